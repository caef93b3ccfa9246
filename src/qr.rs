//! QR rendering for sealed tokens. Error correction is pinned to level L and
//! the smallest version that holds the payload is chosen automatically.

use std::path::{Path, PathBuf};

use image::{imageops, GrayImage, ImageFormat, Luma};
use log::{debug, info};
use qrcode::types::QrError;
use qrcode::{EcLevel, QrCode, Version};
use thiserror::Error;

const DARK: Luma<u8> = Luma([0]);
const LIGHT: Luma<u8> = Luma([255]);

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("payload of {0} bytes exceeds QR capacity")]
    TooLong(usize),
    #[error("qr encoding failed: {0}")]
    Qr(String),
    #[error("invalid style: {0}")]
    InvalidStyle(String),
    #[error("unable to write image {}: {source}", .path.display())]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// Visual parameters of the rendered image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QrStyle {
    /// Edge length of one QR module, in pixels.
    pub module_size: u32,
    /// Width of the light quiet zone, in modules.
    pub border: u32,
}

impl Default for QrStyle {
    fn default() -> Self {
        Self {
            module_size: 10,
            border: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QrSummary {
    pub version: i16,
    /// Modules per side, excluding the border.
    pub modules: u32,
    /// Pixels per side of the written image.
    pub pixels: u32,
}

/// Encodes `data` and writes it as a grayscale PNG to `output_path`,
/// replacing any existing file. Bytes are stored verbatim, so a reader that
/// maps each decoded byte to one character gets back exactly `data`.
pub fn render_barcode(
    data: &[u8],
    output_path: impl AsRef<Path>,
    style: &QrStyle,
) -> Result<QrSummary, EncodeError> {
    let output_path = output_path.as_ref();
    if style.module_size == 0 {
        return Err(EncodeError::InvalidStyle(
            "module size must be at least one pixel".to_string(),
        ));
    }

    let code = QrCode::with_error_correction_level(data, EcLevel::L).map_err(|e| match e {
        QrError::DataTooLong => EncodeError::TooLong(data.len()),
        other => EncodeError::Qr(format!("{other}")),
    })?;
    let version = match code.version() {
        Version::Normal(v) | Version::Micro(v) => v,
    };
    let modules = code.width() as u32;

    let symbol = code
        .render::<Luma<u8>>()
        .quiet_zone(false)
        .module_dimensions(style.module_size, style.module_size)
        .dark_color(DARK)
        .light_color(LIGHT)
        .build();

    let margin = style.border * style.module_size;
    let pixels = symbol.width() + 2 * margin;
    let mut canvas = GrayImage::from_pixel(pixels, pixels, LIGHT);
    imageops::overlay(&mut canvas, &symbol, i64::from(margin), i64::from(margin));

    debug!(
        "writing {}x{} qr image to {}",
        pixels,
        pixels,
        output_path.display()
    );
    canvas
        .save_with_format(output_path, ImageFormat::Png)
        .map_err(|source| EncodeError::Image {
            path: output_path.to_path_buf(),
            source,
        })?;
    info!(
        "encoded {} bytes as qr version {} ({} modules)",
        data.len(),
        version,
        modules
    );

    Ok(QrSummary {
        version,
        modules,
        pixels,
    })
}
