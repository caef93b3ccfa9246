//! The single on-disk sealing key. A key file holds the 32 raw key bytes as
//! URL-safe base64, so it is always 44 ASCII bytes and can be copied or
//! printed without mangling.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::URL_SAFE, Engine};
use chacha20poly1305::aead::KeyInit;
use chacha20poly1305::{ChaCha20Poly1305, Key};
use log::{debug, info};
use rand::rngs::OsRng;
use thiserror::Error;
use zeroize::Zeroize;

use crate::crypto::integrity;

/// Raw key length required by ChaCha20-Poly1305.
pub const KEY_LEN: usize = 32;
/// Length of a key file written by [`load_or_create_key`].
pub const ENCODED_KEY_LEN: usize = 44;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid key length; expected 32 bytes, found {0}")]
    InvalidKeyLength(usize),
    #[error("base64 decoding failed: {0}")]
    Base64DecodeFailed(String),
    #[error("key file {} unreadable: {source}", .path.display())]
    Unreadable { path: PathBuf, source: io::Error },
    #[error("key file {} could not be written: {source}", .path.display())]
    Unwritable { path: PathBuf, source: io::Error },
}

/// Symmetric key used for every seal and open operation.
pub struct SealKey {
    key: Key,
}

impl SealKey {
    /// Draws a fresh key from the operating system RNG.
    pub fn generate() -> Self {
        Self {
            key: ChaCha20Poly1305::generate_key(&mut OsRng),
        }
    }

    pub fn from_bytes(key_bytes: &[u8]) -> Result<Self, KeyError> {
        if key_bytes.len() != KEY_LEN {
            return Err(KeyError::InvalidKeyLength(key_bytes.len()));
        }
        let mut key = Key::default();
        key.copy_from_slice(key_bytes);
        Ok(Self { key })
    }

    /// Parses the text form stored in key files. Surrounding whitespace,
    /// such as a trailing newline added by an editor, is ignored.
    pub fn decode(encoded: &str) -> Result<Self, KeyError> {
        let mut decoded = URL_SAFE
            .decode(encoded.trim().as_bytes())
            .map_err(|e| KeyError::Base64DecodeFailed(format!("{e}")))?;
        let key = Self::from_bytes(&decoded);
        decoded.zeroize();
        key
    }

    pub fn encode(&self) -> String {
        URL_SAFE.encode(self.key.as_slice())
    }

    pub fn fingerprint(&self) -> String {
        integrity::fingerprint(self.key.as_slice())
    }

    pub(crate) fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(&self.key)
    }
}

impl fmt::Debug for SealKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealKey")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

impl Drop for SealKey {
    fn drop(&mut self) {
        self.key.as_mut_slice().zeroize();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrigin {
    /// The key file was missing and a new key was written.
    Generated,
    /// The key file already existed and was reused as-is.
    Existing,
}

#[derive(Debug)]
pub struct LoadedKey {
    pub key: SealKey,
    pub origin: KeyOrigin,
}

/// Returns the key stored at `path`, creating one first if the file does not
/// exist. An existing file is never rewritten.
pub fn load_or_create_key(path: impl AsRef<Path>) -> Result<LoadedKey, KeyError> {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(mut content) => {
            let key = SealKey::decode(&content);
            content.zeroize();
            let key = key?;
            info!("loaded key {} from {}", key.fingerprint(), path.display());
            Ok(LoadedKey {
                key,
                origin: KeyOrigin::Existing,
            })
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!("no key at {}, generating one", path.display());
            let key = SealKey::generate();
            write_new_key_file(path, &key)?;
            info!("generated key {} at {}", key.fingerprint(), path.display());
            Ok(LoadedKey {
                key,
                origin: KeyOrigin::Generated,
            })
        }
        Err(source) => Err(KeyError::Unreadable {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn write_new_key_file(path: &Path, key: &SealKey) -> Result<(), KeyError> {
    let unwritable = |source| KeyError::Unwritable {
        path: path.to_path_buf(),
        source,
    };

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(unwritable)?;
    let mut encoded = key.encode();
    let written = file.write_all(encoded.as_bytes()).and_then(|_| file.sync_all());
    encoded.zeroize();
    written.map_err(unwritable)
}
