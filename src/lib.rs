//! Seals a text file under a locally kept key and publishes the sealed
//! token as a QR code. The pieces are usable on their own: `crypto` for
//! keys and tokens, `qr` for rendering, and `pipeline` to run them in order.

pub mod config;
pub mod crypto;
pub mod pipeline;
pub mod qr;
