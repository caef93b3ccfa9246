//! Key handling, token sealing, and digest helpers. Each submodule owns a
//! single concern: `keys` persists the secret, `cipher` uses it, and
//! `integrity` only ever identifies data.

pub mod cipher;
pub mod integrity;
pub mod keys;
