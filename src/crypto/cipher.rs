//! Authenticated token sealing built on ChaCha20-Poly1305.
//!
//! A token is URL-safe base64 over
//! `version ‖ issued_at ‖ nonce ‖ ciphertext ‖ tag`. The version byte and
//! the big-endian issue timestamp form the associated data, so neither can
//! be altered without failing authentication. Tokens are plain ASCII and can
//! be embedded anywhere text is accepted, including a QR byte segment.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose::URL_SAFE, Engine};
use chacha20poly1305::aead::{Aead, AeadCore, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use log::debug;
use rand::rngs::OsRng;
use thiserror::Error;

use crate::crypto::keys::SealKey;

const TOKEN_VERSION: u8 = 0x80;
const HEADER_LEN: usize = 9;
const NONCE_LEN: usize = 12;
const TAG_SIZE: usize = 16;
const MIN_TOKEN_LEN: usize = HEADER_LEN + NONCE_LEN + TAG_SIZE;

/// Tokens stamped further than this into the future are refused by
/// [`decrypt_with_ttl`].
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("authentication failed; wrong key or tampered token")]
    Authentication,
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("token expired {age}s after issue (ttl {ttl}s)")]
    Expired { age: u64, ttl: u64 },
    #[error("token issued {0}s in the future")]
    FromFuture(u64),
    #[error("decrypted text is not valid utf-8: {0}")]
    InvalidUtf8(String),
    #[error("system clock unusable: {0}")]
    Clock(String),
}

/// Sealed output of [`encrypt`]. Only holders of the key can open it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ciphertext {
    token: String,
}

impl Ciphertext {
    /// Wraps a token produced elsewhere, e.g. text scanned from a QR code.
    /// Validation is deferred to [`decrypt`].
    pub fn from_token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.token
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.token.as_bytes()
    }

    pub fn into_string(self) -> String {
        self.token
    }
}

impl fmt::Display for Ciphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token)
    }
}

/// Seals `plaintext` under `key`. Every call draws a new random nonce, so
/// identical inputs never produce the same token.
pub fn encrypt(plaintext: &str, key: &SealKey) -> Result<Ciphertext, CipherError> {
    encrypt_at(plaintext, key, unix_now()?)
}

/// Opens a token sealed by [`encrypt`], regardless of its age.
pub fn decrypt(token: &Ciphertext, key: &SealKey) -> Result<String, CipherError> {
    open(token, key).map(|opened| opened.plaintext)
}

/// Like [`decrypt`], but refuses tokens older than `ttl`.
pub fn decrypt_with_ttl(
    token: &Ciphertext,
    key: &SealKey,
    ttl: Duration,
) -> Result<String, CipherError> {
    let opened = open(token, key)?;
    let now = unix_now()?;

    if opened.issued_at > now + MAX_CLOCK_SKEW.as_secs() {
        return Err(CipherError::FromFuture(opened.issued_at - now));
    }
    let age = now.saturating_sub(opened.issued_at);
    if age > ttl.as_secs() {
        return Err(CipherError::Expired {
            age,
            ttl: ttl.as_secs(),
        });
    }
    Ok(opened.plaintext)
}

fn encrypt_at(plaintext: &str, key: &SealKey, issued_at: u64) -> Result<Ciphertext, CipherError> {
    let mut header = [0u8; HEADER_LEN];
    header[0] = TOKEN_VERSION;
    header[1..].copy_from_slice(&issued_at.to_be_bytes());

    let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
    let sealed = key
        .cipher()
        .encrypt(
            &nonce,
            Payload {
                msg: plaintext.as_bytes(),
                aad: &header,
            },
        )
        .map_err(|e| CipherError::EncryptionFailed(format!("{e}")))?;

    let mut raw = Vec::with_capacity(HEADER_LEN + NONCE_LEN + sealed.len());
    raw.extend_from_slice(&header);
    raw.extend_from_slice(&nonce);
    raw.extend_from_slice(&sealed);
    debug!(
        "sealed {} plaintext bytes into {} token bytes",
        plaintext.len(),
        raw.len()
    );

    Ok(Ciphertext {
        token: URL_SAFE.encode(raw),
    })
}

struct Opened {
    issued_at: u64,
    plaintext: String,
}

fn open(token: &Ciphertext, key: &SealKey) -> Result<Opened, CipherError> {
    let raw = URL_SAFE
        .decode(token.as_bytes())
        .map_err(|e| CipherError::Malformed(format!("{e}")))?;
    if raw.len() < MIN_TOKEN_LEN {
        return Err(CipherError::Malformed(format!(
            "token truncated to {} bytes",
            raw.len()
        )));
    }
    if raw[0] != TOKEN_VERSION {
        return Err(CipherError::Malformed(format!(
            "unknown token version {:#04x}",
            raw[0]
        )));
    }

    let (header, rest) = raw.split_at(HEADER_LEN);
    let (nonce, sealed) = rest.split_at(NONCE_LEN);
    let mut stamp = [0u8; 8];
    stamp.copy_from_slice(&header[1..]);

    let plaintext = key
        .cipher()
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: sealed,
                aad: header,
            },
        )
        .map_err(|_| CipherError::Authentication)?;
    let plaintext =
        String::from_utf8(plaintext).map_err(|e| CipherError::InvalidUtf8(format!("{e}")))?;

    Ok(Opened {
        issued_at: u64::from_be_bytes(stamp),
        plaintext,
    })
}

fn unix_now() -> Result<u64, CipherError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .map_err(|e| CipherError::Clock(format!("{e}")))
}

#[cfg(test)]
mod tests {
    use super::{
        decrypt, decrypt_with_ttl, encrypt, encrypt_at, unix_now, Ciphertext, CipherError,
        HEADER_LEN, MIN_TOKEN_LEN,
    };
    use crate::crypto::keys::SealKey;
    use base64::{engine::general_purpose::URL_SAFE, Engine};
    use std::time::Duration;

    fn reseal(raw: &[u8]) -> Ciphertext {
        Ciphertext::from_token(URL_SAFE.encode(raw))
    }

    #[test]
    fn encrypts_and_decrypts_round_trip() {
        let key = SealKey::from_bytes(&[42u8; 32]).expect("key should be valid");
        for text in ["hello world", "", "ünïcødé ✓ 漢字", "line one\nline two\n"] {
            let token = encrypt(text, &key).expect("encryption should succeed");
            assert_eq!(decrypt(&token, &key).expect("decryption should succeed"), text);
        }
    }

    #[test]
    fn encryption_is_randomized() {
        let key = SealKey::generate();
        let first = encrypt("same input", &key).unwrap();
        let second = encrypt("same input", &key).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn tokens_are_ascii() {
        let key = SealKey::generate();
        let token = encrypt("\u{00ff}\u{0100} binary-ish", &key).unwrap();
        assert!(token.as_bytes().iter().all(u8::is_ascii));
        assert!(token.as_bytes().len() >= MIN_TOKEN_LEN);
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let token = encrypt("hello world", &SealKey::generate()).unwrap();
        let err = decrypt(&token, &SealKey::generate()).unwrap_err();
        assert!(matches!(err, CipherError::Authentication));
    }

    #[test]
    fn detects_tampered_ciphertext() {
        let key = SealKey::generate();
        let token = encrypt("hello world", &key).unwrap();
        let mut raw = URL_SAFE.decode(token.as_bytes()).unwrap();

        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let err = decrypt(&reseal(&raw), &key).unwrap_err();
        assert!(matches!(err, CipherError::Authentication));
    }

    #[test]
    fn detects_tampered_timestamp() {
        let key = SealKey::generate();
        let token = encrypt("hello world", &key).unwrap();
        let mut raw = URL_SAFE.decode(token.as_bytes()).unwrap();

        raw[HEADER_LEN - 1] ^= 0x01;
        let err = decrypt(&reseal(&raw), &key).unwrap_err();
        assert!(matches!(err, CipherError::Authentication));
    }

    #[test]
    fn rejects_truncated_and_garbled_tokens() {
        let key = SealKey::generate();
        let token = encrypt("hello world", &key).unwrap();

        let truncated = Ciphertext::from_token(&token.as_str()[..20]);
        let err = decrypt(&truncated, &key).unwrap_err();
        assert!(format!("{err}").contains("truncated"));

        let garbled = Ciphertext::from_token("%%% not a token %%%");
        assert!(matches!(
            decrypt(&garbled, &key).unwrap_err(),
            CipherError::Malformed(_)
        ));
    }

    #[test]
    fn rejects_unknown_version() {
        let key = SealKey::generate();
        let token = encrypt("hello world", &key).unwrap();
        let mut raw = URL_SAFE.decode(token.as_bytes()).unwrap();
        raw[0] = 0x01;

        let err = decrypt(&reseal(&raw), &key).unwrap_err();
        assert!(format!("{err}").contains("unknown token version 0x01"));
    }

    #[test]
    fn ttl_accepts_fresh_tokens() {
        let key = SealKey::generate();
        let token = encrypt("fresh", &key).unwrap();
        let text = decrypt_with_ttl(&token, &key, Duration::from_secs(60)).unwrap();
        assert_eq!(text, "fresh");
    }

    #[test]
    fn ttl_rejects_old_tokens() {
        let key = SealKey::generate();
        let hour_ago = unix_now().unwrap() - 3600;
        let token = encrypt_at("stale", &key, hour_ago).unwrap();

        let err = decrypt_with_ttl(&token, &key, Duration::from_secs(60)).unwrap_err();
        assert!(matches!(err, CipherError::Expired { ttl: 60, .. }));
        assert_eq!(
            decrypt_with_ttl(&token, &key, Duration::from_secs(7200)).unwrap(),
            "stale"
        );
        assert_eq!(decrypt(&token, &key).unwrap(), "stale");
    }

    #[test]
    fn ttl_rejects_tokens_from_the_future() {
        let key = SealKey::generate();
        let later = unix_now().unwrap() + 3600;
        let token = encrypt_at("early", &key, later).unwrap();

        let err = decrypt_with_ttl(&token, &key, Duration::from_secs(7200)).unwrap_err();
        assert!(matches!(err, CipherError::FromFuture(_)));
    }
}
