//! Symmetric string encryption built on Fernet.
//! Stored ciphertexts are the Fernet token wrapped in one more URL-safe
//! base64 layer.

use base64::{engine::general_purpose::URL_SAFE, Engine};
use fernet::Fernet;
use thiserror::Error;
use tracing::warn;

use crate::config::CryptoConfig;

/// Returned by [`Cryptography::decrypt_or_sentinel`] on any failure.
pub const DECRYPTION_ERROR: &str = "Decryption Error";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("ENCRYPTION_KEY must be set")]
    MissingKey,
    #[error("ENCRYPTION_KEY is not a valid Fernet key")]
    InvalidKey,
    #[error("ciphertext is not valid url-safe base64")]
    Encoding,
    #[error("token is malformed, tampered, expired or was issued under another key")]
    Token,
    #[error("decrypted payload is not valid UTF-8")]
    Utf8,
}

pub struct Cryptography {
    cipher: Fernet,
    ttl_secs: Option<u64>,
}

impl Cryptography {
    pub fn new(cfg: &CryptoConfig) -> Result<Self, CryptoError> {
        let key = cfg
            .encryption_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(CryptoError::MissingKey)?;
        let cipher = Fernet::new(key.trim()).ok_or(CryptoError::InvalidKey)?;
        Ok(Self {
            cipher,
            ttl_secs: cfg.token_ttl_secs,
        })
    }

    /// Fresh random key in the format `ENCRYPTION_KEY` expects.
    pub fn generate_key() -> String {
        Fernet::generate_key()
    }

    pub fn encrypt(&self, plaintext: &str) -> String {
        let token = self.cipher.encrypt(plaintext.as_bytes());
        URL_SAFE.encode(token.as_bytes())
    }

    pub fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        let decoded = URL_SAFE
            .decode(ciphertext.trim().as_bytes())
            .map_err(|_| CryptoError::Encoding)?;
        let token = std::str::from_utf8(&decoded).map_err(|_| CryptoError::Encoding)?;

        let plain = match self.ttl_secs {
            Some(ttl) => self.cipher.decrypt_with_ttl(token, ttl),
            None => self.cipher.decrypt(token),
        }
        .map_err(|_| CryptoError::Token)?;

        String::from_utf8(plain).map_err(|_| CryptoError::Utf8)
    }

    /// Legacy form of [`decrypt`](Self::decrypt) for callers that store or
    /// display the result as-is.
    pub fn decrypt_or_sentinel(&self, ciphertext: &str) -> String {
        self.decrypt(ciphertext).unwrap_or_else(|e| {
            warn!(error = %e, "decrypt failed");
            DECRYPTION_ERROR.to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(key: Option<String>) -> CryptoConfig {
        CryptoConfig {
            encryption_key: key,
            token_ttl_secs: None,
        }
    }

    fn cipher_with(byte: u8) -> Cryptography {
        let key = URL_SAFE.encode([byte; 32]);
        Cryptography::new(&config(Some(key))).expect("valid key")
    }

    #[test]
    fn round_trips_plaintext() {
        let c = cipher_with(7);
        for s in ["", "hello", "ünïcødé ✓", "a much longer string with spaces and 123"] {
            let token = c.encrypt(s);
            assert_ne!(token, s);
            assert_eq!(c.decrypt(&token).unwrap(), s);
        }
    }

    #[test]
    fn outer_layer_is_url_safe_base64_of_a_fernet_token() {
        let c = cipher_with(7);
        let token = c.encrypt("payload");
        let inner = URL_SAFE.decode(token.as_bytes()).unwrap();
        let inner = String::from_utf8(inner).unwrap();
        // Fernet tokens start with version byte 0x80, which encodes as "gAAAAA".
        assert!(inner.starts_with("gAAAAA"));
    }

    #[test]
    fn generated_key_is_accepted() {
        let key = Cryptography::generate_key();
        let c = Cryptography::new(&config(Some(key))).unwrap();
        assert_eq!(c.decrypt(&c.encrypt("x")).unwrap(), "x");
    }

    #[test]
    fn missing_key_fails_construction() {
        assert_eq!(
            Cryptography::new(&config(None)).err(),
            Some(CryptoError::MissingKey)
        );
        assert_eq!(
            Cryptography::new(&config(Some("   ".into()))).err(),
            Some(CryptoError::MissingKey)
        );
    }

    #[test]
    fn malformed_key_fails_construction() {
        assert_eq!(
            Cryptography::new(&config(Some("not-a-key".into()))).err(),
            Some(CryptoError::InvalidKey)
        );
    }

    #[test]
    fn garbage_input_is_an_encoding_error() {
        let c = cipher_with(7);
        assert_eq!(c.decrypt("not a valid token!"), Err(CryptoError::Encoding));
    }

    #[test]
    fn wrong_key_is_a_token_error() {
        let token = cipher_with(1).encrypt("secret");
        assert_eq!(cipher_with(2).decrypt(&token), Err(CryptoError::Token));
    }

    #[test]
    fn tampered_token_is_a_token_error() {
        let c = cipher_with(7);
        let inner = String::from_utf8(URL_SAFE.decode(c.encrypt("secret")).unwrap()).unwrap();
        let mut chars: Vec<char> = inner.chars().collect();
        let mid = chars.len() / 2;
        chars[mid] = if chars[mid] == 'A' { 'B' } else { 'A' };
        let tampered: String = chars.into_iter().collect();
        assert_eq!(
            c.decrypt(&URL_SAFE.encode(tampered)),
            Err(CryptoError::Token)
        );
    }

    #[test]
    fn sentinel_form_never_fails() {
        let c = cipher_with(7);
        assert_eq!(c.decrypt_or_sentinel("not-a-valid-token"), DECRYPTION_ERROR);
        let token = c.encrypt("ok");
        assert_eq!(c.decrypt_or_sentinel(&token), "ok");
    }
}
