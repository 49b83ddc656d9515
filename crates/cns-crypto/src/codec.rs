use base64::{engine::general_purpose::STANDARD, Engine};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};

use crate::error::{CryptoError, CryptoResult};
use crate::key::EncryptionKey;

/// XChaCha20 nonce size (192 bits), safe for random generation.
pub const NONCE_SIZE: usize = 24;

/// Poly1305 authentication tag size.
pub const TAG_SIZE: usize = 16;

/// Authenticated, text-safe value codec.
///
/// Token layout before base64: `nonce (24 bytes) || ciphertext || tag (16 bytes)`.
pub struct Codec {
    cipher: XChaCha20Poly1305,
}

impl Codec {
    /// Create a codec bound to the given key.
    pub fn new(key: &EncryptionKey) -> Self {
        Self {
            cipher: XChaCha20Poly1305::new(key.as_bytes().into()),
        }
    }

    /// Seal `plaintext` under a fresh random nonce and render it as base64.
    pub fn encode(&self, plaintext: &str) -> CryptoResult<String> {
        let mut nonce = [0u8; NONCE_SIZE];
        rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut nonce);

        let sealed = self
            .cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| CryptoError::EncryptFailed)?;

        let mut raw = Vec::with_capacity(NONCE_SIZE + sealed.len());
        raw.extend_from_slice(&nonce);
        raw.extend_from_slice(&sealed);
        Ok(STANDARD.encode(raw))
    }

    /// Reverse [`Codec::encode`].
    ///
    /// Fails on malformed base64, truncated tokens, authentication failure
    /// (tampering or a different key) and non-UTF-8 plaintext.
    pub fn decode(&self, token: &str) -> CryptoResult<String> {
        let raw = STANDARD
            .decode(token)
            .map_err(|e| CryptoError::MalformedToken(e.to_string()))?;
        if raw.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::TokenTooShort { len: raw.len() });
        }

        let (nonce, sealed) = raw.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(XNonce::from_slice(nonce), sealed)
            .map_err(|_| CryptoError::AuthenticationFailed)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidPlaintext)
    }
}

impl std::fmt::Debug for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Codec").finish_non_exhaustive()
    }
}
