use zeroize::{ZeroizeOnDrop, Zeroizing};

use crate::error::{CryptoError, CryptoResult};

/// Key size in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// Symmetric 256-bit encryption key shared process-wide.
///
/// The bytes are wiped when the key is dropped and never appear in `Debug`
/// output.
#[derive(Clone, ZeroizeOnDrop)]
pub struct EncryptionKey {
    bytes: [u8; KEY_SIZE],
}

impl EncryptionKey {
    /// Generate a new random key from the OS entropy source.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut bytes);
        Self { bytes }
    }

    /// Create from raw 32-byte key material.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Try to create from a slice of exactly [`KEY_SIZE`] bytes.
    pub fn try_from_slice(slice: &[u8]) -> CryptoResult<Self> {
        let bytes: [u8; KEY_SIZE] = slice.try_into().map_err(|_| CryptoError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual: slice.len(),
        })?;
        Ok(Self { bytes })
    }

    /// Parse a key from 64 hex characters (the `cns genkey` output format).
    ///
    /// The decoded buffer is wiped before returning, whether or not it held a
    /// valid key.
    pub fn from_hex(s: &str) -> CryptoResult<Self> {
        let raw = Zeroizing::new(
            hex::decode(s.trim()).map_err(|e| CryptoError::InvalidKeyEncoding(e.to_string()))?,
        );
        Self::try_from_slice(&raw)
    }

    /// Lowercase hex rendering of the key.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EncryptionKey(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_differ() {
        let a = EncryptionKey::generate();
        let b = EncryptionKey::generate();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn hex_roundtrip() {
        let key = EncryptionKey::generate();
        let hex = key.to_hex();
        assert_eq!(hex.len(), 64);
        let parsed = EncryptionKey::from_hex(&hex).unwrap();
        assert_eq!(parsed.as_bytes(), key.as_bytes());
    }

    #[test]
    fn from_hex_trims_whitespace() {
        let hex = format!("  {}\n", "ab".repeat(32));
        let key = EncryptionKey::from_hex(&hex).unwrap();
        assert_eq!(key.as_bytes(), &[0xab; 32]);
    }

    #[test]
    fn rejects_short_key() {
        let err = EncryptionKey::from_hex("abcd").unwrap_err();
        assert_eq!(
            err,
            CryptoError::InvalidKeyLength {
                expected: 32,
                actual: 2
            }
        );
    }

    #[test]
    fn rejects_long_key_and_keeps_parsing_valid_ones() {
        let err = EncryptionKey::from_hex(&"01".repeat(33)).unwrap_err();
        assert_eq!(
            err,
            CryptoError::InvalidKeyLength {
                expected: 32,
                actual: 33
            }
        );
        let key = EncryptionKey::from_hex(&"01".repeat(32)).unwrap();
        assert_eq!(key.as_bytes(), &[1; 32]);
    }

    #[test]
    fn rejects_non_hex() {
        let err = EncryptionKey::from_hex(&"zz".repeat(32)).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidKeyEncoding(_)));
    }

    #[test]
    fn debug_is_redacted() {
        let key = EncryptionKey::from_bytes([7; 32]);
        let debug = format!("{key:?}");
        assert_eq!(debug, "EncryptionKey(<redacted>)");
        assert!(!debug.contains("0707"));
    }
}
