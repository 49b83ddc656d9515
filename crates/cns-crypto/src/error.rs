/// Errors from key handling and value encryption.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CryptoError {
    /// Key material has the wrong length.
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// Key material is not valid hex.
    #[error("invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    /// The token is not valid base64.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// The decoded token is shorter than a nonce plus an authentication tag.
    #[error("token too short: {len} bytes")]
    TokenTooShort { len: usize },

    /// Authentication failed: the token was tampered with or sealed under another key.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// The decrypted plaintext is not valid UTF-8.
    #[error("plaintext is not valid utf-8")]
    InvalidPlaintext,

    /// The cipher refused to seal the plaintext.
    #[error("encryption failed")]
    EncryptFailed,
}

/// Convenience alias used throughout the crypto crate.
pub type CryptoResult<T> = Result<T, CryptoError>;
