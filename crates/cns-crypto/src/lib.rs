//! Value encryption for the cloud-native store.
//!
//! Values are sealed with XChaCha20-Poly1305 under a process-wide 256-bit
//! [`EncryptionKey`] and rendered as standard base64 so they can travel
//! through string-typed storage backends and the transaction log.
//!
//! Every call to [`Codec::encode`] draws a fresh random nonce, so encoding the
//! same plaintext twice never yields the same token.
//!
//! All crypto operations wrap established libraries; there is no custom cryptography.

pub mod codec;
pub mod error;
pub mod key;

pub use codec::Codec;
pub use error::{CryptoError, CryptoResult};
pub use key::{EncryptionKey, KEY_SIZE};
