//! Password-derived symmetric encryption for licensor.
//!
//! License keys and private signing keys are kept confidential at rest with
//! the same scheme: a 256-bit key is derived from a password with Argon2id
//! and a per-blob random salt, then the payload is sealed with
//! ChaCha20-Poly1305 so any modification is detected on open.
//!
//! [`seal_with_password`] and [`open_with_password`] do both steps and own
//! the framing; the lower-level [`derive_key`], [`encrypt`] and [`decrypt`]
//! stay public for callers with their own layout.

mod cipher;
mod error;
mod key;
mod password;

pub use cipher::{decrypt, encrypt, EncryptedData, NONCE_SIZE, TAG_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use key::{derive_key, CipherKey, KdfParams, Salt, KEY_SIZE, SALT_SIZE};
pub use password::{open_with_password, seal_with_password, SEALED_OVERHEAD};
