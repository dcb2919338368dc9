use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// Argon2 rejected the parameters.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Wrong key, wrong associated data or tampered ciphertext. The AEAD
    /// does not tell these apart.
    #[error("decryption failed: wrong key or tampered data")]
    Decryption,

    #[error("invalid salt length: expected {expected}, got {actual}")]
    InvalidSaltLength { expected: usize, actual: usize },

    #[error("sealed data too short: need at least {minimum} bytes, got {actual}")]
    Truncated { minimum: usize, actual: usize },
}
