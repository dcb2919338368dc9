//! Password sealing: key derivation and AEAD in one framed blob.
//!
//! ```text
//! salt (16) || nonce (12) || ciphertext (+16 byte tag)
//! ```
//!
//! The associated data is `context || salt`. Callers bind whatever must not
//! be swapped (a format version, a key alias) through `context`.

use crate::cipher::{decrypt, encrypt, EncryptedData, NONCE_SIZE, TAG_SIZE};
use crate::error::{CryptoError, CryptoResult};
use crate::key::{derive_key, KdfParams, Salt, SALT_SIZE};

/// Size of the smallest sealed blob (empty plaintext).
pub const SEALED_OVERHEAD: usize = SALT_SIZE + NONCE_SIZE + TAG_SIZE;

fn associated_data(context: &[u8], salt: &Salt) -> Vec<u8> {
    [context, salt.as_bytes().as_slice()].concat()
}

/// Seals `plaintext` under a key derived from `password` and a fresh salt.
pub fn seal_with_password(
    password: &str,
    kdf: &KdfParams,
    plaintext: &[u8],
    context: &[u8],
) -> CryptoResult<Vec<u8>> {
    let salt = Salt::random();
    let key = derive_key(password, &salt, kdf)?;
    let encrypted = encrypt(&key, plaintext, &associated_data(context, &salt))?;

    let mut sealed = Vec::with_capacity(SEALED_OVERHEAD + plaintext.len());
    sealed.extend_from_slice(salt.as_bytes());
    sealed.extend_from_slice(&encrypted.to_bytes());
    Ok(sealed)
}

/// Opens a blob made by [`seal_with_password`] with the same password, KDF
/// cost and context.
pub fn open_with_password(
    password: &str,
    kdf: &KdfParams,
    sealed: &[u8],
    context: &[u8],
) -> CryptoResult<Vec<u8>> {
    if sealed.len() < SEALED_OVERHEAD {
        return Err(CryptoError::Truncated {
            minimum: SEALED_OVERHEAD,
            actual: sealed.len(),
        });
    }
    let (salt, body) = sealed.split_at(SALT_SIZE);
    let salt = Salt::from_slice(salt)?;
    let key = derive_key(password, &salt, kdf)?;
    decrypt(
        &key,
        &EncryptedData::from_bytes(body)?,
        &associated_data(context, &salt),
    )
}
