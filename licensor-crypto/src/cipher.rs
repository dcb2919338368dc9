//! ChaCha20-Poly1305 with an explicit `nonce || ciphertext` framing.

use crate::error::{CryptoError, CryptoResult};
use crate::key::CipherKey;
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;

/// Nonce length (96 bits).
pub const NONCE_SIZE: usize = 12;

/// Poly1305 tag length, appended to every ciphertext.
pub const TAG_SIZE: usize = 16;

/// One AEAD message: a fresh nonce and the tagged ciphertext.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedData {
    pub nonce: [u8; NONCE_SIZE],
    pub ciphertext: Vec<u8>,
}

impl EncryptedData {
    /// Frames as `nonce || ciphertext`.
    pub fn to_bytes(&self) -> Vec<u8> {
        [self.nonce.as_slice(), self.ciphertext.as_slice()].concat()
    }

    /// Splits a `nonce || ciphertext` frame. The ciphertext must at least
    /// hold a tag.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let minimum = NONCE_SIZE + TAG_SIZE;
        if bytes.len() < minimum {
            return Err(CryptoError::Truncated {
                minimum,
                actual: bytes.len(),
            });
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_SIZE);
        let nonce = nonce.try_into().map_err(|_| CryptoError::Truncated {
            minimum,
            actual: bytes.len(),
        })?;
        Ok(Self {
            nonce,
            ciphertext: ciphertext.to_vec(),
        })
    }
}

/// Encrypts `plaintext` under a random nonce, authenticating `aad` with it.
pub fn encrypt(key: &CipherKey, plaintext: &[u8], aad: &[u8]) -> CryptoResult<EncryptedData> {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);

    let ciphertext = ChaCha20Poly1305::new(key.as_bytes().into())
        .encrypt(Nonce::from_slice(&nonce), Payload { msg: plaintext, aad })
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;
    Ok(EncryptedData { nonce, ciphertext })
}

/// Reverses [`encrypt`]. A wrong key, a different `aad` or any flipped bit
/// fails the same way.
pub fn decrypt(key: &CipherKey, encrypted: &EncryptedData, aad: &[u8]) -> CryptoResult<Vec<u8>> {
    ChaCha20Poly1305::new(key.as_bytes().into())
        .decrypt(
            Nonce::from_slice(&encrypted.nonce),
            Payload {
                msg: &encrypted.ciphertext,
                aad,
            },
        )
        .map_err(|_| CryptoError::Decryption)
}
