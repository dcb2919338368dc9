//! Confidentiality of signed certificates at rest.
//!
//! A sealed license key is laid out as:
//!
//! ```text
//! version (1) || salt (16) || nonce (12) || ciphertext (+16 byte tag)
//! ```
//!
//! The plaintext is the gzip-compressed certificate JSON. The key is derived
//! from the cipher password and the salt with Argon2id; version and salt are
//! authenticated as associated data.

use crate::certificate::SignedCertificate;
use crate::codec;
use crate::error::{LicenseError, LicenseResult};
use base64::{engine::general_purpose::STANDARD, Engine};
use licensor_crypto::{open_with_password, seal_with_password, KdfParams};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Current sealed key format version.
const KEY_FORMAT_VERSION: u8 = 1;

/// Suffix for license key files. Must be lowercase.
pub const LICENSE_SUFFIX: &str = ".lic";

/// Suffix that marks a base64-armoured key file.
const ARMOURED_SUFFIX: &str = ".asc";

/// Largest key file that will be read.
pub const MAX_KEY_FILE_SIZE: u64 = 1024 * 1024;

/// Cipher configuration: the shared password and KDF cost.
#[derive(Clone)]
pub struct CipherParams {
    password: String,
    kdf: KdfParams,
}

impl CipherParams {
    /// Creates cipher parameters with the default KDF cost.
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
            kdf: KdfParams::default(),
        }
    }

    /// Overrides the KDF cost. Sealing and opening sides must agree.
    #[must_use]
    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    /// Returns the cipher password.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Returns the KDF parameters.
    pub fn kdf(&self) -> &KdfParams {
        &self.kdf
    }
}

impl fmt::Debug for CipherParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherParams")
            .field("password", &"[REDACTED]")
            .field("kdf", &self.kdf)
            .finish()
    }
}

/// Seals certificates into license keys and opens them again.
#[derive(Debug, Clone)]
pub struct PrivacyGuard {
    params: CipherParams,
}

impl PrivacyGuard {
    /// Creates a guard for the given cipher parameters.
    pub fn new(params: CipherParams) -> Self {
        Self { params }
    }

    /// Compresses and encrypts a certificate into an opaque license key.
    pub fn seal(&self, certificate: &SignedCertificate) -> LicenseResult<Vec<u8>> {
        let json = serde_json::to_vec(certificate)?;
        let compressed = codec::compress(&json)?;

        let body = seal_with_password(
            self.params.password(),
            self.params.kdf(),
            &compressed,
            &[KEY_FORMAT_VERSION],
        )
        .map_err(|e| LicenseError::Encoding(e.to_string()))?;
        let sealed = [&[KEY_FORMAT_VERSION][..], body.as_slice()].concat();

        debug!(bytes = sealed.len(), "sealed license certificate");
        Ok(sealed)
    }

    /// Decrypts and decompresses a license key back into a certificate.
    ///
    /// # Errors
    ///
    /// Every failure is reported as [`LicenseError::CorruptKey`].
    pub fn open(&self, key: &[u8]) -> LicenseResult<SignedCertificate> {
        self.try_open(key).ok_or(LicenseError::CorruptKey)
    }

    fn try_open(&self, key: &[u8]) -> Option<SignedCertificate> {
        let (&version, body) = key.split_first()?;
        if version != KEY_FORMAT_VERSION {
            return None;
        }
        let compressed =
            open_with_password(self.params.password(), self.params.kdf(), body, &[version]).ok()?;
        let json = codec::decompress(&compressed).ok()?;
        serde_json::from_slice(&json).ok()
    }
}

fn has_suffix(path: &Path, suffix: &str) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.to_ascii_lowercase().ends_with(suffix))
}

/// Returns true if `path` looks like a license key file (`.lic` or `.asc`).
#[must_use]
pub fn is_license_file(path: &Path) -> bool {
    has_suffix(path, LICENSE_SUFFIX) || has_suffix(path, ARMOURED_SUFFIX)
}

/// Reads a license key file, undoing base64 armour if present.
///
/// Armour is assumed for `.asc` files and for content ending in `==`. A
/// binary key that happens to end in `==` is returned as is when it does not
/// decode as base64. Files larger than [`MAX_KEY_FILE_SIZE`] are truncated
/// and will fail to open.
pub fn load_license_key(path: &Path) -> LicenseResult<Vec<u8>> {
    let mut raw = Vec::new();
    File::open(path)?
        .take(MAX_KEY_FILE_SIZE)
        .read_to_end(&mut raw)?;

    let text = raw.trim_ascii();
    if has_suffix(path, ARMOURED_SUFFIX) {
        return STANDARD
            .decode(text)
            .map_err(|e| LicenseError::InvalidKeyFormat(format!("invalid base64 armour: {e}")));
    }
    if text.ends_with(b"==") {
        if let Ok(decoded) = STANDARD.decode(text) {
            return Ok(decoded);
        }
    }
    Ok(raw)
}

/// Writes a license key file; `.asc` paths get base64 armour.
pub fn store_license_key(key: &[u8], path: &Path) -> LicenseResult<()> {
    if has_suffix(path, ARMOURED_SUFFIX) {
        std::fs::write(path, STANDARD.encode(key))?;
    } else {
        std::fs::write(path, key)?;
    }
    Ok(())
}
