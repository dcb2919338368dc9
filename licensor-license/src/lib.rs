//! License certificate issuing, sealing and verification.
//!
//! This crate handles:
//! - Canonical encoding of license content
//! - Ed25519 signing and verification against a key store
//! - Password-based encryption of the signed certificate (the license key)
//! - Business-rule validation and a short-lived cache of the installed license
//!
//! # Lifecycle
//!
//! Issuing runs `initialize → validate → sign → seal` and yields an opaque
//! byte blob. Installing reverses it with `open → verify → validate`.
//!
//! An unsigned [`LicenseContent`] is freely mutable. Signing produces a
//! [`SignedCertificate`] which has no setters at all, so content cannot be
//! altered once a signature covers it.
//!
//! # License Key Format
//!
//! `version || salt || nonce || ChaCha20-Poly1305(gzip(certificate JSON))`,
//! optionally base64-armoured when written to an `.asc` file.

mod certificate;
mod codec;
mod content;
mod error;
mod keystore;
mod manager;
mod notary;
mod privacy;

pub use certificate::{SignedCertificate, SIGNATURE_ALGORITHM};
pub use codec::{compress, decode, decompress, encode, MAX_DECOMPRESSED_SIZE};
pub use content::{DistinguishedName, LicenseContent};
pub use error::{LicenseContentError, LicenseError, LicenseResult};
pub use keystore::{FileKeyStore, KeyStore, MemoryKeyStore};
pub use manager::{
    LicenseManager, LicenseParams, SigningParams, DEFAULT_CACHE_TTL, DEFAULT_HOLDER,
    MULTI_SEAT_CONSUMER, SINGLE_SEAT_CONSUMER,
};
pub use notary::Notary;
pub use privacy::{
    is_license_file, load_license_key, store_license_key, CipherParams, PrivacyGuard,
    LICENSE_SUFFIX, MAX_KEY_FILE_SIZE,
};
