//! Error types for the licensing module.

use thiserror::Error;

/// Licensing-specific errors.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// License key bytes are not in a recognised form (e.g. bad base64 armour).
    #[error("invalid license key format: {0}")]
    InvalidKeyFormat(String),

    /// Content could not be encoded (a required field is unset).
    #[error("cannot encode license content: {0}")]
    Encoding(String),

    /// Encoded content is truncated or malformed.
    #[error("cannot decode license content: {0}")]
    Decoding(String),

    /// The license key could not be opened.
    ///
    /// Deliberately carries no detail: wrong password, tampered bytes and
    /// non-license input are indistinguishable to the caller.
    #[error("license key is corrupt or was sealed with a different password")]
    CorruptKey,

    /// Ed25519 signature verification failed.
    #[error("license certificate signature invalid")]
    InvalidSignature,

    /// No key with this alias in the key store.
    #[error("key not found in key store: {0}")]
    KeyNotFound(String),

    /// The private key exists but could not be unlocked.
    #[error("cannot access private key {0}: wrong password or damaged entry")]
    KeyAccess(String),

    /// Producing the signature failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// The content failed a business rule.
    #[error("invalid license content: {0}")]
    Content(#[from] LicenseContentError),

    /// `verify` was called but no license key is installed.
    #[error("no license installed for subject {0}")]
    NoLicenseInstalled(String),

    /// The manager configuration was rejected.
    #[error("invalid license parameters: {0}")]
    InvalidParams(String),

    /// The key store file is malformed.
    #[error("key store error: {0}")]
    KeyStore(String),

    /// The manager's state lock was poisoned by a panicking thread.
    #[error("license manager state poisoned")]
    Poisoned,

    /// File system error (key files, key store).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;

/// A license content validation failure, one variant per rule.
///
/// Rules are checked in declaration order and the first failure wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum LicenseContentError {
    /// The subject does not match the manager's configured subject.
    #[error("invalid subject")]
    InvalidSubject,

    /// No holder.
    #[error("holder is not set")]
    HolderIsNull,

    /// No issuer.
    #[error("issuer is not set")]
    IssuerIsNull,

    /// No issue date.
    #[error("issue date is not set")]
    IssuedIsNull,

    /// The current time is before `not_before`.
    #[error("license is not yet valid")]
    NotYetValid,

    /// The current time is after `not_after`.
    #[error("license has expired")]
    Expired,

    /// No consumer type.
    #[error("consumer type is not set")]
    ConsumerTypeIsNull,

    /// Single-seat mode requires exactly one consumer.
    #[error("consumer amount is not one")]
    ConsumerAmountIsNotOne,

    /// Multi-seat mode requires at least one consumer.
    #[error("consumer amount is not positive")]
    ConsumerAmountIsNotPositive,
}

impl LicenseContentError {
    /// Stable machine-readable reason code.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidSubject => "invalid_subject",
            Self::HolderIsNull => "holder_is_null",
            Self::IssuerIsNull => "issuer_is_null",
            Self::IssuedIsNull => "issued_is_null",
            Self::NotYetValid => "not_yet_valid",
            Self::Expired => "expired",
            Self::ConsumerTypeIsNull => "consumer_type_is_null",
            Self::ConsumerAmountIsNotOne => "consumer_amount_is_not_one",
            Self::ConsumerAmountIsNotPositive => "consumer_amount_is_not_positive",
        }
    }
}
