//! Error types for the registry.

use crate::code::CodeFormatError;
use licensor_license::LicenseError;
use thiserror::Error;

/// Registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The activation code is malformed. Checked before any lookup.
    #[error("invalid activation code: {0}")]
    Format(#[from] CodeFormatError),

    /// No record exists for this activation code.
    #[error("activation code not found: {0}")]
    NotFound(String),

    /// A record with this activation code already exists.
    #[error("activation code already exists: {0}")]
    AlreadyExists(String),

    /// A persisted or imported record has an invalid field.
    #[error("invalid record {code}: {reason}")]
    InvalidRecord { code: String, reason: String },

    /// The record already has a successor.
    #[error("activation code {code} was already upgraded to {replaced_by}")]
    AlreadyUpgraded { code: String, replaced_by: String },

    /// No manager is configured for the record's certificate type.
    #[error("no signing identity configured for {0} certificates")]
    NoIssuer(String),

    /// Fresh code generation kept hitting existing records.
    #[error("no unused activation code found after {0} attempts")]
    CodesExhausted(usize),

    /// Issuing or verifying the license failed.
    #[error(transparent)]
    License(#[from] LicenseError),

    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error in a record or import file.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

impl RegistryError {
    pub(crate) fn invalid(code: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            code: code.into(),
            reason: reason.into(),
        }
    }
}
