//! The signed certificate envelope.

use crate::codec;
use crate::content::LicenseContent;
use crate::error::LicenseResult;
use serde::{Deserialize, Serialize};

/// Signature algorithm recorded in every certificate.
pub const SIGNATURE_ALGORITHM: &str = "Ed25519";

/// Canonically encoded license content plus a signature over it.
///
/// Only the [`Notary`](crate::Notary) constructs these. There are no setters:
/// once signed, the content can be read but never changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedCertificate {
    #[serde(with = "base64_bytes")]
    encoded: Vec<u8>,
    #[serde(with = "base64_bytes")]
    signature: Vec<u8>,
    algorithm: String,
    signer: String,
}

impl SignedCertificate {
    pub(crate) fn new(encoded: Vec<u8>, signature: Vec<u8>, signer: &str) -> Self {
        Self {
            encoded,
            signature,
            algorithm: SIGNATURE_ALGORITHM.to_string(),
            signer: signer.to_string(),
        }
    }

    /// Returns the signed bytes.
    #[must_use]
    pub fn encoded(&self) -> &[u8] {
        &self.encoded
    }

    /// Returns the raw signature.
    #[must_use]
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Returns the signature algorithm name.
    #[must_use]
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Returns the key store alias of the key that signed this certificate.
    #[must_use]
    pub fn signer(&self) -> &str {
        &self.signer
    }

    /// Decodes the embedded content.
    ///
    /// This does not check the signature; call
    /// [`Notary::verify`](crate::Notary::verify) first.
    pub fn content(&self) -> LicenseResult<LicenseContent> {
        codec::decode(&self.encoded)
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
