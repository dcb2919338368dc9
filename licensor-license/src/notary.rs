//! Ed25519 signing and verification of license content.
//!
//! The signature covers the canonical encoding produced by
//! [`codec::encode`](crate::encode), which is carried verbatim inside the
//! certificate. Verification never re-encodes.

use crate::certificate::{SignedCertificate, SIGNATURE_ALGORITHM};
use crate::codec;
use crate::content::LicenseContent;
use crate::error::{LicenseError, LicenseResult};
use crate::keystore::KeyStore;
use ed25519_dalek::{Signature, Signer};
use std::sync::Arc;
use tracing::debug;

/// Signs content with private keys and verifies certificates with a fixed
/// public key.
#[derive(Clone)]
pub struct Notary {
    store: Arc<dyn KeyStore>,
    public_alias: String,
}

impl Notary {
    /// Creates a notary that verifies with the public key under `public_alias`.
    pub fn new(store: Arc<dyn KeyStore>, public_alias: impl Into<String>) -> Self {
        Self {
            store,
            public_alias: public_alias.into(),
        }
    }

    /// Returns the alias used for verification.
    #[must_use]
    pub fn public_alias(&self) -> &str {
        &self.public_alias
    }

    /// Signs the canonical encoding of `content` with the private key under
    /// `alias`.
    pub fn sign(
        &self,
        content: &LicenseContent,
        alias: &str,
        password: &str,
    ) -> LicenseResult<SignedCertificate> {
        let encoded = codec::encode(content)?;
        let signing_key = self.store.private_key(alias, password)?;
        let signature = signing_key
            .try_sign(&encoded)
            .map_err(|e| LicenseError::Signing(e.to_string()))?;

        debug!(alias, bytes = encoded.len(), "signed license content");
        Ok(SignedCertificate::new(
            encoded,
            signature.to_bytes().to_vec(),
            alias,
        ))
    }

    /// Checks the certificate's signature against the configured public key.
    ///
    /// # Errors
    ///
    /// [`LicenseError::InvalidSignature`] on any mismatch, including an
    /// unknown algorithm or a malformed signature;
    /// [`LicenseError::KeyNotFound`] if the public key is unavailable.
    pub fn verify(&self, certificate: &SignedCertificate) -> LicenseResult<()> {
        if certificate.algorithm() != SIGNATURE_ALGORITHM {
            return Err(LicenseError::InvalidSignature);
        }

        let verifying_key = self.store.public_key(&self.public_alias)?;
        let signature = Signature::from_slice(certificate.signature())
            .map_err(|_| LicenseError::InvalidSignature)?;

        verifying_key
            .verify_strict(certificate.encoded(), &signature)
            .map_err(|_| LicenseError::InvalidSignature)?;

        debug!(signer = certificate.signer(), "verified license certificate");
        Ok(())
    }
}
