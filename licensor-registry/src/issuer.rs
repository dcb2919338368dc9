//! Turning registry records into signed license keys.

use crate::error::{RegistryError, RegistryResult};
use crate::record::{CertType, LicenseRecord};
use chrono::{DateTime, Local, NaiveDate, NaiveTime, Utc};
use licensor_license::{DistinguishedName, LicenseContent, LicenseManager, SigningParams};
use std::collections::BTreeMap;
use tracing::info;

/// The manager and signing key used for one certificate type.
pub struct IssuerIdentity {
    pub manager: LicenseManager,
    pub signer: SigningParams,
}

/// Issues license keys for records, choosing the signing identity by the
/// record's [`CertType`].
pub struct Issuer {
    issuer_dn: DistinguishedName,
    identities: BTreeMap<CertType, IssuerIdentity>,
}

/// Start of `date` in local time, as UTC.
fn local_midnight(date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    naive
        .and_local_timezone(Local)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|| naive.and_utc())
}

impl Issuer {
    /// Creates an issuer that stamps `issuer_dn` on every license.
    #[must_use]
    pub fn new(issuer_dn: DistinguishedName) -> Self {
        Self {
            issuer_dn,
            identities: BTreeMap::new(),
        }
    }

    /// Registers the identity for a certificate type, replacing any previous
    /// one.
    #[must_use]
    pub fn with_identity(
        mut self,
        cert: CertType,
        manager: LicenseManager,
        signer: SigningParams,
    ) -> Self {
        self.identities
            .insert(cert, IssuerIdentity { manager, signer });
        self
    }

    /// Returns the identity for `cert`.
    pub fn identity(&self, cert: CertType) -> RegistryResult<&IssuerIdentity> {
        self.identities
            .get(&cert)
            .ok_or_else(|| RegistryError::NoIssuer(cert.to_string()))
    }

    /// Lists the configured certificate types.
    pub fn cert_types(&self) -> impl Iterator<Item = CertType> + '_ {
        self.identities.keys().copied()
    }

    /// Builds the license content for a record.
    ///
    /// The holder name is `CN` (first and last name, else the canonical name)
    /// followed by `O`, `STREET`, `L`, `ST`, `C` and `UID` (purchase id), each
    /// only when set. Subject and not-before are left for the manager to
    /// fill.
    #[must_use]
    pub fn content_for(&self, record: &LicenseRecord) -> LicenseContent {
        let details = &record.holder;
        let mut holder = DistinguishedName::new();
        if let Some(cn) = details.common_name() {
            holder.push("CN", &cn);
        }
        let rest = [
            ("O", &details.organization),
            ("STREET", &details.street),
            ("L", &details.city),
            ("ST", &details.state),
            ("C", &details.country),
            ("UID", &details.purchase_id),
        ];
        for (attribute, value) in rest {
            if let Some(value) = value {
                holder.push(attribute, value);
            }
        }

        LicenseContent {
            holder: (!holder.is_empty()).then_some(holder),
            issuer: Some(self.issuer_dn.clone()),
            issued: Some(local_midnight(record.issued_or_today())),
            not_after: record.expire.map(local_midnight),
            consumer_type: Some(record.license_type.clone()),
            consumer_amount: record.quantity,
            ..LicenseContent::default()
        }
    }

    /// Issues a sealed license key for `record` without modifying it.
    pub fn issue(&self, record: &LicenseRecord) -> RegistryResult<Vec<u8>> {
        let identity = self.identity(record.cert)?;
        let key = identity
            .manager
            .issue(self.content_for(record), &identity.signer)?;
        info!(
            code = %record.activation_code,
            cert = %record.cert,
            subject = identity.manager.subject(),
            "issued license for activation code"
        );
        Ok(key)
    }

    /// Verifies the key stored in `record` with the matching manager.
    pub fn verify(&self, record: &LicenseRecord) -> RegistryResult<LicenseContent> {
        let key = record
            .key_bytes()?
            .ok_or_else(|| RegistryError::invalid(record.activation_code.as_str(), "no license key issued"))?;
        let identity = self.identity(record.cert)?;
        Ok(identity.manager.verify_key(&key)?)
    }
}
