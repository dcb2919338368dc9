//! The persisted state of one activation code.

use crate::code::ActivationCode;
use crate::error::{RegistryError, RegistryResult};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{Local, NaiveDate};
use licensor_license::LicenseError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Date format used in record files.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// License type of a fresh record.
pub const DEFAULT_LICENSE_TYPE: &str = "User";

/// License type of an aggregate site record.
pub const SITE_LICENSE_TYPE: &str = "Site";

/// Which signing identity (product subject and key) issues the license.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CertType {
    #[default]
    User,
    Timed,
    Server,
}

impl CertType {
    pub const ALL: [CertType; 3] = [CertType::User, CertType::Timed, CertType::Server];

    /// Numeric code stored in record files.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::User => 0,
            Self::Timed => 1,
            Self::Server => 2,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Timed => "timed",
            Self::Server => "server",
        }
    }
}

impl fmt::Display for CertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CertType {
    type Err = String;

    /// Accepts the numeric code or the name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| s == t.code().to_string() || s.eq_ignore_ascii_case(t.name()))
            .ok_or_else(|| format!("unknown certificate type {s:?}"))
    }
}

impl Serialize for CertType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for CertType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Who a license is issued to. All fields are optional free text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HolderDetails {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Full name, used when first or last name is missing.
    pub canonical_name: Option<String>,
    pub organization: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    /// Country code.
    pub country: Option<String>,
    pub purchase_id: Option<String>,
    pub email: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl HolderDetails {
    /// First and last name joined, else the canonical name.
    #[must_use]
    pub fn common_name(&self) -> Option<String> {
        match (non_blank(&self.first_name), non_blank(&self.last_name)) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            _ => non_blank(&self.canonical_name).map(str::to_string),
        }
    }

    /// Copies every field of `other` that is unset here.
    pub fn fill_missing(&mut self, other: &HolderDetails) {
        let pairs = [
            (&mut self.first_name, &other.first_name),
            (&mut self.last_name, &other.last_name),
            (&mut self.canonical_name, &other.canonical_name),
            (&mut self.organization, &other.organization),
            (&mut self.street, &other.street),
            (&mut self.city, &other.city),
            (&mut self.state, &other.state),
            (&mut self.country, &other.country),
            (&mut self.purchase_id, &other.purchase_id),
            (&mut self.email, &other.email),
        ];
        for (mine, theirs) in pairs {
            if mine.is_none() {
                mine.clone_from(theirs);
            }
        }
    }

    fn fields(&self) -> [(&'static str, &Option<String>); 10] {
        [
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
            ("canonicalName", &self.canonical_name),
            ("organization", &self.organization),
            ("street", &self.street),
            ("city", &self.city),
            ("state", &self.state),
            ("country", &self.country),
            ("purchaseId", &self.purchase_id),
            ("email", &self.email),
        ]
    }
}

/// One activation code's full state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseRecord {
    pub activation_code: ActivationCode,
    /// The code this record was upgraded to.
    pub replaced_by: Option<ActivationCode>,
    /// The code this record is an upgrade of.
    pub upgraded_from: Option<ActivationCode>,
    /// Constituent codes when this is a site license; empty otherwise.
    pub site_license: Vec<ActivationCode>,
    pub holder: HolderDetails,
    /// Redemption date; `None` until the code is redeemed.
    pub issued: Option<NaiveDate>,
    /// `None` for a perpetual license.
    pub expire: Option<NaiveDate>,
    /// Seat count.
    pub quantity: u32,
    /// Tier label such as `User`, `Academic`, `NFP` or `Site`.
    pub license_type: String,
    pub cert: CertType,
    /// Base64 of the sealed license key, once issued.
    pub key: Option<String>,
}

/// Today's date in local time.
pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn derived_purchase_id(code: &ActivationCode) -> String {
    hex::encode(&Sha256::digest(code.as_str().as_bytes())[..16])
}

impl LicenseRecord {
    /// Creates an empty, unredeemed `User` record.
    #[must_use]
    pub fn new(activation_code: ActivationCode) -> Self {
        Self {
            activation_code,
            replaced_by: None,
            upgraded_from: None,
            site_license: Vec::new(),
            holder: HolderDetails::default(),
            issued: None,
            expire: None,
            quantity: 1,
            license_type: DEFAULT_LICENSE_TYPE.to_string(),
            cert: CertType::User,
            key: None,
        }
    }

    /// Returns true if this record aggregates other codes.
    #[must_use]
    pub fn is_site_license(&self) -> bool {
        !self.site_license.is_empty()
    }

    /// Returns true if no successor has been generated yet.
    #[must_use]
    pub fn is_upgradable(&self) -> bool {
        self.replaced_by.is_none()
    }

    /// The issue date, or today for a record not yet redeemed.
    #[must_use]
    pub fn issued_or_today(&self) -> NaiveDate {
        self.issued.unwrap_or_else(today)
    }

    /// Decodes the stored license key.
    pub fn key_bytes(&self) -> RegistryResult<Option<Vec<u8>>> {
        self.key
            .as_deref()
            .map(|key| {
                STANDARD.decode(key.trim()).map_err(|e| {
                    RegistryError::from(LicenseError::InvalidKeyFormat(format!(
                        "record {}: {e}",
                        self.activation_code
                    )))
                })
            })
            .transpose()
    }

    /// Stores a sealed license key.
    pub fn set_key(&mut self, key: &[u8]) {
        self.key = Some(STANDARD.encode(key));
    }

    /// Checks record-level invariants.
    pub fn check(&self) -> RegistryResult<()> {
        if self.quantity == 0 {
            return Err(RegistryError::invalid(
                self.activation_code.as_str(),
                "quantity must be positive",
            ));
        }
        if self.expire.is_some_and(|expire| expire <= self.issued_or_today()) {
            return Err(RegistryError::invalid(
                self.activation_code.as_str(),
                "expiry date must be after the issue date",
            ));
        }
        Ok(())
    }

    /// Flattens the populated fields into the persisted string map.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("activationCode".to_string(), self.activation_code.to_string());
        map.insert("licenseType".to_string(), self.license_type.clone());
        map.insert("cert".to_string(), self.cert.code().to_string());
        map.insert("quantity".to_string(), self.quantity.to_string());

        if let Some(code) = &self.replaced_by {
            map.insert("replacedBy".to_string(), code.to_string());
        }
        if let Some(code) = &self.upgraded_from {
            map.insert("upgradedFrom".to_string(), code.to_string());
        }
        if self.is_site_license() {
            let codes: Vec<&str> = self.site_license.iter().map(ActivationCode::as_str).collect();
            map.insert("siteLicense".to_string(), codes.join(","));
        }
        for (name, value) in self.holder.fields() {
            if let Some(value) = value {
                map.insert(name.to_string(), value.clone());
            }
        }
        if let Some(issued) = self.issued {
            map.insert("issued".to_string(), issued.format(DATE_FORMAT).to_string());
        }
        if let Some(expire) = self.expire {
            map.insert("expire".to_string(), expire.format(DATE_FORMAT).to_string());
        }
        if let Some(key) = &self.key {
            map.insert("key".to_string(), key.clone());
        }
        map
    }

    /// Rebuilds a record from its persisted string map.
    ///
    /// Missing fields take their defaults: not yet issued, quantity 1, type
    /// `User`, certificate type `User`, and a purchase id derived from the
    /// activation code. Unknown keys are ignored.
    pub fn from_map(map: &BTreeMap<String, String>) -> RegistryResult<Self> {
        let raw_code = map
            .get("activationCode")
            .ok_or_else(|| RegistryError::invalid("", "activationCode is missing"))?;
        let code = ActivationCode::parse(raw_code)?;
        let invalid = |reason: String| RegistryError::invalid(code.as_str(), reason);

        let linked = |field: &str| -> RegistryResult<Option<ActivationCode>> {
            map.get(field)
                .map(|v| ActivationCode::parse(v))
                .transpose()
                .map_err(|e| invalid(format!("{field}: {e}")))
        };
        let date = |field: &str| -> RegistryResult<Option<NaiveDate>> {
            map.get(field)
                .map(|v| NaiveDate::parse_from_str(v.trim(), DATE_FORMAT))
                .transpose()
                .map_err(|e| invalid(format!("{field}: {e}")))
        };
        let text = |field: &str| map.get(field).cloned();

        let site_license = match map.get("siteLicense") {
            Some(codes) => parse_code_list(codes).map_err(|e| invalid(format!("siteLicense: {e}")))?,
            None => Vec::new(),
        };

        let cert = match map.get("cert") {
            Some(v) => v
                .parse::<CertType>()
                .map_err(|e| invalid(format!("cert: {e}")))?,
            None => CertType::User,
        };
        let quantity = match map.get("quantity") {
            Some(v) => v
                .trim()
                .parse::<u32>()
                .map_err(|e| invalid(format!("quantity: {e}")))?,
            None => 1,
        };

        let holder = HolderDetails {
            first_name: text("firstName"),
            last_name: text("lastName"),
            canonical_name: text("canonicalName"),
            organization: text("organization"),
            street: text("street"),
            city: text("city"),
            state: text("state"),
            country: text("country"),
            purchase_id: Some(
                text("purchaseId").unwrap_or_else(|| derived_purchase_id(&code)),
            ),
            email: text("email"),
        };

        let record = Self {
            replaced_by: linked("replacedBy")?,
            upgraded_from: linked("upgradedFrom")?,
            site_license,
            holder,
            issued: date("issued")?,
            expire: date("expire")?,
            quantity,
            license_type: text("licenseType").unwrap_or_else(|| DEFAULT_LICENSE_TYPE.to_string()),
            cert,
            key: text("key"),
            activation_code: code.clone(),
        };
        record.check()?;
        Ok(record)
    }
}

/// Parses a comma-separated list of activation codes, skipping blanks.
pub(crate) fn parse_code_list(codes: &str) -> Result<Vec<ActivationCode>, crate::CodeFormatError> {
    codes
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(ActivationCode::parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cert_type_parses_code_and_name() {
        assert_eq!("2".parse::<CertType>(), Ok(CertType::Server));
        assert_eq!("Timed".parse::<CertType>(), Ok(CertType::Timed));
        assert!("3".parse::<CertType>().is_err());
    }

    #[test]
    fn common_name_prefers_first_and_last() {
        let mut holder = HolderDetails {
            first_name: Some(" Jane ".into()),
            last_name: Some("Doe".into()),
            canonical_name: Some("J. Doe".into()),
            ..HolderDetails::default()
        };
        assert_eq!(holder.common_name().as_deref(), Some("Jane Doe"));
        holder.last_name = None;
        assert_eq!(holder.common_name().as_deref(), Some("J. Doe"));
    }

    #[test]
    fn derived_purchase_id_is_stable() {
        let code = ActivationCode::parse("AB12C-D34E5-F67G8-H90I1-J234K5").unwrap();
        assert_eq!(derived_purchase_id(&code), derived_purchase_id(&code));
        assert_eq!(derived_purchase_id(&code).len(), 32);
    }
}
