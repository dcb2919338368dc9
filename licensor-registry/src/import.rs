//! Bulk import of coupon feeds.
//!
//! A feed is a JSON array of loosely typed objects using the external field
//! names (`couponCode`, `certType`, `firstname`, `orderRef`, `redeemed`, ...).
//! Each item is attempted on its own; a bad item is reported and the rest of
//! the batch continues.

use crate::code::ActivationCode;
use crate::error::{RegistryError, RegistryResult};
use crate::record::{CertType, LicenseRecord};
use crate::store::RecordStore;
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use tracing::{info, warn};

const REDEEMED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One entry of a coupon feed. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportItem {
    pub coupon_code: Option<String>,
    /// Numeric code or name, as a string or a number.
    pub cert_type: Option<Value>,
    pub license_type: Option<String>,
    #[serde(rename = "firstname")]
    pub first_name: Option<String>,
    #[serde(rename = "lastname")]
    pub last_name: Option<String>,
    pub organization: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub order_ref: Option<String>,
    pub email: Option<String>,
    /// `yyyy-MM-dd HH:mm:ss`; becomes the issue date.
    pub redeemed: Option<String>,
}

impl ImportItem {
    /// Maps the item onto a fresh record.
    ///
    /// An unparseable `redeemed` timestamp is logged and leaves the issue
    /// date at its default.
    pub fn into_record(self) -> RegistryResult<LicenseRecord> {
        let raw_code = self
            .coupon_code
            .ok_or_else(|| RegistryError::invalid("", "couponCode is missing"))?;
        let mut record = LicenseRecord::new(ActivationCode::parse(&raw_code)?);
        let code = record.activation_code.to_string();

        if let Some(cert) = self.cert_type {
            let text = match cert {
                Value::String(s) => s,
                other => other.to_string(),
            };
            record.cert = text
                .parse::<CertType>()
                .map_err(|e| RegistryError::invalid(code.as_str(), format!("certType: {e}")))?;
        }
        if let Some(license_type) = self.license_type {
            record.license_type = license_type;
        }

        let holder = &mut record.holder;
        holder.first_name = self.first_name;
        holder.last_name = self.last_name;
        holder.organization = self.organization;
        holder.city = self.city;
        holder.state = self.state;
        holder.country = self.country;
        holder.purchase_id = self.order_ref;
        holder.email = self.email;

        if let Some(redeemed) = self.redeemed {
            match NaiveDateTime::parse_from_str(redeemed.trim(), REDEEMED_FORMAT) {
                Ok(at) => record.issued = Some(at.date()),
                Err(e) => {
                    warn!(code = %code, redeemed = %redeemed, error = %e, "ignoring unparseable redeemed timestamp");
                }
            }
        }

        record.check()?;
        Ok(record)
    }
}

/// Why one feed item was not imported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFailure {
    /// Zero-based position in the feed.
    pub index: usize,
    /// The coupon code, when the item had one.
    pub code: Option<String>,
    pub reason: String,
}

/// Per-item outcome of an import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: Vec<ActivationCode>,
    /// Codes that already had a record, left untouched.
    pub skipped: Vec<ActivationCode>,
    pub failed: Vec<ImportFailure>,
}

impl ImportReport {
    /// Returns true if no item failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Number of items attempted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.imported.len() + self.skipped.len() + self.failed.len()
    }
}

impl RecordStore {
    fn import_item(&self, item: ImportItem, report: &mut ImportReport) -> RegistryResult<()> {
        let record = item.into_record()?;
        if self.exists(&record.activation_code) {
            report.skipped.push(record.activation_code);
            return Ok(());
        }
        self.save(&record)?;
        report.imported.push(record.activation_code);
        Ok(())
    }

    /// Imports loosely typed feed entries. `null` entries are skipped
    /// without being counted.
    pub fn import_batch(&self, items: Vec<Value>) -> ImportReport {
        let mut report = ImportReport::default();

        for (index, value) in items.into_iter().enumerate() {
            if value.is_null() {
                continue;
            }
            let code = value
                .get("couponCode")
                .and_then(Value::as_str)
                .map(str::to_string);

            let outcome = serde_json::from_value::<ImportItem>(value)
                .map_err(RegistryError::from)
                .and_then(|item| self.import_item(item, &mut report));

            if let Err(e) = outcome {
                warn!(index, code = code.as_deref().unwrap_or(""), error = %e, "import item failed");
                report.failed.push(ImportFailure {
                    index,
                    code,
                    reason: e.to_string(),
                });
            }
        }

        info!(
            imported = report.imported.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "import finished"
        );
        report
    }

    /// Imports a feed file holding a JSON array.
    pub fn import_file(&self, path: &Path) -> RegistryResult<ImportReport> {
        let items: Vec<Value> = serde_json::from_slice(&std::fs::read(path)?)?;
        info!(path = %path.display(), items = items.len(), "importing coupon feed");
        Ok(self.import_batch(items))
    }
}
