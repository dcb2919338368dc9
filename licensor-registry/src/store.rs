//! File-per-code persistence of license records.

use crate::code::ActivationCode;
use crate::error::{RegistryError, RegistryResult};
use crate::issuer::Issuer;
use crate::record::{
    today, HolderDetails, LicenseRecord, DEFAULT_LICENSE_TYPE, SITE_LICENSE_TYPE,
};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Suffix of record files.
pub const RECORD_SUFFIX: &str = ".json";

/// Largest number of codes created in one call.
pub const MAX_CODES_PER_BATCH: usize = 500;

const FRESH_CODE_ATTEMPTS: usize = 16;

/// A directory of `<CODE>.json` record files.
#[derive(Debug, Clone)]
pub struct RecordStore {
    dir: PathBuf,
}

impl RecordStore {
    /// Opens the registry at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> RegistryResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), "opened record store");
        Ok(Self { dir })
    }

    /// Returns the registry directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, code: &ActivationCode) -> PathBuf {
        self.dir.join(format!("{code}{RECORD_SUFFIX}"))
    }

    /// Returns true if a record exists for `code`.
    #[must_use]
    pub fn exists(&self, code: &ActivationCode) -> bool {
        self.path_for(code).is_file()
    }

    /// Loads the record for `code`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Format`] if `code` is malformed (checked before any
    /// lookup), [`RegistryError::NotFound`] if no record exists.
    pub fn load(&self, code: &str) -> RegistryResult<LicenseRecord> {
        let code = ActivationCode::parse(code)?;
        let path = self.path_for(&code);
        if !path.is_file() {
            return Err(RegistryError::NotFound(code.to_string()));
        }

        let map: BTreeMap<String, String> = serde_json::from_slice(&std::fs::read(&path)?)?;
        let record = LicenseRecord::from_map(&map)?;
        if record.activation_code != code {
            return Err(RegistryError::invalid(
                code.as_str(),
                format!("file holds record for {}", record.activation_code),
            ));
        }
        Ok(record)
    }

    /// Writes `record`, replacing any previous version. Only populated fields
    /// are written.
    pub fn save(&self, record: &LicenseRecord) -> RegistryResult<()> {
        record.check()?;
        let path = self.path_for(&record.activation_code);
        let json = serde_json::to_vec_pretty(&record.to_map())?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;

        debug!(code = %record.activation_code, "saved record");
        Ok(())
    }

    /// Lists every code in the registry, sorted.
    pub fn list(&self) -> RegistryResult<Vec<ActivationCode>> {
        let mut codes = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(RECORD_SUFFIX)) else {
                continue;
            };
            if let Ok(code) = ActivationCode::parse(stem) {
                codes.push(code);
            }
        }
        codes.sort();
        Ok(codes)
    }

    /// Generates a code that no record uses yet.
    pub fn fresh_code(&self) -> RegistryResult<ActivationCode> {
        for _ in 0..FRESH_CODE_ATTEMPTS {
            let code = ActivationCode::generate();
            if !self.exists(&code) {
                return Ok(code);
            }
            debug!(code = %code, "generated activation code already in use");
        }
        Err(RegistryError::CodesExhausted(FRESH_CODE_ATTEMPTS))
    }

    /// Creates `count` empty records of `license_type`.
    ///
    /// A count outside `1..=MAX_CODES_PER_BATCH` creates a single code; a
    /// blank license type means `User`.
    pub fn create_codes(
        &self,
        license_type: &str,
        count: usize,
    ) -> RegistryResult<Vec<ActivationCode>> {
        let count = if (1..=MAX_CODES_PER_BATCH).contains(&count) {
            count
        } else {
            1
        };
        let license_type = match license_type.trim() {
            "" => DEFAULT_LICENSE_TYPE,
            t => t,
        };

        let mut codes = Vec::with_capacity(count);
        for _ in 0..count {
            let mut record = LicenseRecord::new(self.fresh_code()?);
            record.license_type = license_type.to_string();
            self.save(&record)?;
            codes.push(record.activation_code);
        }

        info!(count, license_type, "created activation codes");
        Ok(codes)
    }

    /// Creates a site license record aggregating existing codes.
    pub fn create_site_code(&self, codes: &[ActivationCode]) -> RegistryResult<LicenseRecord> {
        if codes.is_empty() {
            return Err(RegistryError::invalid("", "site license needs at least one code"));
        }
        for code in codes {
            if !self.exists(code) {
                return Err(RegistryError::NotFound(code.to_string()));
            }
        }

        let mut record = LicenseRecord::new(self.fresh_code()?);
        record.license_type = SITE_LICENSE_TYPE.to_string();
        record.site_license = codes.to_vec();
        self.save(&record)?;

        info!(code = %record.activation_code, members = codes.len(), "created site license code");
        Ok(record)
    }

    /// Generates a successor for `code`, copying its license type,
    /// certificate type and quantity, and links both records.
    ///
    /// The predecessor's `replacedBy` link is written before the successor.
    ///
    /// # Errors
    ///
    /// [`RegistryError::AlreadyUpgraded`] if `code` already has a successor.
    pub fn upgrade(&self, code: &str) -> RegistryResult<LicenseRecord> {
        let mut old = self.load(code)?;
        if let Some(replaced_by) = &old.replaced_by {
            return Err(RegistryError::AlreadyUpgraded {
                code: old.activation_code.to_string(),
                replaced_by: replaced_by.to_string(),
            });
        }

        let mut new = LicenseRecord::new(self.fresh_code()?);
        new.upgraded_from = Some(old.activation_code.clone());
        new.license_type.clone_from(&old.license_type);
        new.cert = old.cert;
        new.quantity = old.quantity;

        old.replaced_by = Some(new.activation_code.clone());
        self.save(&old)?;
        self.save(&new)?;

        info!(from = %old.activation_code, to = %new.activation_code, "upgraded activation code");
        Ok(new)
    }

    /// Returns true if `code` has no successor yet.
    pub fn is_upgradable(&self, code: &str) -> RegistryResult<bool> {
        Ok(self.load(code)?.is_upgradable())
    }

    /// Redeems `code`: fills the holder details the record lacks, issues a
    /// license key and saves it. A record that already holds a key returns
    /// that key unchanged.
    pub fn redeem(
        &self,
        code: &str,
        details: &HolderDetails,
        expire: Option<NaiveDate>,
        issuer: &Issuer,
    ) -> RegistryResult<Vec<u8>> {
        let mut record = self.load(code)?;
        if let Some(key) = record.key_bytes()? {
            debug!(code = %record.activation_code, "activation code already redeemed");
            return Ok(key);
        }

        record.holder.fill_missing(details);
        if record.expire.is_none() {
            record.expire = expire;
        }
        record.issued.get_or_insert_with(today);
        record.check()?;

        let key = issuer.issue(&record)?;
        record.set_key(&key);
        self.save(&record)?;

        info!(code = %record.activation_code, "redeemed activation code");
        Ok(key)
    }
}
