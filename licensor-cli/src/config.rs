//! `licensor.toml` settings and environment secrets.

use anyhow::{bail, Context, Result};
use licensor_crypto::KdfParams;
use licensor_registry::CertType;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "licensor.toml";

/// Environment variable holding the license key cipher password.
pub const CIPHER_PASSWORD_ENV: &str = "LICENSOR_CIPHER_PASSWORD";

/// Environment variable holding the private key password.
pub const KEY_PASSWORD_ENV: &str = "LICENSOR_KEY_PASSWORD";

/// Tool settings. Holds no secrets.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Directory of activation code records. `~/` is expanded.
    pub registry_dir: PathBuf,
    /// Key store file. `~/` is expanded.
    pub key_store: PathBuf,
    /// Directory of installed license keys, one per certificate type.
    pub installed_dir: PathBuf,
    /// Issuer distinguished name stamped on every license.
    pub issuer: String,
    /// Require exactly one consumer per license.
    pub single_seat: bool,
    /// Verified license cache lifetime in seconds.
    pub cache_ttl_secs: u64,
    /// Argon2id cost for license keys and new key store entries.
    pub kdf: KdfParams,
    /// Signing identity per certificate type (`user`, `timed`, `server`).
    pub certs: BTreeMap<String, CertSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            registry_dir: PathBuf::from("~/licenses"),
            key_store: PathBuf::from("~/.licensor/keys.json"),
            installed_dir: PathBuf::from("~/.licensor"),
            issuer: String::new(),
            single_seat: false,
            cache_ttl_secs: licensor_license::DEFAULT_CACHE_TTL.as_secs(),
            kdf: KdfParams::default(),
            certs: BTreeMap::new(),
        }
    }
}

/// Product subject and key store alias for one certificate type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CertSettings {
    pub subject: String,
    pub alias: String,
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

impl Settings {
    /// Parses settings from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid settings")
    }

    /// Loads settings from `path`, or from [`DEFAULT_CONFIG_FILE`] when no
    /// path is given. A missing default file yields the defaults; a missing
    /// explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path, true),
            None => (Path::new(DEFAULT_CONFIG_FILE), false),
        };
        if !explicit && !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read settings file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("in {}", path.display()))
    }

    #[must_use]
    pub fn registry_dir(&self) -> PathBuf {
        expand_home(&self.registry_dir)
    }

    #[must_use]
    pub fn key_store_path(&self) -> PathBuf {
        expand_home(&self.key_store)
    }

    /// File holding the installed license key for `cert`.
    #[must_use]
    pub fn installed_key_path(&self, cert: CertType) -> PathBuf {
        expand_home(&self.installed_dir).join(format!("{}.key", cert.name()))
    }

    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    #[must_use]
    pub fn kdf_params(&self) -> KdfParams {
        self.kdf.clone()
    }

    /// Configured certificate identities keyed by type.
    pub fn cert_settings(&self) -> Result<BTreeMap<CertType, &CertSettings>> {
        let mut certs = BTreeMap::new();
        for (name, settings) in &self.certs {
            let cert: CertType = name
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))
                .with_context(|| format!("in [certs.{name}]"))?;
            if certs.insert(cert, settings).is_some() {
                bail!("certificate type {cert} is configured twice");
            }
        }
        Ok(certs)
    }

    /// Returns the identity for one certificate type.
    pub fn cert(&self, cert: CertType) -> Result<&CertSettings> {
        self.cert_settings()?
            .remove(&cert)
            .with_context(|| format!("no [certs.{cert}] section in settings"))
    }
}

/// Passwords read from the environment.
#[derive(Clone, Default)]
pub struct Secrets {
    cipher_password: Option<String>,
    key_password: Option<String>,
}

impl Secrets {
    /// Reads both secrets; either may be absent until it is needed.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            cipher_password: std::env::var(CIPHER_PASSWORD_ENV).ok(),
            key_password: std::env::var(KEY_PASSWORD_ENV).ok(),
        }
    }

    /// Creates secrets from explicit values.
    #[must_use]
    pub fn new(cipher_password: Option<String>, key_password: Option<String>) -> Self {
        Self {
            cipher_password,
            key_password,
        }
    }

    pub fn cipher_password(&self) -> Result<&str> {
        self.cipher_password
            .as_deref()
            .with_context(|| format!("{CIPHER_PASSWORD_ENV} is not set"))
    }

    pub fn key_password(&self) -> Result<&str> {
        self.key_password
            .as_deref()
            .with_context(|| format!("{KEY_PASSWORD_ENV} is not set"))
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("cipher_password", &self.cipher_password.as_ref().map(|_| "[REDACTED]"))
            .field("key_password", &self.key_password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
