//! Settings and wiring for the `licensor` command line tool.
//!
//! Everything the binary needs that is worth testing without a process:
//! reading `licensor.toml`, reading secrets from the environment, and
//! assembling [`LicenseManager`]s and the registry [`Issuer`] from them.

mod config;

pub use config::{
    CertSettings, Secrets, Settings, CIPHER_PASSWORD_ENV, DEFAULT_CONFIG_FILE,
    KEY_PASSWORD_ENV,
};

use anyhow::{bail, Context, Result};
use licensor_license::{
    CipherParams, DistinguishedName, FileKeyStore, KeyStore, LicenseManager, LicenseParams,
    SigningParams,
};
use licensor_registry::{CertType, Issuer, RecordStore};
use std::sync::Arc;
use tracing::debug;

/// Opens the configured key store.
pub fn open_key_store(settings: &Settings) -> Result<Arc<dyn KeyStore>> {
    let path = settings.key_store_path();
    let store = FileKeyStore::open(&path)
        .with_context(|| format!("cannot open key store {}", path.display()))?;
    Ok(Arc::new(store))
}

/// Opens the configured record directory.
pub fn open_records(settings: &Settings) -> Result<RecordStore> {
    let dir = settings.registry_dir();
    RecordStore::open(&dir).with_context(|| format!("cannot open registry {}", dir.display()))
}

/// Builds the license manager for one certificate type.
///
/// The installed license key for that type lives in
/// `<installed_dir>/<type>.key`.
pub fn build_manager(
    settings: &Settings,
    cert: CertType,
    key_store: Arc<dyn KeyStore>,
    secrets: &Secrets,
) -> Result<LicenseManager> {
    let cert_settings = settings.cert(cert)?;
    let cipher = CipherParams::new(secrets.cipher_password()?).with_kdf(settings.kdf_params());
    let params = LicenseParams::new(
        cert_settings.subject.as_str(),
        key_store,
        cert_settings.alias.as_str(),
        cipher,
    )
    .with_single_seat(settings.single_seat)
    .with_cache_ttl(settings.cache_ttl())
    .with_key_path(settings.installed_key_path(cert));

    LicenseManager::new(params).with_context(|| format!("invalid [certs.{cert}] settings"))
}

/// Builds the issuer with one identity per configured certificate type.
pub fn build_issuer(settings: &Settings, secrets: &Secrets) -> Result<Issuer> {
    if settings.issuer.trim().is_empty() {
        bail!("settings must name an issuer");
    }
    let issuer_dn = DistinguishedName::parse(&settings.issuer).context("invalid issuer name")?;
    let certs = settings.cert_settings()?;
    if certs.is_empty() {
        bail!("settings configure no certificate types");
    }

    let key_store = open_key_store(settings)?;
    let key_password = secrets.key_password()?;
    let mut issuer = Issuer::new(issuer_dn);
    for (cert, cert_settings) in certs {
        let manager = build_manager(settings, cert, Arc::clone(&key_store), secrets)?;
        let signer = SigningParams::new(cert_settings.alias.as_str(), key_password);
        debug!(cert = %cert, subject = %cert_settings.subject, "configured issuer identity");
        issuer = issuer.with_identity(cert, manager, signer);
    }
    Ok(issuer)
}
