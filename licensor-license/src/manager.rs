//! Orchestration of the certificate lifecycle for one product subject.
//!
//! Issue path: `initialize → validate → sign → seal`.
//! Install path: `open → verify → validate → cache`.
//!
//! A manager owns all state for its subject. Operations on the same manager
//! serialize on one lock; independent managers share nothing.

use crate::codec;
use crate::content::{DistinguishedName, LicenseContent};
use crate::error::{LicenseContentError, LicenseError, LicenseResult};
use crate::keystore::KeyStore;
use crate::notary::Notary;
use crate::privacy::{load_license_key, store_license_key, CipherParams, PrivacyGuard};
use chrono::{DateTime, Local, NaiveTime, Utc};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// How long a verified certificate is trusted without re-verification.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

/// Holder assigned to content that has none.
pub const DEFAULT_HOLDER: &str = "CN=user";

/// Consumer type assigned in single-seat mode.
pub const SINGLE_SEAT_CONSUMER: &str = "User";

/// Consumer type assigned in multi-seat mode.
pub const MULTI_SEAT_CONSUMER: &str = "System";

const MIN_PASSWORD_LEN: usize = 6;

/// Configuration of a [`LicenseManager`].
#[derive(Clone)]
pub struct LicenseParams {
    /// Product subject every certificate must carry.
    pub subject: String,
    /// Where signing and verifying keys come from.
    pub key_store: Arc<dyn KeyStore>,
    /// Alias of the public key used for verification.
    pub public_alias: String,
    /// Cipher password and KDF cost for sealing license keys.
    pub cipher: CipherParams,
    /// Require exactly one consumer instead of at least one.
    pub single_seat: bool,
    /// Lifetime of the verified-certificate cache.
    pub cache_ttl: Duration,
    /// File that holds the installed license key. When unset, the installed
    /// key only lives as long as the manager.
    pub key_path: Option<PathBuf>,
}

impl LicenseParams {
    /// Creates parameters with multi-seat validation, the default cache TTL
    /// and no persisted key file.
    pub fn new(
        subject: impl Into<String>,
        key_store: Arc<dyn KeyStore>,
        public_alias: impl Into<String>,
        cipher: CipherParams,
    ) -> Self {
        Self {
            subject: subject.into(),
            key_store,
            public_alias: public_alias.into(),
            cipher,
            single_seat: false,
            cache_ttl: DEFAULT_CACHE_TTL,
            key_path: None,
        }
    }

    #[must_use]
    pub fn with_single_seat(mut self, single_seat: bool) -> Self {
        self.single_seat = single_seat;
        self
    }

    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    fn check(&self) -> LicenseResult<()> {
        if self.subject.trim().is_empty() {
            return Err(LicenseError::InvalidParams("subject is empty".to_string()));
        }
        if self.public_alias.trim().is_empty() {
            return Err(LicenseError::InvalidParams(
                "public key alias is empty".to_string(),
            ));
        }
        let password = self.cipher.password();
        if password.chars().count() < MIN_PASSWORD_LEN
            || !password.chars().any(char::is_alphabetic)
            || !password.chars().any(|c| c.is_ascii_digit())
        {
            return Err(LicenseError::InvalidParams(format!(
                "cipher password must have at least {MIN_PASSWORD_LEN} characters including letters and digits"
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for LicenseParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LicenseParams")
            .field("subject", &self.subject)
            .field("public_alias", &self.public_alias)
            .field("cipher", &self.cipher)
            .field("single_seat", &self.single_seat)
            .field("cache_ttl", &self.cache_ttl)
            .field("key_path", &self.key_path)
            .finish_non_exhaustive()
    }
}

/// Which private key signs newly issued certificates.
#[derive(Clone)]
pub struct SigningParams {
    alias: String,
    password: String,
}

impl SigningParams {
    pub fn new(alias: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            password: password.into(),
        }
    }

    #[must_use]
    pub fn alias(&self) -> &str {
        &self.alias
    }
}

impl fmt::Debug for SigningParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningParams")
            .field("alias", &self.alias)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

struct CachedCertificate {
    digest: [u8; 32],
    content: LicenseContent,
    verified_at: Instant,
}

#[derive(Default)]
struct ManagerState {
    cached: Option<CachedCertificate>,
    installed_key: Option<Vec<u8>>,
}

/// Issues, installs and verifies licenses for one subject.
pub struct LicenseManager {
    params: LicenseParams,
    notary: Notary,
    guard: PrivacyGuard,
    state: Mutex<ManagerState>,
}

fn digest(key: &[u8]) -> [u8; 32] {
    Sha256::digest(key).into()
}

/// Local midnight at the start of today, in UTC.
fn midnight_today() -> DateTime<Utc> {
    let today = Local::now().date_naive();
    today
        .and_time(NaiveTime::MIN)
        .and_local_timezone(Local)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|| today.and_time(NaiveTime::MIN).and_utc())
}

impl LicenseManager {
    /// Creates a manager, rejecting unusable parameters up front.
    pub fn new(params: LicenseParams) -> LicenseResult<Self> {
        params.check()?;
        let notary = Notary::new(Arc::clone(&params.key_store), params.public_alias.clone());
        let guard = PrivacyGuard::new(params.cipher.clone());
        Ok(Self {
            params,
            notary,
            guard,
            state: Mutex::new(ManagerState::default()),
        })
    }

    /// Returns the configured subject.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.params.subject
    }

    /// Returns the configuration.
    #[must_use]
    pub fn params(&self) -> &LicenseParams {
        &self.params
    }

    fn lock(&self) -> LicenseResult<MutexGuard<'_, ManagerState>> {
        self.state.lock().map_err(|_| LicenseError::Poisoned)
    }

    /// Fills unset fields with defaults. Set fields are left untouched, so
    /// calling this twice has the same effect as calling it once.
    ///
    /// A missing consumer type becomes [`SINGLE_SEAT_CONSUMER`] or
    /// [`MULTI_SEAT_CONSUMER`] depending on the seat mode, and a zero
    /// consumer amount then becomes one.
    pub fn initialize(&self, content: &mut LicenseContent) {
        if content.holder.is_none() {
            content.holder = Some(DistinguishedName::new().with("CN", "user"));
        }
        if content.subject.is_none() {
            content.subject = Some(self.params.subject.clone());
        }
        if content.consumer_type.is_none() {
            content.consumer_type = Some(
                if self.params.single_seat {
                    SINGLE_SEAT_CONSUMER
                } else {
                    MULTI_SEAT_CONSUMER
                }
                .to_string(),
            );
            if content.consumer_amount == 0 {
                content.consumer_amount = 1;
            }
        }
        if content.issuer.is_none() {
            content.issuer = Some(DistinguishedName::new().with("CN", &self.params.subject));
        }
        if content.issued.is_none() {
            content.issued = Some(Utc::now());
        }
        if content.not_before.is_none() {
            content.not_before = Some(midnight_today());
        }
    }

    /// Checks the business rules against the current time.
    pub fn validate(&self, content: &LicenseContent) -> Result<(), LicenseContentError> {
        self.validate_at(content, Utc::now())
    }

    fn validate_at(
        &self,
        content: &LicenseContent,
        now: DateTime<Utc>,
    ) -> Result<(), LicenseContentError> {
        if content.subject.as_deref() != Some(self.params.subject.as_str()) {
            return Err(LicenseContentError::InvalidSubject);
        }
        if content.holder.is_none() {
            return Err(LicenseContentError::HolderIsNull);
        }
        if content.issuer.is_none() {
            return Err(LicenseContentError::IssuerIsNull);
        }
        if content.issued.is_none() {
            return Err(LicenseContentError::IssuedIsNull);
        }
        if content.not_before.is_some_and(|nb| now < nb) {
            return Err(LicenseContentError::NotYetValid);
        }
        if content.not_after.is_some_and(|na| now > na) {
            return Err(LicenseContentError::Expired);
        }
        if content.consumer_type.is_none() {
            return Err(LicenseContentError::ConsumerTypeIsNull);
        }
        if self.params.single_seat {
            if content.consumer_amount != 1 {
                return Err(LicenseContentError::ConsumerAmountIsNotOne);
            }
        } else if content.consumer_amount == 0 {
            return Err(LicenseContentError::ConsumerAmountIsNotPositive);
        }
        Ok(())
    }

    /// Creates a new license key from `content`.
    ///
    /// Every call produces a fresh blob (random salt and nonce) even for
    /// identical content.
    pub fn issue(
        &self,
        mut content: LicenseContent,
        signer: &SigningParams,
    ) -> LicenseResult<Vec<u8>> {
        let _state = self.lock()?;

        self.initialize(&mut content);
        self.validate(&content)?;
        let certificate = self.notary.sign(&content, &signer.alias, &signer.password)?;
        let key = self.guard.seal(&certificate)?;

        info!(
            subject = %self.params.subject,
            holder = %content.holder.as_ref().map(ToString::to_string).unwrap_or_default(),
            "issued license"
        );
        Ok(key)
    }

    /// Issues a license key and writes it to `path`.
    pub fn store(
        &self,
        content: LicenseContent,
        signer: &SigningParams,
        path: &Path,
    ) -> LicenseResult<()> {
        let key = self.issue(content, signer)?;
        store_license_key(&key, path)
    }

    fn open_and_check(&self, key: &[u8]) -> LicenseResult<LicenseContent> {
        let certificate = self.guard.open(key)?;
        self.notary.verify(&certificate)?;
        let content = certificate.content()?;
        self.validate(&content)?;
        Ok(content)
    }

    fn cached_content(&self, state: &ManagerState, key_digest: Option<&[u8; 32]>) -> Option<LicenseContent> {
        let cached = state.cached.as_ref()?;
        if cached.verified_at.elapsed() >= self.params.cache_ttl {
            return None;
        }
        if key_digest.is_some_and(|d| *d != cached.digest) {
            return None;
        }
        Some(cached.content.clone())
    }

    /// Installs a license key after full verification.
    ///
    /// Re-installing the same key within the cache TTL returns the cached
    /// content without decrypting or verifying again. Any other key drops the
    /// cache first.
    pub fn install(&self, key: &[u8]) -> LicenseResult<LicenseContent> {
        let mut state = self.lock()?;
        let key_digest = digest(key);

        if let Some(content) = self.cached_content(&state, Some(&key_digest)) {
            debug!(subject = %self.params.subject, "license cache hit");
            return Ok(content);
        }
        state.cached = None;

        let content = self.open_and_check(key)?;

        if let Some(path) = &self.params.key_path {
            std::fs::write(path, key)?;
        }
        state.installed_key = Some(key.to_vec());
        state.cached = Some(CachedCertificate {
            digest: key_digest,
            content: content.clone(),
            verified_at: Instant::now(),
        });

        info!(subject = %self.params.subject, "installed license");
        Ok(content)
    }

    /// Installs a license key read from a file.
    pub fn install_file(&self, path: &Path) -> LicenseResult<LicenseContent> {
        let key = load_license_key(path)?;
        self.install(&key)
    }

    /// Verifies the installed license.
    ///
    /// Uses the cache while it is fresh, otherwise re-verifies the installed
    /// key (from memory, or from the key file if configured).
    ///
    /// # Errors
    ///
    /// [`LicenseError::NoLicenseInstalled`] if there is nothing to verify.
    pub fn verify(&self) -> LicenseResult<LicenseContent> {
        let mut state = self.lock()?;

        if let Some(content) = self.cached_content(&state, None) {
            debug!(subject = %self.params.subject, "license cache hit");
            return Ok(content);
        }

        let key = match (&state.installed_key, &self.params.key_path) {
            (Some(key), _) => key.clone(),
            (None, Some(path)) if path.exists() => std::fs::read(path)?,
            _ => return Err(LicenseError::NoLicenseInstalled(self.params.subject.clone())),
        };

        debug!(subject = %self.params.subject, "license cache miss, verifying installed key");
        let content = self.open_and_check(&key)?;
        state.cached = Some(CachedCertificate {
            digest: digest(&key),
            content: content.clone(),
            verified_at: Instant::now(),
        });
        state.installed_key = Some(key);
        Ok(content)
    }

    /// Verifies a license key without installing it.
    ///
    /// Never fills the cache; a key other than the cached one clears it.
    pub fn verify_key(&self, key: &[u8]) -> LicenseResult<LicenseContent> {
        let mut state = self.lock()?;
        if state
            .cached
            .as_ref()
            .is_some_and(|c| c.digest != digest(key))
        {
            state.cached = None;
        }
        self.open_and_check(key)
    }

    /// Removes the installed license and clears the cache. Safe to repeat.
    pub fn uninstall(&self) -> LicenseResult<()> {
        let mut state = self.lock()?;
        state.cached = None;
        state.installed_key = None;

        if let Some(path) = &self.params.key_path {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        info!(subject = %self.params.subject, "uninstalled license");
        Ok(())
    }

    /// Returns true if a verified certificate is cached and still fresh.
    #[must_use]
    pub fn has_cached_license(&self) -> bool {
        self.lock()
            .map(|state| self.cached_content(&state, None).is_some())
            .unwrap_or(false)
    }

    /// Decodes the canonical content of a key without any checks beyond
    /// decryption. Intended for diagnostics.
    pub fn inspect(&self, key: &[u8]) -> LicenseResult<LicenseContent> {
        let certificate = self.guard.open(key)?;
        codec::decode(certificate.encoded())
    }
}
