//! Alias-keyed storage of Ed25519 key material.
//!
//! The issuing side needs private keys, which are password protected; the
//! verifying side only needs public keys. A verifier deployment can ship a
//! key store that contains public entries only.

use crate::error::{LicenseError, LicenseResult};
use base64::{engine::general_purpose::STANDARD, Engine};
use ed25519_dalek::{SigningKey, VerifyingKey, PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH};
use licensor_crypto::{open_with_password, seal_with_password, KdfParams};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::info;
use zeroize::Zeroizing;

/// Source of signing and verifying keys, looked up by alias.
pub trait KeyStore: Send + Sync {
    /// Unlocks the private key stored under `alias`.
    ///
    /// # Errors
    ///
    /// [`LicenseError::KeyNotFound`] for an unknown alias or a public-only
    /// entry, [`LicenseError::KeyAccess`] for a wrong password.
    fn private_key(&self, alias: &str, password: &str) -> LicenseResult<SigningKey>;

    /// Returns the public key stored under `alias`.
    fn public_key(&self, alias: &str) -> LicenseResult<VerifyingKey>;

    /// Lists all aliases.
    fn aliases(&self) -> Vec<String>;
}

// ── In-memory ────────────────────────────────────────────────────

struct MemoryEntry {
    public: VerifyingKey,
    private: Option<(SigningKey, [u8; 32])>,
}

/// A key store held entirely in memory.
#[derive(Default)]
pub struct MemoryKeyStore {
    entries: HashMap<String, MemoryEntry>,
}

fn password_digest(password: &str) -> [u8; 32] {
    Sha256::digest(password.as_bytes()).into()
}

impl MemoryKeyStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a key pair protected by `password`, replacing any existing entry.
    pub fn insert_pair(&mut self, alias: &str, signing: SigningKey, password: &str) -> VerifyingKey {
        let public = signing.verifying_key();
        self.entries.insert(
            alias.to_string(),
            MemoryEntry {
                public,
                private: Some((signing, password_digest(password))),
            },
        );
        public
    }

    /// Adds a public-only entry.
    pub fn insert_public(&mut self, alias: &str, public: VerifyingKey) {
        self.entries.insert(
            alias.to_string(),
            MemoryEntry {
                public,
                private: None,
            },
        );
    }

    /// Generates and adds a fresh key pair.
    pub fn generate(&mut self, alias: &str, password: &str) -> VerifyingKey {
        self.insert_pair(alias, SigningKey::generate(&mut OsRng), password)
    }
}

impl KeyStore for MemoryKeyStore {
    fn private_key(&self, alias: &str, password: &str) -> LicenseResult<SigningKey> {
        let entry = self
            .entries
            .get(alias)
            .ok_or_else(|| LicenseError::KeyNotFound(alias.to_string()))?;
        let (signing, digest) = entry
            .private
            .as_ref()
            .ok_or_else(|| LicenseError::KeyNotFound(alias.to_string()))?;
        if *digest != password_digest(password) {
            return Err(LicenseError::KeyAccess(alias.to_string()));
        }
        Ok(signing.clone())
    }

    fn public_key(&self, alias: &str) -> LicenseResult<VerifyingKey> {
        self.entries
            .get(alias)
            .map(|e| e.public)
            .ok_or_else(|| LicenseError::KeyNotFound(alias.to_string()))
    }

    fn aliases(&self) -> Vec<String> {
        let mut aliases: Vec<String> = self.entries.keys().cloned().collect();
        aliases.sort();
        aliases
    }
}

// ── File-backed ──────────────────────────────────────────────────

const STORE_FORMAT_VERSION: u8 = 1;

#[derive(Clone, Serialize, Deserialize)]
struct StoredEntry {
    public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    private_key: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct StoreFile {
    version: u8,
    kdf: KdfParams,
    entries: BTreeMap<String, StoredEntry>,
}

/// A key store persisted as a JSON file.
///
/// Each private key is encrypted under a key derived from its own password
/// and salt, with the alias bound as associated data so entries cannot be
/// swapped between aliases.
pub struct FileKeyStore {
    path: PathBuf,
    kdf: KdfParams,
    entries: BTreeMap<String, StoredEntry>,
}

impl FileKeyStore {
    /// Creates an empty store at `path`, overwriting any existing file.
    pub fn create(path: impl Into<PathBuf>, kdf: KdfParams) -> LicenseResult<Self> {
        let store = Self {
            path: path.into(),
            kdf,
            entries: BTreeMap::new(),
        };
        store.save()?;
        Ok(store)
    }

    /// Opens an existing store.
    pub fn open(path: impl Into<PathBuf>) -> LicenseResult<Self> {
        let path = path.into();
        let bytes = std::fs::read(&path)?;
        let file: StoreFile = serde_json::from_slice(&bytes)
            .map_err(|e| LicenseError::KeyStore(format!("{}: {e}", path.display())))?;
        if file.version != STORE_FORMAT_VERSION {
            return Err(LicenseError::KeyStore(format!(
                "{}: unsupported version {}",
                path.display(),
                file.version
            )));
        }
        Ok(Self {
            path,
            kdf: file.kdf,
            entries: file.entries,
        })
    }

    /// Opens the store at `path`, creating it if it does not exist.
    pub fn open_or_create(path: impl Into<PathBuf>, kdf: KdfParams) -> LicenseResult<Self> {
        let path = path.into();
        if path.exists() {
            Self::open(path)
        } else {
            Self::create(path, kdf)
        }
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Generates a key pair under a new alias and saves the store.
    pub fn generate(&mut self, alias: &str, password: &str) -> LicenseResult<VerifyingKey> {
        let signing = SigningKey::generate(&mut OsRng);
        self.insert_pair(alias, &signing, password)?;
        Ok(signing.verifying_key())
    }

    /// Adds a key pair under a new alias and saves the store.
    pub fn insert_pair(
        &mut self,
        alias: &str,
        signing: &SigningKey,
        password: &str,
    ) -> LicenseResult<()> {
        self.ensure_new(alias)?;

        let secret = Zeroizing::new(signing.to_bytes());
        let sealed = seal_with_password(password, &self.kdf, secret.as_slice(), alias.as_bytes())
            .map_err(|e| LicenseError::KeyStore(e.to_string()))?;

        self.entries.insert(
            alias.to_string(),
            StoredEntry {
                public_key: STANDARD.encode(signing.verifying_key().to_bytes()),
                private_key: Some(STANDARD.encode(sealed)),
            },
        );
        self.save()?;
        info!(alias, "added key pair to key store");
        Ok(())
    }

    /// Adds a public-only entry under a new alias and saves the store.
    pub fn insert_public(&mut self, alias: &str, public: &VerifyingKey) -> LicenseResult<()> {
        self.ensure_new(alias)?;
        self.entries.insert(
            alias.to_string(),
            StoredEntry {
                public_key: STANDARD.encode(public.to_bytes()),
                private_key: None,
            },
        );
        self.save()?;
        info!(alias, "added public key to key store");
        Ok(())
    }

    fn ensure_new(&self, alias: &str) -> LicenseResult<()> {
        if alias.trim().is_empty() {
            return Err(LicenseError::KeyStore("alias must not be empty".to_string()));
        }
        if self.entries.contains_key(alias) {
            return Err(LicenseError::KeyStore(format!("alias already exists: {alias}")));
        }
        Ok(())
    }

    fn entry(&self, alias: &str) -> LicenseResult<&StoredEntry> {
        self.entries
            .get(alias)
            .ok_or_else(|| LicenseError::KeyNotFound(alias.to_string()))
    }

    /// Writes the whole store to a sibling temp file and renames it over
    /// the store file.
    fn save(&self) -> LicenseResult<()> {
        let file = StoreFile {
            version: STORE_FORMAT_VERSION,
            kdf: self.kdf.clone(),
            entries: self.entries.clone(),
        };
        let json = serde_json::to_vec_pretty(&file)?;

        let tmp = temp_path(&self.path);
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn decode_public(alias: &str, encoded: &str) -> LicenseResult<VerifyingKey> {
    let damaged = || LicenseError::KeyStore(format!("damaged public key for alias {alias}"));
    let bytes: [u8; PUBLIC_KEY_LENGTH] = STANDARD
        .decode(encoded)
        .map_err(|_| damaged())?
        .try_into()
        .map_err(|_| damaged())?;
    VerifyingKey::from_bytes(&bytes).map_err(|_| damaged())
}

impl KeyStore for FileKeyStore {
    fn private_key(&self, alias: &str, password: &str) -> LicenseResult<SigningKey> {
        let entry = self.entry(alias)?;
        let sealed = entry
            .private_key
            .as_deref()
            .ok_or_else(|| LicenseError::KeyNotFound(alias.to_string()))?;

        let access = || LicenseError::KeyAccess(alias.to_string());
        let sealed = STANDARD.decode(sealed).map_err(|_| access())?;
        let opened = Zeroizing::new(
            open_with_password(password, &self.kdf, &sealed, alias.as_bytes())
                .map_err(|_| access())?,
        );
        let secret: Zeroizing<[u8; SECRET_KEY_LENGTH]> =
            Zeroizing::new(opened.as_slice().try_into().map_err(|_| access())?);

        let signing = SigningKey::from_bytes(&secret);
        if signing.verifying_key() != decode_public(alias, &entry.public_key)? {
            return Err(LicenseError::KeyStore(format!(
                "private and public key differ for alias {alias}"
            )));
        }
        Ok(signing)
    }

    fn public_key(&self, alias: &str) -> LicenseResult<VerifyingKey> {
        decode_public(alias, &self.entry(alias)?.public_key)
    }

    fn aliases(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}
