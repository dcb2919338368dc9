//! Shared test helpers for license tests.

#![allow(dead_code)]

use chrono::{TimeDelta, Utc};
use ed25519_dalek::{SigningKey, VerifyingKey};
use licensor_crypto::KdfParams;
use licensor_license::{
    CipherParams, DistinguishedName, KeyStore, LicenseContent, LicenseManager, LicenseParams,
    LicenseResult, MemoryKeyStore, SigningParams,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const SUBJECT: &str = "Acme Widget";
pub const ALIAS: &str = "acme";
pub const KEY_PASSWORD: &str = "keypass1";
pub const CIPHER_PASSWORD: &str = "cipher123";

/// Returns a deterministic Ed25519 signing key from a fixed seed.
pub fn test_keypair() -> SigningKey {
    let seed: [u8; 32] = [
        1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24,
        25, 26, 27, 28, 29, 30, 31, 32,
    ];
    SigningKey::from_bytes(&seed)
}

/// A second, unrelated key.
pub fn other_keypair() -> SigningKey {
    SigningKey::from_bytes(&[7u8; 32])
}

/// A memory key store holding the test key pair under [`ALIAS`].
pub fn key_store() -> MemoryKeyStore {
    let mut store = MemoryKeyStore::new();
    store.insert_pair(ALIAS, test_keypair(), KEY_PASSWORD);
    store
}

/// Counts public key lookups so tests can tell a cache hit from a
/// re-verification.
pub struct CountingKeyStore {
    inner: MemoryKeyStore,
    public_lookups: AtomicUsize,
}

impl CountingKeyStore {
    pub fn new(inner: MemoryKeyStore) -> Self {
        Self {
            inner,
            public_lookups: AtomicUsize::new(0),
        }
    }

    pub fn public_lookups(&self) -> usize {
        self.public_lookups.load(Ordering::SeqCst)
    }
}

impl KeyStore for CountingKeyStore {
    fn private_key(&self, alias: &str, password: &str) -> LicenseResult<SigningKey> {
        self.inner.private_key(alias, password)
    }

    fn public_key(&self, alias: &str) -> LicenseResult<VerifyingKey> {
        self.public_lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.public_key(alias)
    }

    fn aliases(&self) -> Vec<String> {
        self.inner.aliases()
    }
}

/// Cipher parameters with a cheap KDF.
pub fn cipher() -> CipherParams {
    CipherParams::new(CIPHER_PASSWORD).with_kdf(KdfParams::fast())
}

pub fn signer() -> SigningParams {
    SigningParams::new(ALIAS, KEY_PASSWORD)
}

pub fn params(store: Arc<dyn KeyStore>) -> LicenseParams {
    LicenseParams::new(SUBJECT, store, ALIAS, cipher())
}

/// A manager over a counting store, returned alongside the store.
pub fn manager() -> (LicenseManager, Arc<CountingKeyStore>) {
    let store = Arc::new(CountingKeyStore::new(key_store()));
    let manager = LicenseManager::new(params(store.clone())).unwrap();
    (manager, store)
}

/// Content for a named holder valid for the next thirty days.
pub fn sample_content() -> LicenseContent {
    LicenseContent {
        holder: Some(
            DistinguishedName::new()
                .with("CN", "Jane Doe")
                .with("O", "Acme, Inc.")
                .with("C", "AU"),
        ),
        not_after: Some(Utc::now() + TimeDelta::days(30)),
        consumer_type: Some("User".to_string()),
        consumer_amount: 1,
        info: Some("order 1234".to_string()),
        ..LicenseContent::default()
    }
}

/// Fully populated content that encodes without defaults.
pub fn complete_content() -> LicenseContent {
    let now = Utc::now();
    LicenseContent {
        issuer: Some(DistinguishedName::new().with("CN", SUBJECT)),
        subject: Some(SUBJECT.to_string()),
        issued: Some(now),
        not_before: Some(now - TimeDelta::hours(1)),
        ..sample_content()
    }
}
