//! Shared test helpers for registry tests.

#![allow(dead_code)]

use ed25519_dalek::SigningKey;
use licensor_crypto::KdfParams;
use licensor_license::{
    CipherParams, DistinguishedName, LicenseManager, LicenseParams, MemoryKeyStore, SigningParams,
};
use licensor_registry::{CertType, Issuer, RecordStore};
use std::sync::Arc;
use tempfile::TempDir;

pub const USER_SUBJECT: &str = "Acme Widget";
pub const TIMED_SUBJECT: &str = "Acme Widget Timed";
pub const ALIAS_USER: &str = "user";
pub const ALIAS_TIMED: &str = "timed";
pub const KEY_PASSWORD: &str = "keypass1";

pub const VALID_CODE: &str = "AB12C-D34E5-F67G8-H90I1-J234K5";

/// A record store in a fresh temporary directory. Keep the `TempDir` alive.
pub fn store() -> (RecordStore, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = RecordStore::open(dir.path().join("licenses")).unwrap();
    (store, dir)
}

pub fn issuer_dn() -> DistinguishedName {
    DistinguishedName::new()
        .with("O", "Acme Pty Ltd")
        .with("L", "Balmoral")
        .with("C", "AU")
}

/// An issuer with identities for user and timed certificates. Server
/// certificates are deliberately left unconfigured.
pub fn issuer() -> Issuer {
    let mut keys = MemoryKeyStore::new();
    keys.insert_pair(ALIAS_USER, SigningKey::from_bytes(&[1u8; 32]), KEY_PASSWORD);
    keys.insert_pair(ALIAS_TIMED, SigningKey::from_bytes(&[2u8; 32]), KEY_PASSWORD);
    let keys = Arc::new(keys);

    let cipher = CipherParams::new("cipher123").with_kdf(KdfParams::fast());
    let user = LicenseManager::new(LicenseParams::new(
        USER_SUBJECT,
        keys.clone(),
        ALIAS_USER,
        cipher.clone(),
    ))
    .unwrap();
    let timed = LicenseManager::new(LicenseParams::new(
        TIMED_SUBJECT,
        keys,
        ALIAS_TIMED,
        cipher,
    ))
    .unwrap();

    Issuer::new(issuer_dn())
        .with_identity(
            CertType::User,
            user,
            SigningParams::new(ALIAS_USER, KEY_PASSWORD),
        )
        .with_identity(
            CertType::Timed,
            timed,
            SigningParams::new(ALIAS_TIMED, KEY_PASSWORD),
        )
}
