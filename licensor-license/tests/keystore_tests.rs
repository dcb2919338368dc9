mod common;

use licensor_crypto::KdfParams;
use licensor_license::{FileKeyStore, KeyStore, LicenseError, MemoryKeyStore};
use pretty_assertions::assert_eq;

// ── In-memory ────────────────────────────────────────────────────

#[test]
fn memory_store_returns_inserted_pair() {
    let store = common::key_store();
    let signing = store.private_key(common::ALIAS, common::KEY_PASSWORD).unwrap();
    assert_eq!(signing.to_bytes(), common::test_keypair().to_bytes());
    assert_eq!(
        store.public_key(common::ALIAS).unwrap(),
        common::test_keypair().verifying_key()
    );
}

#[test]
fn memory_store_wrong_password() {
    let store = common::key_store();
    assert!(matches!(
        store.private_key(common::ALIAS, "wrong"),
        Err(LicenseError::KeyAccess(_))
    ));
}

#[test]
fn memory_store_public_only_entry_has_no_private_key() {
    let mut store = MemoryKeyStore::new();
    store.insert_public("verify", common::test_keypair().verifying_key());
    assert!(store.public_key("verify").is_ok());
    assert!(matches!(
        store.private_key("verify", common::KEY_PASSWORD),
        Err(LicenseError::KeyNotFound(_))
    ));
}

#[test]
fn memory_store_unknown_alias() {
    let store = common::key_store();
    assert!(matches!(
        store.public_key("nobody"),
        Err(LicenseError::KeyNotFound(_))
    ));
}

#[test]
fn memory_store_aliases_are_sorted() {
    let mut store = common::key_store();
    store.generate("beta", "pass123");
    assert_eq!(store.aliases(), vec!["acme".to_string(), "beta".to_string()]);
}

// ── File-backed ──────────────────────────────────────────────────

#[test]
fn file_store_persists_across_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keys.json");

    let mut store = FileKeyStore::create(&path, KdfParams::fast()).unwrap();
    store
        .insert_pair(common::ALIAS, &common::test_keypair(), common::KEY_PASSWORD)
        .unwrap();

    let reopened = FileKeyStore::open(&path).unwrap();
    assert_eq!(reopened.aliases(), vec![common::ALIAS.to_string()]);
    let signing = reopened
        .private_key(common::ALIAS, common::KEY_PASSWORD)
        .unwrap();
    assert_eq!(signing.to_bytes(), common::test_keypair().to_bytes());
}

#[test]
fn file_store_does_not_hold_private_key_in_clear() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keys.json");
    let mut store = FileKeyStore::create(&path, KdfParams::fast()).unwrap();
    store
        .insert_pair(common::ALIAS, &common::test_keypair(), common::KEY_PASSWORD)
        .unwrap();

    let raw = std::fs::read(&path).unwrap();
    let secret = common::test_keypair().to_bytes();
    assert!(!raw.windows(secret.len()).any(|w| w == secret));
}

#[test]
fn file_store_wrong_password() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FileKeyStore::create(dir.path().join("keys.json"), KdfParams::fast()).unwrap();
    store.generate(common::ALIAS, common::KEY_PASSWORD).unwrap();
    assert!(matches!(
        store.private_key(common::ALIAS, "wrong"),
        Err(LicenseError::KeyAccess(_))
    ));
}

#[test]
fn file_store_rejects_duplicate_and_empty_alias() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FileKeyStore::create(dir.path().join("keys.json"), KdfParams::fast()).unwrap();
    store.generate(common::ALIAS, common::KEY_PASSWORD).unwrap();

    assert!(matches!(
        store.generate(common::ALIAS, common::KEY_PASSWORD),
        Err(LicenseError::KeyStore(_))
    ));
    assert!(matches!(
        store.insert_public(" ", &common::test_keypair().verifying_key()),
        Err(LicenseError::KeyStore(_))
    ));
}

#[test]
fn file_store_open_or_create() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keys.json");
    assert!(!path.exists());

    let mut store = FileKeyStore::open_or_create(&path, KdfParams::fast()).unwrap();
    store
        .insert_public("verify", &common::test_keypair().verifying_key())
        .unwrap();

    let again = FileKeyStore::open_or_create(&path, KdfParams::fast()).unwrap();
    assert_eq!(
        again.public_key("verify").unwrap(),
        common::test_keypair().verifying_key()
    );
}

#[test]
fn file_store_rejects_garbage_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keys.json");
    std::fs::write(&path, "not json").unwrap();
    assert!(matches!(
        FileKeyStore::open(&path),
        Err(LicenseError::KeyStore(_))
    ));
}

#[test]
fn file_store_generated_key_matches_public_entry() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FileKeyStore::create(dir.path().join("keys.json"), KdfParams::fast()).unwrap();
    let public = store.generate(common::ALIAS, common::KEY_PASSWORD).unwrap();

    let signing = store
        .private_key(common::ALIAS, common::KEY_PASSWORD)
        .unwrap();
    assert_eq!(signing.verifying_key(), public);
    assert_eq!(store.public_key(common::ALIAS).unwrap(), public);
}

#[test]
fn file_store_save_leaves_only_the_store_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keys.json");
    let mut store = FileKeyStore::create(&path, KdfParams::fast()).unwrap();
    store.generate("one", common::KEY_PASSWORD).unwrap();
    store.generate("two", common::KEY_PASSWORD).unwrap();

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["keys.json".to_string()]);
    assert_eq!(
        FileKeyStore::open(&path).unwrap().aliases(),
        vec!["one".to_string(), "two".to_string()]
    );
}

#[test]
fn file_store_failed_save_keeps_previous_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keys.json");
    let mut store = FileKeyStore::create(&path, KdfParams::fast()).unwrap();
    store
        .insert_pair(common::ALIAS, &common::test_keypair(), common::KEY_PASSWORD)
        .unwrap();
    let before = std::fs::read(&path).unwrap();

    // a directory in the temp file's place makes the next write fail
    std::fs::create_dir(dir.path().join("keys.json.tmp")).unwrap();
    assert!(store.generate("second", common::KEY_PASSWORD).is_err());

    assert_eq!(std::fs::read(&path).unwrap(), before);
    let reopened = FileKeyStore::open(&path).unwrap();
    assert_eq!(reopened.aliases(), vec![common::ALIAS.to_string()]);
    assert!(reopened
        .private_key(common::ALIAS, common::KEY_PASSWORD)
        .is_ok());
}
