mod common;

use chrono::{Local, NaiveDate, TimeDelta};
use licensor_license::{LicenseContentError, LicenseError};
use licensor_registry::{
    ActivationCode, CertType, HolderDetails, LicenseRecord, RegistryError, MAX_CODES_PER_BATCH,
    SITE_LICENSE_TYPE,
};
use pretty_assertions::assert_eq;

fn jane() -> HolderDetails {
    HolderDetails {
        first_name: Some("Jane".into()),
        last_name: Some("Doe".into()),
        organization: Some("Acme, Inc.".into()),
        country: Some("AU".into()),
        email: Some("jane@example.com".into()),
        ..HolderDetails::default()
    }
}

// ── Load / save ──────────────────────────────────────────────────

#[test]
fn save_then_load() {
    let (store, _dir) = common::store();
    let mut record = LicenseRecord::new(ActivationCode::parse(common::VALID_CODE).unwrap());
    record.holder = jane();
    record.holder.purchase_id = Some("order-1".into());
    store.save(&record).unwrap();

    assert_eq!(store.load(common::VALID_CODE).unwrap(), record);
    assert!(store.dir().join(format!("{}.json", common::VALID_CODE)).is_file());
}

#[test]
fn load_is_case_insensitive() {
    let (store, _dir) = common::store();
    let record = LicenseRecord::new(ActivationCode::parse(common::VALID_CODE).unwrap());
    store.save(&record).unwrap();
    assert!(store.load(&common::VALID_CODE.to_lowercase()).is_ok());
}

#[test]
fn load_checks_format_before_lookup() {
    let (store, _dir) = common::store();
    assert!(matches!(
        store.load("AB12-D34E5-F67G8-H90I1-J234K5"),
        Err(RegistryError::Format(_))
    ));
    assert!(matches!(
        store.load(common::VALID_CODE),
        Err(RegistryError::NotFound(_))
    ));
}

#[test]
fn saved_file_is_flat_string_map() {
    let (store, _dir) = common::store();
    let record = LicenseRecord::new(ActivationCode::parse(common::VALID_CODE).unwrap());
    store.save(&record).unwrap();

    let raw = std::fs::read(store.dir().join(format!("{}.json", common::VALID_CODE))).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&raw).unwrap();
    let object = value.as_object().unwrap();
    assert!(object.values().all(serde_json::Value::is_string));
    assert!(!object.contains_key("key"));
    assert!(!object.contains_key("expire"));
}

#[test]
fn save_rejects_expiry_before_issue() {
    let (store, _dir) = common::store();
    let mut record = LicenseRecord::new(ActivationCode::generate());
    record.issued = NaiveDate::from_ymd_opt(2024, 3, 1);
    record.expire = NaiveDate::from_ymd_opt(2024, 2, 1);
    assert!(matches!(
        store.save(&record),
        Err(RegistryError::InvalidRecord { .. })
    ));
    assert!(!store.exists(&record.activation_code));
}

#[test]
fn list_returns_sorted_codes_and_ignores_other_files() {
    let (store, _dir) = common::store();
    let codes = store.create_codes("User", 3).unwrap();
    std::fs::write(store.dir().join("notes.txt"), "hello").unwrap();
    std::fs::write(store.dir().join("README.json"), "{}").unwrap();

    let mut expected = codes.clone();
    expected.sort();
    assert_eq!(store.list().unwrap(), expected);
}

// ── Code generation ──────────────────────────────────────────────

#[test]
fn fresh_code_is_unused() {
    let (store, _dir) = common::store();
    let existing = store.create_codes("User", 20).unwrap();
    let fresh = store.fresh_code().unwrap();
    assert!(!existing.contains(&fresh));
    assert!(!store.exists(&fresh));
}

#[test]
fn create_codes_saves_empty_records_of_type() {
    let (store, _dir) = common::store();
    let codes = store.create_codes("Academic", 4).unwrap();
    assert_eq!(codes.len(), 4);
    for code in &codes {
        let record = store.load(code.as_str()).unwrap();
        assert_eq!(record.license_type, "Academic");
        assert!(record.key.is_none());
        assert!(record.issued.is_none());

        let raw = std::fs::read(store.dir().join(format!("{code}.json"))).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert!(value.get("issued").is_none());
    }
}

#[test]
fn create_codes_falls_back_to_one() {
    let (store, _dir) = common::store();
    assert_eq!(store.create_codes("User", 0).unwrap().len(), 1);
    assert_eq!(
        store.create_codes("User", MAX_CODES_PER_BATCH + 1).unwrap().len(),
        1
    );
    let codes = store.create_codes("  ", 1).unwrap();
    assert_eq!(store.load(codes[0].as_str()).unwrap().license_type, "User");
}

// ── Site licenses ────────────────────────────────────────────────

#[test]
fn site_code_lists_constituents() {
    let (store, _dir) = common::store();
    let members = store.create_codes("User", 5).unwrap();
    let site = store.create_site_code(&members).unwrap();

    let loaded = store.load(site.activation_code.as_str()).unwrap();
    assert_eq!(loaded.license_type, SITE_LICENSE_TYPE);
    assert_eq!(loaded.site_license, members);
    assert!(loaded.is_site_license());
}

#[test]
fn site_code_requires_existing_members() {
    let (store, _dir) = common::store();
    let mut members = store.create_codes("User", 2).unwrap();
    members.push(ActivationCode::parse(common::VALID_CODE).unwrap());

    assert!(matches!(
        store.create_site_code(&members),
        Err(RegistryError::NotFound(_))
    ));
    assert!(matches!(
        store.create_site_code(&[]),
        Err(RegistryError::InvalidRecord { .. })
    ));
}

// ── Upgrades ─────────────────────────────────────────────────────

#[test]
fn upgrade_links_both_records() {
    let (store, _dir) = common::store();
    let mut old = LicenseRecord::new(ActivationCode::generate());
    old.license_type = "NFP".into();
    old.cert = CertType::Timed;
    old.quantity = 3;
    store.save(&old).unwrap();

    let new = store.upgrade(old.activation_code.as_str()).unwrap();
    assert_eq!(new.upgraded_from.as_ref(), Some(&old.activation_code));
    assert_eq!(new.license_type, "NFP");
    assert_eq!(new.cert, CertType::Timed);
    assert_eq!(new.quantity, 3);

    let old = store.load(old.activation_code.as_str()).unwrap();
    assert_eq!(old.replaced_by.as_ref(), Some(&new.activation_code));
    assert!(!store.is_upgradable(old.activation_code.as_str()).unwrap());
    assert!(store.is_upgradable(new.activation_code.as_str()).unwrap());
}

#[test]
fn failed_upgrade_leaves_no_orphaned_successor() {
    let (store, _dir) = common::store();
    let code = store.create_codes("User", 1).unwrap().remove(0);
    // a directory in the temp file's place makes saving the predecessor fail
    std::fs::create_dir(store.dir().join(format!("{code}.json.tmp"))).unwrap();

    assert!(store.upgrade(code.as_str()).is_err());
    assert_eq!(store.list().unwrap(), vec![code.clone()]);
    assert!(store.is_upgradable(code.as_str()).unwrap());
}

#[test]
fn upgrade_of_undated_code_stays_undated() {
    let (store, _dir) = common::store();
    let code = store.create_codes("User", 1).unwrap().remove(0);
    let new = store.upgrade(code.as_str()).unwrap();
    assert!(store.load(new.activation_code.as_str()).unwrap().issued.is_none());
}

#[test]
fn upgrade_twice_is_refused() {
    let (store, _dir) = common::store();
    let code = store.create_codes("User", 1).unwrap().remove(0);
    store.upgrade(code.as_str()).unwrap();
    assert!(matches!(
        store.upgrade(code.as_str()),
        Err(RegistryError::AlreadyUpgraded { .. })
    ));
}

#[test]
fn upgrade_chain_can_continue_from_successor() {
    let (store, _dir) = common::store();
    let first = store.create_codes("User", 1).unwrap().remove(0);
    let second = store.upgrade(first.as_str()).unwrap();
    let third = store.upgrade(second.activation_code.as_str()).unwrap();

    let second = store.load(second.activation_code.as_str()).unwrap();
    assert_eq!(second.upgraded_from, Some(first));
    assert_eq!(second.replaced_by, Some(third.activation_code));
}

#[test]
fn is_upgradable_of_unknown_code() {
    let (store, _dir) = common::store();
    assert!(matches!(
        store.is_upgradable(common::VALID_CODE),
        Err(RegistryError::NotFound(_))
    ));
}

// ── Redemption ───────────────────────────────────────────────────

#[test]
fn redeem_issues_and_stores_key() {
    let (store, _dir) = common::store();
    let issuer = common::issuer();
    let code = store.create_codes("User", 1).unwrap().remove(0);

    let key = store.redeem(code.as_str(), &jane(), None, &issuer).unwrap();

    let record = store.load(code.as_str()).unwrap();
    assert_eq!(record.key_bytes().unwrap(), Some(key));
    assert_eq!(record.holder.first_name.as_deref(), Some("Jane"));

    let content = issuer.verify(&record).unwrap();
    let holder = content.holder.unwrap();
    assert_eq!(holder.common_name(), Some("Jane Doe"));
    assert_eq!(holder.get("O"), Some("Acme, Inc."));
    assert_eq!(holder.get("UID"), record.holder.purchase_id.as_deref());
    assert_eq!(content.issuer, Some(common::issuer_dn()));
    assert_eq!(content.subject.as_deref(), Some(common::USER_SUBJECT));
    assert_eq!(content.consumer_type.as_deref(), Some("User"));
    assert_eq!(content.consumer_amount, 1);
    assert!(content.not_after.is_none());
}

#[test]
fn redeem_dates_an_old_code_today() {
    let (store, _dir) = common::store();
    let issuer = common::issuer();
    let code = store.create_codes("User", 1).unwrap().remove(0);

    // an unredeemed code reloaded long after creation is still undated
    let record = store.load(code.as_str()).unwrap();
    assert!(record.issued.is_none());

    store.redeem(code.as_str(), &jane(), None, &issuer).unwrap();

    let today = Local::now().date_naive();
    let record = store.load(code.as_str()).unwrap();
    assert_eq!(record.issued, Some(today));
    let issued = issuer.verify(&record).unwrap().issued.unwrap();
    assert_eq!(issued.with_timezone(&Local).date_naive(), today);
}

#[test]
fn redeem_keeps_an_imported_issue_date() {
    let (store, _dir) = common::store();
    let issuer = common::issuer();
    let issued = Local::now().date_naive() - TimeDelta::days(10);
    let mut record = LicenseRecord::new(ActivationCode::generate());
    record.issued = Some(issued);
    store.save(&record).unwrap();

    store
        .redeem(record.activation_code.as_str(), &jane(), None, &issuer)
        .unwrap();

    let record = store.load(record.activation_code.as_str()).unwrap();
    assert_eq!(record.issued, Some(issued));
    let signed = issuer.verify(&record).unwrap().issued.unwrap();
    assert_eq!(signed.with_timezone(&Local).date_naive(), issued);
}

#[test]
fn redeem_twice_returns_existing_key() {
    let (store, _dir) = common::store();
    let issuer = common::issuer();
    let code = store.create_codes("User", 1).unwrap().remove(0);

    let first = store.redeem(code.as_str(), &jane(), None, &issuer).unwrap();
    let other = HolderDetails {
        canonical_name: Some("Someone Else".into()),
        ..HolderDetails::default()
    };
    let second = store.redeem(code.as_str(), &other, None, &issuer).unwrap();
    assert_eq!(first, second);
}

#[test]
fn redeem_uses_timed_identity_and_expiry() {
    let (store, _dir) = common::store();
    let issuer = common::issuer();
    let mut record = LicenseRecord::new(ActivationCode::generate());
    record.cert = CertType::Timed;
    store.save(&record).unwrap();

    let expire = Local::now().date_naive() + TimeDelta::days(30);
    store
        .redeem(record.activation_code.as_str(), &jane(), Some(expire), &issuer)
        .unwrap();

    let record = store.load(record.activation_code.as_str()).unwrap();
    assert_eq!(record.expire, Some(expire));
    let content = issuer.verify(&record).unwrap();
    assert_eq!(content.subject.as_deref(), Some(common::TIMED_SUBJECT));
    assert!(content.not_after.is_some());
}

#[test]
fn redeem_expired_record_fails_and_stores_nothing() {
    let (store, _dir) = common::store();
    let issuer = common::issuer();
    let mut record = LicenseRecord::new(ActivationCode::generate());
    record.issued = Some(Local::now().date_naive() - TimeDelta::days(60));
    record.expire = Some(Local::now().date_naive() - TimeDelta::days(30));
    store.save(&record).unwrap();

    let err = store
        .redeem(record.activation_code.as_str(), &jane(), None, &issuer)
        .unwrap_err();
    assert!(matches!(
        err,
        RegistryError::License(LicenseError::Content(LicenseContentError::Expired))
    ));
    assert!(store
        .load(record.activation_code.as_str())
        .unwrap()
        .key
        .is_none());
}

#[test]
fn redeem_without_identity_for_cert_type() {
    let (store, _dir) = common::store();
    let mut record = LicenseRecord::new(ActivationCode::generate());
    record.cert = CertType::Server;
    store.save(&record).unwrap();

    assert!(matches!(
        store.redeem(record.activation_code.as_str(), &jane(), None, &common::issuer()),
        Err(RegistryError::NoIssuer(_))
    ));
}

#[test]
fn redeem_anonymous_record_gets_placeholder_holder() {
    let (store, _dir) = common::store();
    let issuer = common::issuer();
    let code = store.create_codes("User", 1).unwrap().remove(0);

    store
        .redeem(code.as_str(), &HolderDetails::default(), None, &issuer)
        .unwrap();
    let content = issuer.verify(&store.load(code.as_str()).unwrap()).unwrap();
    // the derived purchase id is still carried
    assert!(content.holder.unwrap().get("UID").is_some());
}
