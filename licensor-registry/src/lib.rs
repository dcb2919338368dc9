//! Activation code registry for licensor.
//!
//! Each activation code owns one [`LicenseRecord`], persisted as
//! `<CODE>.json` in the registry directory. Records are created empty by code
//! generation, filled and issued a license key on redemption, linked to a
//! successor on upgrade, and bulk-created from coupon feeds.
//!
//! Records are never deleted. A superseded record keeps its `replacedBy`
//! link so the upgrade chain stays auditable.

mod code;
mod error;
mod import;
mod issuer;
mod record;
mod store;

pub use code::{ActivationCode, CodeFormatError, GROUP_LENGTHS};
pub use error::{RegistryError, RegistryResult};
pub use import::{ImportFailure, ImportItem, ImportReport};
pub use issuer::{Issuer, IssuerIdentity};
pub use record::{CertType, HolderDetails, LicenseRecord, DATE_FORMAT, DEFAULT_LICENSE_TYPE, SITE_LICENSE_TYPE};
pub use store::{RecordStore, MAX_CODES_PER_BATCH, RECORD_SUFFIX};
