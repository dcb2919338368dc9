//! Canonical encoding of license content.
//!
//! The wire form is compact JSON with a fixed field order, so encoding the
//! same content twice yields identical bytes and signatures can be computed
//! over it. Compression is applied separately by the privacy layer.

use crate::content::{DistinguishedName, LicenseContent};
use crate::error::{LicenseError, LicenseResult};
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Current wire format version.
const FORMAT_VERSION: u8 = 1;

/// Upper bound on decompressed output. Real certificates are a few hundred
/// bytes.
pub const MAX_DECOMPRESSED_SIZE: usize = 1024 * 1024;

/// Field order here is the canonical order.
#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct WireContent {
    v: u8,
    holder: DistinguishedName,
    issuer: DistinguishedName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subject: Option<String>,
    issued: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    not_before: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    not_after: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    consumer_type: Option<String>,
    consumer_amount: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    info: Option<String>,
}

/// Encodes content into its canonical byte form.
///
/// # Errors
///
/// Returns [`LicenseError::Encoding`] if holder, issuer or issued is unset.
pub fn encode(content: &LicenseContent) -> LicenseResult<Vec<u8>> {
    let missing = |field: &str| LicenseError::Encoding(format!("{field} is not set"));

    let wire = WireContent {
        v: FORMAT_VERSION,
        holder: content.holder.clone().ok_or_else(|| missing("holder"))?,
        issuer: content.issuer.clone().ok_or_else(|| missing("issuer"))?,
        subject: content.subject.clone(),
        issued: content.issued.ok_or_else(|| missing("issued"))?,
        not_before: content.not_before,
        not_after: content.not_after,
        consumer_type: content.consumer_type.clone(),
        consumer_amount: content.consumer_amount,
        info: content.info.clone(),
    };

    serde_json::to_vec(&wire).map_err(|e| LicenseError::Encoding(e.to_string()))
}

/// Decodes the canonical byte form.
///
/// # Errors
///
/// Returns [`LicenseError::Decoding`] on truncated, malformed or
/// unknown-version input. Callers should treat this as an invalid license.
pub fn decode(bytes: &[u8]) -> LicenseResult<LicenseContent> {
    let wire: WireContent =
        serde_json::from_slice(bytes).map_err(|e| LicenseError::Decoding(e.to_string()))?;

    if wire.v != FORMAT_VERSION {
        return Err(LicenseError::Decoding(format!(
            "unsupported format version {}",
            wire.v
        )));
    }

    Ok(LicenseContent {
        holder: Some(wire.holder),
        issuer: Some(wire.issuer),
        subject: wire.subject,
        issued: Some(wire.issued),
        not_before: wire.not_before,
        not_after: wire.not_after,
        consumer_type: wire.consumer_type,
        consumer_amount: wire.consumer_amount,
        info: wire.info,
    })
}

/// Gzip-compresses `data`.
pub fn compress(data: &[u8]) -> LicenseResult<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::best());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Reverses [`compress`], refusing output larger than
/// [`MAX_DECOMPRESSED_SIZE`].
pub fn decompress(data: &[u8]) -> LicenseResult<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(data)
        .take(MAX_DECOMPRESSED_SIZE as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| LicenseError::Decoding(format!("decompression failed: {e}")))?;

    if out.len() > MAX_DECOMPRESSED_SIZE {
        return Err(LicenseError::Decoding(
            "decompressed content exceeds size limit".to_string(),
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_order_is_fixed() {
        let content = LicenseContent {
            holder: Some(DistinguishedName::new().with("CN", "a")),
            issuer: Some(DistinguishedName::new().with("CN", "b")),
            issued: Some(DateTime::from_timestamp(0, 0).unwrap()),
            consumer_amount: 1,
            ..LicenseContent::default()
        };
        let json = String::from_utf8(encode(&content).unwrap()).unwrap();
        assert_eq!(
            json,
            r#"{"v":1,"holder":[["CN","a"]],"issuer":[["CN","b"]],"issued":"1970-01-01T00:00:00Z","consumer_amount":1}"#
        );
    }

    #[test]
    fn decompress_rejects_garbage() {
        assert!(decompress(b"definitely not gzip").is_err());
    }
}
