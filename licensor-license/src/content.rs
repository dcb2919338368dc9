//! License content: the payload that gets signed.

use crate::error::{LicenseError, LicenseResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Characters that must be backslash-escaped inside an attribute value.
const SPECIAL: &[char] = &['"', '+', ',', ';', '<', '>', '\\', '='];

/// An ordered list of `type=value` attributes identifying a holder or issuer.
///
/// Renders in RFC 4514 string form, e.g. `CN=Jane Doe,O=Acme\, Inc.,C=AU`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DistinguishedName {
    attributes: Vec<(String, String)>,
}

impl DistinguishedName {
    /// Creates an empty name.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an attribute, builder style. See [`push`](Self::push).
    #[must_use]
    pub fn with(mut self, attribute: &str, value: &str) -> Self {
        self.push(attribute, value);
        self
    }

    /// Appends an attribute. The value is trimmed; blank values are skipped.
    pub fn push(&mut self, attribute: &str, value: &str) -> &mut Self {
        let value = value.trim();
        if !value.is_empty() {
            self.attributes
                .push((attribute.trim().to_ascii_uppercase(), value.to_string()));
        }
        self
    }

    /// Returns the first value of `attribute` (case-insensitive).
    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(a, _)| a.eq_ignore_ascii_case(attribute))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the common name (`CN`), if any.
    #[must_use]
    pub fn common_name(&self) -> Option<&str> {
        self.get("CN")
    }

    /// Iterates over `(attribute, value)` pairs in order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(a, v)| (a.as_str(), v.as_str()))
    }

    /// Returns true if no attribute is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Parses the RFC 4514 string form.
    ///
    /// Only single-character backslash escapes are understood; hex-pair
    /// escapes are not.
    pub fn parse(input: &str) -> LicenseResult<Self> {
        let mut dn = Self::new();
        if input.trim().is_empty() {
            return Ok(dn);
        }

        let invalid = |reason: &str| {
            LicenseError::InvalidParams(format!("distinguished name {input:?}: {reason}"))
        };

        let mut chars = input.chars();
        let mut attribute = String::new();
        let mut value = String::new();
        let mut in_value = false;
        let mut trailing_spaces = 0usize;

        loop {
            match chars.next() {
                next @ (None | Some(',')) => {
                    if !in_value {
                        return Err(invalid("attribute without '='"));
                    }
                    let attribute_name = attribute.trim();
                    if attribute_name.is_empty()
                        || !attribute_name
                            .chars()
                            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
                    {
                        return Err(invalid("bad attribute type"));
                    }
                    value.truncate(value.len() - trailing_spaces);
                    dn.attributes
                        .push((attribute_name.to_ascii_uppercase(), std::mem::take(&mut value)));
                    attribute.clear();
                    in_value = false;
                    trailing_spaces = 0;
                    if next.is_none() {
                        break;
                    }
                }
                Some('\\') if in_value => {
                    let escaped = chars.next().ok_or_else(|| invalid("dangling escape"))?;
                    value.push(escaped);
                    trailing_spaces = 0;
                }
                Some('=') if !in_value => in_value = true,
                Some(' ') if in_value && value.is_empty() => {}
                Some(c) if in_value => {
                    value.push(c);
                    trailing_spaces = if c == ' ' { trailing_spaces + 1 } else { 0 };
                }
                Some(c) => attribute.push(c),
            }
        }

        dn.attributes.retain(|(_, v)| !v.is_empty());
        Ok(dn)
    }
}

fn escape_value(value: &str, out: &mut fmt::Formatter<'_>) -> fmt::Result {
    let last = value.chars().count().saturating_sub(1);
    for (i, c) in value.chars().enumerate() {
        let edge_space = c == ' ' && (i == 0 || i == last);
        if SPECIAL.contains(&c) || edge_space || (i == 0 && c == '#') {
            write!(out, "\\{c}")?;
        } else {
            write!(out, "{c}")?;
        }
    }
    Ok(())
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (attribute, value)) in self.attributes.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{attribute}=")?;
            escape_value(value, f)?;
        }
        Ok(())
    }
}

impl FromStr for DistinguishedName {
    type Err = LicenseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// The content of a license before it is signed.
///
/// Every field may be left unset; [`LicenseManager::initialize`] fills
/// defaults and [`LicenseManager::validate`] enforces the business rules.
///
/// [`LicenseManager::initialize`]: crate::LicenseManager::initialize
/// [`LicenseManager::validate`]: crate::LicenseManager::validate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LicenseContent {
    /// Who the license is issued to.
    pub holder: Option<DistinguishedName>,
    /// Who issued the license.
    pub issuer: Option<DistinguishedName>,
    /// The product (edition) the license applies to.
    pub subject: Option<String>,
    /// When the license was issued.
    pub issued: Option<DateTime<Utc>>,
    /// Start of the validity window.
    pub not_before: Option<DateTime<Utc>>,
    /// End of the validity window; `None` for a perpetual license.
    pub not_after: Option<DateTime<Utc>>,
    /// Tier label, e.g. `User`, `Academic`, `Site`.
    pub consumer_type: Option<String>,
    /// Number of seats.
    pub consumer_amount: u32,
    /// Free-form note carried inside the signature.
    pub info: Option<String>,
}

impl LicenseContent {
    /// Creates empty content.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the license never expires.
    #[must_use]
    pub fn is_perpetual(&self) -> bool {
        self.not_after.is_none()
    }
}
