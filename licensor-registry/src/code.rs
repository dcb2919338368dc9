//! Activation codes: `XXXXX-XXXXX-XXXXX-XXXXX-XXXXXX`.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Character count of each dash-separated group.
pub const GROUP_LENGTHS: [usize; 5] = [5, 5, 5, 5, 6];

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Why a string is not an activation code. Groups and positions are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodeFormatError {
    #[error("activation code has {0} parts, expected five")]
    PartCount(usize),

    #[error("activation code part {group} is {actual} characters long, expected {expected}")]
    PartLength {
        group: usize,
        expected: usize,
        actual: usize,
    },

    #[error("activation code part {group} position {position} is not alpha-numeric")]
    NotAlphanumeric { group: usize, position: usize },
}

/// A well-formed activation code in canonical uppercase form.
///
/// Parsing is case-insensitive; only ASCII letters and digits are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ActivationCode(String);

impl ActivationCode {
    /// Validates and canonicalizes `input`. Surrounding whitespace is ignored.
    pub fn parse(input: &str) -> Result<Self, CodeFormatError> {
        let input = input.trim();
        let parts: Vec<&str> = input.split('-').collect();
        if parts.len() != GROUP_LENGTHS.len() {
            return Err(CodeFormatError::PartCount(parts.len()));
        }

        for (i, (part, expected)) in parts.iter().zip(GROUP_LENGTHS).enumerate() {
            let actual = part.chars().count();
            if actual != expected {
                return Err(CodeFormatError::PartLength {
                    group: i + 1,
                    expected,
                    actual,
                });
            }
            if let Some(j) = part.chars().position(|c| !c.is_ascii_alphanumeric()) {
                return Err(CodeFormatError::NotAlphanumeric {
                    group: i + 1,
                    position: j + 1,
                });
            }
        }

        Ok(Self(input.to_ascii_uppercase()))
    }

    /// Generates a random code.
    ///
    /// Does not check whether the code is already in use; see
    /// [`RecordStore::fresh_code`](crate::RecordStore::fresh_code).
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let groups: Vec<String> = GROUP_LENGTHS
            .iter()
            .map(|&len| {
                (0..len)
                    .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
                    .collect()
            })
            .collect();
        Self(groups.join("-"))
    }

    /// Returns the canonical string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActivationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ActivationCode {
    type Err = CodeFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ActivationCode {
    type Error = CodeFormatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ActivationCode> for String {
    fn from(code: ActivationCode) -> Self {
        code.0
    }
}

impl AsRef<str> for ActivationCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_parse() {
        for _ in 0..50 {
            let code = ActivationCode::generate();
            assert_eq!(ActivationCode::parse(code.as_str()), Ok(code));
        }
    }

    #[test]
    fn parse_uppercases() {
        let code = ActivationCode::parse(" ab12c-d34e5-f67g8-h90i1-j234k5 ").unwrap();
        assert_eq!(code.as_str(), "AB12C-D34E5-F67G8-H90I1-J234K5");
    }
}
