//! Member identity hashing and resolver input classification.
//!
//! A member's external identifier (badge number, student ID) is never stored
//! raw. It is trimmed and run through a one-way digest; the hex-encoded digest
//! is the durable, comparable key that scans are matched against.

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Digest algorithm used to derive identity hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityDigest {
    /// Hex-encoded SHA-256.
    #[default]
    Sha256,
    /// Hex-encoded BLAKE3.
    Blake3,
}

impl IdentityDigest {
    /// Stable name of the algorithm, as recorded in the database.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Blake3 => "blake3",
        }
    }

    /// Hash a raw identifier.
    ///
    /// The input is trimmed of surrounding whitespace first, so `" 555 "` and
    /// `"555"` produce the same hash.
    #[must_use]
    pub fn hash(self, raw: &str) -> IdentityHash {
        let canonical = canonicalize(raw);
        let hex = match self {
            Self::Sha256 => hex::encode(Sha256::digest(canonical.as_bytes())),
            Self::Blake3 => blake3::hash(canonical.as_bytes()).to_hex().to_string(),
        };
        IdentityHash(hex)
    }
}

impl fmt::Display for IdentityDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdentityDigest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sha256" => Ok(Self::Sha256),
            "blake3" => Ok(Self::Blake3),
            other => Err(Error::ConfigValidation {
                message: format!("unknown identity digest: {other}"),
            }),
        }
    }
}

/// Canonical form of a raw identifier before hashing.
#[must_use]
pub fn canonicalize(raw: &str) -> &str {
    raw.trim()
}

/// Hex-encoded digest of a member's external identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityHash(String);

impl IdentityHash {
    /// Wrap a hash read back from storage without recomputing it.
    #[must_use]
    pub fn from_stored(hex: String) -> Self {
        Self(hex)
    }

    /// The hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for IdentityHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl ToSql for IdentityHash {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        self.0.to_sql()
    }
}

impl FromSql for IdentityHash {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        String::column_result(value).map(Self)
    }
}

/// How resolver input should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind<'a> {
    /// A raw external identifier, to be hashed and matched exactly.
    RawIdentifier(&'a str),
    /// A fragment of a first or last name.
    NameFragment(&'a str),
}

/// Decides whether free text is a raw identifier or a name fragment.
///
/// By default any all-ASCII-digit string is an identifier and never a name.
/// A custom pattern replaces that rule.
#[derive(Debug, Clone, Default)]
pub struct InputClassifier {
    pattern: Option<Regex>,
}

impl InputClassifier {
    /// Build a classifier that treats input matching `pattern` as an identifier.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the pattern is not a valid regex.
    pub fn with_pattern(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| Error::ConfigValidation {
            message: format!("invalid identity pattern {pattern}: {e}"),
        })?;
        Ok(Self {
            pattern: Some(regex),
        })
    }

    /// Classify trimmed input. Returns `None` when nothing is left after trimming.
    #[must_use]
    pub fn classify<'a>(&self, input: &'a str) -> Option<InputKind<'a>> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }

        let is_identifier = match &self.pattern {
            Some(regex) => regex.is_match(trimmed),
            None => trimmed.bytes().all(|b| b.is_ascii_digit()),
        };

        Some(if is_identifier {
            InputKind::RawIdentifier(trimmed)
        } else {
            InputKind::NameFragment(trimmed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_value() {
        // sha256("555")
        let hash = IdentityDigest::Sha256.hash("555");
        assert_eq!(
            hash.as_str(),
            "91a73fd806ab2c005c13b4dc19130a884e909dea3f72d46e30266fe1a1f588d8"
        );
    }

    #[test]
    fn test_hash_trims_input() {
        for digest in [IdentityDigest::Sha256, IdentityDigest::Blake3] {
            assert_eq!(digest.hash("  12345\t"), digest.hash("12345"));
        }
    }

    #[test]
    fn test_hash_is_stable_and_fixed_length() {
        let a = IdentityDigest::Sha256.hash("67890");
        let b = IdentityDigest::Sha256.hash("67890");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert_ne!(a, IdentityDigest::Sha256.hash("67891"));
    }

    #[test]
    fn test_digests_differ() {
        assert_ne!(
            IdentityDigest::Sha256.hash("555"),
            IdentityDigest::Blake3.hash("555")
        );
        assert_eq!(IdentityDigest::Blake3.hash("555").as_str().len(), 64);
    }

    #[test]
    fn test_digest_names_round_trip() {
        for digest in [IdentityDigest::Sha256, IdentityDigest::Blake3] {
            assert_eq!(digest.as_str().parse::<IdentityDigest>().unwrap(), digest);
        }
        assert!("md5".parse::<IdentityDigest>().is_err());
    }

    #[test]
    fn test_short_hash() {
        let hash = IdentityDigest::Sha256.hash("1");
        assert_eq!(hash.short().len(), 12);
        assert_eq!(IdentityHash::from_stored("ab".to_string()).short(), "ab");
    }

    #[test]
    fn test_classify_digits_as_identifier() {
        let classifier = InputClassifier::default();
        assert_eq!(
            classifier.classify(" 12345 "),
            Some(InputKind::RawIdentifier("12345"))
        );
    }

    #[test]
    fn test_classify_names() {
        let classifier = InputClassifier::default();
        assert_eq!(
            classifier.classify("Jane"),
            Some(InputKind::NameFragment("Jane"))
        );
        assert_eq!(
            classifier.classify("R2D2"),
            Some(InputKind::NameFragment("R2D2"))
        );
        assert_eq!(
            classifier.classify("12 34"),
            Some(InputKind::NameFragment("12 34"))
        );
    }

    #[test]
    fn test_classify_empty() {
        let classifier = InputClassifier::default();
        assert_eq!(classifier.classify(""), None);
        assert_eq!(classifier.classify("   "), None);
    }

    #[test]
    fn test_custom_pattern() {
        let classifier = InputClassifier::with_pattern(r"^S\d{6}$").unwrap();
        assert_eq!(
            classifier.classify("S123456"),
            Some(InputKind::RawIdentifier("S123456"))
        );
        assert_eq!(
            classifier.classify("123456"),
            Some(InputKind::NameFragment("123456"))
        );
    }

    #[test]
    fn test_invalid_pattern() {
        let err = InputClassifier::with_pattern("[unclosed").unwrap_err();
        assert!(matches!(err, Error::ConfigValidation { .. }));
    }
}
