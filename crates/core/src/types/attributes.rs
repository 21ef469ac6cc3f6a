//! Variant attribute values and their identity fingerprint.
//!
//! Two variants of the same product are "the same variant" exactly when their
//! attribute-value sets are equal. [`AttributeHash`] commits to such a set so
//! that the comparison can be done with a single indexed lookup.
//!
//! # Encoding
//!
//! Pairs are sorted by attribute ID, rendered as `"{attribute_id}:{value}"`
//! and joined with `|`. Attribute IDs render as decimal digits (optionally
//! with a leading `-`), so neither `:` nor `|` can come from the ID side of a
//! pair. Values escape `\` and `|` with a backslash, which keeps the encoding
//! injective even for values that contain the separator; ordinary values
//! encode verbatim. The joined string is hashed with SHA-256 and encoded as
//! lowercase hex.
//!
//! The empty set hashes the empty string, so a product whose category has no
//! variant-distinguishing attributes still gets exactly one valid hash (and
//! therefore at most one variant).

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::id::AttributeId;

/// Separator between encoded pairs.
const PAIR_SEPARATOR: &str = "|";

/// A single `(attribute, value)` selection on a variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeValue {
    pub attribute_id: AttributeId,
    pub value: String,
}

impl AttributeValue {
    /// Create a new attribute selection.
    #[must_use]
    pub fn new(attribute_id: AttributeId, value: impl Into<String>) -> Self {
        Self {
            attribute_id,
            value: value.into(),
        }
    }
}

fn escape_value(value: &str) -> String {
    if !value.contains(['\\', '|']) {
        return value.to_owned();
    }
    let mut escaped = String::with_capacity(value.len() + 4);
    for c in value.chars() {
        if c == '\\' || c == '|' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Deterministic SHA-256 digest of a variant's attribute-value set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeHash(String);

impl AttributeHash {
    /// Fingerprint an unordered collection of attribute selections.
    ///
    /// Input order does not matter; the slice is not modified.
    #[must_use]
    pub fn of(attributes: &[AttributeValue]) -> Self {
        let mut sorted: Vec<&AttributeValue> = attributes.iter().collect();
        sorted.sort_by_key(|a| a.attribute_id);

        let canonical = sorted
            .iter()
            .map(|a| format!("{}:{}", a.attribute_id, escape_value(&a.value)))
            .collect::<Vec<_>>()
            .join(PAIR_SEPARATOR);

        let digest = Sha256::digest(canonical.as_bytes());
        Self(hex::encode(digest))
    }

    /// Wrap a digest previously read from storage.
    #[must_use]
    pub const fn from_stored(hex_digest: String) -> Self {
        Self(hex_digest)
    }

    /// The lowercase hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AttributeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
