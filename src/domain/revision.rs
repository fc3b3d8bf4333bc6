use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Content fingerprint of a serialized rule set.
///
/// Lowercase hex SHA-256 over the exact bytes, computed once. Identical
/// content always yields the same revision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    /// Compute the revision of some serialized content.
    pub fn of(data: &[u8]) -> Self {
        Revision(hex::encode(Sha256::digest(data)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare against an entity tag as sent by HTTP clients (quoted, weak or bare).
    /// `*` matches any revision.
    pub fn matches_etag(&self, etag: &str) -> bool {
        let tag = etag.trim();
        if tag == "*" {
            return true;
        }
        let tag = tag.strip_prefix("W/").unwrap_or(tag);
        let tag = tag.trim_matches('"');
        tag == self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
