//! Identifiers for recorded incidents

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of every generated record ID
pub const MISS_ID_LEN: usize = 10;

/// URL-safe alphabet IDs are drawn from
const ID_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

/// Unique identifier for a missed delivery record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MissId(String);

impl MissId {
    /// Generate a fresh random ID
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let id = (0..MISS_ID_LEN)
            .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
            .collect();
        Self(id)
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `s` has the shape of a generated ID
    pub fn is_well_formed(s: &str) -> bool {
        s.len() == MISS_ID_LEN
            && s
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    }
}

impl fmt::Display for MissId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MissId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<str> for MissId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}
