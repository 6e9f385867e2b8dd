//! Newtype wrappers for domain identifiers.
//!
//! These types prevent accidental mixing of plain strings (e.g. using an
//! artifact name where a commit SHA is expected) and make the code more
//! self-documenting.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A git commit SHA (40 hex characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sha(pub String);

impl Sha {
    /// Creates a new Sha from a string.
    ///
    /// Note: This does not validate the format. Valid SHAs are 40 hex characters.
    pub fn new(s: impl Into<String>) -> Self {
        Sha(s.into())
    }

    /// Returns the SHA as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the 8-character truncated prefix used as the on-disk bucket key.
    ///
    /// Truncating to 8 hex characters carries a birthday-bound collision risk:
    /// two distinct commits sharing a prefix would share a bucket. That risk is
    /// accepted; callers must not rely on bucket keys being unique across the
    /// full SHA space.
    pub fn bucket(&self) -> &str {
        // Use get() to avoid panic if the string contains non-ASCII (shouldn't
        // happen for valid SHAs, but can occur via Sha::new or Deserialize on
        // bad input).
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl fmt::Display for Sha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Sha {
    fn from(s: String) -> Self {
        Sha(s)
    }
}

impl From<&str> for Sha {
    fn from(s: &str) -> Self {
        Sha(s.to_string())
    }
}
