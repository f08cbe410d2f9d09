//! Newtype wrapper for identifier strings, providing compile-time type safety.
//!
//! Serializes/deserializes as a plain string for wire compatibility.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// A persistent identifier bound to a content checksum, e.g. `minid:1a2b3c`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Minid(String);

impl Minid {
    /// Create a new instance from a string.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Return the inner string as a slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume self and return the inner `String`.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Deref for Minid {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Minid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Minid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Minid {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Minid {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl PartialEq<String> for Minid {
    fn eq(&self, other: &String) -> bool {
        self.0 == *other
    }
}

impl PartialEq<Minid> for String {
    fn eq(&self, other: &Minid) -> bool {
        *self == other.0
    }
}

impl From<String> for Minid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Minid {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}
