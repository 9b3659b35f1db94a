use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Resolution-stable identity of a module.
///
/// The resolver produces one identifier per underlying resource (typically an
/// absolute path plus any request qualifiers), and the whole compilation keys
/// on it: registry lookups, reason edges, chunk membership. Cloning is cheap -
/// the string is reference counted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(Arc<str>);

impl ModuleId {
    /// Create a module identity from an identifier string.
    pub fn new(identifier: impl AsRef<str>) -> Self {
        Self(Arc::from(identifier.as_ref()))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ModuleId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl Serialize for ModuleId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ModuleId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}
