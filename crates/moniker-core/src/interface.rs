//! Interface identifiers.
//!
//! Requested interfaces are compared in their repository form,
//! `IDL:<name>:<version>`. Short forms are normalized on construction:
//!
//! - `Stream` → `IDL:Stream:1.0`
//! - `IDL:Stream` → `IDL:Stream:1.0`
//! - `IDL:Stream:2.1` → unchanged

use std::fmt;

use serde::{Deserialize, Serialize};

const REPO_PREFIX: &str = "IDL:";
const DEFAULT_VERSION: &str = ":1.0";

/// A normalized interface identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct InterfaceId(String);

impl InterfaceId {
    /// Base capability every object answers for.
    pub const UNKNOWN: &'static str = "IDL:Unknown:1.0";
    /// Seekable byte stream.
    pub const STREAM: &'static str = "IDL:Stream:1.0";
    /// Named child item lookup.
    pub const ITEM_CONTAINER: &'static str = "IDL:ItemContainer:1.0";
    /// Object creation by interface.
    pub const GENERIC_FACTORY: &'static str = "IDL:GenericFactory:1.0";
    /// Loading state from a stream.
    pub const PERSIST_STREAM: &'static str = "IDL:PersistStream:1.0";
    /// Moniker objects themselves.
    pub const MONIKER: &'static str = "IDL:Moniker:1.0";

    /// Normalize an interface name.
    ///
    /// ```
    /// use moniker_core::InterfaceId;
    ///
    /// assert_eq!(InterfaceId::new("Stream").as_str(), "IDL:Stream:1.0");
    /// assert_eq!(InterfaceId::new("IDL:Stream:1.0"), InterfaceId::stream());
    /// ```
    pub fn new(name: &str) -> Self {
        let name = name.trim();
        let bare = name.strip_prefix(REPO_PREFIX).unwrap_or(name);

        let mut full = String::with_capacity(REPO_PREFIX.len() + bare.len() + DEFAULT_VERSION.len());
        full.push_str(REPO_PREFIX);
        full.push_str(bare);
        if !bare.contains(':') {
            full.push_str(DEFAULT_VERSION);
        }
        Self(full)
    }

    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    pub fn stream() -> Self {
        Self(Self::STREAM.to_string())
    }

    pub fn item_container() -> Self {
        Self(Self::ITEM_CONTAINER.to_string())
    }

    pub fn generic_factory() -> Self {
        Self(Self::GENERIC_FACTORY.to_string())
    }

    pub fn persist_stream() -> Self {
        Self(Self::PERSIST_STREAM.to_string())
    }

    /// Full repository form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name without the `IDL:` prefix and version, e.g. `Stream`.
    pub fn short_name(&self) -> &str {
        let bare = &self.0[REPO_PREFIX.len()..];
        match bare.rfind(':') {
            Some(idx) => &bare[..idx],
            None => bare,
        }
    }

    pub fn is_stream(&self) -> bool {
        self.0 == Self::STREAM
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InterfaceId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for InterfaceId {
    fn from(name: String) -> Self {
        Self::new(&name)
    }
}

impl From<InterfaceId> for String {
    fn from(id: InterfaceId) -> Self {
        id.0
    }
}

impl PartialEq<str> for InterfaceId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for InterfaceId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_forms_normalize() {
        assert_eq!(InterfaceId::new("Stream"), InterfaceId::stream());
        assert_eq!(InterfaceId::new("IDL:Stream"), InterfaceId::stream());
        assert_eq!(InterfaceId::new(" IDL:Stream:1.0 "), InterfaceId::stream());
    }

    #[test]
    fn test_explicit_version_kept() {
        let id = InterfaceId::new("Editor/Control:2.1");
        assert_eq!(id.as_str(), "IDL:Editor/Control:2.1");
        assert_eq!(id.short_name(), "Editor/Control");
    }

    #[test]
    fn test_short_name() {
        assert_eq!(InterfaceId::persist_stream().short_name(), "PersistStream");
        assert!(InterfaceId::new("Stream").is_stream());
        assert!(!InterfaceId::new("PersistStream").is_stream());
    }

    #[test]
    fn test_serde_normalizes() {
        let id: InterfaceId = serde_json::from_str("\"Stream\"").unwrap();
        assert_eq!(id, InterfaceId::stream());
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"IDL:Stream:1.0\"");
    }
}
