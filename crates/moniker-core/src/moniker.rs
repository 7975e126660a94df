//! Moniker nodes and parsed chains.

use std::fmt;
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};

use crate::error::{MonikerError, MonikerResult};
use crate::name::{escape, parse_segment, segments};

/// Moniker kinds addressable by a name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonikerKind {
    /// `!name`: child of the parent item container.
    Item,
    /// `IOR:ref`: stringified object reference.
    Ior,
    /// `OAFIID:iid`: activation by implementation id.
    Oaf,
    /// `cache:`: cached view of the parent stream.
    Cache,
    /// `new:`: object from the parent's generic factory.
    New,
    /// `query:(expr)`: activation by requirement query.
    Query,
}

impl MonikerKind {
    /// Canonical prefix used when rendering a name.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Item => "!",
            Self::Ior => "IOR:",
            Self::Oaf => "OAFIID:",
            Self::Cache => "cache:",
            Self::New => "new:",
            Self::Query => "query:",
        }
    }

    /// Whether a node of this kind may sit on top of a parent.
    pub fn accepts_parent(self) -> bool {
        !matches!(self, Self::Oaf | Self::Query)
    }
}

impl fmt::Display for MonikerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Item => "item",
            Self::Ior => "ior",
            Self::Oaf => "oaf",
            Self::Cache => "cache",
            Self::New => "new",
            Self::Query => "query",
        };
        f.write_str(s)
    }
}

/// One node of a composite name.
///
/// The parent link is weak: whoever parsed the chain owns its nodes.
#[derive(Debug)]
pub struct Moniker {
    kind: MonikerKind,
    name: String,
    parent: Option<Weak<Moniker>>,
}

impl Moniker {
    /// Create a root node.
    pub fn new(kind: MonikerKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            parent: None,
        }
    }

    /// Create a node on top of `parent`.
    pub fn with_parent(kind: MonikerKind, name: impl Into<String>, parent: &Arc<Moniker>) -> Self {
        Self {
            kind,
            name: name.into(),
            parent: Some(Arc::downgrade(parent)),
        }
    }

    pub fn kind(&self) -> MonikerKind {
        self.kind
    }

    /// Segment payload, prefix stripped and unescaped.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_parent(&self) -> bool {
        self.parent.is_some()
    }

    /// Upgrade the parent link.
    ///
    /// Fails when the node had a parent that has since been released.
    pub fn parent(&self) -> MonikerResult<Option<Arc<Moniker>>> {
        match &self.parent {
            None => Ok(None),
            Some(weak) => weak.upgrade().map(Some).ok_or_else(|| {
                MonikerError::general(format!(
                    "parent of {}{} has been released",
                    self.kind.prefix(),
                    self.name
                ))
            }),
        }
    }

    /// Full escaped name of this node and its ancestors.
    pub fn display_name(&self) -> MonikerResult<String> {
        let mut out = match self.parent()? {
            Some(parent) => parent.display_name()?,
            None => String::new(),
        };
        if self.parent.is_some() && self.kind != MonikerKind::Item {
            out.push('#');
        }
        out.push_str(self.kind.prefix());
        out.push_str(&escape(&self.name));
        Ok(out)
    }

    /// Whether `name` denotes the same chain as this node.
    pub fn equal(&self, name: &str) -> MonikerResult<bool> {
        let other = MonikerChain::parse(name)?;
        Ok(self.display_name()? == other.leaf().display_name()?)
    }
}

impl fmt::Display for Moniker {
    /// Renders the full name. A released ancestor renders as nothing.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(parent) = self.parent.as_ref().and_then(Weak::upgrade) {
            write!(f, "{parent}")?;
        }
        if self.parent.is_some() && self.kind != MonikerKind::Item {
            f.write_str("#")?;
        }
        write!(f, "{}{}", self.kind.prefix(), escape(&self.name))
    }
}

/// A parsed name: owns every node, root first.
#[derive(Debug, Clone)]
pub struct MonikerChain {
    nodes: Vec<Arc<Moniker>>,
}

impl MonikerChain {
    /// Parse a full name.
    ///
    /// # Examples
    ///
    /// ```
    /// use moniker_core::{MonikerChain, MonikerKind};
    ///
    /// let chain = MonikerChain::parse("IOR:00ff#cache:").unwrap();
    /// assert_eq!(chain.len(), 2);
    /// assert_eq!(chain.leaf().kind(), MonikerKind::Cache);
    /// assert_eq!(chain.root().name(), "00ff");
    /// assert_eq!(chain.to_string(), "IOR:00ff#cache:");
    /// ```
    pub fn parse(name: &str) -> MonikerResult<Self> {
        let mut nodes: Vec<Arc<Moniker>> = Vec::new();
        for segment in segments(name)? {
            let (kind, payload) = parse_segment(segment)?;
            let node = match nodes.last() {
                Some(parent) => Moniker::with_parent(kind, payload, parent),
                None => Moniker::new(kind, payload),
            };
            nodes.push(Arc::new(node));
        }
        Ok(Self { nodes })
    }

    /// The node a resolve starts from.
    pub fn leaf(&self) -> &Arc<Moniker> {
        // parse() never yields an empty chain
        &self.nodes[self.nodes.len() - 1]
    }

    pub fn root(&self) -> &Arc<Moniker> {
        &self.nodes[0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes, root first.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Moniker>> {
        self.nodes.iter()
    }
}

impl fmt::Display for MonikerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.leaf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chain() {
        let chain = MonikerChain::parse("OAFIID:Demo_Container!doc#cache:").unwrap();
        let kinds: Vec<_> = chain.iter().map(|m| m.kind()).collect();
        assert_eq!(
            kinds,
            vec![MonikerKind::Oaf, MonikerKind::Item, MonikerKind::Cache]
        );
        assert_eq!(chain.root().name(), "Demo_Container");
        assert!(!chain.root().has_parent());

        let parent = chain.leaf().parent().unwrap().unwrap();
        assert_eq!(parent.kind(), MonikerKind::Item);
        assert_eq!(parent.name(), "doc");
    }

    #[test]
    fn test_display_roundtrip_with_escapes() {
        let original = r"IOR:00!a\!b\#c#query:(iid == 'x')";
        let chain = MonikerChain::parse(original).unwrap();
        assert_eq!(chain.leaf().name(), "(iid == 'x')");
        assert_eq!(chain.iter().nth(1).unwrap().name(), "a!b#c");

        let rendered = chain.to_string();
        assert_eq!(rendered, original);
        let reparsed = MonikerChain::parse(&rendered).unwrap();
        assert_eq!(reparsed.len(), chain.len());
        assert_eq!(reparsed.to_string(), rendered);
    }

    #[test]
    fn test_display_canonicalizes_prefix() {
        let chain = MonikerChain::parse("oafaid:Demo#CACHE:").unwrap();
        assert_eq!(chain.to_string(), "OAFIID:Demo#cache:");
        assert!(chain.leaf().equal("OAFIID:Demo#cache:").unwrap());
        assert!(!chain.leaf().equal("OAFIID:Other#cache:").unwrap());
    }

    #[test]
    fn test_released_parent() {
        let leaf = {
            let chain = MonikerChain::parse("IOR:00#cache:").unwrap();
            Arc::clone(chain.leaf())
        };
        assert!(leaf.has_parent());
        assert!(matches!(leaf.parent(), Err(MonikerError::General { .. })));
        assert!(leaf.display_name().is_err());
        assert_eq!(leaf.to_string(), "#cache:");
    }

    #[test]
    fn test_kind_display_and_serde() {
        assert_eq!(MonikerKind::Oaf.to_string(), "oaf");
        assert_eq!(
            serde_json::to_string(&MonikerKind::Query).unwrap(),
            "\"query\""
        );
        assert!(!MonikerKind::Query.accepts_parent());
        assert!(MonikerKind::Cache.accepts_parent());
    }
}
