//! Identifiers, node identities and source locations.
//!
//! Every syntax node carries a [`NodeId`]. Analyses key their results by node id instead of by
//! pointer, so a result stays valid for as long as the tree it was computed on is alive, and
//! transformations that move a subtree without copying it keep the analysis facts attached.
//! Structural copies (see [`crate::ast::names::refresh_ids`]) allocate new ids.

use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

/// Interned-ish string used for names, operator spellings and source paths.
pub type Symbol = Arc<str>;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique identity of a syntax node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Allocates a new, never before returned node id.
    #[must_use]
    pub fn fresh() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw counter value.
    #[must_use]
    pub const fn index(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A user-visible or generated variable name.
///
/// Two names are equal only if both the base spelling and the disambiguating counter agree, so a
/// generated `x` with counter `3` never aliases a user-written `x`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamedId {
    base: Symbol,
    count: Option<u32>,
}

impl NamedId {
    /// Creates a user-level name with no disambiguator.
    #[must_use]
    pub fn new(base: impl Into<Symbol>) -> Self {
        Self {
            base: base.into(),
            count: None,
        }
    }

    /// Creates a name with an explicit disambiguator.
    #[must_use]
    pub fn with_count(base: impl Into<Symbol>, count: u32) -> Self {
        Self {
            base: base.into(),
            count: Some(count),
        }
    }

    /// The spelling shared by every name derived from the same source identifier.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The base spelling as a shared symbol.
    #[must_use]
    pub fn base_symbol(&self) -> &Symbol {
        &self.base
    }

    /// The disambiguator, `None` for names written by the user.
    #[must_use]
    pub const fn count(&self) -> Option<u32> {
        self.count
    }

    /// Returns `true` if the name was produced by a fresh-name generator.
    #[must_use]
    pub const fn is_generated(&self) -> bool {
        self.count.is_some()
    }
}

impl fmt::Display for NamedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.count {
            Some(count) => write!(f, "{}_{}", self.base, count),
            None => f.write_str(&self.base),
        }
    }
}

impl From<&str> for NamedId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A binding identifier: either a name or the wildcard `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Id {
    /// A real variable.
    Named(NamedId),
    /// The wildcard; binds nothing.
    Underscore,
}

impl Id {
    /// Returns the named identifier, or `None` for the wildcard.
    #[must_use]
    pub const fn as_named(&self) -> Option<&NamedId> {
        match self {
            Self::Named(name) => Some(name),
            Self::Underscore => None,
        }
    }

    /// Returns `true` for the wildcard.
    #[must_use]
    pub const fn is_underscore(&self) -> bool {
        matches!(self, Self::Underscore)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => name.fmt(f),
            Self::Underscore => f.write_str("_"),
        }
    }
}

impl From<NamedId> for Id {
    fn from(value: NamedId) -> Self {
        Self::Named(value)
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        if value == "_" {
            Self::Underscore
        } else {
            Self::Named(NamedId::new(value))
        }
    }
}

/// Source range of a node. Purely informational.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Loc {
    /// Source file or other origin label
    pub source: Symbol,
    /// First line, 1-based
    pub start_line: u32,
    /// First column, 0-based
    pub start_col: u32,
    /// Last line, 1-based
    pub end_line: u32,
    /// Column after the last character
    pub end_col: u32,
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.source, self.start_line, self.start_col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_ids_are_unique() {
        let a = NodeId::fresh();
        let b = NodeId::fresh();
        assert_ne!(a, b);
        assert!(b.index() > a.index());
    }

    #[test]
    fn test_named_id_equality_includes_count() {
        let user = NamedId::new("x");
        let generated = NamedId::with_count("x", 0);
        assert_ne!(user, generated);
        assert_eq!(user.base(), generated.base());
        assert!(!user.is_generated());
        assert!(generated.is_generated());
        assert_eq!(generated.to_string(), "x_0");
    }

    #[test]
    fn test_id_from_str() {
        assert!(Id::from("_").is_underscore());
        assert_eq!(Id::from("y").as_named(), Some(&NamedId::new("y")));
    }
}
