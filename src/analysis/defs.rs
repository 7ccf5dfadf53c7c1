//! Definition records produced by reaching-definitions.
//!
//! A definition is either an [`AssignDef`] (a binder in the source: parameter, free variable,
//! assignment target, loop target, `with ... as` name, comprehension target) or a [`PhiDef`]
//! that merges two incoming definitions where control flow joins. Both are addressed by a
//! dense [`DefId`].

use std::fmt;

use crate::ast::{NamedId, NodeId};

/// Index of a definition within one [`super::ReachingDefsAnalysis`].
///
/// After normalization the indices of an analysis are exactly `0..len`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefId(pub(crate) usize);

impl DefId {
    /// The raw index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for DefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.0)
    }
}

/// The syntax node that produced an [`AssignDef`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefSite {
    /// A function parameter, by argument id
    Param(NodeId),
    /// A free variable of the function, by function id
    Free(NodeId),
    /// An assignment, loop or context statement, by statement id
    Stmt(NodeId),
    /// A list comprehension target, by comprehension id
    Comp(NodeId),
}

impl DefSite {
    /// The node id of the site, whatever its kind.
    #[must_use]
    pub const fn node(self) -> NodeId {
        match self {
            Self::Param(id) | Self::Free(id) | Self::Stmt(id) | Self::Comp(id) => id,
        }
    }
}

/// A definition created by a binder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignDef {
    /// Defined name
    pub name: NamedId,
    /// Binder that created the definition
    pub site: DefSite,
    /// The definition of the same name that was visible just before this one
    pub prev: Option<DefId>,
}

/// A definition merging two incoming definitions of the same name.
///
/// For an `if`, `lhs` comes from the taken branch (or the fall-through of a one-armed `if`)
/// and `rhs` from the other. For a loop, `lhs` is the definition entering the loop and `rhs`
/// the definition leaving the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhiDef {
    /// Merged name
    pub name: NamedId,
    /// The `if` or loop statement at whose join the merge happens
    pub site: NodeId,
    /// First incoming definition
    pub lhs: DefId,
    /// Second incoming definition
    pub rhs: DefId,
}

/// A definition record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Definition {
    /// Created by a binder
    Assign(AssignDef),
    /// Created at a control-flow join
    Phi(PhiDef),
}

impl Definition {
    /// The defined name.
    #[must_use]
    pub const fn name(&self) -> &NamedId {
        match self {
            Self::Assign(def) => &def.name,
            Self::Phi(def) => &def.name,
        }
    }

    /// Node id of the site that created the definition.
    #[must_use]
    pub const fn site_node(&self) -> NodeId {
        match self {
            Self::Assign(def) => def.site.node(),
            Self::Phi(def) => def.site,
        }
    }

    /// Returns `true` for φ-definitions.
    #[must_use]
    pub const fn is_phi(&self) -> bool {
        matches!(self, Self::Phi(_))
    }

    /// Returns the φ record, if this is one.
    #[must_use]
    pub const fn as_phi(&self) -> Option<&PhiDef> {
        match self {
            Self::Phi(def) => Some(def),
            Self::Assign(_) => None,
        }
    }

    /// Returns the assignment record, if this is one.
    #[must_use]
    pub const fn as_assign(&self) -> Option<&AssignDef> {
        match self {
            Self::Assign(def) => Some(def),
            Self::Phi(_) => None,
        }
    }

    /// Every definition index this record points at.
    #[must_use]
    pub fn operands(&self) -> Vec<DefId> {
        match self {
            Self::Assign(def) => def.prev.into_iter().collect(),
            Self::Phi(def) => vec![def.lhs, def.rhs],
        }
    }

    pub(crate) fn remap(&self, map: impl Fn(DefId) -> DefId) -> Self {
        match self {
            Self::Assign(def) => Self::Assign(AssignDef {
                name: def.name.clone(),
                site: def.site,
                prev: def.prev.map(&map),
            }),
            Self::Phi(def) => Self::Phi(PhiDef {
                name: def.name.clone(),
                site: def.site,
                lhs: map(def.lhs),
                rhs: map(def.rhs),
            }),
        }
    }
}

impl fmt::Display for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assign(def) => write!(f, "{} @ {:?}", def.name, def.site),
            Self::Phi(def) => write!(f, "{} = phi({}, {})", def.name, def.lhs, def.rhs),
        }
    }
}

/// Name to reaching definition, at one program point.
///
/// Persistent, so snapshots per statement and copies at branch points share structure.
pub type Env = im::OrdMap<NamedId, DefId>;
