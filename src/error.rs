use thiserror::Error;

use crate::ast::{NamedId, NodeId, Symbol};

macro_rules! invariant_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::InvariantViolation {
            detail: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::InvariantViolation {
            detail: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

pub(crate) use invariant_error;

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every variant carries enough structure for a frontend to point at the offending node; the
/// core itself never prints diagnostics.
///
/// # Error Categories
///
/// ## Scope and binding errors
/// - [`Error::UndefinedName`] - a use with no reaching definition
/// - [`Error::ArityMismatch`] - tuple binding or call with the wrong number of elements
/// - [`Error::BindingShadowsWildcard`] - a named binding spelled like the wildcard
///
/// ## Inference errors
/// - [`Error::CyclicContext`] - a context variable whose definition chain never bottoms out
/// - [`Error::TypeConflict`] - unification failure
/// - [`Error::ContextConflict`] - monomorphization found two contexts for one variable
///
/// ## Rewrite errors
/// - [`Error::RewriteNoMatch`] - the requested occurrence does not exist
/// - [`Error::SubstitutionError`] - the right-hand side uses an unbound pattern variable
/// - [`Error::InvalidPattern`] - a pattern function has the wrong shape
///
/// ## Pipeline errors
/// - [`Error::InvariantViolation`] - post-pass verification caught a malformed IR
/// - [`Error::InvalidArgument`] - a pass was configured with an unusable parameter
///
/// # Examples
///
/// ```rust
/// use fpy_core::{analysis::ReachingDefs, ast::*, Error};
///
/// let func = FuncDef::new("f", vec![], Block::new(vec![Stmt::ret(Expr::var("y"))]));
/// match ReachingDefs::analyze(&func) {
///     Err(Error::UndefinedName { name, .. }) => assert_eq!(name.base(), "y"),
///     other => panic!("unexpected result: {other:?}"),
/// }
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A variable is read at a point where no definition reaches it.
    #[error("undefined name `{name}` at {site}")]
    UndefinedName {
        /// The unbound identifier
        name: NamedId,
        /// The node reading it
        site: NodeId,
    },

    /// A tuple binding or a call received the wrong number of elements.
    #[error("arity mismatch at {site}: expected {expected}, found {actual}")]
    ArityMismatch {
        /// The binding statement or call expression
        site: NodeId,
        /// Number of elements the binder or callee expects
        expected: usize,
        /// Number of elements supplied
        actual: usize,
    },

    /// A named identifier uses the reserved wildcard spelling `_`.
    #[error("binding `{name}` at {site} shadows the wildcard")]
    BindingShadowsWildcard {
        /// The offending identifier
        name: NamedId,
        /// The binding node
        site: NodeId,
    },

    /// The static value of a context variable depends only on itself.
    #[error("cyclic context definition for `{name}` at {site}")]
    CyclicContext {
        /// The context variable
        name: NamedId,
        /// The merging statement
        site: NodeId,
    },

    /// Two types could not be unified.
    #[error("type conflict at {site}: expected {expected}, found {actual}")]
    TypeConflict {
        /// The expression or statement being typed
        site: NodeId,
        /// The type required by the context
        expected: String,
        /// The type that was found
        actual: String,
    },

    /// Monomorphization derived two different contexts for one context variable.
    #[error("context conflict at {site}: {first} vs {second}")]
    ContextConflict {
        /// The parameter or annotation carrying the variable
        site: NodeId,
        /// The context derived first
        first: String,
        /// The conflicting context
        second: String,
    },

    /// A rewrite was asked for an occurrence that does not exist.
    #[error("rewrite `{rule}` has no occurrence {requested} ({found} matches)")]
    RewriteNoMatch {
        /// The rule name
        rule: Symbol,
        /// The requested zero-based occurrence
        requested: usize,
        /// The number of matches that exist
        found: usize,
    },

    /// The right-hand side of a rule references a pattern variable the match did not bind.
    #[error("pattern variable `{0}` is not bound by the match")]
    SubstitutionError(NamedId),

    /// A pattern function does not have the shape of an expression or statement pattern.
    #[error("invalid pattern `{name}`: {reason}")]
    InvalidPattern {
        /// The pattern function name
        name: Symbol,
        /// Why it was rejected
        reason: String,
    },

    /// A pass was given an argument it cannot work with.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The IR violates a structural invariant.
    ///
    /// # Fields
    ///
    /// * `detail` - Description of the violated invariant
    /// * `file` - Source file where the violation was detected
    /// * `line` - Source line where the violation was detected
    #[error("Invariant violation - {file}:{line}: {detail}")]
    InvariantViolation {
        /// Description of the violated invariant
        detail: String,
        /// The source file in which this error occurred
        file: &'static str,
        /// The source line in which this error occurred
        line: u32,
    },
}

impl Error {
    /// Returns the node an error refers to, if it names one.
    #[must_use]
    pub fn site(&self) -> Option<NodeId> {
        match self {
            Self::UndefinedName { site, .. }
            | Self::ArityMismatch { site, .. }
            | Self::BindingShadowsWildcard { site, .. }
            | Self::CyclicContext { site, .. }
            | Self::TypeConflict { site, .. }
            | Self::ContextConflict { site, .. } => Some(*site),
            _ => None,
        }
    }
}
