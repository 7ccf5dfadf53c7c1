//! Function definitions, type annotations and call targets.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::Arc,
};

use super::{Block, Context, ForeignValue, Id, Loc, NamedId, NodeId, Symbol};

/// Context component of a real-number annotation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContextAnn {
    /// Any context
    Any,
    /// A context variable, bound by monomorphization
    Var(Symbol),
    /// A concrete context
    Known(Context),
}

/// A type annotation as written in the source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeAnn {
    /// No constraint
    Any,
    /// `bool`
    Bool,
    /// `real`, optionally pinned to a rounding context
    Real(ContextAnn),
    /// `context`
    Context,
    /// `tuple[t0, t1, ...]`
    Tuple(Vec<TypeAnn>),
    /// `list[t]`
    List(Box<TypeAnn>),
    /// A type variable, bound by monomorphization
    Var(Symbol),
}

impl TypeAnn {
    /// `real` in any context.
    #[must_use]
    pub const fn real() -> Self {
        Self::Real(ContextAnn::Any)
    }

    /// Returns `true` if the annotation mentions a type or context variable.
    #[must_use]
    pub fn is_polymorphic(&self) -> bool {
        match self {
            Self::Var(_) | Self::Real(ContextAnn::Var(_)) => true,
            Self::Tuple(elts) => elts.iter().any(Self::is_polymorphic),
            Self::List(elt) => elt.is_polymorphic(),
            _ => false,
        }
    }
}

impl fmt::Display for TypeAnn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::Bool => f.write_str("bool"),
            Self::Real(ContextAnn::Any) => f.write_str("real"),
            Self::Real(ContextAnn::Var(v)) => write!(f, "real[{v}]"),
            Self::Real(ContextAnn::Known(ctx)) => write!(f, "real[{ctx}]"),
            Self::Context => f.write_str("context"),
            Self::Tuple(elts) => {
                f.write_str("tuple[")?;
                for (i, elt) in elts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    elt.fmt(f)?;
                }
                f.write_str("]")
            }
            Self::List(elt) => write!(f, "list[{elt}]"),
            Self::Var(v) => f.write_str(v),
        }
    }
}

/// A host function the core cannot see into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalFn {
    /// Name in the host environment
    pub name: Symbol,
    /// Whether calling it is free of side effects
    pub pure: bool,
    /// Optional signature as `(parameters, result)`
    pub signature: Option<(Vec<TypeAnn>, TypeAnn)>,
}

/// Resolved target of a call.
///
/// The core only compares callees and asks whether they are pure; evaluating them is the
/// interpreter's business.
#[derive(Debug, Clone)]
pub enum Callee {
    /// A user-defined FPy function
    Function(Arc<FuncDef>),
    /// A host function
    External(Arc<ExternalFn>),
}

impl Callee {
    /// Name of the target.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Function(func) => &func.name,
            Self::External(ext) => &ext.name,
        }
    }
}

impl PartialEq for Callee {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Function(a), Self::Function(b)) => Arc::ptr_eq(a, b),
            (Self::External(a), Self::External(b)) => Arc::ptr_eq(a, b) || a == b,
            _ => false,
        }
    }
}

/// A function parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    /// Identity of the parameter; definition site of its entry binding
    pub id: NodeId,
    /// Parameter name, possibly the wildcard
    pub name: Id,
    /// Optional annotation
    pub ann: Option<TypeAnn>,
    /// Source location
    pub loc: Option<Loc>,
}

impl Argument {
    /// Unannotated parameter.
    #[must_use]
    pub fn new(name: impl Into<Id>) -> Self {
        Self {
            id: NodeId::fresh(),
            name: name.into(),
            ann: None,
            loc: None,
        }
    }

    /// Attaches an annotation.
    #[must_use]
    pub fn with_ann(mut self, ann: TypeAnn) -> Self {
        self.ann = Some(ann);
        self
    }
}

/// A function definition.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncDef {
    /// Identity of the function; definition site of free variables
    pub id: NodeId,
    /// Function name
    pub name: Symbol,
    /// Parameters in order
    pub args: Vec<Argument>,
    /// Body
    pub body: Block,
    /// Names referenced but never assigned
    pub free_vars: BTreeSet<NamedId>,
    /// Overriding rounding context
    pub ctx: Option<Context>,
    /// Free-form metadata attached by the frontend
    pub meta: BTreeMap<Symbol, ForeignValue>,
    /// Host values captured at definition time
    pub env: BTreeMap<Symbol, ForeignValue>,
    /// Source location
    pub loc: Option<Loc>,
}

impl FuncDef {
    /// Creates a function with no free variables, context, metadata or environment.
    #[must_use]
    pub fn new(name: impl Into<Symbol>, args: Vec<Argument>, body: Block) -> Self {
        Self {
            id: NodeId::fresh(),
            name: name.into(),
            args,
            body,
            free_vars: BTreeSet::new(),
            ctx: None,
            meta: BTreeMap::new(),
            env: BTreeMap::new(),
            loc: None,
        }
    }

    /// Declares free variables.
    #[must_use]
    pub fn with_free_vars<I, N>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<NamedId>,
    {
        self.free_vars.extend(names.into_iter().map(Into::into));
        self
    }

    /// Sets the overriding context.
    #[must_use]
    pub fn with_ctx(mut self, ctx: Context) -> Self {
        self.ctx = Some(ctx);
        self
    }

    /// Adds a captured host value.
    #[must_use]
    pub fn with_env(mut self, name: impl Into<Symbol>, value: ForeignValue) -> Self {
        self.env.insert(name.into(), value);
        self
    }

    /// Named parameters in order.
    pub fn param_names(&self) -> impl Iterator<Item = &NamedId> {
        self.args.iter().filter_map(|arg| arg.name.as_named())
    }
}
