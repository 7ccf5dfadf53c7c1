//! The FPy abstract syntax tree.
//!
//! The tree is the compiler's only IR. Expressions, statements and blocks are plain owned
//! values: a function owns its body, a block owns its statements, an operator owns its operands.
//! Transformations never patch a tree in place; they consume or clone it and build a new one.
//!
//! # Layout
//!
//! - [`id`] - identifiers, node identities and locations
//! - [`context`] - rounding contexts and host values embedded in the tree
//! - [`expr`], [`stmt`], [`func`] - the node types
//! - [`equiv`] - structural equivalence
//! - [`visit`], [`fold`] - read-only and rebuilding traversals
//! - [`names`] - renaming, structural copies, name sets and fresh names
//! - [`printer`] - source-like rendering

pub mod context;
pub mod equiv;
pub mod expr;
pub mod fold;
pub mod func;
pub mod id;
pub mod names;
pub mod printer;
pub mod stmt;
pub mod visit;

pub use context::{
    digits_value, parse_decnum, parse_hexnum, rational_value, Context, CtxArg, ForeignValue,
    RoundingMode,
};
pub use expr::{
    BinaryOpKind, Binding, CompareOp, Expr, ExprKind, NaryOpKind, NullaryOpKind, TernaryOpKind,
    UnaryOpKind,
};
pub use fold::Fold;
pub use func::{Argument, Callee, ContextAnn, ExternalFn, FuncDef, TypeAnn};
pub use id::{Id, Loc, NamedId, NodeId, Symbol};
pub use names::Gensym;
pub use printer::Printer;
pub use stmt::{Block, Stmt, StmtKind};
pub use visit::Visit;
