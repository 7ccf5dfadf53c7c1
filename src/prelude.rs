//! # fpy-core Prelude
//!
//! The most commonly used types of the crate in one import.
//!
//! ```rust
//! use fpy_core::prelude::*;
//!
//! let func = FuncDef::new("f", vec![Argument::new("x")], Block::new(vec![
//!     Stmt::ret(Expr::var("x")),
//! ]));
//! let defs = ReachingDefs::analyze(&func)?;
//! assert_eq!(defs.len(), 1);
//! # Ok::<(), fpy_core::Error>(())
//! ```

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all operations
pub use crate::Error;

/// The result type used throughout the crate
pub use crate::Result;

// ================================================================================================
// Syntax
// ================================================================================================

pub use crate::ast::{
    Argument, BinaryOpKind, Binding, Block, Callee, CompareOp, Context, ContextAnn, Expr,
    ExprKind, ExternalFn, Fold, ForeignValue, FuncDef, Id, NamedId, NaryOpKind, NodeId,
    NullaryOpKind, Printer, RoundingMode, Stmt, StmtKind, TernaryOpKind, TypeAnn, UnaryOpKind,
    Visit,
};

// ================================================================================================
// Analyses
// ================================================================================================

pub use crate::analysis::{
    ContextInfer, CtxVal, DefId, DefineUse, Definition, LiveVars, Purity, Reachability,
    ReachingDefs, SyntaxCheck, Type, TypeInfer,
};

// ================================================================================================
// Rewriting
// ================================================================================================

pub use crate::rewrite::{Pattern, Rewrite, RewriteStats};

// ================================================================================================
// Passes
// ================================================================================================

pub use crate::compiler::{
    Bundle, CompilerContext, ConstFold, CopyPropagate, DeadCodeEliminate, EventKind, EventLog,
    ForUnroll, FuncInline, LiftContext, Monomorphize, Pass, PassScheduler, PipelineConfig,
    SimplifyIf,
};
