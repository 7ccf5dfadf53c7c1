//! Program analyses over the FPy AST.
//!
//! Every analysis is built per invocation, scoped to one function, and keyed by
//! [`crate::ast::NodeId`]. None of them mutates the tree.
//!
//! # Architecture
//!
//! - [`reaching`] - reaching definitions with φ-definitions at control-flow joins
//! - [`defuse`] - define-use chains on top of reaching definitions
//! - [`context`] - rounding-context inference
//! - [`types`] - Hindley-Milner style type inference
//! - [`purity`] - side-effect analysis
//! - [`reachability`] - statement reachability and fall-through
//! - [`live`] - backward live variables
//! - [`syntax`] - the well-formedness check every pass runs on its output
//!
//! The first two form the backbone: context inference, dead-code elimination, copy
//! propagation and the bundling passes all consume a [`DefineUseAnalysis`].
//!
//! # Usage
//!
//! ```rust
//! use fpy_core::{analysis::DefineUse, ast::*};
//!
//! let func = FuncDef::new("f", vec![Argument::new("x")], Block::new(vec![
//!     Stmt::assign("y", Expr::var("x")),
//!     Stmt::ret(Expr::var("x")),
//! ]));
//! let du = DefineUse::analyze(&func)?;
//! let unused: Vec<_> = du.iter().filter(|(_, uses)| uses.is_empty()).collect();
//! assert_eq!(unused.len(), 1);
//! # Ok::<(), fpy_core::Error>(())
//! ```

use std::collections::HashMap;

use crate::ast::{Block, NodeId, Stmt};

pub mod context;
pub mod defs;
pub mod defuse;
pub mod live;
pub mod purity;
pub mod reachability;
pub mod reaching;
pub mod syntax;
pub mod types;

pub use context::{ContextAnalysis, ContextInfer, CtxVal};
pub use defs::{AssignDef, DefId, DefSite, Definition, Env, PhiDef};
pub use defuse::{DefineUse, DefineUseAnalysis, UseKind, UseSite};
pub use live::{LiveAnalysis, LiveSet, LiveVars};
pub use purity::{Effects, Finding, Purity, PurityAnalysis};
pub use reachability::{Reachability, ReachabilityAnalysis};
pub use reaching::{ReachingDefs, ReachingDefsAnalysis};
pub use syntax::SyntaxCheck;
pub use types::{op_signature, OpRef, Type, TypeAnalysis, TypeInfer, TypeVar};

/// Every statement of a block and its nested blocks, by id.
pub(crate) fn stmt_table(block: &Block) -> HashMap<NodeId, &Stmt> {
    fn walk<'a>(block: &'a Block, table: &mut HashMap<NodeId, &'a Stmt>) {
        for stmt in &block.stmts {
            table.insert(stmt.id, stmt);
            for inner in stmt.blocks() {
                walk(inner, table);
            }
        }
    }

    let mut table = HashMap::new();
    walk(block, &mut table);
    table
}
