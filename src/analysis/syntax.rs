//! Lightweight well-formedness check.
//!
//! Every transform pass runs [`SyntaxCheck::check`] on its output. The check covers:
//!
//! - scope: every name read is defined on every path reaching it (via reaching definitions)
//! - binding arity: a tuple binding against a tuple literal of another length
//! - duplicate names in a tuple binding or parameter list
//! - wildcard shadowing: a named identifier spelled `_`
//! - empty blocks: every block holds at least one statement
//! - comparison chains with one more operand than operator
//!
//! # Example
//!
//! ```rust
//! use fpy_core::{analysis::SyntaxCheck, ast::*, Error};
//!
//! let func = FuncDef::new("f", vec![Argument::new("x")], Block::new(vec![]));
//! assert!(matches!(SyntaxCheck::check(&func), Err(Error::InvariantViolation { .. })));
//! ```

use std::collections::BTreeSet;

use crate::{
    analysis::reaching::ReachingDefs,
    ast::{Binding, Block, Expr, ExprKind, FuncDef, NamedId, NodeId, Stmt, StmtKind},
    error::invariant_error,
    Error, Result,
};

const WILDCARD: &str = "_";

/// Entry point of the syntax checker.
pub struct SyntaxCheck;

impl SyntaxCheck {
    /// Checks that `func` is well formed.
    ///
    /// # Errors
    ///
    /// - [`Error::BindingShadowsWildcard`] for a named binding spelled `_`
    /// - [`Error::ArityMismatch`] for mis-sized tuple bindings or comparison chains
    /// - [`Error::UndefinedName`] for a read with no reaching definition
    /// - [`Error::InvariantViolation`] for empty blocks and duplicate names
    pub fn check(func: &FuncDef) -> Result<()> {
        let mut params = BTreeSet::new();
        for arg in &func.args {
            if let Some(name) = arg.name.as_named() {
                check_name(name, arg.id)?;
                if !params.insert(name) {
                    return Err(invariant_error!(
                        "duplicate parameter `{}` in `{}`",
                        name,
                        func.name
                    ));
                }
            }
        }
        check_block(&func.body)?;
        ReachingDefs::analyze(func).map(|_| ())
    }

    /// Like [`SyntaxCheck::check`] for a free-standing block with `inputs` defined on entry.
    ///
    /// # Errors
    ///
    /// See [`SyntaxCheck::check`].
    pub fn check_block(block: &Block, inputs: &[NamedId]) -> Result<()> {
        check_block(block)?;
        ReachingDefs::analyze_block(block, inputs).map(|_| ())
    }
}

fn check_name(name: &NamedId, site: NodeId) -> Result<()> {
    if name.base() == WILDCARD {
        return Err(Error::BindingShadowsWildcard {
            name: name.clone(),
            site,
        });
    }
    Ok(())
}

fn check_binding(target: &Binding, site: NodeId) -> Result<()> {
    for name in target.names() {
        check_name(name, site)?;
    }
    Ok(())
}

fn check_block(block: &Block) -> Result<()> {
    if block.is_empty() {
        return Err(invariant_error!("empty block {}", block.id));
    }
    for stmt in &block.stmts {
        check_stmt(stmt)?;
    }
    Ok(())
}

fn check_stmt(stmt: &Stmt) -> Result<()> {
    match &stmt.kind {
        StmtKind::Assign { target, .. } | StmtKind::For { target, .. } => {
            check_binding(target, stmt.id)?;
        }
        StmtKind::IndexedAssign { var, .. }
        | StmtKind::Context {
            name: Some(var), ..
        } => check_name(var, stmt.id)?,
        _ => {}
    }
    for expr in stmt.exprs() {
        check_expr(expr)?;
    }
    for block in stmt.blocks() {
        check_block(block)?;
    }
    Ok(())
}

fn check_expr(expr: &Expr) -> Result<()> {
    match &expr.kind {
        ExprKind::Compare { ops, args } if ops.len() + 1 != args.len() => {
            return Err(Error::ArityMismatch {
                site: expr.id,
                expected: ops.len() + 1,
                actual: args.len(),
            });
        }
        ExprKind::ListComp {
            targets, iterables, ..
        } => {
            if targets.len() != iterables.len() {
                return Err(Error::ArityMismatch {
                    site: expr.id,
                    expected: targets.len(),
                    actual: iterables.len(),
                });
            }
            for target in targets {
                check_binding(target, expr.id)?;
            }
        }
        _ => {}
    }
    for child in expr.children() {
        check_expr(child)?;
    }
    Ok(())
}
