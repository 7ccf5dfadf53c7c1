//! Statement reachability.
//!
//! A reducing traversal that computes, for every statement, whether some execution can reach
//! it, and for every block whether control can fall off its end. A statement after a `return`
//! (or after a loop that can never exit) is unreachable.
//!
//! Literal conditions are honored: the arm of `if False:` is unreachable, `while True:` never
//! falls through (FPy has no `break`), and `assert False` ends the path. Both arms of a
//! two-armed `if` are visited exactly once.

use std::collections::HashMap;

use crate::ast::{Block, Expr, ExprKind, FuncDef, NodeId, Stmt, StmtKind};

/// Entry point of the reachability analysis.
pub struct Reachability;

impl Reachability {
    /// Computes reachability for every statement of `func`. Never fails.
    #[must_use]
    pub fn analyze(func: &FuncDef) -> ReachabilityAnalysis {
        let mut analysis = ReachabilityAnalysis {
            stmts: HashMap::new(),
            blocks: HashMap::new(),
            order: Vec::new(),
            falls_through: false,
        };
        analysis.falls_through = analysis.visit_block(&func.body, true);
        analysis
    }
}

fn literal(expr: &Expr) -> Option<bool> {
    match expr.kind {
        ExprKind::Bool(value) => Some(value),
        _ => None,
    }
}

/// The result of [`Reachability`].
#[derive(Debug, Clone)]
pub struct ReachabilityAnalysis {
    stmts: HashMap<NodeId, bool>,
    blocks: HashMap<NodeId, bool>,
    order: Vec<NodeId>,
    falls_through: bool,
}

impl ReachabilityAnalysis {
    /// Visits a block entered with the given reachability and returns whether control falls
    /// off its end.
    fn visit_block(&mut self, block: &Block, reachable: bool) -> bool {
        let mut live = reachable;
        for stmt in &block.stmts {
            live = self.visit_stmt(stmt, live);
        }
        self.blocks.insert(block.id, live);
        live
    }

    fn visit_stmt(&mut self, stmt: &Stmt, reachable: bool) -> bool {
        self.stmts.insert(stmt.id, reachable);
        self.order.push(stmt.id);
        match &stmt.kind {
            StmtKind::Return(_) => false,
            StmtKind::Assert { test, .. } => reachable && literal(test) != Some(false),
            StmtKind::If1 { cond, body } => {
                let taken = self.visit_block(body, reachable && literal(cond) != Some(false));
                match literal(cond) {
                    Some(true) => taken,
                    _ => reachable,
                }
            }
            StmtKind::If { cond, ift, iff } => {
                let cond = literal(cond);
                let ift = self.visit_block(ift, reachable && cond != Some(false));
                let iff = self.visit_block(iff, reachable && cond != Some(true));
                ift || iff
            }
            StmtKind::While { cond, body } => {
                let cond = literal(cond);
                self.visit_block(body, reachable && cond != Some(false));
                reachable && cond != Some(true)
            }
            StmtKind::For { body, .. } => {
                self.visit_block(body, reachable);
                reachable
            }
            StmtKind::Context { body, .. } => self.visit_block(body, reachable),
            StmtKind::Assign { .. }
            | StmtKind::IndexedAssign { .. }
            | StmtKind::Effect(_)
            | StmtKind::Pass => reachable,
        }
    }

    /// Returns `true` if some execution reaches the statement. Unknown ids are unreachable.
    #[must_use]
    pub fn is_reachable(&self, stmt: NodeId) -> bool {
        self.stmts.get(&stmt).copied().unwrap_or(false)
    }

    /// Returns `true` if control can fall off the end of the block.
    #[must_use]
    pub fn block_falls_through(&self, block: NodeId) -> bool {
        self.blocks.get(&block).copied().unwrap_or(false)
    }

    /// Returns `true` if some path reaches the end of the function body without returning.
    #[must_use]
    pub const fn falls_through(&self) -> bool {
        self.falls_through
    }

    /// Unreachable statements in document order.
    pub fn unreachable(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.order
            .iter()
            .copied()
            .filter(|id| !self.is_reachable(*id))
    }
}
