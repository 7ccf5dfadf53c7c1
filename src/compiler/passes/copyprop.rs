//! Copy propagation pass.
//!
//! This pass eliminates copies `x = y` by replacing uses of `x` with `y`, then deleting the
//! copy once nothing reads it anymore.
//!
//! # Example
//!
//! Before:
//! ```text
//! a = x
//! b = a + 1
//! return b
//! ```
//!
//! After:
//! ```text
//! b = x + 1
//! return b
//! ```
//!
//! # Algorithm
//!
//! The pass iterates to a fixed point:
//!
//! 1. Run define-use and collect every unannotated assignment whose target is a single name
//!    and whose right-hand side is a variable.
//! 2. Resolve copy chains to their ultimate source (`c = b; b = a` maps `c` to `a`).
//! 3. Rewrite a use of a copy only if the very definition of the source that the copy read
//!    also reaches the use. A source reassigned in between, or shadowed by a comprehension
//!    target, blocks the rewrite.
//! 4. Remove a copy when every use was rewritten, no rewrite points at it and it does not feed
//!    a φ.

use std::collections::{HashMap, HashSet};

use crate::{
    analysis::{stmt_table, DefId, DefineUse, DefineUseAnalysis, UseKind},
    ast::{
        fold, Binding, Block, Expr, ExprKind, Fold, FuncDef, Id, NamedId, NodeId, Stmt, StmtKind,
    },
    compiler::{pass::finish, CompilerContext, EventKind, EventLog, Pass},
    Result,
};

/// Maximum iterations for the fixed-point algorithm to prevent infinite loops.
const MAX_ITERATIONS: usize = 64;

/// Longest copy chain followed when resolving a source.
const MAX_CHAIN: usize = 64;

/// Copy propagation pass.
pub struct CopyPropagate;

impl Default for CopyPropagate {
    fn default() -> Self {
        Self::new()
    }
}

/// A copy `target = source`.
#[derive(Debug, Clone)]
struct CopyDef {
    stmt: NodeId,
    target: NamedId,
    source: NamedId,
    /// Definition of the source the copy reads
    source_def: DefId,
}

#[derive(Debug, Default)]
struct Plan {
    rewrites: HashMap<NodeId, NamedId>,
    removals: HashSet<NodeId>,
}

impl Plan {
    fn is_empty(&self) -> bool {
        self.rewrites.is_empty() && self.removals.is_empty()
    }
}

impl CopyPropagate {
    /// Creates a new copy propagation pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Collects the copies of a function, keyed by the definition they create.
    fn collect_copies(func: &FuncDef, du: &DefineUseAnalysis) -> HashMap<DefId, CopyDef> {
        let reach = du.reach();
        let mut copies = HashMap::new();
        for (id, stmt) in stmt_table(&func.body) {
            let StmtKind::Assign {
                target: Binding::Id(Id::Named(target)),
                ann: None,
                expr,
            } = &stmt.kind
            else {
                continue;
            };
            let Some(source) = expr.as_var() else {
                continue;
            };
            if source == target {
                continue;
            }
            let (Some(def), Some(source_def)) =
                (reach.def_at(id, target), reach.reaching(id, source))
            else {
                continue;
            };
            copies.insert(
                def,
                CopyDef {
                    stmt: id,
                    target: target.clone(),
                    source: source.clone(),
                    source_def,
                },
            );
        }
        copies
    }

    /// Candidate sources for uses of `copy`, ultimate source first.
    fn sources<'c>(
        copy: &'c CopyDef,
        copies: &'c HashMap<DefId, CopyDef>,
    ) -> Vec<(&'c NamedId, DefId)> {
        let mut chain = vec![(&copy.source, copy.source_def)];
        let mut current = copy;
        for _ in 0..MAX_CHAIN {
            let Some(next) = copies.get(&current.source_def) else {
                break;
            };
            if chain.iter().any(|(_, def)| *def == next.source_def) {
                break;
            }
            chain.push((&next.source, next.source_def));
            current = next;
        }
        chain.reverse();
        chain
    }

    fn plan(
        func: &FuncDef,
        du: &DefineUseAnalysis,
        changes: &EventLog,
        pass: &'static str,
    ) -> Plan {
        let copies = Self::collect_copies(func, du);
        let mut plan = Plan::default();
        let mut targeted: HashSet<DefId> = HashSet::new();
        let mut complete: Vec<(DefId, &CopyDef)> = Vec::new();

        let mut ordered: Vec<(&DefId, &CopyDef)> = copies.iter().collect();
        ordered.sort_by_key(|(def, _)| **def);

        for (&def, copy) in ordered {
            let sources = Self::sources(copy, &copies);
            let mut all_rewritten = true;
            for site in du.uses_of(def) {
                if site.kind != UseKind::Var {
                    all_rewritten = false;
                    continue;
                }
                let env = du.env_at_use(site.node);
                let valid = sources.iter().find(|(name, source_def)| {
                    env.and_then(|env| env.get(*name)) == Some(source_def)
                });
                match valid {
                    Some((name, source_def)) => {
                        changes
                            .record(EventKind::CopyPropagated)
                            .at(&func.name, site.node)
                            .pass(pass)
                            .message(format!("`{}` -> `{}`", copy.target, name));
                        plan.rewrites.insert(site.node, (*name).clone());
                        targeted.insert(*source_def);
                    }
                    None => all_rewritten = false,
                }
            }
            if all_rewritten && !du.reach().is_phi_source(def) {
                complete.push((def, copy));
            }
        }

        for (def, copy) in complete {
            if targeted.contains(&def) {
                continue;
            }
            changes
                .record(EventKind::AssignmentRemoved)
                .at(&func.name, copy.stmt)
                .pass(pass)
                .message(format!("copy `{} = {}`", copy.target, copy.source));
            plan.removals.insert(copy.stmt);
        }
        plan
    }
}

impl Pass for CopyPropagate {
    fn name(&self) -> &'static str {
        "copy-propagate"
    }

    fn description(&self) -> &'static str {
        "Replaces uses of copies with their sources and removes dead copies"
    }

    fn run_on_function(&self, func: &FuncDef, ctx: &CompilerContext) -> Result<(FuncDef, bool)> {
        let changes = EventLog::new();
        let mut current = func.clone();
        for _ in 0..MAX_ITERATIONS {
            let du = DefineUse::analyze(&current)?;
            let plan = Self::plan(&current, &du, &changes, self.name());
            if plan.is_empty() {
                break;
            }
            current = Rewriter { plan: &plan }.fold_func(current)?;
        }
        finish(self.name(), current, changes, ctx)
    }
}

struct Rewriter<'a> {
    plan: &'a Plan,
}

impl Fold for Rewriter<'_> {
    fn fold_block(&mut self, block: Block) -> Result<Block> {
        let mut block = fold::fold_block(self, block)?;
        if block.stmts.is_empty() {
            block.stmts.push(Stmt::pass());
        }
        Ok(block)
    }

    fn fold_stmt(&mut self, stmt: Stmt) -> Result<Vec<Stmt>> {
        if self.plan.removals.contains(&stmt.id) {
            return Ok(Vec::new());
        }
        Ok(vec![fold::fold_stmt(self, stmt)?])
    }

    fn fold_expr(&mut self, expr: Expr) -> Result<Expr> {
        if let Some(name) = self.plan.rewrites.get(&expr.id) {
            if matches!(expr.kind, ExprKind::Var(_)) {
                return Ok(Expr {
                    kind: ExprKind::Var(name.clone()),
                    ..expr
                });
            }
        }
        fold::fold_expr(self, expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::CompareOp,
        test::helpers::{func, name, scenario_copy},
    };

    #[test]
    fn test_copy_is_propagated_and_removed() {
        let ctx = CompilerContext::new();
        let (out, changed) = CopyPropagate::new()
            .run_on_function(&scenario_copy(), &ctx)
            .unwrap();
        assert!(changed);
        assert_eq!(out.body.len(), 2);
        let expected = func(
            &["x"],
            vec![
                Stmt::assign("b", Expr::add(Expr::var("x"), Expr::int(1))),
                Stmt::ret(Expr::var("b")),
            ],
        );
        assert!(out.is_equiv(&expected));
        assert_eq!(ctx.events.count(EventKind::CopyPropagated), 1);
        assert_eq!(ctx.events.count(EventKind::AssignmentRemoved), 1);
    }

    #[test]
    fn test_chains_resolve_to_ultimate_source() {
        let f = func(
            &["x"],
            vec![
                Stmt::assign("a", Expr::var("x")),
                Stmt::assign("b", Expr::var("a")),
                Stmt::ret(Expr::var("b")),
            ],
        );
        let out = CopyPropagate::new().apply(&f).unwrap();
        let expected = func(&["x"], vec![Stmt::ret(Expr::var("x"))]);
        assert!(out.is_equiv(&expected), "{out}");
    }

    #[test]
    fn test_reassigned_source_blocks_rewrite() {
        let f = func(
            &["x"],
            vec![
                Stmt::assign("a", Expr::var("x")),
                Stmt::assign("x", Expr::add(Expr::var("x"), Expr::int(1))),
                Stmt::ret(Expr::add(Expr::var("a"), Expr::var("x"))),
            ],
        );
        let out = CopyPropagate::new().apply(&f).unwrap();
        assert!(out.is_equiv(&f));
    }

    #[test]
    fn test_phi_source_is_kept() {
        let f = func(
            &["x", "c"],
            vec![
                Stmt::assign("a", Expr::int(0)),
                Stmt::if1(
                    Expr::compare(CompareOp::Gt, Expr::var("c"), Expr::int(0)),
                    vec![Stmt::assign("a", Expr::var("x"))],
                ),
                Stmt::ret(Expr::var("a")),
            ],
        );
        let out = CopyPropagate::new().apply(&f).unwrap();
        assert!(out.is_equiv(&f));
        assert!(crate::ast::names::assigned_names(&out.body).contains(&name("a")));
    }
}
