//! If simplification pass.
//!
//! Turns `if` statements into straight-line code by evaluating both arms unconditionally and
//! selecting the results with conditional expressions. Every name an arm assigns is renamed to
//! a fresh name, so the speculated arms never clobber the values the other arm or the code
//! after the `if` expects; a merge `v = v_t if c else v_f` after the arms restores the name.
//!
//! # Example
//!
//! Before:
//! ```text
//! if x > 0:
//!     y = x + 1
//! else:
//!     y = 0
//! return y
//! ```
//!
//! After:
//! ```text
//! t_0 = x > 0
//! y_0 = x + 1
//! y_1 = 0
//! y = y_0 if t_0 else y_1
//! return y
//! ```
//!
//! An arm is simplified only if it consists of assignments of pure expressions (and `pass`);
//! returns, assertions, effects, indexed assignments and impure calls keep their `if`. Nested
//! `if` statements are simplified first, so an arm holding a simplifiable `if` qualifies too.
//!
//! Which names are merged follows the scoping rules: after a one-armed `if` only names defined
//! before it survive, after a two-armed `if` also names both arms define.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    analysis::{Purity, ReachingDefs, ReachingDefsAnalysis},
    ast::{
        fold,
        names::{assigned_names, rename_binding, rename_expr},
        Block, Expr, Fold, FuncDef, Gensym, Loc, NamedId, NodeId, Stmt, StmtKind, Symbol,
    },
    compiler::{pass::finish, CompilerContext, EventKind, EventLog, Pass},
    Result,
};

/// If simplification pass.
pub struct SimplifyIf;

impl Default for SimplifyIf {
    fn default() -> Self {
        Self::new()
    }
}

impl SimplifyIf {
    /// Creates a new if simplification pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Pass for SimplifyIf {
    fn name(&self) -> &'static str {
        "simplify-if"
    }

    fn description(&self) -> &'static str {
        "Speculates both arms of an if and merges the results with conditional expressions"
    }

    fn run_on_function(&self, func: &FuncDef, ctx: &CompilerContext) -> Result<(FuncDef, bool)> {
        let reach = ReachingDefs::analyze(func)?;
        let changes = EventLog::new();
        let mut simplifier = Simplifier {
            reach: &reach,
            gensym: Gensym::from_func(func),
            func: &func.name,
            changes: &changes,
            pass: self.name(),
        };
        let out = simplifier.fold_func(func.clone())?;
        finish(self.name(), out, changes, ctx)
    }
}

/// An arm after speculation: its renamed statements and the final name of every name it
/// assigns.
struct Speculated {
    stmts: Vec<Stmt>,
    names: BTreeMap<NamedId, NamedId>,
}

struct Simplifier<'a> {
    reach: &'a ReachingDefsAnalysis,
    gensym: Gensym,
    func: &'a Symbol,
    changes: &'a EventLog,
    pass: &'static str,
}

impl Simplifier<'_> {
    fn is_straight_line(block: &Block) -> bool {
        block.stmts.iter().all(|stmt| match &stmt.kind {
            StmtKind::Assign { expr, .. } => Purity::is_pure_expr(expr),
            StmtKind::Pass => true,
            _ => false,
        })
    }

    fn speculate(&mut self, block: Block) -> Result<Speculated> {
        let mut names = BTreeMap::new();
        let mut stmts = Vec::with_capacity(block.stmts.len());
        for stmt in block.stmts {
            let StmtKind::Assign { target, ann, expr } = stmt.kind else {
                continue;
            };
            let expr = rename_expr(expr, &names)?;
            for name in target.names() {
                let fresh = self.gensym.refresh(name);
                names.insert(name.clone(), fresh);
            }
            let target = rename_binding(&target, &names);
            stmts.push(Stmt {
                id: stmt.id,
                kind: StmtKind::Assign { target, ann, expr },
                loc: stmt.loc,
            });
        }
        Ok(Speculated { stmts, names })
    }

    /// Flattens an `if` with one arm (`iff` is `None`) or two.
    fn flatten(
        &mut self,
        site: NodeId,
        loc: Option<Loc>,
        cond: Expr,
        ift: Block,
        iff: Option<Block>,
    ) -> Result<Vec<Stmt>> {
        let mut assigned = assigned_names(&ift);
        if let Some(iff) = &iff {
            assigned.extend(assigned_names(iff));
        }

        let mut out = Vec::new();
        let test = match cond.as_var() {
            Some(var) if !assigned.contains(var) => var.clone(),
            _ => {
                let temp = self.gensym.fresh("t");
                out.push(Stmt::assign(temp.clone(), cond));
                temp
            }
        };

        let ift = self.speculate(ift)?;
        let iff = match iff {
            Some(iff) => Some(self.speculate(iff)?),
            None => None,
        };
        out.extend(ift.stmts);

        let before: BTreeSet<&NamedId> = self
            .reach
            .in_env(site)
            .map(|env| env.keys().collect())
            .unwrap_or_default();
        let mut merges = Vec::new();
        for name in &assigned {
            let taken = ift.names.get(name);
            let other = iff.as_ref().and_then(|iff| iff.names.get(name));
            let defined = before.contains(name);
            let (taken, other) = match (taken, other) {
                (Some(t), Some(f)) => (t, f),
                (Some(t), None) if defined => (t, name),
                (None, Some(f)) if defined => (name, f),
                _ => continue,
            };
            merges.push(Stmt::assign(
                name.clone(),
                Expr::if_expr(
                    Expr::var(test.clone()),
                    Expr::var(taken.clone()),
                    Expr::var(other.clone()),
                ),
            ));
        }
        if let Some(iff) = iff {
            out.extend(iff.stmts);
        }
        out.extend(merges);

        if let Some(first) = out.first_mut() {
            if first.loc.is_none() {
                first.loc = loc;
            }
        }
        if out.is_empty() {
            out.push(Stmt::pass());
        }

        self.changes
            .record(EventKind::IfSimplified)
            .at(self.func, site)
            .pass(self.pass)
            .message(format!("{} names merged", assigned.len()));
        Ok(out)
    }
}

impl Fold for Simplifier<'_> {
    fn fold_stmt(&mut self, stmt: Stmt) -> Result<Vec<Stmt>> {
        let stmt = fold::fold_stmt(self, stmt)?;
        match stmt.kind {
            StmtKind::If1 { cond, body } if Self::is_straight_line(&body) => {
                self.flatten(stmt.id, stmt.loc, cond, body, None)
            }
            StmtKind::If { cond, ift, iff }
                if Self::is_straight_line(&ift) && Self::is_straight_line(&iff) =>
            {
                self.flatten(stmt.id, stmt.loc, cond, ift, Some(iff))
            }
            kind => Ok(vec![Stmt { kind, ..stmt }]),
        }
    }
}
