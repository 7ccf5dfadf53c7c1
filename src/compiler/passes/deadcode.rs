//! Dead code elimination pass.
//!
//! Removes code that cannot affect the result of a function:
//!
//! - **Dead assignments**: pure assignments none of whose definitions is live
//! - **Unreachable statements**: statements following a `return` (or another statement control
//!   never leaves) in the same block
//! - **Empty branches**: `if` statements whose arms are only `pass` and whose condition is pure
//! - **Redundant `pass`**: `pass` in a block that has other statements
//! - **Unused free variables**: free variables no longer referenced by the body
//!
//! # Liveness
//!
//! Liveness is a mark-sweep over define-use chains. Statements other than plain assignments
//! (returns, assertions, effects, indexed assignments and the headers of compound statements)
//! are roots, as are assignments with an impure right-hand side. Every definition a root reads
//! is live; an assignment defining a live definition makes everything it reads live; both
//! operands of a live φ are live.
//!
//! The pass repeats until an iteration removes nothing, since removing one assignment can make
//! the assignments it read dead.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::{
    analysis::{
        stmt_table, DefId, DefSite, DefineUse, DefineUseAnalysis, Definition, Purity,
        Reachability, ReachabilityAnalysis,
    },
    ast::{
        fold,
        names::{called_names, referenced_names},
        Block, Fold, FuncDef, NodeId, Stmt, StmtKind, Symbol,
    },
    compiler::{pass::finish, CompilerContext, EventKind, EventLog, Pass},
    Result,
};

/// Dead code elimination pass.
pub struct DeadCodeEliminate;

impl Default for DeadCodeEliminate {
    fn default() -> Self {
        Self::new()
    }
}

impl DeadCodeEliminate {
    /// Creates a new dead code elimination pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Computes the live definitions of a function.
    fn mark(func: &FuncDef, du: &DefineUseAnalysis) -> HashSet<DefId> {
        let mut reads: HashMap<NodeId, Vec<DefId>> = HashMap::new();
        for (def, sites) in du.iter() {
            for site in sites {
                reads.entry(site.stmt).or_default().push(def);
            }
        }

        let mut worklist: Vec<DefId> = Vec::new();
        for (id, stmt) in stmt_table(&func.body) {
            let root = match &stmt.kind {
                StmtKind::Assign { expr, .. } => !Purity::is_pure_expr(expr),
                _ => true,
            };
            if root {
                worklist.extend(reads.get(&id).into_iter().flatten().copied());
            }
        }

        let mut live = HashSet::new();
        while let Some(def) = worklist.pop() {
            if !live.insert(def) {
                continue;
            }
            match du.reach().def(def) {
                Some(Definition::Phi(phi)) => worklist.extend([phi.lhs, phi.rhs]),
                Some(Definition::Assign(assign)) => {
                    if let DefSite::Stmt(site) = assign.site {
                        worklist.extend(reads.get(&site).into_iter().flatten().copied());
                    }
                }
                None => {}
            }
        }
        live
    }

    /// Assignments to delete: pure, and defining nothing live.
    fn sweep(func: &FuncDef, du: &DefineUseAnalysis, live: &HashSet<DefId>) -> HashSet<NodeId> {
        stmt_table(&func.body)
            .into_iter()
            .filter(|(id, stmt)| match &stmt.kind {
                StmtKind::Assign { expr, .. } => {
                    Purity::is_pure_expr(expr)
                        && du.reach().defs_at(*id).iter().all(|def| !live.contains(def))
                }
                _ => false,
            })
            .map(|(id, _)| id)
            .collect()
    }

    /// Drops free variables the body no longer mentions, with their captured host values.
    fn prune_free_vars(func: &mut FuncDef, changes: &EventLog, pass: &'static str) {
        let mut used = referenced_names(&func.body);
        used.extend(called_names(&func.body));
        let unused: Vec<_> = func
            .free_vars
            .iter()
            .filter(|name| !used.contains(*name))
            .cloned()
            .collect();
        for name in unused {
            func.free_vars.remove(&name);
            changes
                .record(EventKind::FreeVarPruned)
                .function(&func.name)
                .pass(pass)
                .message(format!("`{name}`"));
        }
        let bases: BTreeSet<Symbol> = func
            .free_vars
            .iter()
            .map(|name| name.base_symbol().clone())
            .collect();
        let stale: Vec<Symbol> = func
            .env
            .keys()
            .filter(|key| !bases.contains(*key))
            .cloned()
            .collect();
        for key in stale {
            func.env.remove(&key);
        }
    }
}

impl Pass for DeadCodeEliminate {
    fn name(&self) -> &'static str {
        "dead-code-eliminate"
    }

    fn description(&self) -> &'static str {
        "Removes dead assignments, unreachable statements and unused free variables"
    }

    fn run_on_function(&self, func: &FuncDef, ctx: &CompilerContext) -> Result<(FuncDef, bool)> {
        let changes = EventLog::new();
        let mut current = func.clone();
        // Each productive iteration removes at least one statement.
        let limit = stmt_table(&current.body).len() + 1;
        for _ in 0..limit {
            let before = changes.len();
            let reach = Reachability::analyze(&current);
            let du = DefineUse::analyze(&current)?;
            let live = Self::mark(&current, &du);
            let dead = Self::sweep(&current, &du, &live);
            let name = current.name.clone();
            current = Sweeper {
                dead: &dead,
                reach: &reach,
                func: &name,
                changes: &changes,
                pass: self.name(),
            }
            .fold_func(current)?;
            if changes.len() == before {
                break;
            }
        }
        Self::prune_free_vars(&mut current, &changes, self.name());
        finish(self.name(), current, changes, ctx)
    }
}

struct Sweeper<'a> {
    dead: &'a HashSet<NodeId>,
    reach: &'a ReachabilityAnalysis,
    func: &'a Symbol,
    changes: &'a EventLog,
    pass: &'static str,
}

impl Sweeper<'_> {
    fn removed(&self, kind: EventKind, stmt: &Stmt, why: &str) {
        self.changes
            .record(kind)
            .at(self.func, stmt.id)
            .pass(self.pass)
            .message(format!("{why}: {}", stmt.to_string().trim_end()));
    }

    fn is_empty_arm(block: &Block) -> bool {
        block
            .stmts
            .iter()
            .all(|stmt| matches!(stmt.kind, StmtKind::Pass))
    }
}

impl Fold for Sweeper<'_> {
    fn fold_block(&mut self, block: Block) -> Result<Block> {
        // A block whose first statement is unreachable is a dead arm; its contents stay so the
        // scope structure is unchanged, and the assignments in it die like any other.
        let entered = block
            .stmts
            .first()
            .is_some_and(|stmt| self.reach.is_reachable(stmt.id));
        let mut stmts = Vec::with_capacity(block.stmts.len());
        for stmt in block.stmts {
            if entered && !self.reach.is_reachable(stmt.id) {
                self.removed(EventKind::StatementRemoved, &stmt, "unreachable");
                continue;
            }
            stmts.extend(self.fold_stmt(stmt)?);
        }

        if stmts.iter().any(|stmt| !matches!(stmt.kind, StmtKind::Pass)) {
            let (passes, rest): (Vec<Stmt>, Vec<Stmt>) = stmts
                .into_iter()
                .partition(|stmt| matches!(stmt.kind, StmtKind::Pass));
            for stmt in &passes {
                self.removed(EventKind::StatementRemoved, stmt, "redundant");
            }
            stmts = rest;
        } else if stmts.len() > 1 {
            for stmt in stmts.drain(1..) {
                self.removed(EventKind::StatementRemoved, &stmt, "redundant");
            }
        }
        if stmts.is_empty() {
            stmts.push(Stmt::pass());
        }
        Ok(Block {
            id: block.id,
            stmts,
        })
    }

    fn fold_stmt(&mut self, stmt: Stmt) -> Result<Vec<Stmt>> {
        if self.dead.contains(&stmt.id) {
            self.removed(EventKind::AssignmentRemoved, &stmt, "dead");
            return Ok(Vec::new());
        }
        let stmt = fold::fold_stmt(self, stmt)?;
        let empty = match &stmt.kind {
            StmtKind::If1 { cond, body } => {
                Self::is_empty_arm(body) && Purity::is_pure_expr(cond)
            }
            StmtKind::If { cond, ift, iff } => {
                Self::is_empty_arm(ift) && Self::is_empty_arm(iff) && Purity::is_pure_expr(cond)
            }
            _ => false,
        };
        if empty {
            self.removed(EventKind::StatementRemoved, &stmt, "empty branch");
            return Ok(Vec::new());
        }
        Ok(vec![stmt])
    }
}
