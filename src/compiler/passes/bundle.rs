//! Variable bundling pass.
//!
//! Rewrites loops and `if` statements that merge more than one name so that exactly one name,
//! a tuple, flows across the join. This is the form backends that support a single
//! loop-carried value expect.
//!
//! # Loops
//!
//! Before:
//! ```text
//! while x < 10:
//!     x = x + 1
//!     y = y * 2
//! ```
//!
//! After:
//! ```text
//! b_0 = (x, y)
//! while b_0[0] < 10:
//!     (x_0, y_0) = b_0
//!     x_0 = x_0 + 1
//!     y_0 = y_0 * 2
//!     b_0 = (x_0, y_0)
//! (x, y) = b_0
//! ```
//!
//! The names carried by the loop are renamed inside the body, so the bundle is the only name
//! the body reassigns from before the loop; the condition reads the bundle's elements. `for`
//! loops are handled the same way, except those whose target rebinds a name defined before
//! the loop, which stay as they are.
//!
//! # Branches
//!
//! Each arm assigns renamed copies of the merged names and ends by packing them into the
//! bundle; the names are unpacked once after the `if`. A one-armed `if` packs the incoming
//! values before the branch.

use std::collections::{BTreeMap, BTreeSet};

use bitflags::bitflags;

use crate::{
    analysis::{ReachingDefs, ReachingDefsAnalysis},
    ast::{
        fold,
        names::{assigned_names, rename_block},
        Binding, Block, Expr, ExprKind, Fold, FuncDef, Gensym, NamedId, NodeId, Stmt, StmtKind,
        Symbol,
    },
    compiler::{pass::finish, CompilerContext, EventKind, EventLog, Pass},
    Result,
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Statements the bundling pass rewrites
    pub struct BundleTargets : u8 {
        /// `while` loops
        const WHILE = 0x01;
        /// `for` loops
        const FOR = 0x02;
        /// One- and two-armed `if` statements
        const IF = 0x04;
    }
}

/// Variable bundling pass.
pub struct Bundle {
    targets: BundleTargets,
}

impl Default for Bundle {
    fn default() -> Self {
        Self::new()
    }
}

impl Bundle {
    /// Creates a pass bundling loops and branches.
    #[must_use]
    pub fn new() -> Self {
        Self {
            targets: BundleTargets::all(),
        }
    }

    /// Restricts the statements the pass rewrites.
    #[must_use]
    pub fn with_targets(targets: BundleTargets) -> Self {
        Self { targets }
    }
}

impl Pass for Bundle {
    fn name(&self) -> &'static str {
        "bundle"
    }

    fn description(&self) -> &'static str {
        "Packs the names merged by a loop or branch into a single tuple"
    }

    fn run_on_function(&self, func: &FuncDef, ctx: &CompilerContext) -> Result<(FuncDef, bool)> {
        let reach = ReachingDefs::analyze(func)?;
        let changes = EventLog::new();
        let mut bundler = Bundler {
            targets: self.targets,
            reach: &reach,
            gensym: Gensym::from_func(func),
            func: &func.name,
            changes: &changes,
            pass: self.name(),
        };
        let out = bundler.fold_func(func.clone())?;
        finish(self.name(), out, changes, ctx)
    }
}

fn pack(bundle: &NamedId, names: &[NamedId]) -> Stmt {
    Stmt::assign(
        bundle.clone(),
        Expr::tuple(names.iter().cloned().map(Expr::var).collect()),
    )
}

fn unpack(names: &[NamedId], bundle: &NamedId) -> Stmt {
    Stmt::assign(
        Binding::tuple(names.iter().cloned().map(Binding::named).collect()),
        Expr::var(bundle.clone()),
    )
}

/// Names a body reassigns that are defined before it.
fn carried(body: &Block, before: &BTreeSet<NamedId>) -> Vec<NamedId> {
    assigned_names(body).intersection(before).cloned().collect()
}

/// Replaces reads of bundled names by elements of the bundle.
struct Project<'a> {
    bundle: &'a NamedId,
    index: BTreeMap<NamedId, usize>,
}

impl Fold for Project<'_> {
    fn fold_expr(&mut self, expr: Expr) -> Result<Expr> {
        if let ExprKind::Var(name) = &expr.kind {
            if let Some(&i) = self.index.get(name) {
                return Ok(Expr::list_ref(Expr::var(self.bundle.clone()), Expr::int(i)));
            }
        }
        fold::fold_expr(self, expr)
    }
}

struct Bundler<'a> {
    targets: BundleTargets,
    reach: &'a ReachingDefsAnalysis,
    gensym: Gensym,
    func: &'a Symbol,
    changes: &'a EventLog,
    pass: &'static str,
}

impl Bundler<'_> {
    fn defined_before(&self, site: NodeId) -> BTreeSet<NamedId> {
        self.reach
            .in_env(site)
            .map(|env| env.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Renames `names` inside `body`, returning the renamed names in the same order.
    fn rename_arm(&mut self, names: &[NamedId], body: Block) -> Result<(Vec<NamedId>, Block)> {
        let assigned = assigned_names(&body);
        let mut map = BTreeMap::new();
        for name in names.iter().filter(|name| assigned.contains(*name)) {
            map.insert(name.clone(), self.gensym.refresh(name));
        }
        let renamed = names
            .iter()
            .map(|name| map.get(name).cloned().unwrap_or_else(|| name.clone()))
            .collect();
        Ok((renamed, rename_block(body, &map)?))
    }

    /// Wraps a renamed loop body in the unpack / repack pair.
    fn loop_body(bundle: &NamedId, inner: &[NamedId], body: Block) -> Block {
        let mut stmts = Vec::with_capacity(body.stmts.len() + 2);
        stmts.push(unpack(inner, bundle));
        stmts.extend(body.stmts);
        stmts.push(pack(bundle, inner));
        Block { id: body.id, stmts }
    }

    fn record(&self, site: NodeId, names: &[NamedId], bundle: &NamedId) {
        let list: Vec<String> = names.iter().map(ToString::to_string).collect();
        self.changes
            .record(EventKind::VariablesBundled)
            .at(self.func, site)
            .pass(self.pass)
            .message(format!("({}) into `{bundle}`", list.join(", ")));
    }

    fn bundle(&mut self, stmt: Stmt) -> Result<Vec<Stmt>> {
        let before = self.defined_before(stmt.id);
        match stmt.kind {
            StmtKind::While { cond, body } if self.targets.contains(BundleTargets::WHILE) => {
                let names = carried(&body, &before);
                if names.len() < 2 {
                    return Ok(vec![Stmt {
                        kind: StmtKind::While { cond, body },
                        ..stmt
                    }]);
                }
                let bundle = self.gensym.fresh("b");
                let (inner, body) = self.rename_arm(&names, body)?;
                let mut project = Project {
                    bundle: &bundle,
                    index: names.iter().cloned().enumerate().map(|(i, n)| (n, i)).collect(),
                };
                let cond = project.fold_expr(cond)?;
                let body = Self::loop_body(&bundle, &inner, body);
                self.record(stmt.id, &names, &bundle);
                Ok(vec![
                    pack(&bundle, &names),
                    Stmt {
                        kind: StmtKind::While { cond, body },
                        ..stmt
                    },
                    unpack(&names, &bundle),
                ])
            }
            StmtKind::For {
                target,
                iterable,
                body,
            } if self.targets.contains(BundleTargets::FOR)
                && !target.names().into_iter().any(|name| before.contains(name)) =>
            {
                let names = carried(&body, &before);
                if names.len() < 2 {
                    return Ok(vec![Stmt {
                        kind: StmtKind::For {
                            target,
                            iterable,
                            body,
                        },
                        ..stmt
                    }]);
                }
                let bundle = self.gensym.fresh("b");
                let (inner, body) = self.rename_arm(&names, body)?;
                let body = Self::loop_body(&bundle, &inner, body);
                self.record(stmt.id, &names, &bundle);
                Ok(vec![
                    pack(&bundle, &names),
                    Stmt {
                        kind: StmtKind::For {
                            target,
                            iterable,
                            body,
                        },
                        ..stmt
                    },
                    unpack(&names, &bundle),
                ])
            }
            StmtKind::If1 { cond, body } if self.targets.contains(BundleTargets::IF) => {
                let names = carried(&body, &before);
                if names.len() < 2 {
                    return Ok(vec![Stmt {
                        kind: StmtKind::If1 { cond, body },
                        ..stmt
                    }]);
                }
                let bundle = self.gensym.fresh("b");
                let (inner, mut body) = self.rename_arm(&names, body)?;
                body.stmts.push(pack(&bundle, &inner));
                self.record(stmt.id, &names, &bundle);
                Ok(vec![
                    pack(&bundle, &names),
                    Stmt {
                        kind: StmtKind::If1 { cond, body },
                        ..stmt
                    },
                    unpack(&names, &bundle),
                ])
            }
            StmtKind::If { cond, ift, iff } if self.targets.contains(BundleTargets::IF) => {
                let in_ift = assigned_names(&ift);
                let in_iff = assigned_names(&iff);
                let names: Vec<NamedId> = in_ift
                    .union(&in_iff)
                    .filter(|name| {
                        before.contains(*name) || (in_ift.contains(*name) && in_iff.contains(*name))
                    })
                    .cloned()
                    .collect();
                if names.len() < 2 {
                    return Ok(vec![Stmt {
                        kind: StmtKind::If { cond, ift, iff },
                        ..stmt
                    }]);
                }
                let bundle = self.gensym.fresh("b");
                let (ift_names, mut ift) = self.rename_arm(&names, ift)?;
                let (iff_names, mut iff) = self.rename_arm(&names, iff)?;
                ift.stmts.push(pack(&bundle, &ift_names));
                iff.stmts.push(pack(&bundle, &iff_names));
                self.record(stmt.id, &names, &bundle);
                Ok(vec![
                    Stmt {
                        kind: StmtKind::If { cond, ift, iff },
                        ..stmt
                    },
                    unpack(&names, &bundle),
                ])
            }
            kind => Ok(vec![Stmt { kind, ..stmt }]),
        }
    }
}

impl Fold for Bundler<'_> {
    fn fold_stmt(&mut self, stmt: Stmt) -> Result<Vec<Stmt>> {
        let stmt = fold::fold_stmt(self, stmt)?;
        self.bundle(stmt)
    }
}
