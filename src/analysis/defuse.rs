//! Define-use chains.
//!
//! [`DefineUse`] walks the function a second time and resolves every use site against the
//! environments recorded by [`ReachingDefs`]. Uses of φ-definitions need no special handling:
//! a φ index is an ordinary index.
//!
//! A use site is one of:
//!
//! - a variable reference (`Var` expression)
//! - the array of an indexed assignment (`x[i] = e` reads `x`)
//! - the name of a call, when that name is bound in the function (a parameter or free
//!   variable holding a function value); calls to names not in scope are resolved through the
//!   callee handle and are not uses
//!
//! # Example
//!
//! ```rust
//! use fpy_core::{analysis::DefineUse, ast::*};
//!
//! let func = FuncDef::new("f", vec![Argument::new("x")], Block::new(vec![
//!     Stmt::assign("y", Expr::add(Expr::var("x"), Expr::var("x"))),
//!     Stmt::ret(Expr::var("y")),
//! ]));
//! let du = DefineUse::analyze(&func)?;
//! let x = du.reach().entry_env().get(&NamedId::new("x")).copied().unwrap();
//! assert_eq!(du.uses_of(x).len(), 2);
//! # Ok::<(), fpy_core::Error>(())
//! ```

use std::collections::{BTreeSet, HashMap};

use crate::{
    analysis::{
        defs::{DefId, Env},
        reaching::{ReachingDefs, ReachingDefsAnalysis},
    },
    ast::{Block, Expr, ExprKind, FuncDef, NamedId, NodeId, Stmt, StmtKind},
    error::invariant_error,
    Result,
};

/// How a definition is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UseKind {
    /// Read through a variable reference
    Var,
    /// Array of an indexed assignment
    IndexedAssign,
    /// Name of a call
    Call,
}

/// A use of a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UseSite {
    /// The using node: the `Var` or `Call` expression, or the indexed-assignment statement
    pub node: NodeId,
    /// The statement containing the use
    pub stmt: NodeId,
    /// What kind of use this is
    pub kind: UseKind,
}

/// Entry point of the define-use analysis.
pub struct DefineUse;

impl DefineUse {
    /// Runs reaching definitions on `func` and resolves every use.
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`ReachingDefs::analyze`].
    pub fn analyze(func: &FuncDef) -> Result<DefineUseAnalysis> {
        let reach = ReachingDefs::analyze(func)?;
        Self::from_reaching(&func.body, reach)
    }

    /// Runs reaching definitions on a free-standing block and resolves every use.
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`ReachingDefs::analyze_block`].
    pub fn analyze_block(block: &Block, inputs: &[NamedId]) -> Result<DefineUseAnalysis> {
        let reach = ReachingDefs::analyze_block(block, inputs)?;
        Self::from_reaching(block, reach)
    }

    /// Resolves uses against an existing reaching-definitions result computed on `body`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvariantViolation`] if `reach` was computed on another tree.
    pub fn from_reaching(body: &Block, reach: ReachingDefsAnalysis) -> Result<DefineUseAnalysis> {
        let mut resolver = Resolver {
            reach: &reach,
            uses: vec![BTreeSet::new(); reach.len()],
            use_def: HashMap::new(),
            use_env: HashMap::new(),
        };
        resolver.visit_block(body)?;
        let Resolver {
            uses,
            use_def,
            use_env,
            ..
        } = resolver;
        Ok(DefineUseAnalysis {
            reach,
            uses,
            use_def,
            use_env,
        })
    }
}

struct Resolver<'a> {
    reach: &'a ReachingDefsAnalysis,
    uses: Vec<BTreeSet<UseSite>>,
    use_def: HashMap<NodeId, DefId>,
    use_env: HashMap<NodeId, Env>,
}

impl Resolver<'_> {
    fn record(&mut self, name: &NamedId, env: &Env, site: UseSite) -> Result<()> {
        let Some(&def) = env.get(name) else {
            return Err(invariant_error!(
                "no definition of `{}` reaches use {}",
                name,
                site.node
            ));
        };
        let Some(uses) = self.uses.get_mut(def.index()) else {
            return Err(invariant_error!("definition {} out of range", def));
        };
        uses.insert(site);
        self.use_def.insert(site.node, def);
        self.use_env.insert(site.node, env.clone());
        Ok(())
    }

    fn visit_block(&mut self, block: &Block) -> Result<()> {
        for stmt in &block.stmts {
            self.visit_stmt(stmt)?;
        }
        Ok(())
    }

    fn visit_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        let Some(env) = self.reach.in_env(stmt.id).cloned() else {
            return Err(invariant_error!("statement {} was not analyzed", stmt.id));
        };
        match &stmt.kind {
            StmtKind::Assign { expr, .. } | StmtKind::Effect(expr) | StmtKind::Return(expr) => {
                self.visit_expr(expr, &env, stmt.id)
            }
            StmtKind::IndexedAssign { var, indices, expr } => {
                for index in indices {
                    self.visit_expr(index, &env, stmt.id)?;
                }
                self.visit_expr(expr, &env, stmt.id)?;
                self.record(
                    var,
                    &env,
                    UseSite {
                        node: stmt.id,
                        stmt: stmt.id,
                        kind: UseKind::IndexedAssign,
                    },
                )
            }
            StmtKind::If1 { cond, body } => {
                self.visit_expr(cond, &env, stmt.id)?;
                self.visit_block(body)
            }
            StmtKind::If { cond, ift, iff } => {
                self.visit_expr(cond, &env, stmt.id)?;
                self.visit_block(ift)?;
                self.visit_block(iff)
            }
            StmtKind::While { cond, body } => {
                let Some(header) = self.reach.block_in_env(body.id).cloned() else {
                    return Err(invariant_error!("loop body {} was not analyzed", body.id));
                };
                self.visit_expr(cond, &header, stmt.id)?;
                self.visit_block(body)
            }
            StmtKind::For { iterable, body, .. } => {
                self.visit_expr(iterable, &env, stmt.id)?;
                self.visit_block(body)
            }
            StmtKind::Context { ctx, body, .. } => {
                self.visit_expr(ctx, &env, stmt.id)?;
                self.visit_block(body)
            }
            StmtKind::Assert { test, msg } => {
                self.visit_expr(test, &env, stmt.id)?;
                if let Some(msg) = msg {
                    self.visit_expr(msg, &env, stmt.id)?;
                }
                Ok(())
            }
            StmtKind::Pass => Ok(()),
        }
    }

    fn visit_expr(&mut self, expr: &Expr, env: &Env, stmt: NodeId) -> Result<()> {
        match &expr.kind {
            ExprKind::Var(name) => self.record(
                name,
                env,
                UseSite {
                    node: expr.id,
                    stmt,
                    kind: UseKind::Var,
                },
            ),
            ExprKind::ListComp {
                targets,
                iterables,
                elt,
            } => {
                for iterable in iterables {
                    self.visit_expr(iterable, env, stmt)?;
                }
                let mut local = env.clone();
                for target in targets {
                    for name in target.names() {
                        let Some(def) = self.reach.def_at(expr.id, name) else {
                            return Err(invariant_error!(
                                "comprehension {} does not define `{}`",
                                expr.id,
                                name
                            ));
                        };
                        local.insert(name.clone(), def);
                    }
                }
                self.visit_expr(elt, &local, stmt)
            }
            ExprKind::Call { func, .. } => {
                for child in expr.children() {
                    self.visit_expr(child, env, stmt)?;
                }
                if env.contains_key(func) {
                    self.record(
                        func,
                        env,
                        UseSite {
                            node: expr.id,
                            stmt,
                            kind: UseKind::Call,
                        },
                    )?;
                }
                Ok(())
            }
            _ => {
                for child in expr.children() {
                    self.visit_expr(child, env, stmt)?;
                }
                Ok(())
            }
        }
    }
}

/// The result of [`DefineUse`]: reaching definitions plus the uses of every definition.
#[derive(Debug, Clone)]
pub struct DefineUseAnalysis {
    reach: ReachingDefsAnalysis,
    uses: Vec<BTreeSet<UseSite>>,
    use_def: HashMap<NodeId, DefId>,
    use_env: HashMap<NodeId, Env>,
}

impl DefineUseAnalysis {
    /// The underlying reaching-definitions result.
    #[must_use]
    pub fn reach(&self) -> &ReachingDefsAnalysis {
        &self.reach
    }

    /// Uses of a definition. Uses by φ-definitions are not included.
    #[must_use]
    pub fn uses_of(&self, def: DefId) -> &BTreeSet<UseSite> {
        static EMPTY: BTreeSet<UseSite> = BTreeSet::new();
        self.uses.get(def.index()).unwrap_or(&EMPTY)
    }

    /// Returns `true` if no use site reads the definition.
    #[must_use]
    pub fn is_unused(&self, def: DefId) -> bool {
        self.uses_of(def).is_empty()
    }

    /// The definition a use site reads.
    #[must_use]
    pub fn def_of_use(&self, node: NodeId) -> Option<DefId> {
        self.use_def.get(&node).copied()
    }

    /// The environment a use site was resolved in.
    #[must_use]
    pub fn env_at_use(&self, node: NodeId) -> Option<&Env> {
        self.use_env.get(&node)
    }

    /// Iterates over every `(definition, uses)` pair.
    pub fn iter(&self) -> impl Iterator<Item = (DefId, &BTreeSet<UseSite>)> {
        self.uses
            .iter()
            .enumerate()
            .map(|(index, uses)| (DefId(index), uses))
    }

    /// Total number of use sites.
    #[must_use]
    pub fn use_count(&self) -> usize {
        self.use_def.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::defs::Definition,
        ast::{Argument, Binding, CompareOp},
        test::helpers::{func, name, scenario_simple, scenario_while},
    };

    #[test]
    fn test_return_resolves_to_assignment() {
        let f = scenario_simple();
        let du = DefineUse::analyze(&f).unwrap();
        let y = du.reach().def_at(f.body.stmts[0].id, &name("y")).unwrap();
        let uses = du.uses_of(y);
        assert_eq!(uses.len(), 1);
        let site = uses.iter().next().unwrap();
        assert_eq!(site.stmt, f.body.stmts[1].id);
        assert_eq!(site.kind, UseKind::Var);
    }

    #[test]
    fn test_loop_condition_reads_header_phi() {
        let f = scenario_while();
        let du = DefineUse::analyze(&f).unwrap();
        let StmtKind::While { cond, .. } = &f.body.stmts[1].kind else {
            panic!("expected while");
        };
        let ExprKind::Compare { args, .. } = &cond.kind else {
            panic!("expected compare");
        };
        let def = du.def_of_use(args[0].id).unwrap();
        assert!(matches!(du.reach().def(def), Some(Definition::Phi(_))));

        let x0 = du.reach().def_at(f.body.stmts[0].id, &name("x")).unwrap();
        assert!(du.is_unused(x0));
        assert!(du.reach().is_phi_source(x0));
    }

    #[test]
    fn test_every_use_is_in_its_statement_env() {
        let f = scenario_while();
        let du = DefineUse::analyze(&f).unwrap();
        for (def, uses) in du.iter() {
            for site in uses {
                let env = du.env_at_use(site.node).unwrap();
                assert!(env.values().any(|&d| d == def));
            }
        }
        assert_eq!(du.use_count(), 3);
    }

    #[test]
    fn test_indexed_assign_and_call_uses() {
        // def f(xs, g):
        //     xs[0] = g(1)
        //     return xs
        let f = FuncDef::new(
            "f",
            vec![Argument::new("xs"), Argument::new("g")],
            Block::new(vec![
                Stmt::indexed_assign("xs", vec![Expr::int(0)], Expr::call("g", None, vec![Expr::int(1)])),
                Stmt::ret(Expr::var("xs")),
            ]),
        );
        let du = DefineUse::analyze(&f).unwrap();
        let entry = du.reach().entry_env();
        let xs = entry.get(&name("xs")).copied().unwrap();
        let g = entry.get(&name("g")).copied().unwrap();

        let kinds: Vec<UseKind> = du.uses_of(xs).iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![UseKind::IndexedAssign]);
        let kinds: Vec<UseKind> = du.uses_of(g).iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![UseKind::Call]);

        // the return reads the mutated version
        let xs1 = du.reach().def_at(f.body.stmts[0].id, &name("xs")).unwrap();
        assert_eq!(du.uses_of(xs1).len(), 1);
    }

    #[test]
    fn test_comprehension_element_reads_local_target() {
        let comp = Expr::list_comp(
            vec![Binding::from("i")],
            vec![Expr::var("xs")],
            Expr::compare(CompareOp::Lt, Expr::var("i"), Expr::var("n")),
        );
        let comp_id = comp.id;
        let f = func(
            &["xs", "n"],
            vec![Stmt::ret(comp)],
        );
        let du = DefineUse::analyze(&f).unwrap();
        let i = du.reach().def_at(comp_id, &name("i")).unwrap();
        assert_eq!(du.uses_of(i).len(), 1);
    }
}
