//! Reaching definitions over the structured AST.
//!
//! The analysis is a single forward walk. An environment maps every name in scope to the
//! definition that reaches the current point; it is copied at each branch point and merged at
//! each join, where names whose incoming definitions differ get a [`PhiDef`].
//!
//! # Loops
//!
//! A loop header merges the definition entering the loop with the one leaving the body, but
//! the latter is only known after the body was walked. Before walking the body, every name
//! that is both in scope and assigned inside the loop is bound to a placeholder φ whose
//! operands both point at the entering definition. After the body, the real φ is created and
//! the two are unioned:
//!
//! ```text
//! x = 0                x -> d0
//! while x < 10:        x -> d1 = phi(d0, d0)   placeholder
//!     x = x + 1        x -> d2 (prev d1)
//!                      x -> d3 = phi(d0, d2)   real, unioned with d1
//! ```
//!
//! Normalization then collapses every union-find class to one dense index, so uses inside the
//! loop that saw the placeholder end up pointing at the real φ.
//!
//! # Scoping
//!
//! - After a one-armed `if`, only names in scope before the `if` survive.
//! - After a two-armed `if`, names in scope at the end of both arms survive.
//! - After a loop, only names in scope before the loop survive.
//! - A `with` body runs exactly once, so everything it defines stays in scope.
//! - Comprehension targets are local to their comprehension.
//! - An indexed assignment `x[i] = e` reads `x` and defines a new version of it.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::{
    analysis::defs::{AssignDef, DefId, DefSite, Definition, Env, PhiDef},
    ast::{
        names::assigned_names, Binding, Block, Expr, ExprKind, FuncDef, Id, NamedId, NodeId, Stmt,
        StmtKind,
    },
    error::invariant_error,
    utils::UnionFind,
    Error, Result,
};

/// Entry point of the reaching-definitions analysis.
///
/// # Examples
///
/// ```rust
/// use fpy_core::{analysis::ReachingDefs, ast::*};
///
/// // def f(x):
/// //     y = x + 1
/// //     return y
/// let ret = Stmt::ret(Expr::var("y"));
/// let ret_id = ret.id;
/// let func = FuncDef::new("f", vec![Argument::new("x")], Block::new(vec![
///     Stmt::assign("y", Expr::add(Expr::var("x"), Expr::int(1))),
///     ret,
/// ]));
///
/// let rd = ReachingDefs::analyze(&func)?;
/// assert_eq!(rd.len(), 2);
/// let y = rd.reaching(ret_id, &NamedId::new("y")).unwrap();
/// assert!(!rd.def(y).unwrap().is_phi());
/// # Ok::<(), fpy_core::Error>(())
/// ```
pub struct ReachingDefs;

impl ReachingDefs {
    /// Analyzes a function.
    ///
    /// Parameters and free variables are defined on entry.
    ///
    /// # Errors
    ///
    /// - [`Error::UndefinedName`] if a name is read where no definition reaches
    /// - [`Error::ArityMismatch`] if a tuple binding is assigned a tuple literal of another length
    /// - [`Error::InvariantViolation`] if a tuple binding repeats a name
    pub fn analyze(func: &FuncDef) -> Result<ReachingDefsAnalysis> {
        let mut builder = Builder::default();
        let mut env = Env::new();
        for arg in &func.args {
            if let Id::Named(name) = &arg.name {
                builder.assign(&mut env, name, DefSite::Param(arg.id));
            }
        }
        for name in &func.free_vars {
            if !env.contains_key(name) {
                builder.assign(&mut env, name, DefSite::Free(func.id));
            }
        }
        let entry = env.clone();
        let exit = builder.visit_block(&func.body, env)?;
        let analysis = builder.normalize(&entry, &exit);
        log::trace!(
            "reaching definitions for `{}`: {} definitions, {} phis",
            func.name,
            analysis.len(),
            analysis.phi_count()
        );
        Ok(analysis)
    }

    /// Analyzes a free-standing block with `inputs` defined on entry.
    ///
    /// The input definitions use the block's id as their [`DefSite::Free`] site.
    ///
    /// # Errors
    ///
    /// Same as [`ReachingDefs::analyze`].
    pub fn analyze_block(block: &Block, inputs: &[NamedId]) -> Result<ReachingDefsAnalysis> {
        let mut builder = Builder::default();
        let mut env = Env::new();
        for name in inputs {
            if !env.contains_key(name) {
                builder.assign(&mut env, name, DefSite::Free(block.id));
            }
        }
        let entry = env.clone();
        let exit = builder.visit_block(block, env)?;
        Ok(builder.normalize(&entry, &exit))
    }
}

#[derive(Default)]
struct Builder {
    defs: Vec<Definition>,
    classes: UnionFind<usize>,
    stmt_in: HashMap<NodeId, Env>,
    stmt_out: HashMap<NodeId, Env>,
    block_in: HashMap<NodeId, Env>,
    block_out: HashMap<NodeId, Env>,
    phis: HashMap<NodeId, BTreeMap<NamedId, DefId>>,
    site_defs: HashMap<NodeId, Vec<DefId>>,
}

impl Builder {
    fn push(&mut self, def: Definition) -> DefId {
        let id = DefId(self.defs.len());
        self.classes.add(id.0);
        if let Definition::Assign(assign) = &def {
            self.site_defs
                .entry(assign.site.node())
                .or_default()
                .push(id);
        }
        self.defs.push(def);
        id
    }

    fn assign(&mut self, env: &mut Env, name: &NamedId, site: DefSite) -> DefId {
        let id = self.push(Definition::Assign(AssignDef {
            name: name.clone(),
            site,
            prev: env.get(name).copied(),
        }));
        env.insert(name.clone(), id);
        id
    }

    fn phi(&mut self, name: &NamedId, site: NodeId, lhs: DefId, rhs: DefId) -> DefId {
        let id = self.push(Definition::Phi(PhiDef {
            name: name.clone(),
            site,
            lhs,
            rhs,
        }));
        self.phis.entry(site).or_default().insert(name.clone(), id);
        id
    }

    fn visit_block(&mut self, block: &Block, mut env: Env) -> Result<Env> {
        self.block_in.insert(block.id, env.clone());
        for stmt in &block.stmts {
            env = self.visit_stmt(stmt, env)?;
        }
        self.block_out.insert(block.id, env.clone());
        Ok(env)
    }

    /// Binds placeholder φs for every loop-carried name and returns them.
    fn open_loop(
        &mut self,
        site: NodeId,
        env: &Env,
        carried: BTreeSet<NamedId>,
    ) -> (Env, BTreeMap<NamedId, DefId>) {
        let mut body_in = env.clone();
        let mut temps = BTreeMap::new();
        for name in carried {
            let Some(&entering) = env.get(&name) else {
                continue;
            };
            let temp = self.phi(&name, site, entering, entering);
            body_in.insert(name.clone(), temp);
            temps.insert(name, temp);
        }
        (body_in, temps)
    }

    /// Creates the real loop φs, unions each with its placeholder and returns the post-loop
    /// environment.
    fn close_loop(
        &mut self,
        site: NodeId,
        env: &Env,
        body_out: &Env,
        temps: BTreeMap<NamedId, DefId>,
    ) -> Env {
        let mut out = env.clone();
        for (name, temp) in temps {
            let Some(&entering) = env.get(&name) else {
                continue;
            };
            let leaving = body_out.get(&name).copied().unwrap_or(temp);
            let real = self.phi(&name, site, entering, leaving);
            self.classes.union(&real.0, &temp.0);
            out.insert(name, real);
        }
        out
    }

    fn visit_stmt(&mut self, stmt: &Stmt, env: Env) -> Result<Env> {
        self.stmt_in.insert(stmt.id, env.clone());
        let out = match &stmt.kind {
            StmtKind::Assign { target, expr, .. } => {
                self.visit_expr(expr, &env)?;
                check_binding(target, stmt.id)?;
                check_arity(target, expr, stmt.id)?;
                let mut env = env;
                for name in target.names() {
                    self.assign(&mut env, name, DefSite::Stmt(stmt.id));
                }
                env
            }
            StmtKind::IndexedAssign { var, indices, expr } => {
                if !env.contains_key(var) {
                    return Err(Error::UndefinedName {
                        name: var.clone(),
                        site: stmt.id,
                    });
                }
                for index in indices {
                    self.visit_expr(index, &env)?;
                }
                self.visit_expr(expr, &env)?;
                let mut env = env;
                self.assign(&mut env, var, DefSite::Stmt(stmt.id));
                env
            }
            StmtKind::If1 { cond, body } => {
                self.visit_expr(cond, &env)?;
                let body_out = self.visit_block(body, env.clone())?;
                let mut out = env.clone();
                for (name, &before) in &env {
                    if let Some(&after) = body_out.get(name) {
                        if after != before {
                            let phi = self.phi(name, stmt.id, before, after);
                            out.insert(name.clone(), phi);
                        }
                    }
                }
                out
            }
            StmtKind::If { cond, ift, iff } => {
                self.visit_expr(cond, &env)?;
                let ift_out = self.visit_block(ift, env.clone())?;
                let iff_out = self.visit_block(iff, env)?;
                let mut out = Env::new();
                for (name, &lhs) in &ift_out {
                    let Some(&rhs) = iff_out.get(name) else {
                        continue;
                    };
                    let merged = if lhs == rhs {
                        lhs
                    } else {
                        self.phi(name, stmt.id, lhs, rhs)
                    };
                    out.insert(name.clone(), merged);
                }
                out
            }
            StmtKind::While { cond, body } => {
                let (body_in, temps) = self.open_loop(stmt.id, &env, assigned_names(body));
                self.visit_expr(cond, &body_in)?;
                let body_out = self.visit_block(body, body_in)?;
                self.close_loop(stmt.id, &env, &body_out, temps)
            }
            StmtKind::For {
                target,
                iterable,
                body,
            } => {
                self.visit_expr(iterable, &env)?;
                check_binding(target, stmt.id)?;
                let mut carried = assigned_names(body);
                carried.extend(target.names().into_iter().cloned());
                let (mut body_in, temps) = self.open_loop(stmt.id, &env, carried);
                for name in target.names() {
                    self.assign(&mut body_in, name, DefSite::Stmt(stmt.id));
                }
                let body_out = self.visit_block(body, body_in)?;
                self.close_loop(stmt.id, &env, &body_out, temps)
            }
            StmtKind::Context { name, ctx, body } => {
                self.visit_expr(ctx, &env)?;
                let mut inner = env;
                if let Some(name) = name {
                    self.assign(&mut inner, name, DefSite::Stmt(stmt.id));
                }
                self.visit_block(body, inner)?
            }
            StmtKind::Assert { test, msg } => {
                self.visit_expr(test, &env)?;
                if let Some(msg) = msg {
                    self.visit_expr(msg, &env)?;
                }
                env
            }
            StmtKind::Effect(expr) | StmtKind::Return(expr) => {
                self.visit_expr(expr, &env)?;
                env
            }
            StmtKind::Pass => env,
        };
        self.stmt_out.insert(stmt.id, out.clone());
        Ok(out)
    }

    fn visit_expr(&mut self, expr: &Expr, env: &Env) -> Result<()> {
        match &expr.kind {
            ExprKind::Var(name) => {
                if env.contains_key(name) {
                    Ok(())
                } else {
                    Err(Error::UndefinedName {
                        name: name.clone(),
                        site: expr.id,
                    })
                }
            }
            ExprKind::ListComp {
                targets,
                iterables,
                elt,
            } => {
                for iterable in iterables {
                    self.visit_expr(iterable, env)?;
                }
                let mut local = env.clone();
                for target in targets {
                    check_binding(target, expr.id)?;
                    for name in target.names() {
                        self.assign(&mut local, name, DefSite::Comp(expr.id));
                    }
                }
                self.visit_expr(elt, &local)
            }
            _ => {
                for child in expr.children() {
                    self.visit_expr(child, env)?;
                }
                Ok(())
            }
        }
    }

    fn normalize(mut self, entry: &Env, exit: &Env) -> ReachingDefsAnalysis {
        let count = self.defs.len();
        let reps: Vec<usize> = (0..count)
            .map(|raw| self.classes.find(&raw).unwrap_or(raw))
            .collect();

        let mut dense = vec![0usize; count];
        let mut next = 0;
        for raw in 0..count {
            if reps[raw] == raw {
                dense[raw] = next;
                next += 1;
            }
        }
        let remap = |id: DefId| DefId(dense[reps[id.0]]);
        let remap_env = |env: &Env| -> Env { env.iter().map(|(k, v)| (k.clone(), remap(*v))).collect() };
        let remap_envs = |envs: HashMap<NodeId, Env>| -> HashMap<NodeId, Env> {
            envs.into_iter().map(|(k, env)| (k, remap_env(&env))).collect()
        };

        let defs: Vec<Definition> = (0..count)
            .filter(|&raw| reps[raw] == raw)
            .map(|raw| self.defs[raw].remap(remap))
            .collect();

        let mut name_to_defs: BTreeMap<NamedId, BTreeSet<DefId>> = BTreeMap::new();
        let mut phi_sources = BTreeSet::new();
        for (index, def) in defs.iter().enumerate() {
            name_to_defs
                .entry(def.name().clone())
                .or_default()
                .insert(DefId(index));
            if let Definition::Phi(phi) = def {
                for operand in [phi.lhs, phi.rhs] {
                    if operand.0 != index {
                        phi_sources.insert(operand);
                    }
                }
            }
        }

        let phis = self
            .phis
            .into_iter()
            .map(|(site, map)| {
                let map = map.into_iter().map(|(k, v)| (k, remap(v))).collect();
                (site, map)
            })
            .collect();
        let site_defs = self
            .site_defs
            .into_iter()
            .map(|(site, ids)| (site, ids.into_iter().map(remap).collect()))
            .collect();

        ReachingDefsAnalysis {
            defs,
            name_to_defs,
            stmt_in: remap_envs(self.stmt_in),
            stmt_out: remap_envs(self.stmt_out),
            block_in: remap_envs(self.block_in),
            block_out: remap_envs(self.block_out),
            phis,
            site_defs,
            phi_sources,
            entry: remap_env(entry),
            exit: remap_env(exit),
        }
    }
}

/// Rejects tuple bindings that bind a name twice.
fn check_binding(target: &Binding, site: NodeId) -> Result<()> {
    let mut seen = BTreeSet::new();
    for name in target.names() {
        if !seen.insert(name) {
            return Err(invariant_error!(
                "name `{}` bound twice in tuple binding at {}",
                name,
                site
            ));
        }
    }
    Ok(())
}

/// Compares a tuple binding against a tuple literal, recursively.
fn check_arity(target: &Binding, expr: &Expr, site: NodeId) -> Result<()> {
    if let (Binding::Tuple(elts), ExprKind::Tuple(values)) = (target, &expr.kind) {
        if elts.len() != values.len() {
            return Err(Error::ArityMismatch {
                site,
                expected: elts.len(),
                actual: values.len(),
            });
        }
        for (elt, value) in elts.iter().zip(values) {
            check_arity(elt, value, site)?;
        }
    }
    Ok(())
}

/// The result of [`ReachingDefs`].
///
/// All indices are dense: every [`DefId`] stored anywhere in the result is below
/// [`ReachingDefsAnalysis::len`].
#[derive(Debug, Clone)]
pub struct ReachingDefsAnalysis {
    defs: Vec<Definition>,
    name_to_defs: BTreeMap<NamedId, BTreeSet<DefId>>,
    stmt_in: HashMap<NodeId, Env>,
    stmt_out: HashMap<NodeId, Env>,
    block_in: HashMap<NodeId, Env>,
    block_out: HashMap<NodeId, Env>,
    phis: HashMap<NodeId, BTreeMap<NamedId, DefId>>,
    site_defs: HashMap<NodeId, Vec<DefId>>,
    phi_sources: BTreeSet<DefId>,
    entry: Env,
    exit: Env,
}

impl ReachingDefsAnalysis {
    /// All definitions, indexed by [`DefId::index`].
    #[must_use]
    pub fn defs(&self) -> &[Definition] {
        &self.defs
    }

    /// Looks up one definition.
    #[must_use]
    pub fn def(&self, id: DefId) -> Option<&Definition> {
        self.defs.get(id.0)
    }

    /// Number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// Returns `true` if nothing is defined (a parameterless function with no binders).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Iterates over `(id, definition)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (DefId, &Definition)> {
        self.defs.iter().enumerate().map(|(i, d)| (DefId(i), d))
    }

    /// Number of φ-definitions.
    #[must_use]
    pub fn phi_count(&self) -> usize {
        self.defs.iter().filter(|d| d.is_phi()).count()
    }

    /// All definitions of a name.
    #[must_use]
    pub fn defs_of(&self, name: &NamedId) -> Option<&BTreeSet<DefId>> {
        self.name_to_defs.get(name)
    }

    /// The name-to-definitions map.
    #[must_use]
    pub fn name_to_defs(&self) -> &BTreeMap<NamedId, BTreeSet<DefId>> {
        &self.name_to_defs
    }

    /// Environment just before a statement.
    #[must_use]
    pub fn in_env(&self, stmt: NodeId) -> Option<&Env> {
        self.stmt_in.get(&stmt)
    }

    /// Environment just after a statement.
    #[must_use]
    pub fn out_env(&self, stmt: NodeId) -> Option<&Env> {
        self.stmt_out.get(&stmt)
    }

    /// Environment on entry to a block.
    ///
    /// For a loop body this includes the loop-header φs, and for a `for` body the target.
    #[must_use]
    pub fn block_in_env(&self, block: NodeId) -> Option<&Env> {
        self.block_in.get(&block)
    }

    /// Environment at the end of a block.
    #[must_use]
    pub fn block_out_env(&self, block: NodeId) -> Option<&Env> {
        self.block_out.get(&block)
    }

    /// The definition of `name` reaching the start of `stmt`.
    #[must_use]
    pub fn reaching(&self, stmt: NodeId, name: &NamedId) -> Option<DefId> {
        self.stmt_in.get(&stmt)?.get(name).copied()
    }

    /// The φ-definitions introduced by an `if` or loop statement, by name.
    #[must_use]
    pub fn phis_at(&self, stmt: NodeId) -> Option<&BTreeMap<NamedId, DefId>> {
        self.phis.get(&stmt)
    }

    /// Statements that introduce at least one φ.
    pub fn phi_sites(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.phis.keys().copied()
    }

    /// Non-φ definitions created by a binder site, in binding order.
    #[must_use]
    pub fn defs_at(&self, site: NodeId) -> &[DefId] {
        self.site_defs.get(&site).map_or(&[], Vec::as_slice)
    }

    /// The definition of `name` created by the binder at `site`.
    #[must_use]
    pub fn def_at(&self, site: NodeId, name: &NamedId) -> Option<DefId> {
        self.defs_at(site)
            .iter()
            .copied()
            .find(|&id| self.defs[id.0].name() == name)
    }

    /// Returns `true` if some other φ merges `id`.
    #[must_use]
    pub fn is_phi_source(&self, id: DefId) -> bool {
        self.phi_sources.contains(&id)
    }

    /// Environment on function entry (parameters and free variables).
    #[must_use]
    pub fn entry_env(&self) -> &Env {
        &self.entry
    }

    /// Environment at the end of the function body.
    #[must_use]
    pub fn exit_env(&self) -> &Env {
        &self.exit
    }
}
