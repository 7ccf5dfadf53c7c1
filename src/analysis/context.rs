//! Rounding-context inference.
//!
//! Every definition is computed under some rounding context: the context of the innermost
//! enclosing `with` statement, or the function's overriding context, or (when neither exists)
//! whatever the caller runs under. [`ContextInfer`] tags each definition and statement with a
//! [`CtxVal`]:
//!
//! - [`CtxVal::Default`] - no `with` or overriding context applies; inherited from the caller
//! - [`CtxVal::Known`] - a statically known context
//! - [`CtxVal::Unknown`] - a `with` whose context expression cannot be evaluated statically, or
//!   a φ whose incoming definitions disagree
//!
//! Static evaluation of context expressions follows constructor calls with literal arguments,
//! variable definitions, `with ... as` bindings, φs whose inputs agree, and foreign values in
//! the function's captured environment. Back edges of loop φs are treated optimistically; a
//! definition whose value depends only on itself is a [`crate::Error::CyclicContext`].
//!
//! # Example
//!
//! ```rust
//! use fpy_core::{analysis::{ContextInfer, CtxVal}, ast::*};
//!
//! let body = Stmt::assign("y", Expr::add(Expr::var("x"), Expr::int(1)));
//! let ret = Stmt::ret(Expr::var("y"));
//! let ctx = Expr::context("IEEEContext", vec![Expr::int(8), Expr::int(32)]);
//! let func = FuncDef::new("f", vec![Argument::new("x")], Block::new(vec![
//!     Stmt::context(None, ctx, vec![body.clone()]),
//!     ret.clone(),
//! ]));
//!
//! let analysis = ContextInfer::infer(&func)?;
//! assert_eq!(analysis.ctx_of_stmt(body.id), Some(&CtxVal::Known(Context::fp32())));
//! assert_eq!(analysis.ctx_of_stmt(ret.id), Some(&CtxVal::Default));
//! # Ok::<(), fpy_core::Error>(())
//! ```

use std::{collections::HashMap, fmt};

use crate::{
    analysis::{
        defs::{DefId, DefSite, Definition},
        defuse::{DefineUse, DefineUseAnalysis},
        stmt_table,
    },
    ast::{
        Binding, Block, Context, CtxArg, Expr, ExprKind, ForeignValue, FuncDef, Id, NodeId, Stmt,
        StmtKind, UnaryOpKind,
    },
    error::invariant_error,
    Error, Result,
};

/// Deepest chain of variable copies followed when resolving a constructor argument.
const MAX_ARG_DEPTH: usize = 64;

/// The rounding context attached to a definition or statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CtxVal {
    /// Inherited from the caller
    Default,
    /// Statically known
    Known(Context),
    /// Statically indeterminate
    Unknown,
}

impl CtxVal {
    /// Least upper bound: equal values join to themselves, anything else to `Unknown`.
    #[must_use]
    pub fn join(&self, other: &CtxVal) -> CtxVal {
        if self == other {
            self.clone()
        } else {
            CtxVal::Unknown
        }
    }

    /// The known context, if any.
    #[must_use]
    pub const fn known(&self) -> Option<&Context> {
        match self {
            Self::Known(ctx) => Some(ctx),
            _ => None,
        }
    }
}

impl fmt::Display for CtxVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            Self::Known(ctx) => ctx.fmt(f),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// Outcome of statically evaluating a definition's value.
#[derive(Debug, Clone, PartialEq)]
enum Static {
    Known(Context),
    Unknown,
    /// Reached a definition already being evaluated.
    Cycle,
}

/// Entry point of rounding-context inference.
pub struct ContextInfer;

impl ContextInfer {
    /// Infers contexts for every definition and statement of `func`.
    ///
    /// # Errors
    ///
    /// Propagates reaching-definition errors and returns [`Error::CyclicContext`] when a
    /// context value is defined only in terms of itself.
    pub fn infer(func: &FuncDef) -> Result<ContextAnalysis> {
        let du = DefineUse::analyze(func)?;
        Self::from_define_use(func, du)
    }

    /// Infers contexts reusing an existing define-use result computed on `func`.
    ///
    /// # Errors
    ///
    /// See [`ContextInfer::infer`].
    pub fn from_define_use(func: &FuncDef, du: DefineUseAnalysis) -> Result<ContextAnalysis> {
        let root = func
            .ctx
            .clone()
            .map_or(CtxVal::Default, CtxVal::Known);
        let mut inference = Inference {
            func,
            du: &du,
            stmts: stmt_table(&func.body),
            def_ctx: vec![None; du.reach().len()],
            stmt_ctx: HashMap::new(),
            memo: HashMap::new(),
            expr_values: HashMap::new(),
        };

        for (id, def) in du.reach().iter() {
            if let Definition::Assign(assign) = def {
                if matches!(assign.site, DefSite::Param(_) | DefSite::Free(_)) {
                    inference.def_ctx[id.index()] = Some(root.clone());
                }
            }
        }
        inference.visit_block(&func.body, &root)?;
        inference.join_phis();

        let mut def_values = HashMap::new();
        for index in 0..du.reach().len() {
            let id = DefId(index);
            if let Some(ctx) = inference.eval_top(id)? {
                def_values.insert(id, ctx);
            }
        }

        let Inference {
            def_ctx,
            stmt_ctx,
            expr_values,
            ..
        } = inference;
        let def_ctx = def_ctx
            .into_iter()
            .map(|ctx| ctx.unwrap_or(CtxVal::Unknown))
            .collect();

        log::trace!(
            "context inference for `{}`: {} known context values",
            func.name,
            def_values.len()
        );

        Ok(ContextAnalysis {
            root,
            def_ctx,
            stmt_ctx,
            def_values,
            expr_values,
            du,
        })
    }
}

struct Inference<'a> {
    func: &'a FuncDef,
    du: &'a DefineUseAnalysis,
    stmts: HashMap<NodeId, &'a Stmt>,
    def_ctx: Vec<Option<CtxVal>>,
    stmt_ctx: HashMap<NodeId, CtxVal>,
    memo: HashMap<DefId, Static>,
    expr_values: HashMap<NodeId, Context>,
}

impl<'a> Inference<'a> {
    fn visit_block(&mut self, block: &Block, cur: &CtxVal) -> Result<()> {
        for stmt in &block.stmts {
            self.visit_stmt(stmt, cur)?;
        }
        Ok(())
    }

    fn visit_stmt(&mut self, stmt: &Stmt, cur: &CtxVal) -> Result<()> {
        self.stmt_ctx.insert(stmt.id, cur.clone());
        for &def in self.du.reach().defs_at(stmt.id) {
            self.def_ctx[def.index()] = Some(cur.clone());
        }
        for expr in stmt.exprs() {
            self.visit_expr(expr, cur)?;
        }
        match &stmt.kind {
            StmtKind::Context { ctx, body, .. } => {
                let inner = match self.eval_expr(ctx, &mut Vec::new())? {
                    (Static::Known(ctx), _) => CtxVal::Known(ctx),
                    _ => CtxVal::Unknown,
                };
                self.visit_block(body, &inner)
            }
            _ => {
                for block in stmt.blocks() {
                    self.visit_block(block, cur)?;
                }
                Ok(())
            }
        }
    }

    fn visit_expr(&mut self, expr: &Expr, cur: &CtxVal) -> Result<()> {
        match &expr.kind {
            ExprKind::ListComp { .. } => {
                for &def in self.du.reach().defs_at(expr.id) {
                    self.def_ctx[def.index()] = Some(cur.clone());
                }
            }
            ExprKind::Context { .. } | ExprKind::Var(_) => {
                if let (Static::Known(ctx), _) = self.top_expr(expr)? {
                    self.expr_values.insert(expr.id, ctx);
                }
            }
            _ => {}
        }
        for child in expr.children() {
            self.visit_expr(child, cur)?;
        }
        Ok(())
    }

    /// Loop φs may read definitions that come later in the walk, so iterate to a fixpoint.
    /// Values only move up the lattice `None < Default | Known < Unknown`.
    fn join_phis(&mut self) {
        let reach = self.du.reach();
        let mut changed = true;
        while changed {
            changed = false;
            for (id, def) in reach.iter() {
                let Definition::Phi(phi) = def else {
                    continue;
                };
                let joined = match (
                    self.def_ctx[phi.lhs.index()].as_ref(),
                    self.def_ctx[phi.rhs.index()].as_ref(),
                ) {
                    (Some(a), Some(b)) => Some(a.join(b)),
                    (Some(a), None) | (None, Some(a)) => Some(a.clone()),
                    (None, None) => None,
                };
                if joined.is_some() && joined != self.def_ctx[id.index()] {
                    self.def_ctx[id.index()] = joined;
                    changed = true;
                }
            }
        }
    }

    fn top_expr(&mut self, expr: &Expr) -> Result<(Static, bool)> {
        let result = self.eval_expr(expr, &mut Vec::new())?;
        if let (Static::Cycle, _) = result {
            let def = self.du.def_of_use(expr.id);
            return Err(self.cyclic(def));
        }
        Ok(result)
    }

    fn eval_top(&mut self, def: DefId) -> Result<Option<Context>> {
        match self.eval_def(def, &mut Vec::new())? {
            (Static::Known(ctx), _) => Ok(Some(ctx)),
            (Static::Unknown, _) => Ok(None),
            (Static::Cycle, _) => Err(self.cyclic(Some(def))),
        }
    }

    fn cyclic(&self, def: Option<DefId>) -> Error {
        match def.and_then(|id| self.du.reach().def(id)) {
            Some(def) => Error::CyclicContext {
                name: def.name().clone(),
                site: def.site_node(),
            },
            None => invariant_error!("cyclic context without a definition"),
        }
    }

    /// Evaluates an expression to a context value.
    ///
    /// The flag is `true` when the result relied on an optimistic cycle assumption and must
    /// not be memoized.
    fn eval_expr(&mut self, expr: &Expr, stack: &mut Vec<DefId>) -> Result<(Static, bool)> {
        match &expr.kind {
            ExprKind::Foreign(ForeignValue::Context(ctx)) => Ok((Static::Known(ctx.clone()), false)),
            ExprKind::Context { ctor, args, kwargs } => {
                if !kwargs.is_empty() {
                    return Ok((Static::Unknown, false));
                }
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    match self.ctor_arg(arg, 0) {
                        Some(value) => values.push(value),
                        None => return Ok((Static::Unknown, false)),
                    }
                }
                Ok(match Context::from_ctor(ctor, &values) {
                    Some(ctx) => (Static::Known(ctx), false),
                    None => (Static::Unknown, false),
                })
            }
            ExprKind::Var(_) => match self.du.def_of_use(expr.id) {
                Some(def) => self.eval_def(def, stack),
                None => Ok((Static::Unknown, false)),
            },
            _ => Ok((Static::Unknown, false)),
        }
    }

    fn eval_def(&mut self, def: DefId, stack: &mut Vec<DefId>) -> Result<(Static, bool)> {
        if let Some(value) = self.memo.get(&def) {
            return Ok((value.clone(), false));
        }
        if stack.contains(&def) {
            return Ok((Static::Cycle, true));
        }
        let Some(record) = self.du.reach().def(def) else {
            return Err(invariant_error!("definition {} out of range", def));
        };
        stack.push(def);
        let result = match record {
            Definition::Assign(assign) => match assign.site {
                DefSite::Param(_) | DefSite::Comp(_) => (Static::Unknown, false),
                DefSite::Free(_) => {
                    let value = match self.func.env.get(assign.name.base_symbol()) {
                        Some(ForeignValue::Context(ctx)) => Static::Known(ctx.clone()),
                        _ => Static::Unknown,
                    };
                    (value, false)
                }
                DefSite::Stmt(site) => match self.stmts.get(&site).copied() {
                    Some(stmt) => match &stmt.kind {
                        StmtKind::Assign {
                            target: Binding::Id(Id::Named(name)),
                            expr,
                            ..
                        } if *name == assign.name => self.eval_expr(expr, stack)?,
                        StmtKind::Context {
                            name: Some(name),
                            ctx,
                            ..
                        } if *name == assign.name => self.eval_expr(ctx, stack)?,
                        _ => (Static::Unknown, false),
                    },
                    None => (Static::Unknown, false),
                },
            },
            Definition::Phi(phi) => {
                let (lhs, lhs_tainted) = self.eval_def(phi.lhs, stack)?;
                let (rhs, rhs_tainted) = self.eval_def(phi.rhs, stack)?;
                let value = match (lhs, rhs) {
                    (Static::Cycle, Static::Cycle) => Static::Cycle,
                    (Static::Cycle, other) | (other, Static::Cycle) => other,
                    (Static::Known(a), Static::Known(b)) if a == b => Static::Known(a),
                    _ => Static::Unknown,
                };
                (value, lhs_tainted || rhs_tainted)
            }
        };
        stack.pop();
        if !result.1 {
            self.memo.insert(def, result.0.clone());
        }
        Ok(result)
    }

    fn ctor_arg(&self, expr: &Expr, depth: usize) -> Option<CtxArg> {
        if depth > MAX_ARG_DEPTH {
            return None;
        }
        match &expr.kind {
            ExprKind::Integer(n) => Some(CtxArg::Int(n.clone())),
            ExprKind::Bool(b) => Some(CtxArg::Bool(*b)),
            ExprKind::Foreign(value) => foreign_arg(value),
            ExprKind::Unary {
                op: UnaryOpKind::Neg,
                arg,
                ..
            } => match self.ctor_arg(arg, depth + 1)? {
                CtxArg::Int(n) => Some(CtxArg::Int(-n)),
                _ => None,
            },
            ExprKind::Var(_) => {
                let def = self.du.def_of_use(expr.id)?;
                self.def_arg(def, depth + 1)
            }
            _ => None,
        }
    }

    fn def_arg(&self, def: DefId, depth: usize) -> Option<CtxArg> {
        if depth > MAX_ARG_DEPTH {
            return None;
        }
        match self.du.reach().def(def)? {
            Definition::Assign(assign) => match assign.site {
                DefSite::Free(_) => foreign_arg(self.func.env.get(assign.name.base_symbol())?),
                DefSite::Stmt(site) => match &self.stmts.get(&site)?.kind {
                    StmtKind::Assign {
                        target: Binding::Id(Id::Named(name)),
                        expr,
                        ..
                    } if *name == assign.name => self.ctor_arg(expr, depth + 1),
                    _ => None,
                },
                DefSite::Param(_) | DefSite::Comp(_) => None,
            },
            Definition::Phi(phi) => {
                let lhs = self.def_arg(phi.lhs, depth + 1)?;
                let rhs = self.def_arg(phi.rhs, depth + 1)?;
                (lhs == rhs).then_some(lhs)
            }
        }
    }
}

fn foreign_arg(value: &ForeignValue) -> Option<CtxArg> {
    match value {
        ForeignValue::Bool(b) => Some(CtxArg::Bool(*b)),
        ForeignValue::RoundingMode(rm) => Some(CtxArg::Rm(*rm)),
        ForeignValue::Number(n) if n.is_integer() => Some(CtxArg::Int(n.to_integer())),
        _ => None,
    }
}

/// The result of [`ContextInfer`].
#[derive(Debug, Clone)]
pub struct ContextAnalysis {
    root: CtxVal,
    def_ctx: Vec<CtxVal>,
    stmt_ctx: HashMap<NodeId, CtxVal>,
    def_values: HashMap<DefId, Context>,
    expr_values: HashMap<NodeId, Context>,
    du: DefineUseAnalysis,
}

impl ContextAnalysis {
    /// The context the function body starts under.
    #[must_use]
    pub const fn root(&self) -> &CtxVal {
        &self.root
    }

    /// The context a definition is computed under.
    #[must_use]
    pub fn ctx_of_def(&self, def: DefId) -> Option<&CtxVal> {
        self.def_ctx.get(def.index())
    }

    /// The context a statement executes under.
    #[must_use]
    pub fn ctx_of_stmt(&self, stmt: NodeId) -> Option<&CtxVal> {
        self.stmt_ctx.get(&stmt)
    }

    /// The statically known context a definition holds as its value, for context-valued
    /// definitions.
    #[must_use]
    pub fn value_of_def(&self, def: DefId) -> Option<&Context> {
        self.def_values.get(&def)
    }

    /// The statically known context value of a constructor or variable expression.
    #[must_use]
    pub fn value_of_expr(&self, expr: NodeId) -> Option<&Context> {
        self.expr_values.get(&expr)
    }

    /// The define-use result the inference ran on.
    #[must_use]
    pub const fn define_use(&self) -> &DefineUseAnalysis {
        &self.du
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::{CompareOp, RoundingMode},
        test::helpers::{func, name},
    };

    fn fp32_ctor() -> Expr {
        Expr::context("IEEEContext", vec![Expr::int(8), Expr::int(32)])
    }

    #[test]
    fn test_with_body_is_tagged() {
        let inner = Stmt::assign("y", Expr::var("x"));
        let outer = Stmt::assign("z", Expr::var("y"));
        let f = func(
            &["x"],
            vec![
                Stmt::context(None, fp32_ctor(), vec![inner.clone()]),
                outer.clone(),
                Stmt::ret(Expr::var("z")),
            ],
        );
        let ca = ContextInfer::infer(&f).unwrap();
        let reach = ca.define_use().reach();
        let y = reach.def_at(inner.id, &name("y")).unwrap();
        let z = reach.def_at(outer.id, &name("z")).unwrap();
        assert_eq!(ca.ctx_of_def(y), Some(&CtxVal::Known(Context::fp32())));
        assert_eq!(ca.ctx_of_def(z), Some(&CtxVal::Default));
        assert_eq!(ca.root(), &CtxVal::Default);
    }

    #[test]
    fn test_overriding_context_is_root() {
        let f = func(&["x"], vec![Stmt::ret(Expr::var("x"))]).with_ctx(Context::fp64());
        let ca = ContextInfer::infer(&f).unwrap();
        let x = ca.define_use().reach().entry_env().get(&name("x")).copied().unwrap();
        assert_eq!(ca.ctx_of_def(x), Some(&CtxVal::Known(Context::fp64())));
    }

    #[test]
    fn test_unknown_context_expression() {
        let inner = Stmt::assign("y", Expr::var("x"));
        let f = func(
            &["x", "c"],
            vec![
                Stmt::context(None, Expr::var("c"), vec![inner.clone()]),
                Stmt::ret(Expr::var("y")),
            ],
        );
        let ca = ContextInfer::infer(&f).unwrap();
        assert_eq!(ca.ctx_of_stmt(inner.id), Some(&CtxVal::Unknown));
    }

    #[test]
    fn test_context_through_variables_and_env() {
        let bind = Stmt::assign("c", fp32_ctor());
        let via_var = Stmt::assign("y", Expr::var("x"));
        let via_env = Stmt::assign("z", Expr::var("y"));
        let f = func(
            &["x"],
            vec![
                bind,
                Stmt::context(None, Expr::var("c"), vec![via_var.clone()]),
                Stmt::context(Some(name("d")), Expr::var("big"), vec![via_env.clone()]),
                Stmt::ret(Expr::var("z")),
            ],
        )
        .with_free_vars(["big"])
        .with_env("big", ForeignValue::Context(Context::fp64()));

        let ca = ContextInfer::infer(&f).unwrap();
        assert_eq!(ca.ctx_of_stmt(via_var.id), Some(&CtxVal::Known(Context::fp32())));
        assert_eq!(ca.ctx_of_stmt(via_env.id), Some(&CtxVal::Known(Context::fp64())));

        let reach = ca.define_use().reach();
        let d = reach.defs_of(&name("d")).unwrap().iter().next().copied().unwrap();
        assert_eq!(ca.value_of_def(d), Some(&Context::fp64()));
    }

    #[test]
    fn test_rounding_mode_argument_from_env() {
        let stmt = Stmt::assign("y", Expr::var("x"));
        let ctor = Expr::context("MPFloatContext", vec![Expr::int(24), Expr::var("RTZ")]);
        let ctor_id = ctor.id;
        let f = func(
            &["x"],
            vec![
                Stmt::context(None, ctor, vec![stmt.clone()]),
                Stmt::ret(Expr::var("y")),
            ],
        )
        .with_free_vars(["RTZ"])
        .with_env("RTZ", ForeignValue::RoundingMode(RoundingMode::RTZ));

        let ca = ContextInfer::infer(&f).unwrap();
        let expected = Context::MpFloat {
            prec: 24,
            rm: RoundingMode::RTZ,
        };
        assert_eq!(ca.value_of_expr(ctor_id), Some(&expected));
        assert_eq!(ca.ctx_of_stmt(stmt.id), Some(&CtxVal::Known(expected)));
    }

    #[test]
    fn test_phi_joins_disagreeing_contexts() {
        let f = func(
            &["x"],
            vec![
                Stmt::if2(
                    Expr::compare(CompareOp::Gt, Expr::var("x"), Expr::int(0)),
                    vec![Stmt::context(
                        None,
                        fp32_ctor(),
                        vec![Stmt::assign("y", Expr::var("x"))],
                    )],
                    vec![Stmt::assign("y", Expr::var("x"))],
                ),
                Stmt::ret(Expr::var("y")),
            ],
        );
        let ca = ContextInfer::infer(&f).unwrap();
        let reach = ca.define_use().reach();
        let phi = reach
            .iter()
            .find(|(_, def)| def.is_phi())
            .map(|(id, _)| id)
            .unwrap();
        assert_eq!(ca.ctx_of_def(phi), Some(&CtxVal::Unknown));
    }

    #[test]
    fn test_loop_phi_keeps_agreeing_context() {
        let f = func(
            &[],
            vec![
                Stmt::assign("c", fp32_ctor()),
                Stmt::while_loop(
                    Expr::boolean(false),
                    vec![Stmt::assign("c", Expr::var("c"))],
                ),
                Stmt::ret(Expr::var("c")),
            ],
        );
        let ca = ContextInfer::infer(&f).unwrap();
        let reach = ca.define_use().reach();
        let phi = reach.exit_env().get(&name("c")).copied().unwrap();
        assert!(reach.def(phi).unwrap().is_phi());
        assert_eq!(ca.value_of_def(phi), Some(&Context::fp32()));
        assert_eq!(ca.ctx_of_def(phi), Some(&CtxVal::Default));
    }

    #[test]
    fn test_join_lattice() {
        let known = CtxVal::Known(Context::Real);
        assert_eq!(known.join(&known), known);
        assert_eq!(known.join(&CtxVal::Default), CtxVal::Unknown);
        assert_eq!(known.known(), Some(&Context::Real));
        assert_eq!(CtxVal::Unknown.known(), None);
    }
}
