//! Function inlining pass.
//!
//! Replaces calls of user-defined functions by the body of the callee. The callee body is
//! α-renamed so none of its names clash with the caller's, spliced in front of the statement
//! holding the call, and the call itself becomes a read of a fresh temporary holding the
//! callee's return value.
//!
//! # Example
//!
//! Before:
//! ```text
//! def sq(a):
//!     b = a * a
//!     return b
//!
//! def f(x):
//!     y = sq(x + 1)
//!     return y
//! ```
//!
//! After (in `f`):
//! ```text
//! a_0 = x + 1
//! b_0 = a_0 * a_0
//! tmp_0 = b_0
//! y = tmp_0
//! return y
//! ```
//!
//! If the callee carries an overriding context, the spliced body (without the parameter
//! bindings, whose arguments belong to the caller) is wrapped in `with <ctx>:`.
//!
//! # Eligibility
//!
//! A call is inlined when its callee:
//!
//! - is resolved to a user-defined function other than the caller
//! - returns exactly once, as the last statement of its body
//! - has at most `inline_threshold` statements
//! - reads no free variable the caller binds
//! - reads no free variable the caller captures with a different host value
//!
//! and the call passes no keyword arguments. Since the body moves in front of the statement, a
//! call to an impure callee is inlined only when it is the whole right-hand side of an
//! assignment, effect or return. Calls in `while` conditions, comprehensions, conditional
//! expressions, `and`/`or` operands and comparison chains stay, as those are not evaluated
//! exactly once.

use std::{
    collections::{BTreeMap, BTreeSet},
    mem,
    sync::Arc,
};

use crate::{
    analysis::{stmt_table, Purity},
    ast::{
        fold,
        names::{bound_names, called_names, refresh_ids, rename_binding, rename_block},
        Binding, Block, Callee, Expr, ExprKind, Fold, ForeignValue, FuncDef, Gensym, NaryOpKind,
        NamedId, NodeId, Stmt, StmtKind, Symbol,
    },
    compiler::{pass::finish, CompilerContext, EventKind, EventLog, Pass},
    error::invariant_error,
    Error, Result,
};

/// Function inlining pass.
pub struct FuncInline {
    threshold: Option<usize>,
}

impl Default for FuncInline {
    fn default() -> Self {
        Self::new()
    }
}

impl FuncInline {
    /// Creates a pass using the `inline_threshold` of the pipeline configuration.
    #[must_use]
    pub fn new() -> Self {
        Self { threshold: None }
    }

    /// Overrides the maximum callee size.
    #[must_use]
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = Some(threshold);
        self
    }
}

impl Pass for FuncInline {
    fn name(&self) -> &'static str {
        "func-inline"
    }

    fn description(&self) -> &'static str {
        "Replaces calls of small user-defined functions with their bodies"
    }

    fn should_run(&self, func: &FuncDef, _ctx: &CompilerContext) -> bool {
        !called_names(&func.body).is_empty()
    }

    fn run_on_function(&self, func: &FuncDef, ctx: &CompilerContext) -> Result<(FuncDef, bool)> {
        let changes = EventLog::new();
        let mut caller_bound: BTreeSet<NamedId> = func.param_names().cloned().collect();
        caller_bound.extend(bound_names(&func.body));

        let mut inliner = Inliner {
            threshold: self.threshold.unwrap_or(ctx.config.inline_threshold),
            caller_bound,
            caller_free: &func.free_vars,
            caller_env: &func.env,
            gensym: Gensym::from_func(func),
            prelude: Vec::new(),
            root: None,
            free_vars: BTreeSet::new(),
            env: BTreeMap::new(),
            func: &func.name,
            changes: &changes,
            pass: self.name(),
        };
        let mut out = inliner.fold_func(func.clone())?;
        out.free_vars.extend(inliner.free_vars);
        for (key, value) in inliner.env {
            out.env.entry(key).or_insert(value);
        }
        finish(self.name(), out, changes, ctx)
    }
}

struct Inliner<'a> {
    threshold: usize,
    caller_bound: BTreeSet<NamedId>,
    caller_free: &'a BTreeSet<NamedId>,
    caller_env: &'a BTreeMap<Symbol, ForeignValue>,
    gensym: Gensym,
    /// Statements to splice before the statement being folded
    prelude: Vec<Stmt>,
    /// Right-hand side of the current assignment, effect or return
    root: Option<NodeId>,
    free_vars: BTreeSet<NamedId>,
    env: BTreeMap<Symbol, ForeignValue>,
    func: &'a Symbol,
    changes: &'a EventLog,
    pass: &'static str,
}

fn count_returns(block: &Block) -> usize {
    block
        .stmts
        .iter()
        .map(|stmt| match &stmt.kind {
            StmtKind::Return(_) => 1,
            _ => stmt.blocks().into_iter().map(count_returns).sum(),
        })
        .sum()
}

impl Inliner<'_> {
    /// The host value the caller (or an already inlined callee) gives `key`.
    ///
    /// `None` when the caller never mentions `key`; `Some(None)` when it reads `key` as a free
    /// variable without a captured value.
    fn captured(&self, key: &Symbol) -> Option<Option<&ForeignValue>> {
        let read = self
            .caller_free
            .iter()
            .chain(&self.free_vars)
            .any(|name| name.base_symbol() == key);
        let value = self.caller_env.get(key).or_else(|| self.env.get(key));
        (read || value.is_some()).then_some(value)
    }

    fn is_inlinable(&self, callee: &FuncDef) -> bool {
        if callee.name == *self.func {
            return false;
        }
        let returns_last = matches!(
            callee.body.stmts.last().map(|stmt| &stmt.kind),
            Some(StmtKind::Return(_))
        );
        if !returns_last || count_returns(&callee.body) != 1 {
            log::trace!("not inlining `{}`: multiple exits", callee.name);
            return false;
        }
        if stmt_table(&callee.body).len() > self.threshold {
            log::trace!("not inlining `{}`: above threshold", callee.name);
            return false;
        }
        if callee
            .free_vars
            .iter()
            .any(|name| self.caller_bound.contains(name))
        {
            log::trace!("not inlining `{}`: free variable captured", callee.name);
            return false;
        }
        if callee.free_vars.iter().any(|name| {
            let key = name.base_symbol();
            matches!(self.captured(key), Some(value) if value != callee.env.get(key))
        }) {
            log::trace!("not inlining `{}`: free variable shadowed", callee.name);
            return false;
        }
        true
    }

    fn inline(&mut self, site: NodeId, callee: &FuncDef, args: Vec<Expr>) -> Result<Expr> {
        if args.len() != callee.args.len() {
            return Err(Error::ArityMismatch {
                site,
                expected: callee.args.len(),
                actual: args.len(),
            });
        }
        for name in &callee.free_vars {
            self.gensym.reserve(name.clone());
        }

        let mut bound: BTreeSet<NamedId> = callee.param_names().cloned().collect();
        bound.extend(bound_names(&callee.body));
        let mut map = BTreeMap::new();
        for name in bound {
            let fresh = self.gensym.refresh(&name);
            self.caller_bound.insert(fresh.clone());
            map.insert(name, fresh);
        }

        for (param, arg) in callee.args.iter().zip(args) {
            let target = rename_binding(&Binding::Id(param.name.clone()), &map);
            self.prelude.push(Stmt::assign(target, arg));
        }

        let mut body = rename_block(refresh_ids(&callee.body), &map)?;
        let Some(Stmt {
            kind: StmtKind::Return(value),
            ..
        }) = body.stmts.pop()
        else {
            return Err(invariant_error!("`{}` does not end in a return", callee.name));
        };
        let temp = self.gensym.fresh("tmp");
        self.caller_bound.insert(temp.clone());
        body.stmts.push(Stmt::assign(temp.clone(), value));

        match &callee.ctx {
            Some(ctx) => self.prelude.push(Stmt::context(
                None,
                Expr::foreign(ForeignValue::Context(ctx.clone())),
                body.stmts,
            )),
            None => self.prelude.extend(body.stmts),
        }

        self.free_vars.extend(callee.free_vars.iter().cloned());
        for (key, value) in &callee.env {
            self.env.entry(key.clone()).or_insert_with(|| value.clone());
        }
        self.changes
            .record(EventKind::CallInlined)
            .at(self.func, site)
            .pass(self.pass)
            .message(format!("`{}` into `{temp}`", callee.name));
        Ok(Expr::var(temp))
    }
}

impl Fold for Inliner<'_> {
    fn fold_stmt(&mut self, stmt: Stmt) -> Result<Vec<Stmt>> {
        let saved = mem::take(&mut self.prelude);
        let saved_root = self.root.take();
        let stmt = match stmt.kind {
            StmtKind::While { cond, body } => {
                let body = self.fold_block(body)?;
                Stmt {
                    kind: StmtKind::While { cond, body },
                    ..stmt
                }
            }
            kind => {
                self.root = match &kind {
                    StmtKind::Assign { expr, .. }
                    | StmtKind::Effect(expr)
                    | StmtKind::Return(expr) => Some(expr.id),
                    _ => None,
                };
                fold::fold_stmt(self, Stmt { kind, ..stmt })?
            }
        };
        let mut out = mem::replace(&mut self.prelude, saved);
        self.root = saved_root;
        out.push(stmt);
        Ok(out)
    }

    fn fold_expr(&mut self, expr: Expr) -> Result<Expr> {
        let opaque = match &expr.kind {
            ExprKind::IfExpr { .. } | ExprKind::ListComp { .. } => true,
            ExprKind::Nary { op, .. } => matches!(op, NaryOpKind::And | NaryOpKind::Or),
            ExprKind::Compare { args, .. } => args.len() > 2,
            _ => false,
        };
        if opaque {
            return Ok(expr);
        }

        let is_root = self.root == Some(expr.id);
        let expr = fold::fold_expr(self, expr)?;
        let callee = match &expr.kind {
            ExprKind::Call {
                callee: Some(Callee::Function(callee)),
                kwargs,
                ..
            } if kwargs.is_empty() => Arc::clone(callee),
            _ => return Ok(expr),
        };
        if !self.is_inlinable(&callee) || !(is_root || Purity::is_pure(&callee)) {
            return Ok(expr);
        }
        match expr.kind {
            ExprKind::Call { args, .. } => self.inline(expr.id, &callee, args),
            kind => Ok(Expr { kind, ..expr }),
        }
    }
}
