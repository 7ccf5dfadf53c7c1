//! Context lifting pass.
//!
//! Hoists context constructors whose value is statically known into bindings at the top of the
//! function, so each distinct context is built once and later passes see a plain variable.
//!
//! # Example
//!
//! Before:
//! ```text
//! with IEEEContext(8, 32):
//!     y = x + 1
//! with IEEEContext(8, 32):
//!     z = y * 2
//! ```
//!
//! After:
//! ```text
//! ctx_0 = IEEEContext(8, 32, RNE)
//! with ctx_0:
//!     y = x + 1
//! with ctx_0:
//!     z = y * 2
//! ```
//!
//! The binding holds the context itself as a foreign literal. Equal contexts share one binding.
//! Constructors that are already variables or literals, or whose arguments are not known
//! statically, are left alone.

use std::collections::HashMap;

use crate::{
    analysis::{ContextAnalysis, ContextInfer},
    ast::{
        fold, Context, Expr, ExprKind, Fold, ForeignValue, FuncDef, Gensym, NamedId, Stmt, Symbol,
    },
    compiler::{pass::finish, CompilerContext, EventKind, EventLog, Pass},
    Result,
};

/// Context lifting pass.
pub struct LiftContext;

impl Default for LiftContext {
    fn default() -> Self {
        Self::new()
    }
}

impl LiftContext {
    /// Creates a new context lifting pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Pass for LiftContext {
    fn name(&self) -> &'static str {
        "lift-context"
    }

    fn description(&self) -> &'static str {
        "Hoists statically known context constructors to top-level bindings"
    }

    fn run_on_function(&self, func: &FuncDef, ctx: &CompilerContext) -> Result<(FuncDef, bool)> {
        let analysis = ContextInfer::infer(func)?;
        let changes = EventLog::new();
        let mut lifter = Lifter {
            analysis: &analysis,
            gensym: Gensym::from_func(func),
            names: HashMap::new(),
            bindings: Vec::new(),
            func: &func.name,
            changes: &changes,
            pass: self.name(),
        };
        let mut out = lifter.fold_func(func.clone())?;
        if !lifter.bindings.is_empty() {
            let mut stmts = lifter.bindings;
            stmts.append(&mut out.body.stmts);
            out.body.stmts = stmts;
        }
        finish(self.name(), out, changes, ctx)
    }
}

struct Lifter<'a> {
    analysis: &'a ContextAnalysis,
    gensym: Gensym,
    names: HashMap<Context, NamedId>,
    bindings: Vec<Stmt>,
    func: &'a Symbol,
    changes: &'a EventLog,
    pass: &'static str,
}

impl Lifter<'_> {
    fn binding_for(&mut self, value: &Context) -> NamedId {
        if let Some(name) = self.names.get(value) {
            return name.clone();
        }
        let name = self.gensym.fresh("ctx");
        self.bindings.push(Stmt::assign(
            name.clone(),
            Expr::foreign(ForeignValue::Context(value.clone())),
        ));
        self.names.insert(value.clone(), name.clone());
        name
    }
}

impl Fold for Lifter<'_> {
    fn fold_expr(&mut self, expr: Expr) -> Result<Expr> {
        let analysis = self.analysis;
        if matches!(expr.kind, ExprKind::Context { .. }) {
            if let Some(value) = analysis.value_of_expr(expr.id) {
                let name = self.binding_for(value);
                self.changes
                    .record(EventKind::ContextLifted)
                    .at(self.func, expr.id)
                    .pass(self.pass)
                    .message(format!("{value} as `{name}`"));
                return Ok(Expr {
                    kind: ExprKind::Var(name),
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
    use crate::{ast::StmtKind, test::helpers::func};

    fn fp32_ctor() -> Expr {
        Expr::context("IEEEContext", vec![Expr::int(8), Expr::int(32)])
    }

    #[test]
    fn test_equal_contexts_share_a_binding() {
        let f = func(
            &["x"],
            vec![
                Stmt::context(
                    None,
                    fp32_ctor(),
                    vec![Stmt::assign("y", Expr::add(Expr::var("x"), Expr::int(1)))],
                ),
                Stmt::context(
                    None,
                    fp32_ctor(),
                    vec![Stmt::assign("z", Expr::mul(Expr::var("y"), Expr::int(2)))],
                ),
                Stmt::ret(Expr::var("z")),
            ],
        );
        let ctx = CompilerContext::new();
        let (out, changed) = LiftContext::new().run_on_function(&f, &ctx).unwrap();
        assert!(changed);
        assert_eq!(out.body.len(), 4);
        let StmtKind::Assign { expr, .. } = &out.body.stmts[0].kind else {
            panic!("expected the lifted binding");
        };
        assert_eq!(
            expr.kind,
            ExprKind::Foreign(ForeignValue::Context(Context::fp32()))
        );
        for stmt in &out.body.stmts[1..3] {
            let StmtKind::Context { ctx, .. } = &stmt.kind else {
                panic!("expected a context statement");
            };
            assert!(ctx.as_var().is_some());
        }
        assert_eq!(ctx.events.count(EventKind::ContextLifted), 2);
    }

    #[test]
    fn test_unknown_contexts_stay() {
        let f = func(
            &["x", "p"],
            vec![
                Stmt::context(
                    None,
                    Expr::context("MPFloatContext", vec![Expr::var("p")]),
                    vec![Stmt::assign("y", Expr::var("x"))],
                ),
                Stmt::ret(Expr::var("y")),
            ],
        );
        let ctx = CompilerContext::new();
        let (out, changed) = LiftContext::new().run_on_function(&f, &ctx).unwrap();
        assert!(!changed);
        assert!(out.is_equiv(&f));
    }

    #[test]
    fn test_context_in_assignment_is_lifted() {
        let f = func(
            &["x"],
            vec![
                Stmt::assign("c", fp32_ctor()),
                Stmt::context(None, Expr::var("c"), vec![Stmt::assign("y", Expr::var("x"))]),
                Stmt::ret(Expr::var("y")),
            ],
        );
        let out = LiftContext::new().apply(&f).unwrap();
        let StmtKind::Assign { expr, .. } = &out.body.stmts[1].kind else {
            panic!("expected the original assignment");
        };
        assert!(expr.as_var().is_some());
    }
}
