//! Read-only traversal.
//!
//! [`Visit`] has one hook per syntactic category. The default implementation of each hook calls
//! the matching `walk_*` function, which dispatches on the node's variant and visits every child
//! in evaluation order. Implementors override the hooks they care about and call the `walk_*`
//! function to continue the descent.
//!
//! # Example
//!
//! ```rust
//! use fpy_core::ast::{visit::{self, Visit}, Expr, ExprKind};
//!
//! struct CountVars(usize);
//!
//! impl Visit for CountVars {
//!     fn visit_expr(&mut self, expr: &Expr) {
//!         if let ExprKind::Var(_) = expr.kind {
//!             self.0 += 1;
//!         }
//!         visit::walk_expr(self, expr);
//!     }
//! }
//!
//! let mut counter = CountVars(0);
//! counter.visit_expr(&Expr::add(Expr::var("x"), Expr::var("y")));
//! assert_eq!(counter.0, 2);
//! ```

use super::{Binding, Block, Expr, ExprKind, FuncDef, NodeId, Stmt, StmtKind};

/// A read-only visitor over the AST.
pub trait Visit {
    /// Visits a function definition.
    fn visit_func(&mut self, func: &FuncDef) {
        walk_func(self, func);
    }

    /// Visits a block.
    fn visit_block(&mut self, block: &Block) {
        walk_block(self, block);
    }

    /// Visits a statement.
    fn visit_stmt(&mut self, stmt: &Stmt) {
        walk_stmt(self, stmt);
    }

    /// Visits an expression.
    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }

    /// Visits a binding pattern. `site` is the statement or comprehension that binds it.
    fn visit_binding(&mut self, _binding: &Binding, _site: NodeId) {}
}

/// Visits the body of a function.
pub fn walk_func<V: Visit + ?Sized>(v: &mut V, func: &FuncDef) {
    v.visit_block(&func.body);
}

/// Visits every statement of a block in order.
pub fn walk_block<V: Visit + ?Sized>(v: &mut V, block: &Block) {
    for stmt in &block.stmts {
        v.visit_stmt(stmt);
    }
}

/// Visits the children of a statement in evaluation order.
pub fn walk_stmt<V: Visit + ?Sized>(v: &mut V, stmt: &Stmt) {
    match &stmt.kind {
        StmtKind::Assign { target, expr, .. } => {
            v.visit_expr(expr);
            v.visit_binding(target, stmt.id);
        }
        StmtKind::IndexedAssign { indices, expr, .. } => {
            for index in indices {
                v.visit_expr(index);
            }
            v.visit_expr(expr);
        }
        StmtKind::If1 { cond, body } | StmtKind::While { cond, body } => {
            v.visit_expr(cond);
            v.visit_block(body);
        }
        StmtKind::If { cond, ift, iff } => {
            v.visit_expr(cond);
            v.visit_block(ift);
            v.visit_block(iff);
        }
        StmtKind::For {
            target,
            iterable,
            body,
        } => {
            v.visit_expr(iterable);
            v.visit_binding(target, stmt.id);
            v.visit_block(body);
        }
        StmtKind::Context { ctx, body, .. } => {
            v.visit_expr(ctx);
            v.visit_block(body);
        }
        StmtKind::Assert { test, msg } => {
            v.visit_expr(test);
            if let Some(msg) = msg {
                v.visit_expr(msg);
            }
        }
        StmtKind::Effect(expr) | StmtKind::Return(expr) => v.visit_expr(expr),
        StmtKind::Pass => {}
    }
}

/// Visits the children of an expression in evaluation order.
pub fn walk_expr<V: Visit + ?Sized>(v: &mut V, expr: &Expr) {
    if let ExprKind::ListComp {
        targets,
        iterables,
        elt,
    } = &expr.kind
    {
        for iterable in iterables {
            v.visit_expr(iterable);
        }
        for target in targets {
            v.visit_binding(target, expr.id);
        }
        v.visit_expr(elt);
        return;
    }
    for child in expr.children() {
        v.visit_expr(child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;

    #[derive(Default)]
    struct Trace(Vec<String>);

    impl Visit for Trace {
        fn visit_expr(&mut self, expr: &Expr) {
            if let ExprKind::Var(name) = &expr.kind {
                self.0.push(name.to_string());
            }
            walk_expr(self, expr);
        }

        fn visit_binding(&mut self, binding: &Binding, _site: NodeId) {
            for name in binding.names() {
                self.0.push(format!("bind:{name}"));
            }
        }
    }

    #[test]
    fn test_walk_order_is_evaluation_order() {
        let func = FuncDef::new(
            "f",
            vec![Argument::new("xs")],
            Block::new(vec![
                Stmt::assign("y", Expr::add(Expr::var("a"), Expr::var("b"))),
                Stmt::for_loop(
                    "x",
                    Expr::var("xs"),
                    vec![Stmt::assign("y", Expr::var("x"))],
                ),
                Stmt::ret(Expr::var("y")),
            ]),
        );

        let mut trace = Trace::default();
        trace.visit_func(&func);
        assert_eq!(
            trace.0,
            vec!["a", "b", "bind:y", "xs", "bind:x", "x", "bind:y", "y"]
        );
    }

    #[test]
    fn test_comprehension_binds_before_element() {
        let comp = Expr::list_comp(
            vec![Binding::from("i")],
            vec![Expr::var("xs")],
            Expr::var("i"),
        );
        let mut trace = Trace::default();
        trace.visit_expr(&comp);
        assert_eq!(trace.0, vec!["xs", "bind:i", "i"]);
    }
}
