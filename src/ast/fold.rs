//! Rebuilding traversal.
//!
//! [`Fold`] consumes a tree and produces a new one. Every hook defaults to the matching free
//! function, which folds the children in evaluation order (the same order [`super::visit`]
//! uses) and reassembles the node around them, keeping its id and location. A pass overrides
//! only the hooks for the nodes it rewrites.
//!
//! Statements fold to a `Vec<Stmt>` so a pass can delete a statement (empty vector) or splice
//! several in its place. Every identifier occurrence, whether a use or a binder, is routed
//! through [`Fold::fold_name`], which makes whole-tree renaming a one-method override.

use super::{Binding, Block, Expr, ExprKind, FuncDef, Id, NamedId, Stmt, StmtKind};
use crate::Result;

/// A transforming visitor.
pub trait Fold {
    /// Folds a function definition.
    fn fold_func(&mut self, func: FuncDef) -> Result<FuncDef> {
        fold_func(self, func)
    }

    /// Folds a block.
    fn fold_block(&mut self, block: Block) -> Result<Block> {
        fold_block(self, block)
    }

    /// Folds a statement into its replacement sequence.
    fn fold_stmt(&mut self, stmt: Stmt) -> Result<Vec<Stmt>> {
        Ok(vec![fold_stmt(self, stmt)?])
    }

    /// Folds an expression.
    fn fold_expr(&mut self, expr: Expr) -> Result<Expr> {
        fold_expr(self, expr)
    }

    /// Folds a binding pattern.
    fn fold_binding(&mut self, binding: Binding) -> Result<Binding> {
        fold_binding(self, binding)
    }

    /// Folds one identifier occurrence.
    fn fold_name(&mut self, name: NamedId) -> Result<NamedId> {
        Ok(name)
    }
}

/// Folds the body of a function, leaving the signature untouched.
pub fn fold_func<F: Fold + ?Sized>(f: &mut F, func: FuncDef) -> Result<FuncDef> {
    let body = f.fold_block(func.body)?;
    Ok(FuncDef { body, ..func })
}

/// Folds every statement of a block and concatenates the replacements.
pub fn fold_block<F: Fold + ?Sized>(f: &mut F, block: Block) -> Result<Block> {
    let mut stmts = Vec::with_capacity(block.stmts.len());
    for stmt in block.stmts {
        stmts.extend(f.fold_stmt(stmt)?);
    }
    Ok(Block {
        id: block.id,
        stmts,
    })
}

/// Folds the children of a statement and rebuilds it.
pub fn fold_stmt<F: Fold + ?Sized>(f: &mut F, stmt: Stmt) -> Result<Stmt> {
    let kind = match stmt.kind {
        StmtKind::Assign { target, ann, expr } => {
            let expr = f.fold_expr(expr)?;
            let target = f.fold_binding(target)?;
            StmtKind::Assign { target, ann, expr }
        }
        StmtKind::IndexedAssign { var, indices, expr } => {
            let indices = fold_exprs(f, indices)?;
            let expr = f.fold_expr(expr)?;
            let var = f.fold_name(var)?;
            StmtKind::IndexedAssign { var, indices, expr }
        }
        StmtKind::If1 { cond, body } => {
            let cond = f.fold_expr(cond)?;
            let body = f.fold_block(body)?;
            StmtKind::If1 { cond, body }
        }
        StmtKind::If { cond, ift, iff } => {
            let cond = f.fold_expr(cond)?;
            let ift = f.fold_block(ift)?;
            let iff = f.fold_block(iff)?;
            StmtKind::If { cond, ift, iff }
        }
        StmtKind::While { cond, body } => {
            let cond = f.fold_expr(cond)?;
            let body = f.fold_block(body)?;
            StmtKind::While { cond, body }
        }
        StmtKind::For {
            target,
            iterable,
            body,
        } => {
            let iterable = f.fold_expr(iterable)?;
            let target = f.fold_binding(target)?;
            let body = f.fold_block(body)?;
            StmtKind::For {
                target,
                iterable,
                body,
            }
        }
        StmtKind::Context { name, ctx, body } => {
            let ctx = f.fold_expr(ctx)?;
            let name = name.map(|name| f.fold_name(name)).transpose()?;
            let body = f.fold_block(body)?;
            StmtKind::Context { name, ctx, body }
        }
        StmtKind::Assert { test, msg } => {
            let test = f.fold_expr(test)?;
            let msg = msg.map(|msg| f.fold_expr(msg)).transpose()?;
            StmtKind::Assert { test, msg }
        }
        StmtKind::Effect(expr) => StmtKind::Effect(f.fold_expr(expr)?),
        StmtKind::Return(expr) => StmtKind::Return(f.fold_expr(expr)?),
        StmtKind::Pass => StmtKind::Pass,
    };
    Ok(Stmt {
        id: stmt.id,
        kind,
        loc: stmt.loc,
    })
}

/// Folds every identifier of a binding pattern.
pub fn fold_binding<F: Fold + ?Sized>(f: &mut F, binding: Binding) -> Result<Binding> {
    match binding {
        Binding::Id(Id::Named(name)) => Ok(Binding::Id(Id::Named(f.fold_name(name)?))),
        Binding::Id(Id::Underscore) => Ok(Binding::Id(Id::Underscore)),
        Binding::Tuple(elts) => Ok(Binding::Tuple(
            elts.into_iter()
                .map(|elt| f.fold_binding(elt))
                .collect::<Result<_>>()?,
        )),
    }
}

fn fold_exprs<F: Fold + ?Sized>(f: &mut F, exprs: Vec<Expr>) -> Result<Vec<Expr>> {
    exprs.into_iter().map(|e| f.fold_expr(e)).collect()
}

fn fold_boxed<F: Fold + ?Sized>(f: &mut F, expr: Box<Expr>) -> Result<Box<Expr>> {
    Ok(Box::new(f.fold_expr(*expr)?))
}

fn fold_kwargs<F: Fold + ?Sized>(
    f: &mut F,
    kwargs: Vec<(super::Symbol, Expr)>,
) -> Result<Vec<(super::Symbol, Expr)>> {
    kwargs
        .into_iter()
        .map(|(key, e)| Ok((key, f.fold_expr(e)?)))
        .collect()
}

/// Folds the children of an expression and rebuilds it.
pub fn fold_expr<F: Fold + ?Sized>(f: &mut F, expr: Expr) -> Result<Expr> {
    let kind = match expr.kind {
        ExprKind::Var(name) => ExprKind::Var(f.fold_name(name)?),
        leaf @ (ExprKind::Bool(_)
        | ExprKind::Decnum(_)
        | ExprKind::Hexnum(_)
        | ExprKind::Integer(_)
        | ExprKind::Rational { .. }
        | ExprKind::Digits { .. }
        | ExprKind::Foreign(_)
        | ExprKind::Nullary { .. }) => leaf,
        ExprKind::Unary { op, func, arg } => ExprKind::Unary {
            op,
            func,
            arg: fold_boxed(f, arg)?,
        },
        ExprKind::Binary { op, func, lhs, rhs } => {
            let lhs = fold_boxed(f, lhs)?;
            let rhs = fold_boxed(f, rhs)?;
            ExprKind::Binary { op, func, lhs, rhs }
        }
        ExprKind::Ternary {
            op,
            func,
            first,
            second,
            third,
        } => {
            let first = fold_boxed(f, first)?;
            let second = fold_boxed(f, second)?;
            let third = fold_boxed(f, third)?;
            ExprKind::Ternary {
                op,
                func,
                first,
                second,
                third,
            }
        }
        ExprKind::Nary { op, func, args } => ExprKind::Nary {
            op,
            func,
            args: fold_exprs(f, args)?,
        },
        ExprKind::Compare { ops, args } => ExprKind::Compare {
            ops,
            args: fold_exprs(f, args)?,
        },
        ExprKind::Call {
            func,
            callee,
            args,
            kwargs,
        } => {
            let args = fold_exprs(f, args)?;
            let kwargs = fold_kwargs(f, kwargs)?;
            let func = f.fold_name(func)?;
            ExprKind::Call {
                func,
                callee,
                args,
                kwargs,
            }
        }
        ExprKind::Tuple(elts) => ExprKind::Tuple(fold_exprs(f, elts)?),
        ExprKind::List(elts) => ExprKind::List(fold_exprs(f, elts)?),
        ExprKind::ListComp {
            targets,
            iterables,
            elt,
        } => {
            let iterables = fold_exprs(f, iterables)?;
            let targets = targets
                .into_iter()
                .map(|t| f.fold_binding(t))
                .collect::<Result<_>>()?;
            let elt = fold_boxed(f, elt)?;
            ExprKind::ListComp {
                targets,
                iterables,
                elt,
            }
        }
        ExprKind::ListRef { value, index } => {
            let value = fold_boxed(f, value)?;
            let index = fold_boxed(f, index)?;
            ExprKind::ListRef { value, index }
        }
        ExprKind::ListSlice { value, start, stop } => {
            let value = fold_boxed(f, value)?;
            let start = start.map(|e| fold_boxed(f, e)).transpose()?;
            let stop = stop.map(|e| fold_boxed(f, e)).transpose()?;
            ExprKind::ListSlice { value, start, stop }
        }
        ExprKind::ListSet {
            value,
            indices,
            elt,
        } => {
            let value = fold_boxed(f, value)?;
            let indices = fold_exprs(f, indices)?;
            let elt = fold_boxed(f, elt)?;
            ExprKind::ListSet {
                value,
                indices,
                elt,
            }
        }
        ExprKind::IfExpr { cond, ift, iff } => {
            let cond = fold_boxed(f, cond)?;
            let ift = fold_boxed(f, ift)?;
            let iff = fold_boxed(f, iff)?;
            ExprKind::IfExpr { cond, ift, iff }
        }
        ExprKind::Context { ctor, args, kwargs } => {
            let args = fold_exprs(f, args)?;
            let kwargs = fold_kwargs(f, kwargs)?;
            ExprKind::Context { ctor, args, kwargs }
        }
    };
    Ok(Expr {
        id: expr.id,
        kind,
        loc: expr.loc,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;

    struct DoubleInts;

    impl Fold for DoubleInts {
        fn fold_expr(&mut self, expr: Expr) -> Result<Expr> {
            let expr = fold_expr(self, expr)?;
            match expr.kind {
                ExprKind::Integer(n) => Ok(Expr {
                    kind: ExprKind::Integer(n * 2),
                    ..expr
                }),
                _ => Ok(expr),
            }
        }
    }

    struct DropPass;

    impl Fold for DropPass {
        fn fold_stmt(&mut self, stmt: Stmt) -> Result<Vec<Stmt>> {
            if matches!(stmt.kind, StmtKind::Pass) {
                return Ok(Vec::new());
            }
            Ok(vec![fold_stmt(self, stmt)?])
        }
    }

    #[test]
    fn test_fold_rebuilds_and_keeps_ids() {
        let stmt = Stmt::assign("y", Expr::add(Expr::var("x"), Expr::int(2)));
        let id = stmt.id;
        let folded = DoubleInts.fold_stmt(stmt).unwrap();
        assert_eq!(folded.len(), 1);
        assert_eq!(folded[0].id, id);
        let expected = Stmt::assign("y", Expr::add(Expr::var("x"), Expr::int(4)));
        assert!(folded[0].is_equiv(&expected));
    }

    #[test]
    fn test_fold_can_delete_statements() {
        let block = Block::new(vec![
            Stmt::pass(),
            Stmt::if1(Expr::boolean(true), vec![Stmt::pass(), Stmt::ret(Expr::int(1))]),
        ]);
        let folded = DropPass.fold_block(block).unwrap();
        assert_eq!(folded.len(), 1);
        let StmtKind::If1 { body, .. } = &folded.stmts[0].kind else {
            panic!("expected if statement");
        };
        assert_eq!(body.len(), 1);
    }
}
