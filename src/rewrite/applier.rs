//! Instantiation of patterns.
//!
//! The applier turns a pattern and a capture into a fresh tree: pattern variables are replaced
//! by copies of their captures, free names are renamed to the target names the match mapped
//! them to, and free names the match never saw receive a fresh identifier on every
//! application. Every node of the result has a new id.

use std::collections::BTreeMap;

use crate::{
    ast::{
        fold::{self, Fold},
        names::{refresh_expr, refresh_stmt},
        Expr, ExprKind, Gensym, NamedId, Stmt,
    },
    rewrite::{
        matcher::Subst,
        pattern::{Pattern, PatternKind},
    },
    Error, Result,
};

/// An instantiated pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum Replacement {
    /// Instance of an expression pattern
    Expr(Expr),
    /// Instance of a statement pattern
    Stmts(Vec<Stmt>),
}

/// Instantiates one pattern.
pub struct Applier<'a> {
    pattern: &'a Pattern,
    gensym: &'a mut Gensym,
}

impl<'a> Applier<'a> {
    /// Creates an applier drawing fresh names from `gensym`.
    ///
    /// Seed `gensym` with the names of the function being rewritten.
    pub fn new(pattern: &'a Pattern, gensym: &'a mut Gensym) -> Self {
        Self { pattern, gensym }
    }

    /// Builds one instance of the pattern under `subst`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SubstitutionError`] when the pattern uses a variable `subst` does not
    /// bind, or uses in binder position a variable bound to something other than a name.
    pub fn apply(&mut self, subst: &Subst) -> Result<Replacement> {
        let mut names = BTreeMap::new();
        for free in self.pattern.free_names() {
            let target = match subst.name_of(free) {
                Some(target) => target.clone(),
                None => self.gensym.refresh(free),
            };
            names.insert(free.clone(), target);
        }

        let mut inst = Instantiate {
            pattern: self.pattern,
            subst,
            names: &names,
        };
        match self.pattern.kind() {
            PatternKind::Expr(expr) => {
                let mut expr = inst.fold_expr(expr.clone())?;
                refresh_expr(&mut expr);
                Ok(Replacement::Expr(expr))
            }
            PatternKind::Stmts(stmts) => {
                let mut out = Vec::with_capacity(stmts.len());
                for stmt in stmts {
                    out.extend(inst.fold_stmt(stmt.clone())?);
                }
                for stmt in &mut out {
                    refresh_stmt(stmt);
                }
                Ok(Replacement::Stmts(out))
            }
        }
    }
}

/// Instantiates `pattern` without drawing any fresh name from the function being rewritten.
pub(crate) fn instantiate(pattern: &Pattern, subst: &Subst) -> Result<Replacement> {
    let mut gensym = Gensym::new();
    Applier::new(pattern, &mut gensym).apply(subst)
}

struct Instantiate<'a> {
    pattern: &'a Pattern,
    subst: &'a Subst,
    names: &'a BTreeMap<NamedId, NamedId>,
}

impl Fold for Instantiate<'_> {
    fn fold_expr(&mut self, expr: Expr) -> Result<Expr> {
        if let ExprKind::Var(var) = &expr.kind {
            if self.pattern.is_var(var) {
                return self
                    .subst
                    .get(var)
                    .cloned()
                    .ok_or_else(|| Error::SubstitutionError(var.clone()));
            }
        }
        fold::fold_expr(self, expr)
    }

    fn fold_name(&mut self, name: NamedId) -> Result<NamedId> {
        if self.pattern.is_var(&name) {
            return match self.subst.get(&name).map(|expr| &expr.kind) {
                Some(ExprKind::Var(target)) => Ok(target.clone()),
                _ => Err(Error::SubstitutionError(name)),
            };
        }
        Ok(self.names.get(&name).cloned().unwrap_or(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::{names::all_names, Binding, StmtKind},
        rewrite::matcher::Matcher,
        test::helpers::{fma_lhs, fma_rhs, func, name, scenario_sum_loop},
    };

    #[test]
    fn test_captures_are_copied_with_fresh_ids() {
        let lhs = Pattern::from_func(&fma_lhs()).unwrap();
        let rhs = Pattern::from_func(&fma_rhs()).unwrap();
        let target = Expr::add(Expr::mul(Expr::var("x"), Expr::var("y")), Expr::var("z"));
        let subst = Matcher::new(&lhs).match_expr(&target).unwrap();

        let mut gensym = Gensym::new();
        let Replacement::Expr(out) = Applier::new(&rhs, &mut gensym).apply(&subst).unwrap() else {
            panic!("expected an expression");
        };
        let ExprKind::Ternary { first, .. } = &out.kind else {
            panic!("expected fma");
        };
        assert!(first.is_equiv(&Expr::var("x")));
        let ExprKind::Binary { lhs: product, .. } = &target.kind else {
            unreachable!()
        };
        let ExprKind::Binary { lhs: x, .. } = &product.kind else {
            unreachable!()
        };
        assert_ne!(first.id, x.id);
    }

    #[test]
    fn test_unbound_variable_is_an_error() {
        let lhs = Pattern::from_func(&func(&["a"], vec![Stmt::effect(Expr::var("a"))])).unwrap();
        let rhs = Pattern::from_func(&func(
            &["a", "b"],
            vec![Stmt::effect(Expr::add(Expr::var("a"), Expr::var("b")))],
        ))
        .unwrap();
        let subst = Matcher::new(&lhs).match_expr(&Expr::int(1)).unwrap();
        assert_eq!(
            instantiate(&rhs, &subst),
            Err(Error::SubstitutionError(name("b")))
        );
    }

    #[test]
    fn test_unseen_free_names_are_fresh_per_application() {
        let lhs = Pattern::from_func(&func(&["a"], vec![Stmt::effect(Expr::var("a"))])).unwrap();
        let rhs = Pattern::from_func(&func(
            &["a"],
            vec![
                Stmt::assign("t", Expr::var("a")),
                Stmt::assign("t", Expr::mul(Expr::var("t"), Expr::var("t"))),
            ],
        ))
        .unwrap();
        let subst = Matcher::new(&lhs).match_expr(&Expr::var("x")).unwrap();

        let host = scenario_sum_loop();
        let mut gensym = Gensym::from_func(&host);
        let mut temps = Vec::new();
        for _ in 0..2 {
            let Replacement::Stmts(stmts) = Applier::new(&rhs, &mut gensym).apply(&subst).unwrap()
            else {
                panic!("expected statements");
            };
            let StmtKind::Assign { target, .. } = &stmts[0].kind else {
                panic!("expected an assignment");
            };
            temps.push(target.clone());
        }
        assert_ne!(temps[0], temps[1]);
        for temp in &temps {
            let Binding::Id(id) = temp else { panic!() };
            let temp = id.as_named().unwrap();
            assert_eq!(temp.base(), "t");
            assert!(!all_names(&host).contains(temp));
        }
    }
}
