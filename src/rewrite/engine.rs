//! Rewrite rules and their application to functions.
//!
//! A [`Rewrite`] pairs a left-hand side pattern with a right-hand side of the same shape.
//! [`Rewrite::apply`] replaces one occurrence, numbered in the document order of
//! [`Matcher::find_all`]; [`Rewrite::apply_all`] replaces every occurrence in a single
//! traversal. Expression rules are applied bottom-up, so a rewritten operand can take part in
//! a match of its parent. Statement rules scan each block from the top and resume after the
//! window they replaced, so a replacement is never matched again in the same traversal.

use crate::{
    ast::{
        fold::{self, Fold},
        Block, Expr, FuncDef, Gensym, Stmt, Symbol,
    },
    rewrite::{
        applier::{Applier, Replacement},
        matcher::{Match, Matcher, Subst},
        pattern::Pattern,
    },
    Error, Result,
};

/// Counts reported by an application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteStats {
    /// Matches in the input function
    pub matches: usize,
    /// Replacements performed
    pub applications: usize,
}

/// A rewrite rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Rewrite {
    name: Symbol,
    lhs: Pattern,
    rhs: Pattern,
}

impl Rewrite {
    /// Creates a rule.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] when one side is an expression pattern and the other
    /// a statement pattern.
    pub fn new(name: impl Into<Symbol>, lhs: Pattern, rhs: Pattern) -> Result<Self> {
        if lhs.is_expr() != rhs.is_expr() {
            return Err(Error::InvalidPattern {
                name: rhs.name().clone(),
                reason: format!(
                    "right-hand side does not have the shape of `{}`",
                    lhs.name()
                ),
            });
        }
        Ok(Self {
            name: name.into(),
            lhs,
            rhs,
        })
    }

    /// Creates a rule from two pattern functions.
    ///
    /// # Errors
    ///
    /// See [`Pattern::from_func`] and [`Rewrite::new`].
    pub fn from_funcs(name: impl Into<Symbol>, lhs: &FuncDef, rhs: &FuncDef) -> Result<Self> {
        Self::new(name, Pattern::from_func(lhs)?, Pattern::from_func(rhs)?)
    }

    /// The rule with its sides swapped.
    #[must_use]
    pub fn inverse(&self) -> Self {
        Self {
            name: Symbol::from(format!("{}_inverse", self.name)),
            lhs: self.rhs.clone(),
            rhs: self.lhs.clone(),
        }
    }

    /// The rule name.
    #[must_use]
    pub fn name(&self) -> &Symbol {
        &self.name
    }

    /// The left-hand side.
    #[must_use]
    pub const fn lhs(&self) -> &Pattern {
        &self.lhs
    }

    /// The right-hand side.
    #[must_use]
    pub const fn rhs(&self) -> &Pattern {
        &self.rhs
    }

    /// Every occurrence of the left-hand side in `func`, in document order.
    #[must_use]
    pub fn matches(&self, func: &FuncDef) -> Vec<Match> {
        Matcher::new(&self.lhs).find_all(func)
    }

    /// Replaces the occurrence numbered `occurrence` (default: the first).
    ///
    /// # Errors
    ///
    /// - [`Error::RewriteNoMatch`] if fewer occurrences exist
    /// - [`Error::SubstitutionError`] if the right-hand side uses an unbound variable
    pub fn apply(
        &self,
        func: &FuncDef,
        occurrence: Option<usize>,
    ) -> Result<(FuncDef, RewriteStats)> {
        let requested = occurrence.unwrap_or(0);
        let found = self.matches(func).len();
        if requested >= found {
            return Err(Error::RewriteNoMatch {
                rule: self.name.clone(),
                requested,
                found,
            });
        }
        let mut driver = Driver::new(self, func, Some(requested));
        let out = driver.fold_func(func.clone())?;
        log::trace!(
            "rewrite `{}` applied occurrence {} in `{}`",
            self.name,
            requested,
            func.name
        );
        Ok((
            out,
            RewriteStats {
                matches: found,
                applications: driver.applied,
            },
        ))
    }

    /// Replaces every occurrence.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SubstitutionError`] if the right-hand side uses an unbound variable.
    pub fn apply_all(&self, func: &FuncDef) -> Result<(FuncDef, RewriteStats)> {
        let found = self.matches(func).len();
        let mut driver = Driver::new(self, func, None);
        let out = driver.fold_func(func.clone())?;
        log::trace!(
            "rewrite `{}` applied {} times in `{}`",
            self.name,
            driver.applied,
            func.name
        );
        Ok((
            out,
            RewriteStats {
                matches: found,
                applications: driver.applied,
            },
        ))
    }
}

/// Drives one traversal: either every occurrence, or only occurrence `target`.
struct Driver<'r> {
    rule: &'r Rewrite,
    gensym: Gensym,
    target: Option<usize>,
    seen: usize,
    applied: usize,
}

impl<'r> Driver<'r> {
    fn new(rule: &'r Rewrite, func: &FuncDef, target: Option<usize>) -> Self {
        Self {
            rule,
            gensym: Gensym::from_func(func),
            target,
            seen: 0,
            applied: 0,
        }
    }

    fn done(&self) -> bool {
        self.target.is_some() && self.applied > 0
    }

    /// Decides whether a match found at the current position is replaced.
    fn select(&mut self) -> bool {
        match self.target {
            None => true,
            Some(target) if self.seen == target => true,
            Some(_) => {
                self.seen += 1;
                false
            }
        }
    }

    fn instantiate(&mut self, subst: &Subst) -> Result<Replacement> {
        self.applied += 1;
        Applier::new(&self.rule.rhs, &mut self.gensym).apply(subst)
    }
}

impl Fold for Driver<'_> {
    fn fold_expr(&mut self, expr: Expr) -> Result<Expr> {
        if !self.rule.lhs.is_expr() || self.done() {
            return Ok(expr);
        }
        let rule = self.rule;
        let matcher = Matcher::new(&rule.lhs);
        if self.target.is_some() {
            if let Some(subst) = matcher.match_expr(&expr) {
                if self.select() {
                    return match self.instantiate(&subst)? {
                        Replacement::Expr(out) => Ok(out),
                        Replacement::Stmts(_) => Ok(expr),
                    };
                }
            }
            return fold::fold_expr(self, expr);
        }

        let expr = fold::fold_expr(self, expr)?;
        match matcher.match_expr(&expr) {
            Some(subst) => match self.instantiate(&subst)? {
                Replacement::Expr(out) => Ok(out),
                Replacement::Stmts(_) => Ok(expr),
            },
            None => Ok(expr),
        }
    }

    fn fold_block(&mut self, block: Block) -> Result<Block> {
        let window = self.rule.lhs.window();
        if window == 0 {
            return fold::fold_block(self, block);
        }

        let mut stmts: Vec<Stmt> = Vec::with_capacity(block.stmts.len());
        let mut rest = block.stmts.into_iter();
        let mut pending: Vec<Stmt> = Vec::new();
        loop {
            while pending.len() < window {
                match rest.next() {
                    Some(stmt) => pending.push(stmt),
                    None => break,
                }
            }
            if pending.is_empty() {
                break;
            }
            if !self.done() && pending.len() == window {
                if let Some(subst) = Matcher::new(&self.rule.lhs).match_stmts(&pending) {
                    if self.select() {
                        if let Replacement::Stmts(out) = self.instantiate(&subst)? {
                            stmts.extend(out);
                            pending.clear();
                            continue;
                        }
                    }
                }
            }
            let head = pending.remove(0);
            if self.done() {
                stmts.push(head);
            } else {
                stmts.extend(self.fold_stmt(head)?);
            }
        }
        Ok(Block {
            id: block.id,
            stmts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::{ExprKind, StmtKind, TernaryOpKind, UnaryOpKind},
        test::helpers::{fma_lhs, fma_rhs, func, scenario_sum_loop},
    };

    fn fma_rule() -> Rewrite {
        Rewrite::from_funcs("fma", &fma_lhs(), &fma_rhs()).unwrap()
    }

    fn sum_rule() -> Rewrite {
        let lhs = func(
            &["xs"],
            vec![
                Stmt::assign("y", Expr::int(0)),
                Stmt::for_loop(
                    "x",
                    Expr::var("xs"),
                    vec![Stmt::assign("y", Expr::add(Expr::var("y"), Expr::var("x")))],
                ),
            ],
        );
        let rhs = func(
            &["xs"],
            vec![Stmt::assign(
                "y",
                Expr::unary(UnaryOpKind::Sum, Expr::var("xs")).named("sum"),
            )],
        );
        Rewrite::from_funcs("sum", &lhs, &rhs).unwrap()
    }

    fn nested_fma() -> FuncDef {
        let inner = Expr::add(Expr::mul(Expr::var("a"), Expr::var("b")), Expr::var("c"));
        func(
            &["a", "b", "c", "d", "e"],
            vec![Stmt::ret(Expr::add(
                Expr::mul(inner, Expr::var("d")),
                Expr::var("e"),
            ))],
        )
    }

    #[test]
    fn test_apply_all_nests_bottom_up() {
        let f = nested_fma();
        let (out, stats) = fma_rule().apply_all(&f).unwrap();
        assert_eq!(
            stats,
            RewriteStats {
                matches: 2,
                applications: 2
            }
        );
        let StmtKind::Return(ret) = &out.body.stmts[0].kind else {
            panic!("expected return");
        };
        let ExprKind::Ternary {
            op: TernaryOpKind::Fma,
            first,
            ..
        } = &ret.kind
        else {
            panic!("expected fma");
        };
        assert!(matches!(
            first.kind,
            ExprKind::Ternary {
                op: TernaryOpKind::Fma,
                ..
            }
        ));
    }

    #[test]
    fn test_apply_selects_occurrence() {
        let f = nested_fma();
        let (out, stats) = fma_rule().apply(&f, Some(1)).unwrap();
        assert_eq!(stats.applications, 1);
        let StmtKind::Return(ret) = &out.body.stmts[0].kind else {
            panic!("expected return");
        };
        // The outer sum is untouched, the inner one is rewritten.
        assert!(matches!(ret.kind, ExprKind::Binary { .. }));
        assert_eq!(fma_rule().matches(&out).len(), 1);

        assert_eq!(
            fma_rule().apply(&f, Some(2)),
            Err(Error::RewriteNoMatch {
                rule: Symbol::from("fma"),
                requested: 2,
                found: 2
            })
        );
    }

    #[test]
    fn test_statement_window_is_replaced() {
        let f = scenario_sum_loop();
        let (out, stats) = sum_rule().apply(&f, None).unwrap();
        assert_eq!(stats.matches, 1);
        let expected = func(
            &["lst"],
            vec![
                Stmt::assign(
                    "s",
                    Expr::unary(UnaryOpKind::Sum, Expr::var("lst")).named("sum"),
                ),
                Stmt::ret(Expr::var("s")),
            ],
        );
        assert!(out.body.is_equiv(&expected.body));
    }

    #[test]
    fn test_inverse_restores_the_original() {
        let f = nested_fma();
        let rule = fma_rule();
        let (forward, _) = rule.apply_all(&f).unwrap();
        let (back, stats) = rule.inverse().apply_all(&forward).unwrap();
        assert_eq!(stats.applications, 2);
        assert!(back.is_equiv(&f));
    }

    #[test]
    fn test_mismatched_shapes_are_rejected() {
        let stmt_rhs = func(&["a", "b", "c"], vec![Stmt::ret(Expr::var("a"))]);
        assert!(matches!(
            Rewrite::from_funcs("bad", &fma_lhs(), &stmt_rhs),
            Err(Error::InvalidPattern { .. })
        ));
    }
}
