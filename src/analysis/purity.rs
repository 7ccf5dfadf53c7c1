//! Side-effect analysis.
//!
//! A function is pure when calling it has no observable effect besides its return value: every
//! call it makes goes to a pure callee, and it never mutates, through an indexed assignment, a
//! list it received from its caller. Assertions may abort evaluation but are not side effects;
//! they are reported as a finding so passes that reorder code can see them.
//!
//! The analysis is best-effort and never fails. If reaching definitions cannot be computed
//! (for example because of an undefined name), every indexed assignment is assumed to mutate an
//! input.

use std::collections::{HashMap, HashSet};

use bitflags::bitflags;

use crate::{
    analysis::{
        defs::{DefId, DefSite, Definition},
        reaching::{ReachingDefs, ReachingDefsAnalysis},
        stmt_table,
    },
    ast::{Block, Callee, Expr, ExprKind, FuncDef, NodeId, Stmt, StmtKind},
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Kinds of effect a function or expression may have
    pub struct Effects : u8 {
        /// An indexed assignment writes into a list owned by the caller
        const MUTATES_INPUT = 0x01;
        /// A call reaches a host function marked impure or an impure FPy function
        const IMPURE_CALL = 0x02;
        /// A call has no resolved callee, so nothing is known about it
        const UNKNOWN_CALL = 0x04;
        /// An assertion may abort evaluation
        const ASSERTION = 0x08;
        /// An indexed assignment writes into a list created locally
        const LOCAL_MUTATION = 0x10;
    }
}

impl Effects {
    /// Effects that make a function impure.
    pub const IMPURE: Effects = Effects::MUTATES_INPUT
        .union(Effects::IMPURE_CALL)
        .union(Effects::UNKNOWN_CALL);
}

/// One reason a function is not trivially effect-free.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// The statement or call expression responsible
    pub site: NodeId,
    /// The effect it has
    pub effect: Effects,
    /// Human readable description
    pub detail: String,
}

/// Entry point of the purity analysis.
pub struct Purity;

impl Purity {
    /// Returns `true` if `func` has no side effect visible to its caller.
    #[must_use]
    pub fn is_pure(func: &FuncDef) -> bool {
        Self::analyze(func).is_pure()
    }

    /// Collects every effect of `func`, in document order.
    #[must_use]
    pub fn analyze(func: &FuncDef) -> PurityAnalysis {
        let reach = ReachingDefs::analyze(func).ok();
        let mut scan = Scan {
            reach: reach.as_ref(),
            stmts: stmt_table(&func.body),
            findings: Vec::new(),
        };
        scan.visit_block(&func.body);
        let effects = scan
            .findings
            .iter()
            .fold(Effects::empty(), |acc, finding| acc | finding.effect);
        PurityAnalysis {
            effects,
            findings: scan.findings,
        }
    }

    /// Returns `true` if evaluating `expr` calls nothing impure or unknown.
    #[must_use]
    pub fn is_pure_expr(expr: &Expr) -> bool {
        let mut findings = Vec::new();
        scan_calls(expr, &mut findings);
        findings.is_empty()
    }

    /// Returns `true` if calling `callee` has no side effect.
    #[must_use]
    pub fn is_pure_callee(callee: &Callee) -> bool {
        match callee {
            Callee::Function(func) => Self::is_pure(func),
            Callee::External(ext) => ext.pure,
        }
    }
}

fn scan_calls(expr: &Expr, findings: &mut Vec<Finding>) {
    if let ExprKind::Call { func, callee, .. } = &expr.kind {
        match callee {
            Some(callee) if Purity::is_pure_callee(callee) => {}
            Some(callee) => findings.push(Finding {
                site: expr.id,
                effect: Effects::IMPURE_CALL,
                detail: format!("call to impure `{}`", callee.name()),
            }),
            None => findings.push(Finding {
                site: expr.id,
                effect: Effects::UNKNOWN_CALL,
                detail: format!("call to unresolved `{func}`"),
            }),
        }
    }
    for child in expr.children() {
        scan_calls(child, findings);
    }
}

struct Scan<'a> {
    reach: Option<&'a ReachingDefsAnalysis>,
    stmts: HashMap<NodeId, &'a Stmt>,
    findings: Vec<Finding>,
}

impl Scan<'_> {
    fn visit_block(&mut self, block: &Block) {
        for stmt in &block.stmts {
            self.visit_stmt(stmt);
        }
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        for expr in stmt.exprs() {
            scan_calls(expr, &mut self.findings);
        }
        match &stmt.kind {
            StmtKind::IndexedAssign { var, .. } => {
                let effect = if self.aliases_input(stmt) {
                    Effects::MUTATES_INPUT
                } else {
                    Effects::LOCAL_MUTATION
                };
                self.findings.push(Finding {
                    site: stmt.id,
                    effect,
                    detail: format!("indexed assignment to `{var}`"),
                });
            }
            StmtKind::Assert { .. } => self.findings.push(Finding {
                site: stmt.id,
                effect: Effects::ASSERTION,
                detail: "assertion".to_string(),
            }),
            _ => {}
        }
        for block in stmt.blocks() {
            self.visit_block(block);
        }
    }

    /// Returns `true` if the list written by an indexed assignment may be a parameter or free
    /// variable, following copies, φs and earlier indexed assignments.
    fn aliases_input(&self, stmt: &Stmt) -> bool {
        let Some(reach) = self.reach else {
            return true;
        };
        let StmtKind::IndexedAssign { var, .. } = &stmt.kind else {
            return false;
        };
        let Some(start) = reach.reaching(stmt.id, var) else {
            return true;
        };

        let mut seen = HashSet::new();
        let mut work = vec![start];
        while let Some(def) = work.pop() {
            if !seen.insert(def) {
                continue;
            }
            match reach.def(def) {
                Some(Definition::Phi(phi)) => work.extend([phi.lhs, phi.rhs]),
                Some(Definition::Assign(assign)) => match assign.site {
                    DefSite::Param(_) | DefSite::Free(_) => return true,
                    DefSite::Comp(_) => {}
                    DefSite::Stmt(site) => work.extend(self.copied_from(reach, site, assign.prev)),
                },
                None => return true,
            }
        }
        false
    }

    /// The definitions an assignment at `site` may alias.
    fn copied_from(
        &self,
        reach: &ReachingDefsAnalysis,
        site: NodeId,
        prev: Option<DefId>,
    ) -> Vec<DefId> {
        let Some(stmt) = self.stmts.get(&site) else {
            return Vec::new();
        };
        match &stmt.kind {
            StmtKind::IndexedAssign { .. } => prev.into_iter().collect(),
            StmtKind::Assign { expr, .. } => match &expr.kind {
                ExprKind::Var(source) => reach.reaching(site, source).into_iter().collect(),
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }
}

/// The result of [`Purity::analyze`].
#[derive(Debug, Clone)]
pub struct PurityAnalysis {
    effects: Effects,
    findings: Vec<Finding>,
}

impl PurityAnalysis {
    /// The union of every effect found.
    #[must_use]
    pub const fn effects(&self) -> Effects {
        self.effects
    }

    /// Every finding, in document order.
    #[must_use]
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// The verdict: no effect in [`Effects::IMPURE`].
    #[must_use]
    pub const fn is_pure(&self) -> bool {
        !self.effects.intersects(Effects::IMPURE)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        ast::ExternalFn,
        test::helpers::{func, scenario_simple, scenario_while},
    };

    fn external(pure: bool) -> Callee {
        Callee::External(Arc::new(ExternalFn {
            name: if pure { "sin".into() } else { "print".into() },
            pure,
            signature: None,
        }))
    }

    #[test]
    fn test_arithmetic_is_pure() {
        assert!(Purity::is_pure(&scenario_simple()));
        assert!(Purity::is_pure(&scenario_while()));
        assert!(Purity::analyze(&scenario_simple()).findings().is_empty());
    }

    #[test]
    fn test_impure_and_unknown_calls() {
        let f = func(
            &["x"],
            vec![
                Stmt::effect(Expr::call("print", Some(external(false)), vec![Expr::var("x")])),
                Stmt::assign("y", Expr::call("sin", Some(external(true)), vec![Expr::var("x")])),
                Stmt::assign("z", Expr::call("mystery", None, vec![Expr::var("y")])),
                Stmt::ret(Expr::var("z")),
            ],
        );
        let analysis = Purity::analyze(&f);
        assert!(!analysis.is_pure());
        assert_eq!(
            analysis.effects(),
            Effects::IMPURE_CALL | Effects::UNKNOWN_CALL
        );
        assert_eq!(analysis.findings().len(), 2);
    }

    #[test]
    fn test_mutating_parameter_vs_local_list() {
        let mutate_param = func(
            &["xs"],
            vec![
                Stmt::indexed_assign("xs", vec![Expr::int(0)], Expr::int(1)),
                Stmt::ret(Expr::var("xs")),
            ],
        );
        assert_eq!(
            Purity::analyze(&mutate_param).effects(),
            Effects::MUTATES_INPUT
        );
        assert!(!Purity::is_pure(&mutate_param));

        let mutate_alias = func(
            &["xs"],
            vec![
                Stmt::assign("ys", Expr::var("xs")),
                Stmt::indexed_assign("ys", vec![Expr::int(0)], Expr::int(1)),
                Stmt::ret(Expr::var("ys")),
            ],
        );
        assert!(!Purity::is_pure(&mutate_alias));

        let mutate_local = func(
            &[],
            vec![
                Stmt::assign("ys", Expr::list(vec![Expr::int(0), Expr::int(0)])),
                Stmt::indexed_assign("ys", vec![Expr::int(0)], Expr::int(1)),
                Stmt::indexed_assign("ys", vec![Expr::int(1)], Expr::int(2)),
                Stmt::ret(Expr::var("ys")),
            ],
        );
        let analysis = Purity::analyze(&mutate_local);
        assert!(analysis.is_pure());
        assert_eq!(analysis.effects(), Effects::LOCAL_MUTATION);
    }

    #[test]
    fn test_assertion_is_reported_but_pure() {
        let f = func(
            &["x"],
            vec![Stmt::assert(Expr::var("x")), Stmt::ret(Expr::var("x"))],
        );
        let analysis = Purity::analyze(&f);
        assert!(analysis.is_pure());
        assert_eq!(analysis.effects(), Effects::ASSERTION);
    }

    #[test]
    fn test_callee_purity_is_transitive() {
        let inner = func(
            &["x"],
            vec![
                Stmt::effect(Expr::call("print", Some(external(false)), vec![Expr::var("x")])),
                Stmt::ret(Expr::var("x")),
            ],
        );
        let call = Expr::call(
            "inner",
            Some(Callee::Function(Arc::new(inner))),
            vec![Expr::var("x")],
        );
        assert!(!Purity::is_pure_expr(&call));
        assert!(Purity::is_pure_expr(&Expr::add(Expr::var("x"), Expr::int(1))));
    }
}
