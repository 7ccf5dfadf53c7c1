//! Live variables.
//!
//! Backward liveness over the structured AST, written as a reducing traversal: each statement
//! maps the set of names live after it to the set live before it. Loops iterate to a fixpoint,
//! which is reached after at most one extra round per nested loop since the sets only grow.
//!
//! Every expression form contributes its reads, including list displays, comparison chains,
//! list references and comprehensions (whose targets are local to the element).

use std::collections::{BTreeSet, HashMap};

use crate::ast::{Binding, Block, Expr, ExprKind, FuncDef, NamedId, NodeId, Stmt, StmtKind};

/// A set of live names.
pub type LiveSet = BTreeSet<NamedId>;

/// Entry point of the live-variable analysis.
pub struct LiveVars;

impl LiveVars {
    /// Computes live-in and live-out sets for every statement of `func`. Never fails.
    #[must_use]
    pub fn analyze(func: &FuncDef) -> LiveAnalysis {
        let mut analysis = LiveAnalysis::default();
        analysis.entry = analysis.visit_block(&func.body, LiveSet::new());
        analysis
    }

    /// Names read by an expression.
    #[must_use]
    pub fn expr_uses(expr: &Expr) -> LiveSet {
        let mut uses = LiveSet::new();
        collect_uses(expr, &mut uses);
        uses
    }
}

fn collect_uses(expr: &Expr, uses: &mut LiveSet) {
    match &expr.kind {
        ExprKind::Var(name) => {
            uses.insert(name.clone());
        }
        ExprKind::ListComp {
            targets,
            iterables,
            elt,
        } => {
            for iterable in iterables {
                collect_uses(iterable, uses);
            }
            let mut inner = LiveVars::expr_uses(elt);
            for target in targets {
                for name in target.names() {
                    inner.remove(name);
                }
            }
            uses.extend(inner);
        }
        _ => {
            for child in expr.children() {
                collect_uses(child, uses);
            }
        }
    }
}

fn kill(live: &mut LiveSet, target: &Binding) {
    for name in target.names() {
        live.remove(name);
    }
}

/// The result of [`LiveVars`].
#[derive(Debug, Clone, Default)]
pub struct LiveAnalysis {
    live_in: HashMap<NodeId, LiveSet>,
    live_out: HashMap<NodeId, LiveSet>,
    entry: LiveSet,
}

impl LiveAnalysis {
    fn visit_block(&mut self, block: &Block, out: LiveSet) -> LiveSet {
        let mut live = out;
        for stmt in block.stmts.iter().rev() {
            live = self.visit_stmt(stmt, live);
        }
        live
    }

    fn visit_stmt(&mut self, stmt: &Stmt, out: LiveSet) -> LiveSet {
        self.live_out.insert(stmt.id, out.clone());
        let live_in = match &stmt.kind {
            StmtKind::Assign { target, expr, .. } => {
                let mut live = out;
                kill(&mut live, target);
                collect_uses(expr, &mut live);
                live
            }
            StmtKind::IndexedAssign { var, indices, expr } => {
                let mut live = out;
                live.insert(var.clone());
                for index in indices {
                    collect_uses(index, &mut live);
                }
                collect_uses(expr, &mut live);
                live
            }
            StmtKind::If1 { cond, body } => {
                let mut live = self.visit_block(body, out.clone());
                live.extend(out);
                collect_uses(cond, &mut live);
                live
            }
            StmtKind::If { cond, ift, iff } => {
                let mut live = self.visit_block(ift, out.clone());
                live.extend(self.visit_block(iff, out));
                collect_uses(cond, &mut live);
                live
            }
            StmtKind::While { cond, body } => {
                let mut head = out.clone();
                collect_uses(cond, &mut head);
                loop {
                    let mut next = self.visit_block(body, head.clone());
                    next.extend(head.iter().cloned());
                    if next == head {
                        break head;
                    }
                    head = next;
                }
            }
            StmtKind::For {
                target,
                iterable,
                body,
            } => {
                let mut head = out.clone();
                loop {
                    let mut body_in = self.visit_block(body, head.clone());
                    kill(&mut body_in, target);
                    let mut next = out.clone();
                    next.extend(body_in);
                    next.extend(head.iter().cloned());
                    if next == head {
                        break;
                    }
                    head = next;
                }
                collect_uses(iterable, &mut head);
                head
            }
            StmtKind::Context { name, ctx, body } => {
                let mut live = self.visit_block(body, out);
                if let Some(name) = name {
                    live.remove(name);
                }
                collect_uses(ctx, &mut live);
                live
            }
            StmtKind::Assert { test, msg } => {
                let mut live = out;
                collect_uses(test, &mut live);
                if let Some(msg) = msg {
                    collect_uses(msg, &mut live);
                }
                live
            }
            StmtKind::Effect(expr) => {
                let mut live = out;
                collect_uses(expr, &mut live);
                live
            }
            StmtKind::Return(expr) => LiveVars::expr_uses(expr),
            StmtKind::Pass => out,
        };
        self.live_in.insert(stmt.id, live_in.clone());
        live_in
    }

    /// Names live just before the statement.
    #[must_use]
    pub fn live_in(&self, stmt: NodeId) -> Option<&LiveSet> {
        self.live_in.get(&stmt)
    }

    /// Names live just after the statement.
    #[must_use]
    pub fn live_out(&self, stmt: NodeId) -> Option<&LiveSet> {
        self.live_out.get(&stmt)
    }

    /// Names live on entry to the function body.
    #[must_use]
    pub const fn entry(&self) -> &LiveSet {
        &self.entry
    }

    /// Returns `true` if `name` is live just after `stmt`.
    #[must_use]
    pub fn is_live_after(&self, stmt: NodeId, name: &NamedId) -> bool {
        self.live_out(stmt).is_some_and(|live| live.contains(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::CompareOp,
        test::helpers::{func, name, scenario_copy, scenario_sum_loop, scenario_while},
    };

    fn set(names: &[&str]) -> LiveSet {
        names.iter().map(|n| name(n)).collect()
    }

    #[test]
    fn test_straight_line() {
        let f = scenario_copy();
        let la = LiveVars::analyze(&f);
        assert_eq!(la.entry(), &set(&["x"]));
        let copy = &f.body.stmts[0];
        assert_eq!(la.live_out(copy.id), Some(&set(&["a"])));
        assert!(la.is_live_after(f.body.stmts[1].id, &name("b")));
    }

    #[test]
    fn test_while_keeps_carried_name_live() {
        let f = scenario_while();
        let la = LiveVars::analyze(&f);
        let body_stmt = match &f.body.stmts[1].kind {
            StmtKind::While { body, .. } => &body.stmts[0],
            _ => unreachable!(),
        };
        assert!(la.is_live_after(body_stmt.id, &name("x")));
        assert_eq!(la.entry(), &LiveSet::new());
    }

    #[test]
    fn test_for_target_is_killed() {
        let f = scenario_sum_loop();
        let la = LiveVars::analyze(&f);
        assert_eq!(la.entry(), &set(&["lst"]));
        let for_stmt = &f.body.stmts[1];
        assert_eq!(la.live_in(for_stmt.id), Some(&set(&["lst", "s"])));
    }

    #[test]
    fn test_list_compare_and_list_ref_reads() {
        let f = func(
            &["a", "b", "c", "xs", "i"],
            vec![Stmt::ret(Expr::list(vec![
                Expr::compare_chain(
                    vec![CompareOp::Lt, CompareOp::Le],
                    vec![Expr::var("a"), Expr::var("b"), Expr::var("c")],
                ),
                Expr::list_ref(Expr::var("xs"), Expr::var("i")),
            ]))],
        );
        let la = LiveVars::analyze(&f);
        assert_eq!(la.entry(), &set(&["a", "b", "c", "i", "xs"]));
    }

    #[test]
    fn test_comprehension_target_is_local() {
        let comp = Expr::list_comp(
            vec![Binding::from("k")],
            vec![Expr::var("xs")],
            Expr::add(Expr::var("k"), Expr::var("d")),
        );
        assert_eq!(LiveVars::expr_uses(&comp), set(&["d", "xs"]));
    }
}
