//! Loop unrolling pass.
//!
//! Unrolls `for` loops by a constant factor `k`: each iteration of the new loop processes `k`
//! consecutive elements of the iterated list, with a fresh copy of the body per element.
//!
//! # Example
//!
//! Before:
//! ```text
//! for x in xs:
//!     s = s + x
//! ```
//!
//! After (strict, `k = 2`):
//! ```text
//! t_0 = xs
//! n_0 = len(t_0)
//! assert fmod(n_0, 2) == 0
//! for i_0 in range(0, n_0, 2):
//!     x_0 = t_0[i_0]
//!     s = s + x_0
//!     x_1 = t_0[i_0 + 1]
//!     s = s + x_1
//! ```
//!
//! The [`UnrollStrategy::Strict`] strategy asserts that the length is a multiple of `k`. The
//! [`UnrollStrategy::Epilogue`] strategy instead runs the unrolled loop over the largest
//! multiple of `k` and finishes the remaining elements in a second, plain loop.
//!
//! Loop targets get fresh names per copy unless a target name is already defined before the
//! loop, since its value after the loop is then observable.

use std::collections::BTreeMap;

use crate::{
    analysis::{ReachingDefs, ReachingDefsAnalysis},
    ast::{
        fold,
        names::{rename_binding, rename_block, refresh_ids},
        BinaryOpKind, Binding, Block, CompareOp, Expr, Fold, FuncDef, Gensym, NamedId, NodeId,
        Stmt, StmtKind, Symbol, TernaryOpKind, UnaryOpKind,
    },
    compiler::{pass::finish, CompilerContext, EventKind, EventLog, Pass},
    Error, Result,
};

/// How the elements left over by an unrolled loop are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnrollStrategy {
    /// Assert that the list length is a multiple of the factor
    #[default]
    Strict,
    /// Process the remainder in a trailing loop
    Epilogue,
}

/// Loop unrolling pass.
#[derive(Debug, Clone)]
pub struct ForUnroll {
    factor: usize,
    strategy: UnrollStrategy,
    index: Option<usize>,
}

impl ForUnroll {
    /// Creates a pass unrolling every `for` loop by `factor` with the strict strategy.
    #[must_use]
    pub fn new(factor: usize) -> Self {
        Self {
            factor,
            strategy: UnrollStrategy::Strict,
            index: None,
        }
    }

    /// Selects the remainder strategy.
    #[must_use]
    pub const fn with_strategy(mut self, strategy: UnrollStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Restricts the pass to the `index`-th `for` loop of the function, counted from zero in
    /// document order.
    #[must_use]
    pub const fn at_loop(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    fn for_loops(block: &Block, out: &mut Vec<NodeId>) {
        for stmt in &block.stmts {
            if matches!(stmt.kind, StmtKind::For { .. }) {
                out.push(stmt.id);
            }
            for inner in stmt.blocks() {
                Self::for_loops(inner, out);
            }
        }
    }
}

impl Pass for ForUnroll {
    fn name(&self) -> &'static str {
        "for-unroll"
    }

    fn description(&self) -> &'static str {
        "Unrolls for loops by a constant factor"
    }

    fn run_on_function(&self, func: &FuncDef, ctx: &CompilerContext) -> Result<(FuncDef, bool)> {
        if self.factor == 0 {
            return Err(Error::InvalidArgument(
                "unroll factor must be positive".to_string(),
            ));
        }
        let mut loops = Vec::new();
        Self::for_loops(&func.body, &mut loops);
        let selected = match self.index {
            Some(index) => vec![*loops.get(index).ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "`{}` has {} for loops, no loop {index}",
                    func.name,
                    loops.len()
                ))
            })?],
            None => loops,
        };

        let changes = EventLog::new();
        if self.factor == 1 || selected.is_empty() {
            return finish(self.name(), func.clone(), changes, ctx);
        }
        let reach = ReachingDefs::analyze(func)?;
        let mut unroller = Unroller {
            config: self,
            selected,
            reach: &reach,
            gensym: Gensym::from_func(func),
            func: &func.name,
            changes: &changes,
        };
        let out = unroller.fold_func(func.clone())?;
        finish(self.name(), out, changes, ctx)
    }
}

struct Unroller<'a> {
    config: &'a ForUnroll,
    selected: Vec<NodeId>,
    reach: &'a ReachingDefsAnalysis,
    gensym: Gensym,
    func: &'a Symbol,
    changes: &'a EventLog,
}

impl Unroller<'_> {
    /// `target = t[i + offset]` followed by a copy of the body.
    fn copy(
        &mut self,
        site: NodeId,
        target: &Binding,
        body: &Block,
        list: &NamedId,
        index: &NamedId,
        offset: usize,
    ) -> Result<Vec<Stmt>> {
        let observable = target.names().into_iter().any(|name| {
            self.reach
                .in_env(site)
                .is_some_and(|env| env.contains_key(name))
        });
        let mut map = BTreeMap::new();
        if !observable {
            for name in target.names() {
                map.insert(name.clone(), self.gensym.refresh(name));
            }
        }

        let position = match offset {
            0 => Expr::var(index.clone()),
            _ => Expr::add(Expr::var(index.clone()), Expr::int(offset)),
        };
        let mut stmts = vec![Stmt::assign(
            rename_binding(target, &map),
            Expr::list_ref(Expr::var(list.clone()), position),
        )];
        stmts.extend(rename_block(refresh_ids(body), &map)?.stmts);
        Ok(stmts)
    }

    fn unroll(
        &mut self,
        stmt: &Stmt,
        target: &Binding,
        iterable: Expr,
        body: &Block,
    ) -> Result<Vec<Stmt>> {
        let k = self.config.factor;
        let list = self.gensym.fresh("t");
        let len = self.gensym.fresh("n");
        let index = self.gensym.fresh("i");
        let fmod = || {
            Expr::binary(
                BinaryOpKind::Fmod,
                Expr::var(len.clone()),
                Expr::int(k),
            )
            .named("fmod")
        };

        let mut out = vec![
            Stmt::assign(list.clone(), iterable),
            Stmt::assign(
                len.clone(),
                Expr::unary(UnaryOpKind::Len, Expr::var(list.clone())).named("len"),
            ),
        ];
        let stop = match self.config.strategy {
            UnrollStrategy::Strict => {
                out.push(Stmt::assert(Expr::compare(
                    CompareOp::Eq,
                    fmod(),
                    Expr::int(0),
                )));
                Expr::var(len.clone())
            }
            UnrollStrategy::Epilogue => {
                let main = self.gensym.fresh("m");
                out.push(Stmt::assign(
                    main.clone(),
                    Expr::sub(Expr::var(len.clone()), fmod()),
                ));
                Expr::var(main)
            }
        };
        let epilogue_start = stop.clone();

        let mut unrolled = Vec::with_capacity(k * (body.len() + 1));
        for offset in 0..k {
            unrolled.extend(self.copy(stmt.id, target, body, &list, &index, offset)?);
        }
        let mut main_loop = Stmt::for_loop(
            index,
            Expr::ternary(TernaryOpKind::Range, Expr::int(0), stop, Expr::int(k)).named("range"),
            unrolled,
        );
        main_loop.loc = stmt.loc.clone();
        out.push(main_loop);

        if self.config.strategy == UnrollStrategy::Epilogue {
            let rest = self.gensym.fresh("i");
            let tail = self.copy(stmt.id, target, body, &list, &rest, 0)?;
            out.push(Stmt::for_loop(
                rest,
                Expr::binary(BinaryOpKind::Range, epilogue_start, Expr::var(len))
                    .named("range"),
                tail,
            ));
        }

        self.changes
            .record(EventKind::LoopUnrolled)
            .at(self.func, stmt.id)
            .pass(self.config.name())
            .message(format!("by {k} ({:?})", self.config.strategy));
        Ok(out)
    }
}

impl Fold for Unroller<'_> {
    fn fold_stmt(&mut self, stmt: Stmt) -> Result<Vec<Stmt>> {
        let stmt = fold::fold_stmt(self, stmt)?;
        if !self.selected.contains(&stmt.id) {
            return Ok(vec![stmt]);
        }
        let StmtKind::For {
            target,
            iterable,
            body,
        } = &stmt.kind
        else {
            return Ok(vec![stmt]);
        };
        self.unroll(&stmt, target, iterable.clone(), body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::helpers::scenario_sum_loop;

    fn loops(block: &Block) -> Vec<&Stmt> {
        block
            .stmts
            .iter()
            .filter(|stmt| matches!(stmt.kind, StmtKind::For { .. }))
            .collect()
    }

    #[test]
    fn test_strict_unroll_by_two() {
        let ctx = CompilerContext::new();
        let (out, changed) = ForUnroll::new(2)
            .run_on_function(&scenario_sum_loop(), &ctx)
            .unwrap();
        assert!(changed);
        // s = 0; t = lst; n = len(t); assert ...; for ...; return s
        assert_eq!(out.body.len(), 6);
        assert!(matches!(out.body.stmts[3].kind, StmtKind::Assert { .. }));
        let StmtKind::For { body, .. } = &loops(&out.body)[0].kind else {
            unreachable!()
        };
        assert_eq!(body.len(), 4);
        assert_eq!(ctx.events.count(EventKind::LoopUnrolled), 1);
    }

    #[test]
    fn test_epilogue_adds_remainder_loop() {
        let out = ForUnroll::new(3)
            .with_strategy(UnrollStrategy::Epilogue)
            .apply(&scenario_sum_loop())
            .unwrap();
        let found = loops(&out.body);
        assert_eq!(found.len(), 2);
        let StmtKind::For { body, .. } = &found[1].kind else {
            unreachable!()
        };
        assert_eq!(body.len(), 2);
        assert!(!out
            .body
            .stmts
            .iter()
            .any(|stmt| matches!(stmt.kind, StmtKind::Assert { .. })));
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(matches!(
            ForUnroll::new(0).apply(&scenario_sum_loop()),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            ForUnroll::new(2).at_loop(1).apply(&scenario_sum_loop()),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_factor_one_is_identity() {
        let f = scenario_sum_loop();
        assert!(ForUnroll::new(1).apply(&f).unwrap().is_equiv(&f));
    }
}
