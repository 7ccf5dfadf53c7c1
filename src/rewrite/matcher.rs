//! Lock-step matching of patterns against a target tree.
//!
//! The matcher walks a pattern and a target together. A pattern variable captures the target
//! subtree it meets; meeting it again requires a structurally equivalent subtree. A free name
//! of the pattern is mapped to the target name it meets, and the mapping must stay a bijection
//! over the names seen so far. Everything else must agree node for node, ignoring ids and
//! locations.
//!
//! A successful lock-step walk is confirmed by instantiating the pattern with the capture and
//! comparing it with the matched region, so a returned [`Subst`] always reproduces the target.
//!
//! [`Matcher::find_all`] enumerates matches in document order: expression patterns pre-order
//! over every expression, statement patterns over every window of every block, where the window
//! starting at a statement precedes the windows inside that statement's nested blocks.

use std::collections::BTreeMap;

use crate::{
    ast::{Binding, Block, Expr, ExprKind, FuncDef, Id, NamedId, NodeId, Stmt, StmtKind, Symbol},
    rewrite::{
        applier::{instantiate, Replacement},
        pattern::{Pattern, PatternKind},
    },
};

/// The bindings produced by a successful match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Subst {
    exprs: BTreeMap<NamedId, Expr>,
    names: BTreeMap<NamedId, NamedId>,
}

impl Subst {
    /// The subtree captured by a pattern variable.
    #[must_use]
    pub fn get(&self, var: &NamedId) -> Option<&Expr> {
        self.exprs.get(var)
    }

    /// The target name a free pattern name was mapped to.
    #[must_use]
    pub fn name_of(&self, free: &NamedId) -> Option<&NamedId> {
        self.names.get(free)
    }

    /// All captures.
    #[must_use]
    pub const fn exprs(&self) -> &BTreeMap<NamedId, Expr> {
        &self.exprs
    }

    /// All free-name mappings.
    #[must_use]
    pub const fn names(&self) -> &BTreeMap<NamedId, NamedId> {
        &self.names
    }
}

/// Where a match was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSite {
    /// An expression node
    Expr(NodeId),
    /// `len` consecutive statements of a block starting at index `start`
    Window {
        /// The block holding the window
        block: NodeId,
        /// Index of the first statement
        start: usize,
        /// Number of statements
        len: usize,
    },
}

/// A located match.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    /// Where the pattern matched
    pub site: MatchSite,
    /// The captures
    pub subst: Subst,
}

/// Matches one pattern against targets.
pub struct Matcher<'p> {
    pattern: &'p Pattern,
}

impl<'p> Matcher<'p> {
    /// Creates a matcher for `pattern`.
    #[must_use]
    pub const fn new(pattern: &'p Pattern) -> Self {
        Self { pattern }
    }

    /// Matches an expression pattern at the root of `target`.
    #[must_use]
    pub fn match_expr(&self, target: &Expr) -> Option<Subst> {
        let PatternKind::Expr(pattern) = self.pattern.kind() else {
            return None;
        };
        let mut state = State::new(self.pattern);
        if !state.expr(pattern, target) {
            return None;
        }
        let subst = state.finish();
        match instantiate(self.pattern, &subst) {
            Ok(Replacement::Expr(rebuilt)) if rebuilt.is_equiv(target) => Some(subst),
            _ => None,
        }
    }

    /// Matches a statement pattern against exactly the statements of `window`.
    #[must_use]
    pub fn match_stmts(&self, window: &[Stmt]) -> Option<Subst> {
        let PatternKind::Stmts(pattern) = self.pattern.kind() else {
            return None;
        };
        if pattern.len() != window.len() {
            return None;
        }
        let mut state = State::new(self.pattern);
        if !state.stmts(pattern, window) {
            return None;
        }
        let subst = state.finish();
        match instantiate(self.pattern, &subst) {
            Ok(Replacement::Stmts(rebuilt))
                if rebuilt.len() == window.len()
                    && rebuilt.iter().zip(window).all(|(a, b)| a.is_equiv(b)) =>
            {
                Some(subst)
            }
            _ => None,
        }
    }

    /// Every match in `func`, in document order. Matches may overlap.
    #[must_use]
    pub fn find_all(&self, func: &FuncDef) -> Vec<Match> {
        let mut found = Vec::new();
        self.find_in_block(&func.body, &mut found);
        found
    }

    fn find_in_block(&self, block: &Block, found: &mut Vec<Match>) {
        let window = self.pattern.window();
        for (index, stmt) in block.stmts.iter().enumerate() {
            if window > 0 && index + window <= block.stmts.len() {
                if let Some(subst) = self.match_stmts(&block.stmts[index..index + window]) {
                    found.push(Match {
                        site: MatchSite::Window {
                            block: block.id,
                            start: index,
                            len: window,
                        },
                        subst,
                    });
                }
            }
            if self.pattern.is_expr() {
                for expr in stmt.exprs() {
                    self.find_in_expr(expr, found);
                }
            }
            for nested in stmt.blocks() {
                self.find_in_block(nested, found);
            }
        }
    }

    fn find_in_expr(&self, expr: &Expr, found: &mut Vec<Match>) {
        if let Some(subst) = self.match_expr(expr) {
            found.push(Match {
                site: MatchSite::Expr(expr.id),
                subst,
            });
        }
        for child in expr.children() {
            self.find_in_expr(child, found);
        }
    }
}

/// Matching state: the captures so far and the free-name bijection.
struct State<'p> {
    pattern: &'p Pattern,
    subst: Subst,
    inverse: BTreeMap<NamedId, NamedId>,
}

impl<'p> State<'p> {
    fn new(pattern: &'p Pattern) -> Self {
        Self {
            pattern,
            subst: Subst::default(),
            inverse: BTreeMap::new(),
        }
    }

    fn finish(self) -> Subst {
        self.subst
    }

    fn capture(&mut self, var: &NamedId, target: &Expr) -> bool {
        match self.subst.exprs.get(var) {
            Some(bound) => bound.is_equiv(target),
            None => {
                self.subst.exprs.insert(var.clone(), target.clone());
                true
            }
        }
    }

    /// Relates a pattern name to a target name, in binder or use position.
    fn name(&mut self, pattern: &NamedId, target: &NamedId) -> bool {
        if self.pattern.is_var(pattern) {
            return self.capture(pattern, &Expr::var(target.clone()));
        }
        if !self.pattern.is_free(pattern) {
            return pattern == target;
        }
        match (self.subst.names.get(pattern), self.inverse.get(target)) {
            (Some(mapped), Some(back)) => mapped == target && back == pattern,
            (None, None) => {
                self.subst.names.insert(pattern.clone(), target.clone());
                self.inverse.insert(target.clone(), pattern.clone());
                true
            }
            _ => false,
        }
    }

    fn opt_name(&mut self, pattern: Option<&NamedId>, target: Option<&NamedId>) -> bool {
        match (pattern, target) {
            (None, None) => true,
            (Some(p), Some(t)) => self.name(p, t),
            _ => false,
        }
    }

    fn binding(&mut self, pattern: &Binding, target: &Binding) -> bool {
        match (pattern, target) {
            (Binding::Id(Id::Underscore), Binding::Id(Id::Underscore)) => true,
            (Binding::Id(Id::Named(p)), Binding::Id(Id::Named(t))) => self.name(p, t),
            (Binding::Tuple(ps), Binding::Tuple(ts)) => {
                ps.len() == ts.len() && ps.iter().zip(ts).all(|(p, t)| self.binding(p, t))
            }
            _ => false,
        }
    }

    fn exprs(&mut self, pattern: &[Expr], target: &[Expr]) -> bool {
        pattern.len() == target.len() && pattern.iter().zip(target).all(|(p, t)| self.expr(p, t))
    }

    fn opt_expr(&mut self, pattern: Option<&Expr>, target: Option<&Expr>) -> bool {
        match (pattern, target) {
            (None, None) => true,
            (Some(p), Some(t)) => self.expr(p, t),
            _ => false,
        }
    }

    fn kwargs(&mut self, pattern: &[(Symbol, Expr)], target: &[(Symbol, Expr)]) -> bool {
        pattern.len() == target.len()
            && pattern
                .iter()
                .zip(target)
                .all(|((pk, pe), (tk, te))| pk == tk && self.expr(pe, te))
    }

    fn expr(&mut self, pattern: &Expr, target: &Expr) -> bool {
        use ExprKind as K;
        match (&pattern.kind, &target.kind) {
            (K::Var(var), _) if self.pattern.is_var(var) => self.capture(var, target),
            (K::Var(p), K::Var(t)) => self.name(p, t),
            (K::Unary { op: o1, arg: a1, .. }, K::Unary { op: o2, arg: a2, .. }) => {
                o1 == o2 && self.expr(a1, a2)
            }
            (
                K::Binary {
                    op: o1,
                    lhs: l1,
                    rhs: r1,
                    ..
                },
                K::Binary {
                    op: o2,
                    lhs: l2,
                    rhs: r2,
                    ..
                },
            ) => o1 == o2 && self.expr(l1, l2) && self.expr(r1, r2),
            (
                K::Ternary {
                    op: o1,
                    first: a1,
                    second: b1,
                    third: c1,
                    ..
                },
                K::Ternary {
                    op: o2,
                    first: a2,
                    second: b2,
                    third: c2,
                    ..
                },
            ) => o1 == o2 && self.expr(a1, a2) && self.expr(b1, b2) && self.expr(c1, c2),
            (K::Nary { op: o1, args: a1, .. }, K::Nary { op: o2, args: a2, .. }) => {
                o1 == o2 && self.exprs(a1, a2)
            }
            (K::Compare { ops: o1, args: a1 }, K::Compare { ops: o2, args: a2 }) => {
                o1 == o2 && self.exprs(a1, a2)
            }
            (
                K::Call {
                    func: f1,
                    args: a1,
                    kwargs: k1,
                    ..
                },
                K::Call {
                    func: f2,
                    args: a2,
                    kwargs: k2,
                    ..
                },
            ) => f1 == f2 && self.exprs(a1, a2) && self.kwargs(k1, k2),
            (K::Tuple(a), K::Tuple(b)) | (K::List(a), K::List(b)) => self.exprs(a, b),
            (
                K::ListComp {
                    targets: t1,
                    iterables: i1,
                    elt: e1,
                },
                K::ListComp {
                    targets: t2,
                    iterables: i2,
                    elt: e2,
                },
            ) => {
                t1.len() == t2.len()
                    && self.exprs(i1, i2)
                    && t1.iter().zip(t2).all(|(p, t)| self.binding(p, t))
                    && self.expr(e1, e2)
            }
            (
                K::ListRef {
                    value: v1,
                    index: i1,
                },
                K::ListRef {
                    value: v2,
                    index: i2,
                },
            ) => self.expr(v1, v2) && self.expr(i1, i2),
            (
                K::ListSlice {
                    value: v1,
                    start: s1,
                    stop: e1,
                },
                K::ListSlice {
                    value: v2,
                    start: s2,
                    stop: e2,
                },
            ) => {
                self.expr(v1, v2)
                    && self.opt_expr(s1.as_deref(), s2.as_deref())
                    && self.opt_expr(e1.as_deref(), e2.as_deref())
            }
            (
                K::ListSet {
                    value: v1,
                    indices: i1,
                    elt: e1,
                },
                K::ListSet {
                    value: v2,
                    indices: i2,
                    elt: e2,
                },
            ) => self.expr(v1, v2) && self.exprs(i1, i2) && self.expr(e1, e2),
            (
                K::IfExpr {
                    cond: c1,
                    ift: t1,
                    iff: f1,
                },
                K::IfExpr {
                    cond: c2,
                    ift: t2,
                    iff: f2,
                },
            ) => self.expr(c1, c2) && self.expr(t1, t2) && self.expr(f1, f2),
            (
                K::Context {
                    ctor: c1,
                    args: a1,
                    kwargs: k1,
                },
                K::Context {
                    ctor: c2,
                    args: a2,
                    kwargs: k2,
                },
            ) => c1 == c2 && self.exprs(a1, a2) && self.kwargs(k1, k2),
            // Leaves compare structurally.
            _ => pattern.children().is_empty() && pattern.is_equiv(target),
        }
    }

    fn stmts(&mut self, pattern: &[Stmt], target: &[Stmt]) -> bool {
        pattern.len() == target.len() && pattern.iter().zip(target).all(|(p, t)| self.stmt(p, t))
    }

    fn block(&mut self, pattern: &Block, target: &Block) -> bool {
        self.stmts(&pattern.stmts, &target.stmts)
    }

    fn stmt(&mut self, pattern: &Stmt, target: &Stmt) -> bool {
        use StmtKind as S;
        match (&pattern.kind, &target.kind) {
            (
                S::Assign {
                    target: b1,
                    ann: n1,
                    expr: e1,
                },
                S::Assign {
                    target: b2,
                    ann: n2,
                    expr: e2,
                },
            ) => n1 == n2 && self.expr(e1, e2) && self.binding(b1, b2),
            (
                S::IndexedAssign {
                    var: v1,
                    indices: i1,
                    expr: e1,
                },
                S::IndexedAssign {
                    var: v2,
                    indices: i2,
                    expr: e2,
                },
            ) => self.exprs(i1, i2) && self.expr(e1, e2) && self.name(v1, v2),
            (S::If1 { cond: c1, body: b1 }, S::If1 { cond: c2, body: b2 })
            | (S::While { cond: c1, body: b1 }, S::While { cond: c2, body: b2 }) => {
                self.expr(c1, c2) && self.block(b1, b2)
            }
            (
                S::If {
                    cond: c1,
                    ift: t1,
                    iff: f1,
                },
                S::If {
                    cond: c2,
                    ift: t2,
                    iff: f2,
                },
            ) => self.expr(c1, c2) && self.block(t1, t2) && self.block(f1, f2),
            (
                S::For {
                    target: b1,
                    iterable: i1,
                    body: y1,
                },
                S::For {
                    target: b2,
                    iterable: i2,
                    body: y2,
                },
            ) => self.expr(i1, i2) && self.binding(b1, b2) && self.block(y1, y2),
            (
                S::Context {
                    name: n1,
                    ctx: c1,
                    body: b1,
                },
                S::Context {
                    name: n2,
                    ctx: c2,
                    body: b2,
                },
            ) => {
                self.expr(c1, c2) && self.opt_name(n1.as_ref(), n2.as_ref()) && self.block(b1, b2)
            }
            (S::Assert { test: t1, msg: m1 }, S::Assert { test: t2, msg: m2 }) => {
                self.expr(t1, t2) && self.opt_expr(m1.as_ref(), m2.as_ref())
            }
            (S::Effect(e1), S::Effect(e2)) | (S::Return(e1), S::Return(e2)) => self.expr(e1, e2),
            (S::Pass, S::Pass) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::{BinaryOpKind, CompareOp},
        test::helpers::{fma_lhs, func, name, scenario_sum_loop},
    };

    fn fma() -> Pattern {
        Pattern::from_func(&fma_lhs()).unwrap()
    }

    fn sum_loop() -> Pattern {
        Pattern::from_func(&func(
            &["xs"],
            vec![
                Stmt::assign("y", Expr::int(0)),
                Stmt::for_loop(
                    "x",
                    Expr::var("xs"),
                    vec![Stmt::assign("y", Expr::add(Expr::var("y"), Expr::var("x")))],
                ),
            ],
        ))
        .unwrap()
    }

    #[test]
    fn test_expression_capture() {
        let pattern = fma();
        let target = Expr::add(
            Expr::mul(Expr::var("x"), Expr::int(2)),
            Expr::binary(BinaryOpKind::Sub, Expr::var("z"), Expr::int(1)),
        );
        let subst = Matcher::new(&pattern).match_expr(&target).unwrap();
        assert!(subst.get(&name("a")).unwrap().is_equiv(&Expr::var("x")));
        assert!(subst.get(&name("b")).unwrap().is_equiv(&Expr::int(2)));
        assert!(matches!(
            subst.get(&name("c")).unwrap().kind,
            ExprKind::Binary {
                op: BinaryOpKind::Sub,
                ..
            }
        ));
        assert!(Matcher::new(&pattern)
            .match_expr(&Expr::mul(Expr::var("x"), Expr::var("y")))
            .is_none());
    }

    #[test]
    fn test_repeated_variable_needs_equivalent_subtrees() {
        let square = func(&["a"], vec![Stmt::effect(Expr::mul(Expr::var("a"), Expr::var("a")))]);
        let pattern = Pattern::from_func(&square).unwrap();
        let matcher = Matcher::new(&pattern);
        let same = Expr::mul(
            Expr::add(Expr::var("x"), Expr::int(1)),
            Expr::add(Expr::var("x"), Expr::int(1)),
        );
        assert!(matcher.match_expr(&same).is_some());
        let different = Expr::mul(Expr::var("x"), Expr::var("y"));
        assert!(matcher.match_expr(&different).is_none());
    }

    #[test]
    fn test_free_names_map_injectively() {
        let pattern = sum_loop();
        let f = scenario_sum_loop();
        let subst = Matcher::new(&pattern)
            .match_stmts(&f.body.stmts[..2])
            .unwrap();
        assert_eq!(subst.name_of(&name("y")), Some(&name("s")));
        assert_eq!(subst.name_of(&name("x")), Some(&name("n")));
        assert!(subst.get(&name("xs")).unwrap().is_equiv(&Expr::var("lst")));

        // `y` and `x` cannot both stand for `s`.
        let collapsed = func(
            &["lst"],
            vec![
                Stmt::assign("s", Expr::int(0)),
                Stmt::for_loop(
                    "s",
                    Expr::var("lst"),
                    vec![Stmt::assign("s", Expr::add(Expr::var("s"), Expr::var("s")))],
                ),
            ],
        );
        assert!(Matcher::new(&pattern)
            .match_stmts(&collapsed.body.stmts)
            .is_none());
    }

    #[test]
    fn test_find_all_is_in_document_order() {
        let pattern = fma();
        let inner = Expr::add(Expr::mul(Expr::var("p"), Expr::var("q")), Expr::var("r"));
        let outer = Expr::add(Expr::mul(inner.clone(), Expr::var("s")), Expr::var("t"));
        let guard = Expr::compare(
            CompareOp::Lt,
            Expr::add(Expr::mul(Expr::var("p"), Expr::var("p")), Expr::int(1)),
            Expr::int(4),
        );
        let f = func(
            &["p", "q", "r", "s", "t"],
            vec![Stmt::if2(
                guard,
                vec![Stmt::ret(outer.clone())],
                vec![Stmt::ret(Expr::int(0))],
            )],
        );
        let found = Matcher::new(&pattern).find_all(&f);
        assert_eq!(found.len(), 3);
        assert_eq!(found[1].site, MatchSite::Expr(outer.id));
        assert_eq!(found[2].site, MatchSite::Expr(inner.id));
    }

    #[test]
    fn test_windows_in_nested_blocks() {
        let pattern = sum_loop();
        let f = scenario_sum_loop();
        let nested = func(
            &["lst", "c"],
            vec![
                Stmt::if1(Expr::var("c"), f.body.stmts[..2].to_vec()),
                Stmt::ret(Expr::var("c")),
            ],
        );
        let found = Matcher::new(&pattern).find_all(&nested);
        assert_eq!(found.len(), 1);
        assert!(matches!(
            found[0].site,
            MatchSite::Window { start: 0, len: 2, .. }
        ));
        assert_eq!(Matcher::new(&pattern).find_all(&f).len(), 1);
    }
}
