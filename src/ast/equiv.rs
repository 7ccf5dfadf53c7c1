//! Structural equivalence.
//!
//! `is_equiv` compares two trees by variant and children. It ignores node ids, source locations
//! and the cosmetic spelling of named operator nodes, so `sqrt(x)` written as a method call is
//! equivalent to the anonymous built-in form.

use super::{Argument, Block, Expr, ExprKind, FuncDef, Stmt, StmtKind};

fn all_equiv(a: &[Expr], b: &[Expr]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.is_equiv(y))
}

fn kwargs_equiv(a: &[(super::Symbol, Expr)], b: &[(super::Symbol, Expr)]) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b)
            .all(|((ka, ea), (kb, eb))| ka == kb && ea.is_equiv(eb))
}

fn opt_equiv(a: Option<&Expr>, b: Option<&Expr>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => x.is_equiv(y),
        _ => false,
    }
}

impl Expr {
    /// Returns `true` if both expressions have the same structure.
    #[must_use]
    pub fn is_equiv(&self, other: &Expr) -> bool {
        use ExprKind as K;
        match (&self.kind, &other.kind) {
            (K::Var(a), K::Var(b)) => a == b,
            (K::Bool(a), K::Bool(b)) => a == b,
            (K::Decnum(a), K::Decnum(b)) | (K::Hexnum(a), K::Hexnum(b)) => a == b,
            (K::Integer(a), K::Integer(b)) => a == b,
            (K::Rational { p: p1, q: q1 }, K::Rational { p: p2, q: q2 }) => p1 == p2 && q1 == q2,
            (
                K::Digits {
                    m: m1,
                    e: e1,
                    b: b1,
                },
                K::Digits {
                    m: m2,
                    e: e2,
                    b: b2,
                },
            ) => m1 == m2 && e1 == e2 && b1 == b2,
            (K::Foreign(a), K::Foreign(b)) => a == b,
            (K::Nullary { op: a, .. }, K::Nullary { op: b, .. }) => a == b,
            (
                K::Unary {
                    op: o1, arg: a1, ..
                },
                K::Unary {
                    op: o2, arg: a2, ..
                },
            ) => o1 == o2 && a1.is_equiv(a2),
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
            ) => o1 == o2 && l1.is_equiv(l2) && r1.is_equiv(r2),
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
            ) => o1 == o2 && a1.is_equiv(a2) && b1.is_equiv(b2) && c1.is_equiv(c2),
            (
                K::Nary {
                    op: o1, args: a1, ..
                },
                K::Nary {
                    op: o2, args: a2, ..
                },
            ) => o1 == o2 && all_equiv(a1, a2),
            (K::Compare { ops: o1, args: a1 }, K::Compare { ops: o2, args: a2 }) => {
                o1 == o2 && all_equiv(a1, a2)
            }
            (
                K::Call {
                    func: f1,
                    callee: c1,
                    args: a1,
                    kwargs: k1,
                },
                K::Call {
                    func: f2,
                    callee: c2,
                    args: a2,
                    kwargs: k2,
                },
            ) => f1 == f2 && c1 == c2 && all_equiv(a1, a2) && kwargs_equiv(k1, k2),
            (K::Tuple(a), K::Tuple(b)) | (K::List(a), K::List(b)) => all_equiv(a, b),
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
            ) => t1 == t2 && all_equiv(i1, i2) && e1.is_equiv(e2),
            (
                K::ListRef {
                    value: v1,
                    index: i1,
                },
                K::ListRef {
                    value: v2,
                    index: i2,
                },
            ) => v1.is_equiv(v2) && i1.is_equiv(i2),
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
                v1.is_equiv(v2)
                    && opt_equiv(s1.as_deref(), s2.as_deref())
                    && opt_equiv(e1.as_deref(), e2.as_deref())
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
            ) => v1.is_equiv(v2) && all_equiv(i1, i2) && e1.is_equiv(e2),
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
            ) => c1.is_equiv(c2) && t1.is_equiv(t2) && f1.is_equiv(f2),
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
            ) => c1 == c2 && all_equiv(a1, a2) && kwargs_equiv(k1, k2),
            _ => false,
        }
    }
}

impl Stmt {
    /// Returns `true` if both statements have the same structure.
    #[must_use]
    pub fn is_equiv(&self, other: &Stmt) -> bool {
        use StmtKind as S;
        match (&self.kind, &other.kind) {
            (
                S::Assign {
                    target: t1,
                    ann: a1,
                    expr: e1,
                },
                S::Assign {
                    target: t2,
                    ann: a2,
                    expr: e2,
                },
            ) => t1 == t2 && a1 == a2 && e1.is_equiv(e2),
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
            ) => v1 == v2 && all_equiv(i1, i2) && e1.is_equiv(e2),
            (S::If1 { cond: c1, body: b1 }, S::If1 { cond: c2, body: b2 })
            | (S::While { cond: c1, body: b1 }, S::While { cond: c2, body: b2 }) => {
                c1.is_equiv(c2) && b1.is_equiv(b2)
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
            ) => c1.is_equiv(c2) && t1.is_equiv(t2) && f1.is_equiv(f2),
            (
                S::For {
                    target: t1,
                    iterable: i1,
                    body: b1,
                },
                S::For {
                    target: t2,
                    iterable: i2,
                    body: b2,
                },
            ) => t1 == t2 && i1.is_equiv(i2) && b1.is_equiv(b2),
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
            ) => n1 == n2 && c1.is_equiv(c2) && b1.is_equiv(b2),
            (S::Assert { test: t1, msg: m1 }, S::Assert { test: t2, msg: m2 }) => {
                t1.is_equiv(t2) && opt_equiv(m1.as_ref(), m2.as_ref())
            }
            (S::Effect(a), S::Effect(b)) | (S::Return(a), S::Return(b)) => a.is_equiv(b),
            (S::Pass, S::Pass) => true,
            _ => false,
        }
    }
}

impl Block {
    /// Returns `true` if both blocks have pairwise equivalent statements.
    #[must_use]
    pub fn is_equiv(&self, other: &Block) -> bool {
        self.stmts.len() == other.stmts.len()
            && self
                .stmts
                .iter()
                .zip(&other.stmts)
                .all(|(a, b)| a.is_equiv(b))
    }
}

impl Argument {
    /// Returns `true` if both parameters have the same name and annotation.
    #[must_use]
    pub fn is_equiv(&self, other: &Argument) -> bool {
        self.name == other.name && self.ann == other.ann
    }
}

impl FuncDef {
    /// Returns `true` if both functions have the same signature, context and body.
    ///
    /// Metadata and the captured environment are not compared.
    #[must_use]
    pub fn is_equiv(&self, other: &FuncDef) -> bool {
        self.name == other.name
            && self.args.len() == other.args.len()
            && self
                .args
                .iter()
                .zip(&other.args)
                .all(|(a, b)| a.is_equiv(b))
            && self.free_vars == other.free_vars
            && self.ctx == other.ctx
            && self.body.is_equiv(&other.body)
    }
}
