//! Function builders for unit tests.

use crate::ast::{
    Argument, Binding, Block, CompareOp, Expr, FuncDef, NamedId, Stmt, TernaryOpKind,
};

/// Shorthand for a user identifier.
pub fn name(base: &str) -> NamedId {
    NamedId::new(base)
}

/// Wraps statements into a function with the given parameters.
pub fn func(params: &[&str], stmts: Vec<Stmt>) -> FuncDef {
    FuncDef::new(
        "f",
        params.iter().map(|p| Argument::new(*p)).collect(),
        Block::new(stmts),
    )
}

/// ```text
/// def f(x):
///     y = x + 1
///     return y
/// ```
pub fn scenario_simple() -> FuncDef {
    func(
        &["x"],
        vec![
            Stmt::assign("y", Expr::add(Expr::var("x"), Expr::int(1))),
            Stmt::ret(Expr::var("y")),
        ],
    )
}

/// ```text
/// def f(x):
///     if x > 0:
///         y = 1
///     else:
///         y = 2
///     return y
/// ```
pub fn scenario_if_merge() -> FuncDef {
    func(
        &["x"],
        vec![
            Stmt::if2(
                Expr::compare(CompareOp::Gt, Expr::var("x"), Expr::int(0)),
                vec![Stmt::assign("y", Expr::int(1))],
                vec![Stmt::assign("y", Expr::int(2))],
            ),
            Stmt::ret(Expr::var("y")),
        ],
    )
}

/// ```text
/// def f():
///     x = 0
///     while x < 10:
///         x = x + 1
///     return x
/// ```
pub fn scenario_while() -> FuncDef {
    func(
        &[],
        vec![
            Stmt::assign("x", Expr::int(0)),
            Stmt::while_loop(
                Expr::compare(CompareOp::Lt, Expr::var("x"), Expr::int(10)),
                vec![Stmt::assign("x", Expr::add(Expr::var("x"), Expr::int(1)))],
            ),
            Stmt::ret(Expr::var("x")),
        ],
    )
}

/// ```text
/// def f(x):
///     a = x
///     b = a + 1
///     return b
/// ```
pub fn scenario_copy() -> FuncDef {
    func(
        &["x"],
        vec![
            Stmt::assign("a", Expr::var("x")),
            Stmt::assign("b", Expr::add(Expr::var("a"), Expr::int(1))),
            Stmt::ret(Expr::var("b")),
        ],
    )
}

/// ```text
/// def g(lst):
///     s = 0
///     for n in lst:
///         s = s + n
///     return s
/// ```
pub fn scenario_sum_loop() -> FuncDef {
    FuncDef::new(
        "g",
        vec![Argument::new("lst")],
        Block::new(vec![
            Stmt::assign("s", Expr::int(0)),
            Stmt::for_loop(
                "n",
                Expr::var("lst"),
                vec![Stmt::assign("s", Expr::add(Expr::var("s"), Expr::var("n")))],
            ),
            Stmt::ret(Expr::var("s")),
        ]),
    )
}

/// Pattern function `def lhs(a, b, c): a * b + c`.
pub fn fma_lhs() -> FuncDef {
    func(
        &["a", "b", "c"],
        vec![Stmt::effect(Expr::add(
            Expr::mul(Expr::var("a"), Expr::var("b")),
            Expr::var("c"),
        ))],
    )
}

/// Pattern function `def rhs(a, b, c): fma(a, b, c)`.
pub fn fma_rhs() -> FuncDef {
    func(
        &["a", "b", "c"],
        vec![Stmt::effect(
            Expr::ternary(
                TernaryOpKind::Fma,
                Expr::var("a"),
                Expr::var("b"),
                Expr::var("c"),
            )
            .named("fma"),
        )],
    )
}

/// A tuple binding of plain names.
pub fn tuple_binding(names: &[&str]) -> Binding {
    Binding::tuple(names.iter().map(|n| Binding::from(*n)).collect())
}
