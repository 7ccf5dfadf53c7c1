//! Properties every analysis and transformation must uphold, checked over a shared corpus.

mod common;

use std::collections::BTreeSet;

use fpy_core::{
    ast::{names::assigned_names, Gensym},
    prelude::*,
    rewrite::{Applier, MatchSite, Matcher, Replacement},
    utils::UnionFind,
};
use num::BigRational;

#[test]
fn test_every_use_has_a_reaching_definition() -> Result<()> {
    for func in common::corpus() {
        let rd = ReachingDefs::analyze(&func)?;
        let du = DefineUse::analyze(&func)?;
        for site in common::var_uses(&func) {
            let env = rd.in_env(site.stmt).unwrap();
            assert!(
                env.contains_key(&site.name),
                "`{}` is not in scope at its use in `{}`",
                site.name,
                func.name
            );
            let def = du.def_of_use(site.node).unwrap();
            assert_eq!(rd.def(def).unwrap().name(), &site.name);
        }
    }
    Ok(())
}

#[test]
fn test_definition_indices_are_dense() -> Result<()> {
    for func in common::corpus() {
        let rd = ReachingDefs::analyze(&func)?;
        let n = rd.len();
        let valid = |id: DefId| id.index() < n;

        for (expected, (id, def)) in rd.iter().enumerate() {
            assert_eq!(id.index(), expected);
            assert!(def.operands().into_iter().all(valid), "{def} in `{}`", func.name);
        }
        let mut envs = vec![rd.entry_env(), rd.exit_env()];
        for stmt in common::stmt_ids(&func) {
            envs.extend(rd.in_env(stmt));
            envs.extend(rd.out_env(stmt));
        }
        for env in envs {
            assert!(env.values().copied().all(valid));
        }
    }
    Ok(())
}

#[test]
fn test_loop_phis_merge_entry_and_body_exit() -> Result<()> {
    for func in common::corpus() {
        let rd = ReachingDefs::analyze(&func)?;
        let mut loops = Vec::new();
        collect_loops(&func.body, &mut loops);
        for stmt in loops {
            let (StmtKind::While { body, .. } | StmtKind::For { body, .. }) = &stmt.kind else {
                continue;
            };
            let before = rd.in_env(stmt.id).unwrap();
            let after = rd.out_env(stmt.id).unwrap();
            let body_out = rd.block_out_env(body.id).unwrap();
            for name in assigned_names(body) {
                let Some(&entering) = before.get(&name) else {
                    continue;
                };
                let merged = after.get(&name).copied().unwrap();
                let Some(Definition::Phi(phi)) = rd.def(merged) else {
                    panic!("`{name}` after the loop in `{}` is not a phi", func.name);
                };
                assert_eq!(phi.site, stmt.id);
                assert_eq!(phi.lhs, entering);
                assert_eq!(Some(&phi.rhs), body_out.get(&name));
            }
        }
    }
    Ok(())
}

fn collect_loops<'a>(block: &'a Block, out: &mut Vec<&'a Stmt>) {
    for stmt in &block.stmts {
        if matches!(stmt.kind, StmtKind::While { .. } | StmtKind::For { .. }) {
            out.push(stmt);
        }
        for inner in stmt.blocks() {
            collect_loops(inner, out);
        }
    }
}

#[test]
fn test_uses_are_in_scope_of_their_definition() -> Result<()> {
    for func in common::corpus() {
        let du = DefineUse::analyze(&func)?;
        for (def, uses) in du.iter() {
            for site in uses {
                let env = du.env_at_use(site.node).unwrap();
                assert!(
                    env.values().any(|&d| d == def),
                    "{def} does not reach its use in `{}`",
                    func.name
                );
            }
        }
    }
    Ok(())
}

fn fma_rule() -> Result<Rewrite> {
    let params = || vec![Argument::new("a"), Argument::new("b"), Argument::new("c")];
    let lhs = FuncDef::new(
        "lhs",
        params(),
        Block::new(vec![Stmt::effect(Expr::add(
            Expr::mul(Expr::var("a"), Expr::var("b")),
            Expr::var("c"),
        ))]),
    );
    let rhs = FuncDef::new(
        "rhs",
        params(),
        Block::new(vec![Stmt::effect(
            Expr::ternary(
                TernaryOpKind::Fma,
                Expr::var("a"),
                Expr::var("b"),
                Expr::var("c"),
            )
            .named("fma"),
        )]),
    );
    Rewrite::from_funcs("fma", &lhs, &rhs)
}

/// `return (x * y + z) * (u * v + w) + 1`
fn two_fmas() -> FuncDef {
    let fma = |a: &str, b: &str, c: &str| {
        Expr::add(Expr::mul(Expr::var(a), Expr::var(b)), Expr::var(c))
    };
    FuncDef::new(
        "two_fmas",
        ["x", "y", "z", "u", "v", "w"]
            .into_iter()
            .map(Argument::new)
            .collect(),
        Block::new(vec![Stmt::ret(Expr::add(
            Expr::mul(fma("x", "y", "z"), fma("u", "v", "w")),
            Expr::int(1),
        ))]),
    )
}

fn find_expr<'a>(block: &'a Block, id: NodeId) -> Option<&'a Expr> {
    fn search(expr: &Expr, id: NodeId) -> Option<&Expr> {
        if expr.id == id {
            return Some(expr);
        }
        expr.children().into_iter().find_map(|child| search(child, id))
    }

    block.stmts.iter().find_map(|stmt| {
        stmt.exprs()
            .into_iter()
            .find_map(|expr| search(expr, id))
            .or_else(|| stmt.blocks().into_iter().find_map(|inner| find_expr(inner, id)))
    })
}

#[test]
fn test_instantiated_pattern_is_the_matched_subtree() -> Result<()> {
    let rule = fma_rule()?;
    let target = two_fmas();
    let matches = Matcher::new(rule.lhs()).find_all(&target);
    // The whole sum matches too: (x*y + z) * (u*v + w) + 1
    assert_eq!(matches.len(), 3);

    for found in matches {
        let MatchSite::Expr(id) = found.site else {
            panic!("expected an expression match");
        };
        let region = find_expr(&target.body, id).unwrap();
        let mut gensym = Gensym::from_func(&target);
        let Replacement::Expr(instance) = Applier::new(rule.lhs(), &mut gensym).apply(&found.subst)?
        else {
            panic!("expected an expression instance");
        };
        assert!(instance.is_equiv(region));
    }
    Ok(())
}

#[test]
fn test_apply_then_inverse_restores_the_function() -> Result<()> {
    let rule = fma_rule()?;
    for func in [two_fmas(), common::simple(), common::nested_loop()] {
        let (forward, _) = rule.apply_all(&func)?;
        let (back, _) = rule.inverse().apply_all(&forward)?;
        assert!(back.is_equiv(&func), "`{}` did not round-trip", func.name);
    }
    Ok(())
}

fn copies(block: &Block) -> Vec<(NamedId, NamedId)> {
    let mut out = Vec::new();
    for stmt in &block.stmts {
        if let StmtKind::Assign {
            target: Binding::Id(Id::Named(target)),
            ann: None,
            expr,
        } = &stmt.kind
        {
            if let Some(source) = expr.as_var() {
                out.push((target.clone(), source.clone()));
            }
        }
        for inner in stmt.blocks() {
            out.extend(copies(inner));
        }
    }
    out
}

#[test]
fn test_copy_propagation_and_dead_code_remove_copies() -> Result<()> {
    // def f(x, c):
    //     a = x
    //     b = a
    //     if c > 0:
    //         d = b
    //         y = d * 2
    //     else:
    //         y = a + b
    //     e = y
    //     return e
    let f = FuncDef::new(
        "copies",
        vec![Argument::new("x"), Argument::new("c")],
        Block::new(vec![
            Stmt::assign("a", Expr::var("x")),
            Stmt::assign("b", Expr::var("a")),
            Stmt::if2(
                Expr::compare(CompareOp::Gt, Expr::var("c"), Expr::int(0)),
                vec![
                    Stmt::assign("d", Expr::var("b")),
                    Stmt::assign("y", Expr::mul(Expr::var("d"), Expr::int(2))),
                ],
                vec![Stmt::assign("y", Expr::add(Expr::var("a"), Expr::var("b")))],
            ),
            Stmt::assign("e", Expr::var("y")),
            Stmt::ret(Expr::var("e")),
        ]),
    );
    assert_eq!(copies(&f.body).len(), 4);

    let out = CopyPropagate::new().apply(&f)?;
    let out = DeadCodeEliminate::new().apply(&out)?;
    assert!(copies(&out.body).is_empty(), "{:?}", copies(&out.body));

    for x in common::sample_inputs() {
        for c in [-1, 1] {
            let args = [
                common::Value::Num(x.clone()),
                common::Value::Num(BigRational::from_integer(c.into())),
            ];
            assert_eq!(common::run(&f, &args), common::run(&out, &args));
        }
    }
    Ok(())
}

/// Functions under `RealContext()` with plenty of literal arithmetic.
fn foldable() -> Vec<FuncDef> {
    vec![
        // def f(x): y = 1 + 2 * 3; z = x * (y - 0.5); return z / 4
        FuncDef::new(
            "arith",
            vec![Argument::new("x")],
            Block::new(vec![
                Stmt::assign(
                    "y",
                    Expr::add(Expr::int(1), Expr::mul(Expr::int(2), Expr::int(3))),
                ),
                Stmt::assign(
                    "z",
                    Expr::mul(Expr::var("x"), Expr::sub(Expr::var("y"), Expr::decnum("0.5"))),
                ),
                Stmt::ret(Expr::div(Expr::var("z"), Expr::int(4))),
            ]),
        )
        .with_ctx(Context::Real),
        // def f(x): t = 0.1 + 0.2; return x if t > 0.3 else -x
        FuncDef::new(
            "select",
            vec![Argument::new("x")],
            Block::new(vec![
                Stmt::assign("t", Expr::add(Expr::decnum("0.1"), Expr::decnum("0.2"))),
                Stmt::ret(Expr::if_expr(
                    Expr::compare(CompareOp::Gt, Expr::var("t"), Expr::decnum("0.3")),
                    Expr::var("x"),
                    Expr::unary(UnaryOpKind::Neg, Expr::var("x")),
                )),
            ]),
        )
        .with_ctx(Context::Real),
        // def f(x): with RealContext(): w = rational(1, 3) * 3; return x + w
        FuncDef::new(
            "nested_ctx",
            vec![Argument::new("x")],
            Block::new(vec![
                Stmt::context(
                    None,
                    Expr::context("RealContext", vec![]),
                    vec![Stmt::assign(
                        "w",
                        Expr::mul(Expr::rational(1, 3), Expr::int(3)),
                    )],
                ),
                Stmt::ret(Expr::add(Expr::var("x"), Expr::var("w"))),
            ]),
        ),
    ]
}

#[test]
fn test_constant_folding_preserves_values() -> Result<()> {
    for func in foldable().into_iter().chain(common::runnable_corpus()) {
        let ctx = CompilerContext::new();
        let (out, _) = ConstFold::new().run_on_function(&func, &ctx)?;
        for x in common::sample_inputs() {
            assert_eq!(
                common::run1(&func, &x),
                common::run1(&out, &x),
                "`{}` changed its value at {x}",
                func.name
            );
        }
    }
    Ok(())
}

#[test]
fn test_simplify_if_preserves_the_store() -> Result<()> {
    // def f(x):
    //     if x > 1:
    //         y = x * 2
    //         z = 1
    //     else:
    //         y = x - 3
    //         z = 2
    //     return y + z
    let two_arms = FuncDef::new(
        "two_arms",
        vec![Argument::new("x")],
        Block::new(vec![
            Stmt::if2(
                Expr::compare(CompareOp::Gt, Expr::var("x"), Expr::int(1)),
                vec![
                    Stmt::assign("y", Expr::mul(Expr::var("x"), Expr::int(2))),
                    Stmt::assign("z", Expr::int(1)),
                ],
                vec![
                    Stmt::assign("y", Expr::sub(Expr::var("x"), Expr::int(3))),
                    Stmt::assign("z", Expr::int(2)),
                ],
            ),
            Stmt::ret(Expr::add(Expr::var("y"), Expr::var("z"))),
        ]),
    );

    for func in [two_arms, common::if_merge(), common::with_context()] {
        let out = SimplifyIf::new().apply(&func)?;
        assert!(
            out.body
                .stmts
                .iter()
                .all(|stmt| !matches!(stmt.kind, StmtKind::If { .. } | StmtKind::If1 { .. })),
            "`{}` still branches",
            func.name
        );
        for x in common::sample_inputs() {
            assert_eq!(common::run1(&func, &x), common::run1(&out, &x));
        }
    }
    Ok(())
}

/// Deterministic xorshift, so failures reproduce.
struct Rng(u64);

impl Rng {
    fn next(&mut self, bound: u64) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0 % bound
    }
}

#[test]
fn test_union_find_matches_transitive_closure() {
    const N: u64 = 48;
    let mut rng = Rng(0x2545_f491_4f6c_dd1d);

    for _ in 0..16 {
        let mut uf = UnionFind::new();
        // Naive model: every element carries a class label.
        let mut label: Vec<u64> = (0..N).collect();
        for x in 0..N {
            uf.add(x);
        }
        for _ in 0..rng.next(N) {
            let (a, b) = (rng.next(N), rng.next(N));
            uf.union(&a, &b);
            let (from, to) = (label[b as usize], label[a as usize]);
            for l in &mut label {
                if *l == from {
                    *l = to;
                }
            }
        }
        for x in 0..N {
            for y in 0..N {
                assert_eq!(
                    uf.find(&x) == uf.find(&y),
                    label[x as usize] == label[y as usize]
                );
            }
        }
        let classes: BTreeSet<u64> = label.iter().copied().collect();
        assert_eq!(uf.representatives().len(), classes.len());
    }
}
