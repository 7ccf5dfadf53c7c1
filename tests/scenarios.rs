//! End-to-end scenarios over the public API.
//!
//! Each test builds a small function, runs an analysis or a transformation on it and checks
//! the exact shape of the result.

mod common;

use std::sync::Arc;

use fpy_core::prelude::*;
use num::BigRational;

fn ret_expr(stmt: &Stmt) -> &Expr {
    match &stmt.kind {
        StmtKind::Return(expr) => expr,
        other => panic!("expected a return, got {other:?}"),
    }
}

#[test]
fn test_simple_reaching() -> Result<()> {
    let f = common::simple();
    let rd = ReachingDefs::analyze(&f)?;

    assert_eq!(rd.len(), 2);
    assert_eq!(rd.phi_count(), 0);

    let x = rd.entry_env().get(&NamedId::new("x")).copied().unwrap();
    let y = rd.def_at(f.body.stmts[0].id, &NamedId::new("y")).unwrap();
    assert!(rd.def(x).unwrap().as_assign().is_some());
    assert!(rd.def(y).unwrap().as_assign().is_some());

    let du = DefineUse::analyze(&f)?;
    let use_of_y = ret_expr(&f.body.stmts[1]).id;
    assert_eq!(du.def_of_use(use_of_y), Some(y));
    Ok(())
}

#[test]
fn test_if_merge() -> Result<()> {
    let f = common::if_merge();
    let rd = ReachingDefs::analyze(&f)?;
    let if_stmt = &f.body.stmts[0];
    let StmtKind::If { ift, iff, .. } = &if_stmt.kind else {
        panic!("expected if");
    };
    let y = NamedId::new("y");
    let ift_y = rd.def_at(ift.stmts[0].id, &y).unwrap();
    let iff_y = rd.def_at(iff.stmts[0].id, &y).unwrap();

    assert_eq!(rd.phi_count(), 1);
    let phi = rd.reaching(f.body.stmts[1].id, &y).unwrap();
    let Some(Definition::Phi(record)) = rd.def(phi) else {
        panic!("return should read a phi");
    };
    assert_eq!(record.site, if_stmt.id);
    assert_eq!(record.lhs, ift_y);
    assert_eq!(record.rhs, iff_y);
    Ok(())
}

#[test]
fn test_while_loop() -> Result<()> {
    let f = common::counting_loop();
    let du = DefineUse::analyze(&f)?;
    let rd = du.reach();
    let x = NamedId::new("x");

    let StmtKind::While { cond, body } = &f.body.stmts[1].kind else {
        panic!("expected while");
    };
    let x0 = rd.def_at(f.body.stmts[0].id, &x).unwrap();
    let x1 = rd.def_at(body.stmts[0].id, &x).unwrap();

    assert_eq!(rd.phi_count(), 1);
    let header = rd.out_env(f.body.stmts[1].id).unwrap().get(&x).copied().unwrap();
    let Some(Definition::Phi(phi)) = rd.def(header) else {
        panic!("expected the loop phi after the loop");
    };
    assert_eq!((phi.lhs, phi.rhs), (x0, x1));

    // Both the condition and the body read the header phi.
    let ExprKind::Compare { args, .. } = &cond.kind else {
        panic!("expected compare");
    };
    assert_eq!(du.def_of_use(args[0].id), Some(header));
    let StmtKind::Assign { expr, .. } = &body.stmts[0].kind else {
        panic!("expected assignment");
    };
    let ExprKind::Binary { lhs, .. } = &expr.kind else {
        panic!("expected x + 1");
    };
    assert_eq!(du.def_of_use(lhs.id), Some(header));
    Ok(())
}

fn abc() -> Vec<Argument> {
    vec![Argument::new("a"), Argument::new("b"), Argument::new("c")]
}

#[test]
fn test_fma_rewrite() -> Result<()> {
    let lhs = FuncDef::new(
        "lhs",
        abc(),
        Block::new(vec![Stmt::effect(Expr::add(
            Expr::mul(Expr::var("a"), Expr::var("b")),
            Expr::var("c"),
        ))]),
    );
    let rhs = FuncDef::new(
        "rhs",
        abc(),
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
    let rule = Rewrite::from_funcs("fma", &lhs, &rhs)?;

    let f = FuncDef::new(
        "f",
        vec![Argument::new("x"), Argument::new("y"), Argument::new("z")],
        Block::new(vec![Stmt::ret(Expr::add(
            Expr::mul(Expr::var("x"), Expr::var("y")),
            Expr::var("z"),
        ))]),
    );
    let (out, stats) = rule.apply_all(&f)?;
    assert_eq!(stats.applications, 1);

    let expected = Expr::ternary(
        TernaryOpKind::Fma,
        Expr::var("x"),
        Expr::var("y"),
        Expr::var("z"),
    );
    assert!(ret_expr(&out.body.stmts[0]).is_equiv(&expected));
    Ok(())
}

#[test]
fn test_sum_rewrite() -> Result<()> {
    let lhs = FuncDef::new(
        "lhs",
        vec![Argument::new("xs")],
        Block::new(vec![
            Stmt::assign("y", Expr::int(0)),
            Stmt::for_loop(
                "x",
                Expr::var("xs"),
                vec![Stmt::assign("y", Expr::add(Expr::var("y"), Expr::var("x")))],
            ),
        ]),
    );
    let rhs = FuncDef::new(
        "rhs",
        vec![Argument::new("xs")],
        Block::new(vec![Stmt::assign(
            "y",
            Expr::unary(UnaryOpKind::Sum, Expr::var("xs")).named("sum"),
        )]),
    );
    let rule = Rewrite::from_funcs("sum", &lhs, &rhs)?;

    let g = common::sum_loop();
    let (out, stats) = rule.apply(&g, None)?;
    assert_eq!(stats.applications, 1);

    let expected = Block::new(vec![
        Stmt::assign("s", Expr::unary(UnaryOpKind::Sum, Expr::var("lst"))),
        Stmt::ret(Expr::var("s")),
    ]);
    assert!(out.body.is_equiv(&expected));
    Ok(())
}

#[test]
fn test_copy_propagation_then_dead_code() -> Result<()> {
    let f = FuncDef::new(
        "f",
        vec![Argument::new("x")],
        Block::new(vec![
            Stmt::assign("a", Expr::var("x")),
            Stmt::assign("b", Expr::add(Expr::var("a"), Expr::int(1))),
            Stmt::ret(Expr::var("b")),
        ]),
    );
    let out = CopyPropagate::new().apply(&f)?;
    let out = DeadCodeEliminate::new().apply(&out)?;

    let expected = Block::new(vec![
        Stmt::assign("b", Expr::add(Expr::var("x"), Expr::int(1))),
        Stmt::ret(Expr::var("b")),
    ]);
    assert!(out.body.is_equiv(&expected));
    Ok(())
}

#[test]
fn test_default_pipeline_inlines_and_cleans_up() -> Result<()> {
    // def sq(a): b = a * a; return b
    let sq = Arc::new(FuncDef::new(
        "sq",
        vec![Argument::new("a")],
        Block::new(vec![
            Stmt::assign("b", Expr::mul(Expr::var("a"), Expr::var("a"))),
            Stmt::ret(Expr::var("b")),
        ]),
    ));
    // def f(x): y = sq(x); return y
    let f = FuncDef::new(
        "f",
        vec![Argument::new("x")],
        Block::new(vec![
            Stmt::assign(
                "y",
                Expr::call("sq", Some(Callee::Function(Arc::clone(&sq))), vec![Expr::var("x")]),
            ),
            Stmt::ret(Expr::var("y")),
        ]),
    )
    .with_free_vars(["sq"]);

    let ctx = CompilerContext::new();
    ctx.add_function(f);
    let rounds = PassScheduler::default().run(&ctx)?;
    assert!(rounds > 0);
    assert!(ctx.events.has(EventKind::CallInlined));

    let out = ctx.function("f").unwrap();
    // The call, its temporaries and the now unused free variable are gone.
    assert!(out.free_vars.is_empty());
    let x = BigRational::from_integer(7.into());
    assert_eq!(
        common::run1(&out, &x),
        Some(common::Value::Num(BigRational::from_integer(49.into())))
    );
    Ok(())
}

