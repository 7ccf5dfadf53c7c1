//! Benchmarks for the dataflow analyses and the default pass pipeline.
//!
//! The input is a synthetic function with a configurable number of sequential loops, each
//! holding a two-armed `if`, so the number of φ-definitions grows with the size.

extern crate fpy_core;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fpy_core::prelude::*;
use std::hint::black_box;

/// ```text
/// def f(n):
///     acc = 0
///     i_k = 0                      # for every k
///     while i_k < n:
///         if acc > k:
///             acc = acc - i_k
///         else:
///             t_k = acc
///             acc = t_k + 1
///         i_k = i_k + 1
///     return acc
/// ```
fn synthetic(loops: usize) -> FuncDef {
    let mut stmts = vec![Stmt::assign("acc", Expr::int(0))];
    for k in 0..loops {
        let i = format!("i_{k}");
        let t = format!("t_{k}");
        stmts.push(Stmt::assign(i.as_str(), Expr::int(0)));
        stmts.push(Stmt::while_loop(
            Expr::compare(CompareOp::Lt, Expr::var(i.as_str()), Expr::var("n")),
            vec![
                Stmt::if2(
                    Expr::compare(CompareOp::Gt, Expr::var("acc"), Expr::int(k as i64)),
                    vec![Stmt::assign(
                        "acc",
                        Expr::sub(Expr::var("acc"), Expr::var(i.as_str())),
                    )],
                    vec![
                        Stmt::assign(t.as_str(), Expr::var("acc")),
                        Stmt::assign("acc", Expr::add(Expr::var(t.as_str()), Expr::int(1))),
                    ],
                ),
                Stmt::assign(i.as_str(), Expr::add(Expr::var(i.as_str()), Expr::int(1))),
            ],
        ));
    }
    stmts.push(Stmt::ret(Expr::var("acc")));
    FuncDef::new("f", vec![Argument::new("n")], Block::new(stmts))
}

/// Reaching definitions alone, then with define-use chains on top.
fn bench_dataflow(c: &mut Criterion) {
    let mut group = c.benchmark_group("dataflow");
    for loops in [4, 32, 128] {
        let func = synthetic(loops);
        group.throughput(Throughput::Elements(loops as u64));
        group.bench_with_input(BenchmarkId::new("reaching_defs", loops), &func, |b, func| {
            b.iter(|| {
                let rd = ReachingDefs::analyze(black_box(func)).unwrap();
                black_box(rd)
            });
        });
        group.bench_with_input(BenchmarkId::new("define_use", loops), &func, |b, func| {
            b.iter(|| {
                let du = DefineUse::analyze(black_box(func)).unwrap();
                black_box(du)
            });
        });
    }
    group.finish();
}

/// Copy propagation followed by dead-code elimination, the pair the scheduler repeats most.
fn bench_cleanup(c: &mut Criterion) {
    let func = synthetic(32);
    let mut group = c.benchmark_group("cleanup");
    group.bench_function("copy_propagate", |b| {
        b.iter(|| {
            let out = CopyPropagate::new().apply(black_box(&func)).unwrap();
            black_box(out)
        });
    });
    group.bench_function("copy_propagate_then_dce", |b| {
        b.iter(|| {
            let out = CopyPropagate::new().apply(black_box(&func)).unwrap();
            let out = DeadCodeEliminate::new().apply(&out).unwrap();
            black_box(out)
        });
    });
    group.finish();
}

criterion_group!(benches, bench_dataflow, bench_cleanup);
criterion_main!(benches);
