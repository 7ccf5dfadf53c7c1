//! Shared fixtures for the integration tests: a small corpus of functions and an exact
//! reference interpreter to compare program behavior before and after a transformation.

#![allow(dead_code)]

use std::collections::HashMap;

use fpy_core::{
    ast::{
        digits_value, parse_decnum, parse_hexnum, rational_value, visit, BinaryOpKind, CompareOp,
        NaryOpKind, TernaryOpKind, UnaryOpKind,
    },
    prelude::*,
};
use num::{BigRational, Signed, Zero};

/// Loop iterations the interpreter allows before giving up.
const FUEL: usize = 10_000;

/// `def f(x): y = x + 1; return y`
pub fn simple() -> FuncDef {
    FuncDef::new(
        "simple",
        vec![Argument::new("x")],
        Block::new(vec![
            Stmt::assign("y", Expr::add(Expr::var("x"), Expr::int(1))),
            Stmt::ret(Expr::var("y")),
        ]),
    )
}

/// `def f(x): if x > 0: y = 1 else: y = 2; return y`
pub fn if_merge() -> FuncDef {
    FuncDef::new(
        "if_merge",
        vec![Argument::new("x")],
        Block::new(vec![
            Stmt::if2(
                Expr::compare(CompareOp::Gt, Expr::var("x"), Expr::int(0)),
                vec![Stmt::assign("y", Expr::int(1))],
                vec![Stmt::assign("y", Expr::int(2))],
            ),
            Stmt::ret(Expr::var("y")),
        ]),
    )
}

/// `def f(): x = 0; while x < 10: x = x + 1; return x`
pub fn counting_loop() -> FuncDef {
    FuncDef::new(
        "counting_loop",
        vec![],
        Block::new(vec![
            Stmt::assign("x", Expr::int(0)),
            Stmt::while_loop(
                Expr::compare(CompareOp::Lt, Expr::var("x"), Expr::int(10)),
                vec![Stmt::assign("x", Expr::add(Expr::var("x"), Expr::int(1)))],
            ),
            Stmt::ret(Expr::var("x")),
        ]),
    )
}

/// `def g(lst): s = 0; for n in lst: s = s + n; return s`
pub fn sum_loop() -> FuncDef {
    FuncDef::new(
        "sum_loop",
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

/// ```text
/// def h(n):
///     i = 0
///     acc = 0
///     while i < n:
///         if acc > 100:
///             acc = acc - 1
///         else:
///             acc = acc + i
///         i = i + 1
///     return acc
/// ```
pub fn nested_loop() -> FuncDef {
    FuncDef::new(
        "nested_loop",
        vec![Argument::new("n")],
        Block::new(vec![
            Stmt::assign("i", Expr::int(0)),
            Stmt::assign("acc", Expr::int(0)),
            Stmt::while_loop(
                Expr::compare(CompareOp::Lt, Expr::var("i"), Expr::var("n")),
                vec![
                    Stmt::if2(
                        Expr::compare(CompareOp::Gt, Expr::var("acc"), Expr::int(100)),
                        vec![Stmt::assign(
                            "acc",
                            Expr::sub(Expr::var("acc"), Expr::int(1)),
                        )],
                        vec![Stmt::assign(
                            "acc",
                            Expr::add(Expr::var("acc"), Expr::var("i")),
                        )],
                    ),
                    Stmt::assign("i", Expr::add(Expr::var("i"), Expr::int(1))),
                ],
            ),
            Stmt::ret(Expr::var("acc")),
        ]),
    )
}

/// ```text
/// def k(x):
///     with RealContext():
///         y = x * 2
///     if y > 0:
///         y = -y
///     return y
/// ```
pub fn with_context() -> FuncDef {
    FuncDef::new(
        "with_context",
        vec![Argument::new("x")],
        Block::new(vec![
            Stmt::context(
                None,
                Expr::context("RealContext", vec![]),
                vec![Stmt::assign("y", Expr::mul(Expr::var("x"), Expr::int(2)))],
            ),
            Stmt::if1(
                Expr::compare(CompareOp::Gt, Expr::var("y"), Expr::int(0)),
                vec![Stmt::assign(
                    "y",
                    Expr::unary(UnaryOpKind::Neg, Expr::var("y")),
                )],
            ),
            Stmt::ret(Expr::var("y")),
        ]),
    )
}

/// Every corpus function.
pub fn corpus() -> Vec<FuncDef> {
    vec![
        simple(),
        if_merge(),
        counting_loop(),
        sum_loop(),
        nested_loop(),
        with_context(),
    ]
}

/// Corpus functions the reference interpreter can run.
pub fn runnable_corpus() -> Vec<FuncDef> {
    vec![
        simple(),
        if_merge(),
        counting_loop(),
        nested_loop(),
        with_context(),
    ]
}

/// Inputs the properties are checked on.
pub fn sample_inputs() -> Vec<BigRational> {
    [-7, -1, 0, 1, 3, 12, 250]
        .into_iter()
        .map(|n| BigRational::from_integer(n.into()))
        .chain([BigRational::new(1.into(), 3.into())])
        .collect()
}

/// Ids of every statement of a function, nested ones included.
pub fn stmt_ids(func: &FuncDef) -> Vec<NodeId> {
    struct Collector(Vec<NodeId>);

    impl Visit for Collector {
        fn visit_stmt(&mut self, stmt: &Stmt) {
            self.0.push(stmt.id);
            visit::walk_stmt(self, stmt);
        }
    }

    let mut collector = Collector(Vec::new());
    collector.visit_func(func);
    collector.0
}

/// A variable read, with the statement that directly holds it.
#[derive(Debug, Clone)]
pub struct VarUse {
    pub name: NamedId,
    pub node: NodeId,
    pub stmt: NodeId,
}

/// Every variable read of a function.
pub fn var_uses(func: &FuncDef) -> Vec<VarUse> {
    struct Collector {
        stack: Vec<NodeId>,
        uses: Vec<VarUse>,
    }

    impl Visit for Collector {
        fn visit_stmt(&mut self, stmt: &Stmt) {
            self.stack.push(stmt.id);
            visit::walk_stmt(self, stmt);
            self.stack.pop();
        }

        fn visit_expr(&mut self, expr: &Expr) {
            if let (ExprKind::Var(name), Some(&stmt)) = (&expr.kind, self.stack.last()) {
                self.uses.push(VarUse {
                    name: name.clone(),
                    node: expr.id,
                    stmt,
                });
            }
            visit::walk_expr(self, expr);
        }
    }

    let mut collector = Collector {
        stack: Vec::new(),
        uses: Vec::new(),
    };
    collector.visit_func(func);
    collector.uses
}

/// A run-time value of the reference interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Num(BigRational),
    Bool(bool),
}

impl Value {
    fn num(&self) -> Option<&BigRational> {
        match self {
            Self::Num(n) => Some(n),
            Self::Bool(_) => None,
        }
    }

    fn boolean(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Num(_) => None,
        }
    }
}

enum Flow {
    Next,
    Return(Value),
}

/// Runs `func` on `args` with exact real arithmetic, ignoring rounding contexts.
///
/// Returns `None` for anything the interpreter does not model, an assertion failure, or a
/// loop that runs out of fuel.
pub fn run(func: &FuncDef, args: &[Value]) -> Option<Value> {
    if args.len() != func.args.len() {
        return None;
    }
    let mut interp = Interpreter {
        store: HashMap::new(),
        fuel: FUEL,
    };
    for (arg, value) in func.args.iter().zip(args) {
        let name = arg.name.as_named()?;
        interp.store.insert(name.clone(), value.clone());
    }
    match interp.block(&func.body)? {
        Flow::Return(value) => Some(value),
        Flow::Next => None,
    }
}

/// Runs a one-argument function on a number.
pub fn run1(func: &FuncDef, x: &BigRational) -> Option<Value> {
    let args: Vec<Value> = if func.args.is_empty() {
        Vec::new()
    } else {
        vec![Value::Num(x.clone())]
    };
    run(func, &args)
}

struct Interpreter {
    store: HashMap<NamedId, Value>,
    fuel: usize,
}

impl Interpreter {
    fn block(&mut self, block: &Block) -> Option<Flow> {
        for stmt in &block.stmts {
            if let Flow::Return(value) = self.stmt(stmt)? {
                return Some(Flow::Return(value));
            }
        }
        Some(Flow::Next)
    }

    fn stmt(&mut self, stmt: &Stmt) -> Option<Flow> {
        match &stmt.kind {
            StmtKind::Assign { target, expr, .. } => {
                let value = self.expr(expr)?;
                self.store.insert(target.as_name()?.clone(), value);
                Some(Flow::Next)
            }
            StmtKind::If1 { cond, body } => {
                if self.expr(cond)?.boolean()? {
                    self.block(body)
                } else {
                    Some(Flow::Next)
                }
            }
            StmtKind::If { cond, ift, iff } => {
                if self.expr(cond)?.boolean()? {
                    self.block(ift)
                } else {
                    self.block(iff)
                }
            }
            StmtKind::While { cond, body } => {
                while self.expr(cond)?.boolean()? {
                    self.fuel = self.fuel.checked_sub(1)?;
                    if let Flow::Return(value) = self.block(body)? {
                        return Some(Flow::Return(value));
                    }
                }
                Some(Flow::Next)
            }
            StmtKind::Context { name: None, body, .. } => self.block(body),
            StmtKind::Assert { test, .. } => {
                if self.expr(test)?.boolean()? {
                    Some(Flow::Next)
                } else {
                    None
                }
            }
            StmtKind::Effect(expr) => {
                self.expr(expr)?;
                Some(Flow::Next)
            }
            StmtKind::Return(expr) => Some(Flow::Return(self.expr(expr)?)),
            StmtKind::Pass => Some(Flow::Next),
            _ => None,
        }
    }

    fn expr(&mut self, expr: &Expr) -> Option<Value> {
        let value = match &expr.kind {
            ExprKind::Var(name) => return self.store.get(name).cloned(),
            ExprKind::Bool(b) => return Some(Value::Bool(*b)),
            ExprKind::Integer(n) => BigRational::from_integer(n.clone()),
            ExprKind::Decnum(text) => parse_decnum(text)?,
            ExprKind::Hexnum(text) => parse_hexnum(text)?,
            ExprKind::Rational { p, q } => rational_value(p, q)?,
            ExprKind::Digits { m, e, b } => digits_value(m, e, b)?,
            ExprKind::Foreign(ForeignValue::Number(n)) => n.clone(),
            ExprKind::Foreign(ForeignValue::Bool(b)) => return Some(Value::Bool(*b)),
            ExprKind::Unary { op, arg, .. } => {
                let arg = self.expr(arg)?;
                match op {
                    UnaryOpKind::Not => return Some(Value::Bool(!arg.boolean()?)),
                    UnaryOpKind::Neg => -arg.num()?,
                    UnaryOpKind::Fabs => arg.num()?.abs(),
                    _ => return None,
                }
            }
            ExprKind::Binary { op, lhs, rhs, .. } => {
                let a = self.expr(lhs)?.num()?.clone();
                let b = self.expr(rhs)?.num()?.clone();
                match op {
                    BinaryOpKind::Add => a + b,
                    BinaryOpKind::Sub => a - b,
                    BinaryOpKind::Mul => a * b,
                    BinaryOpKind::Div if !b.is_zero() => a / b,
                    BinaryOpKind::Fmin => a.min(b),
                    BinaryOpKind::Fmax => a.max(b),
                    _ => return None,
                }
            }
            ExprKind::Ternary {
                op: TernaryOpKind::Fma,
                first,
                second,
                third,
                ..
            } => {
                let a = self.expr(first)?.num()?.clone();
                let b = self.expr(second)?.num()?.clone();
                let c = self.expr(third)?.num()?.clone();
                a * b + c
            }
            ExprKind::Nary { op, args, .. } => {
                let values = args
                    .iter()
                    .map(|arg| self.expr(arg))
                    .collect::<Option<Vec<_>>>()?;
                match op {
                    NaryOpKind::And => {
                        let bools = values.iter().map(Value::boolean).collect::<Option<Vec<_>>>()?;
                        return Some(Value::Bool(bools.into_iter().all(|b| b)));
                    }
                    NaryOpKind::Or => {
                        let bools = values.iter().map(Value::boolean).collect::<Option<Vec<_>>>()?;
                        return Some(Value::Bool(bools.into_iter().any(|b| b)));
                    }
                    NaryOpKind::Min | NaryOpKind::Max => {
                        let nums = values.iter().map(Value::num).collect::<Option<Vec<_>>>()?;
                        let picked = if *op == NaryOpKind::Min {
                            nums.into_iter().min()?
                        } else {
                            nums.into_iter().max()?
                        };
                        picked.clone()
                    }
                    _ => return None,
                }
            }
            ExprKind::Compare { ops, args } => {
                let values = args
                    .iter()
                    .map(|arg| self.expr(arg))
                    .collect::<Option<Vec<_>>>()?;
                let mut holds = true;
                for (op, pair) in ops.iter().zip(values.windows(2)) {
                    holds &= match (op, &pair[0], &pair[1]) {
                        (CompareOp::Eq, a, b) => a == b,
                        (CompareOp::Ne, a, b) => a != b,
                        (op, Value::Num(a), Value::Num(b)) => match op {
                            CompareOp::Lt => a < b,
                            CompareOp::Le => a <= b,
                            CompareOp::Gt => a > b,
                            CompareOp::Ge => a >= b,
                            CompareOp::Eq | CompareOp::Ne => unreachable!(),
                        },
                        _ => return None,
                    };
                }
                return Some(Value::Bool(holds));
            }
            ExprKind::IfExpr { cond, ift, iff } => {
                return if self.expr(cond)?.boolean()? {
                    self.expr(ift)
                } else {
                    self.expr(iff)
                };
            }
            _ => return None,
        };
        Some(Value::Num(value))
    }
}
