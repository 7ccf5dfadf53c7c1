//! Constant folding pass.
//!
//! Replaces operator nodes whose operands are all literals by the literal value of the
//! operation. Whether a node can be folded depends on the rounding context in force at the
//! enclosing statement, as computed by [`ContextInfer`]: the same `0.1 + 0.2` is exact under
//! `RealContext()` but rounds under `IEEEContext(11, 64)`.
//!
//! The arithmetic itself is delegated to a [`ConstEvaluator`]. The built-in
//! [`ExactEvaluator`] only folds what it can compute exactly with rationals; a frontend that
//! owns a floating-point implementation can plug in an evaluator for finite-precision contexts.
//!
//! # Example
//!
//! Before (under `RealContext()`):
//! ```text
//! y = 1 + 2 * 3
//! z = y if True else 0
//! ```
//!
//! After:
//! ```text
//! y = 7
//! z = y
//! ```

use std::sync::Arc;

use num::{BigRational, Signed, ToPrimitive, Zero};

use crate::{
    analysis::{ContextAnalysis, ContextInfer, CtxVal, OpRef},
    ast::{
        digits_value, fold, parse_decnum, parse_hexnum, rational_value, BinaryOpKind,
        CompareOp, Context, Expr, ExprKind, Fold, ForeignValue, FuncDef, NaryOpKind, NodeId,
        Stmt, Symbol, TernaryOpKind, UnaryOpKind,
    },
    compiler::{pass::finish, CompilerContext, EventKind, EventLog, Pass},
    Result,
};

/// Largest exponent magnitude `pow` is folded with.
const MAX_POW_EXPONENT: u32 = 64;

/// Evaluates operators on literal operands at compile time.
///
/// An evaluator returns `None` whenever it cannot produce the value the operation would have at
/// run time, in which case the node is left alone.
pub trait ConstEvaluator: Send + Sync {
    /// Evaluates an operator applied to `args` under the context `ctx`.
    fn eval(&self, op: OpRef, args: &[ForeignValue], ctx: &CtxVal) -> Option<ForeignValue>;

    /// Evaluates a comparison chain.
    fn compare(&self, ops: &[CompareOp], args: &[ForeignValue], ctx: &CtxVal) -> Option<bool>;
}

/// Folds logic everywhere and exact rational arithmetic under `RealContext()`.
///
/// Numbers are never folded under finite-precision, default or unknown contexts, since the
/// result would have to be rounded.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactEvaluator;

impl ExactEvaluator {
    fn is_exact(ctx: &CtxVal) -> bool {
        matches!(ctx, CtxVal::Known(Context::Real))
    }

    fn arithmetic(op: OpRef, args: &[BigRational]) -> Option<BigRational> {
        let value = match (op, args) {
            (OpRef::Unary(op), [a]) => match op {
                UnaryOpKind::Neg => -a,
                UnaryOpKind::Fabs => a.abs(),
                UnaryOpKind::Ceil => a.ceil(),
                UnaryOpKind::Floor => a.floor(),
                UnaryOpKind::Trunc => a.trunc(),
                UnaryOpKind::Round => a.round(),
                _ => return None,
            },
            (OpRef::Binary(op), [a, b]) => match op {
                BinaryOpKind::Add => a + b,
                BinaryOpKind::Sub => a - b,
                BinaryOpKind::Mul => a * b,
                BinaryOpKind::Div if !b.is_zero() => a / b,
                BinaryOpKind::Fmax => a.max(b).clone(),
                BinaryOpKind::Fmin => a.min(b).clone(),
                BinaryOpKind::Fdim if a > b => a - b,
                BinaryOpKind::Fdim => BigRational::zero(),
                BinaryOpKind::Copysign if b.is_negative() => -a.abs(),
                BinaryOpKind::Copysign => a.abs(),
                BinaryOpKind::Fmod if !b.is_zero() => a - b * (a / b).trunc(),
                BinaryOpKind::Pow => Self::pow(a, b)?,
                _ => return None,
            },
            (OpRef::Ternary(TernaryOpKind::Fma), [a, b, c]) => a * b + c,
            (OpRef::Nary(NaryOpKind::Min), [first, rest @ ..]) => {
                rest.iter().fold(first, |m, x| m.min(x)).clone()
            }
            (OpRef::Nary(NaryOpKind::Max), [first, rest @ ..]) => {
                rest.iter().fold(first, |m, x| m.max(x)).clone()
            }
            _ => return None,
        };
        Some(value)
    }

    fn pow(base: &BigRational, exponent: &BigRational) -> Option<BigRational> {
        if !exponent.is_integer() {
            return None;
        }
        let n = exponent.to_integer().to_i32()?;
        if n.unsigned_abs() > MAX_POW_EXPONENT || (n < 0 && base.is_zero()) {
            return None;
        }
        Some(base.pow(n))
    }
}

impl ConstEvaluator for ExactEvaluator {
    fn eval(&self, op: OpRef, args: &[ForeignValue], ctx: &CtxVal) -> Option<ForeignValue> {
        match op {
            OpRef::Unary(UnaryOpKind::Not) => match args {
                [ForeignValue::Bool(b)] => Some(ForeignValue::Bool(!b)),
                _ => None,
            },
            OpRef::Nary(op @ (NaryOpKind::And | NaryOpKind::Or)) => {
                let bools = args
                    .iter()
                    .map(ForeignValue::as_bool)
                    .collect::<Option<Vec<_>>>()?;
                let value = if op == NaryOpKind::And {
                    bools.iter().all(|b| *b)
                } else {
                    bools.iter().any(|b| *b)
                };
                Some(ForeignValue::Bool(value))
            }
            _ if !Self::is_exact(ctx) => None,
            _ => {
                let numbers = args
                    .iter()
                    .map(|arg| arg.as_number().cloned())
                    .collect::<Option<Vec<_>>>()?;
                Self::arithmetic(op, &numbers).map(ForeignValue::Number)
            }
        }
    }

    fn compare(&self, ops: &[CompareOp], args: &[ForeignValue], ctx: &CtxVal) -> Option<bool> {
        if ops.len() + 1 != args.len() {
            return None;
        }
        let mut result = true;
        for (op, pair) in ops.iter().zip(args.windows(2)) {
            let holds = match (&pair[0], &pair[1]) {
                (ForeignValue::Bool(a), ForeignValue::Bool(b)) => match op {
                    CompareOp::Eq => a == b,
                    CompareOp::Ne => a != b,
                    _ => return None,
                },
                (ForeignValue::Number(a), ForeignValue::Number(b)) if Self::is_exact(ctx) => {
                    match op {
                        CompareOp::Lt => a < b,
                        CompareOp::Le => a <= b,
                        CompareOp::Ge => a >= b,
                        CompareOp::Gt => a > b,
                        CompareOp::Eq => a == b,
                        CompareOp::Ne => a != b,
                    }
                }
                _ => return None,
            };
            result &= holds;
        }
        Some(result)
    }
}

/// The value of a literal expression, if it is one.
///
/// Numeric literals of every spelling evaluate to their exact rational value; foreign values
/// count only when they are booleans or numbers.
#[must_use]
pub fn literal_value(expr: &Expr) -> Option<ForeignValue> {
    let number = match &expr.kind {
        ExprKind::Bool(b) => return Some(ForeignValue::Bool(*b)),
        ExprKind::Foreign(value @ (ForeignValue::Bool(_) | ForeignValue::Number(_))) => {
            return Some(value.clone())
        }
        ExprKind::Integer(n) => BigRational::from_integer(n.clone()),
        ExprKind::Decnum(text) => parse_decnum(text)?,
        ExprKind::Hexnum(text) => parse_hexnum(text)?,
        ExprKind::Rational { p, q } => rational_value(p, q)?,
        ExprKind::Digits { m, e, b } => digits_value(m, e, b)?,
        _ => return None,
    };
    Some(ForeignValue::Number(number))
}

/// The literal node for a folded value.
fn literal_expr(value: ForeignValue, original: &Expr) -> Expr {
    let mut expr = match value {
        ForeignValue::Number(n) if n.is_integer() => Expr::int(n.to_integer()),
        value => Expr::foreign(value),
    };
    expr.loc = original.loc.clone();
    expr
}

/// Constant folding pass.
///
/// The evaluator is shared, so one pass instance can serve every function of a pipeline.
pub struct ConstFold {
    evaluator: Arc<dyn ConstEvaluator>,
}

impl Default for ConstFold {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstFold {
    /// Creates a constant folding pass using the [`ExactEvaluator`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_evaluator(ExactEvaluator)
    }

    /// Creates a constant folding pass using a custom evaluator.
    #[must_use]
    pub fn with_evaluator(evaluator: impl ConstEvaluator + 'static) -> Self {
        Self {
            evaluator: Arc::new(evaluator),
        }
    }
}

impl Pass for ConstFold {
    fn name(&self) -> &'static str {
        "const-fold"
    }

    fn description(&self) -> &'static str {
        "Folds operators on literal operands under the enclosing rounding context"
    }

    fn run_on_function(&self, func: &FuncDef, ctx: &CompilerContext) -> Result<(FuncDef, bool)> {
        let analysis = ContextInfer::infer(func)?;
        let changes = EventLog::new();
        let mut folder = Folder {
            analysis: &analysis,
            evaluator: self.evaluator.as_ref(),
            ctx: analysis.root().clone(),
            func: &func.name,
            changes: &changes,
            pass: self.name(),
        };
        let out = folder.fold_func(func.clone())?;
        finish(self.name(), out, changes, ctx)
    }
}

enum Folded {
    Value(ForeignValue),
    Branch(bool),
}

struct Folder<'a> {
    analysis: &'a ContextAnalysis,
    evaluator: &'a dyn ConstEvaluator,
    ctx: CtxVal,
    func: &'a Symbol,
    changes: &'a EventLog,
    pass: &'static str,
}

impl Folder<'_> {
    fn operands<'e>(args: impl IntoIterator<Item = &'e Expr>) -> Option<Vec<ForeignValue>> {
        args.into_iter().map(literal_value).collect()
    }

    fn evaluate(&self, expr: &Expr) -> Option<Folded> {
        let eval = |op: OpRef, args: Option<Vec<ForeignValue>>| {
            self.evaluator
                .eval(op, &args?, &self.ctx)
                .map(Folded::Value)
        };
        match &expr.kind {
            ExprKind::Unary { op, arg, .. } => eval(OpRef::Unary(*op), Self::operands([&**arg])),
            ExprKind::Binary { op, lhs, rhs, .. } => {
                eval(OpRef::Binary(*op), Self::operands([&**lhs, &**rhs]))
            }
            ExprKind::Ternary {
                op,
                first,
                second,
                third,
                ..
            } => eval(
                OpRef::Ternary(*op),
                Self::operands([&**first, &**second, &**third]),
            ),
            ExprKind::Nary { op, args, .. } => eval(OpRef::Nary(*op), Self::operands(args)),
            ExprKind::Compare { ops, args } => {
                let args = Self::operands(args)?;
                self.evaluator
                    .compare(ops, &args, &self.ctx)
                    .map(|b| Folded::Value(ForeignValue::Bool(b)))
            }
            ExprKind::IfExpr { cond, .. } => literal_value(cond)?.as_bool().map(Folded::Branch),
            _ => None,
        }
    }

    fn record(&self, node: NodeId, message: String) {
        self.changes
            .record(EventKind::ConstantFolded)
            .at(self.func, node)
            .pass(self.pass)
            .message(message);
    }
}

impl Fold for Folder<'_> {
    fn fold_stmt(&mut self, stmt: Stmt) -> Result<Vec<Stmt>> {
        let inner = self
            .analysis
            .ctx_of_stmt(stmt.id)
            .cloned()
            .unwrap_or(CtxVal::Unknown);
        let outer = std::mem::replace(&mut self.ctx, inner);
        let result = fold::fold_stmt(self, stmt);
        self.ctx = outer;
        Ok(vec![result?])
    }

    fn fold_expr(&mut self, expr: Expr) -> Result<Expr> {
        let expr = fold::fold_expr(self, expr)?;
        let Some(folded) = self.evaluate(&expr) else {
            return Ok(expr);
        };
        let replacement = match folded {
            Folded::Value(value) => {
                self.record(expr.id, format!("{expr} -> {value}"));
                literal_expr(value, &expr)
            }
            Folded::Branch(taken) => {
                self.record(expr.id, format!("condition is always {taken}"));
                match expr.kind {
                    ExprKind::IfExpr { ift, .. } if taken => *ift,
                    ExprKind::IfExpr { iff, .. } => *iff,
                    _ => return Ok(expr),
                }
            }
        };
        Ok(replacement)
    }
}
