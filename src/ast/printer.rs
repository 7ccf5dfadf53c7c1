//! Source-like rendering of the AST.
//!
//! [`Printer`] is an explicit formatter value; the `Display` impls on the node types use a
//! default-configured printer. Output follows FPy's Python-like surface syntax with four-space
//! indentation, and reproduces the function spelling of named operator nodes.

use std::fmt::{self, Write};

use super::{
    Binding, BinaryOpKind, Block, Expr, ExprKind, FuncDef, NaryOpKind, Stmt, StmtKind,
    UnaryOpKind,
};

/// Formatter for FPy syntax.
#[derive(Debug, Clone)]
pub struct Printer {
    indent: usize,
}

impl Default for Printer {
    fn default() -> Self {
        Self { indent: 4 }
    }
}

// Binding strength, loosest first.
const PREC_IFEXPR: u8 = 0;
const PREC_OR: u8 = 1;
const PREC_AND: u8 = 2;
const PREC_NOT: u8 = 3;
const PREC_CMP: u8 = 4;
const PREC_ADD: u8 = 5;
const PREC_MUL: u8 = 6;
const PREC_NEG: u8 = 7;
const PREC_ATOM: u8 = 8;

impl Printer {
    /// Creates a printer with the given indentation width.
    #[must_use]
    pub fn new(indent: usize) -> Self {
        Self { indent }
    }

    /// Renders a function definition.
    #[must_use]
    pub fn func(&self, func: &FuncDef) -> String {
        let mut out = String::new();
        let _ = self.write_func(&mut out, func);
        out
    }

    /// Renders a statement at indentation level zero.
    #[must_use]
    pub fn stmt(&self, stmt: &Stmt) -> String {
        let mut out = String::new();
        let _ = self.write_stmt(&mut out, stmt, 0);
        out
    }

    /// Renders an expression.
    #[must_use]
    pub fn expr(&self, expr: &Expr) -> String {
        let mut out = String::new();
        let _ = self.write_expr(&mut out, expr, PREC_IFEXPR);
        out
    }

    fn write_func(&self, out: &mut String, func: &FuncDef) -> fmt::Result {
        if let Some(ctx) = &func.ctx {
            writeln!(out, "@fpy(ctx={ctx})")?;
        }
        write!(out, "def {}(", func.name)?;
        for (i, arg) in func.args.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            write!(out, "{}", arg.name)?;
            if let Some(ann) = &arg.ann {
                write!(out, ": {ann}")?;
            }
        }
        out.push_str("):\n");
        self.write_block(out, &func.body, 1)
    }

    fn write_block(&self, out: &mut String, block: &Block, level: usize) -> fmt::Result {
        if block.stmts.is_empty() {
            self.pad(out, level);
            out.push_str("pass\n");
        }
        for stmt in &block.stmts {
            self.write_stmt(out, stmt, level)?;
        }
        Ok(())
    }

    fn pad(&self, out: &mut String, level: usize) {
        for _ in 0..level * self.indent {
            out.push(' ');
        }
    }

    fn write_stmt(&self, out: &mut String, stmt: &Stmt, level: usize) -> fmt::Result {
        self.pad(out, level);
        match &stmt.kind {
            StmtKind::Assign { target, ann, expr } => {
                write_binding(out, target, true)?;
                if let Some(ann) = ann {
                    write!(out, ": {ann}")?;
                }
                out.push_str(" = ");
                self.write_expr(out, expr, PREC_IFEXPR)?;
                out.push('\n');
            }
            StmtKind::IndexedAssign { var, indices, expr } => {
                write!(out, "{var}")?;
                for index in indices {
                    out.push('[');
                    self.write_expr(out, index, PREC_IFEXPR)?;
                    out.push(']');
                }
                out.push_str(" = ");
                self.write_expr(out, expr, PREC_IFEXPR)?;
                out.push('\n');
            }
            StmtKind::If1 { cond, body } => {
                out.push_str("if ");
                self.write_expr(out, cond, PREC_IFEXPR)?;
                out.push_str(":\n");
                self.write_block(out, body, level + 1)?;
            }
            StmtKind::If { cond, ift, iff } => {
                out.push_str("if ");
                self.write_expr(out, cond, PREC_IFEXPR)?;
                out.push_str(":\n");
                self.write_block(out, ift, level + 1)?;
                self.pad(out, level);
                out.push_str("else:\n");
                self.write_block(out, iff, level + 1)?;
            }
            StmtKind::While { cond, body } => {
                out.push_str("while ");
                self.write_expr(out, cond, PREC_IFEXPR)?;
                out.push_str(":\n");
                self.write_block(out, body, level + 1)?;
            }
            StmtKind::For {
                target,
                iterable,
                body,
            } => {
                out.push_str("for ");
                write_binding(out, target, true)?;
                out.push_str(" in ");
                self.write_expr(out, iterable, PREC_IFEXPR)?;
                out.push_str(":\n");
                self.write_block(out, body, level + 1)?;
            }
            StmtKind::Context { name, ctx, body } => {
                out.push_str("with ");
                self.write_expr(out, ctx, PREC_IFEXPR)?;
                if let Some(name) = name {
                    write!(out, " as {name}")?;
                }
                out.push_str(":\n");
                self.write_block(out, body, level + 1)?;
            }
            StmtKind::Assert { test, msg } => {
                out.push_str("assert ");
                self.write_expr(out, test, PREC_IFEXPR)?;
                if let Some(msg) = msg {
                    out.push_str(", ");
                    self.write_expr(out, msg, PREC_IFEXPR)?;
                }
                out.push('\n');
            }
            StmtKind::Effect(expr) => {
                self.write_expr(out, expr, PREC_IFEXPR)?;
                out.push('\n');
            }
            StmtKind::Return(expr) => {
                out.push_str("return ");
                self.write_expr(out, expr, PREC_IFEXPR)?;
                out.push('\n');
            }
            StmtKind::Pass => out.push_str("pass\n"),
        }
        Ok(())
    }

    fn write_args(&self, out: &mut String, args: &[&Expr]) -> fmt::Result {
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.write_expr(out, arg, PREC_IFEXPR)?;
        }
        Ok(())
    }

    fn write_call(&self, out: &mut String, name: &str, args: &[&Expr]) -> fmt::Result {
        out.push_str(name);
        out.push('(');
        self.write_args(out, args)?;
        out.push(')');
        Ok(())
    }

    fn write_kwargs(
        &self,
        out: &mut String,
        positional: bool,
        kwargs: &[(super::Symbol, Expr)],
    ) -> fmt::Result {
        for (i, (key, value)) in kwargs.iter().enumerate() {
            if positional || i > 0 {
                out.push_str(", ");
            }
            write!(out, "{key}=")?;
            self.write_expr(out, value, PREC_IFEXPR)?;
        }
        Ok(())
    }

    fn write_expr(&self, out: &mut String, expr: &Expr, min_prec: u8) -> fmt::Result {
        let prec = precedence(expr);
        let parens = prec < min_prec;
        if parens {
            out.push('(');
        }
        match &expr.kind {
            ExprKind::Var(name) => write!(out, "{name}")?,
            ExprKind::Bool(true) => out.push_str("True"),
            ExprKind::Bool(false) => out.push_str("False"),
            ExprKind::Decnum(text) | ExprKind::Hexnum(text) => out.push_str(text),
            ExprKind::Integer(n) => write!(out, "{n}")?,
            ExprKind::Rational { p, q } => write!(out, "rational({p}, {q})")?,
            ExprKind::Digits { m, e, b } => write!(out, "digits({m}, {e}, {b})")?,
            ExprKind::Foreign(value) => write!(out, "{value}")?,
            ExprKind::Nullary { op, func } => {
                out.push_str(func.as_deref().unwrap_or_else(|| op.name()));
            }
            ExprKind::Unary { op, func, arg } => match (op, func) {
                (UnaryOpKind::Neg, None) => {
                    out.push('-');
                    self.write_expr(out, arg, PREC_NEG)?;
                }
                (UnaryOpKind::Not, None) => {
                    out.push_str("not ");
                    self.write_expr(out, arg, PREC_NOT)?;
                }
                _ => self.write_call(out, func.as_deref().unwrap_or(op.name()), &[arg])?,
            },
            ExprKind::Binary { op, func, lhs, rhs } => match (infix(*op), func) {
                (Some((symbol, op_prec)), None) => {
                    self.write_expr(out, lhs, op_prec)?;
                    write!(out, " {symbol} ")?;
                    self.write_expr(out, rhs, op_prec + 1)?;
                }
                _ => self.write_call(out, func.as_deref().unwrap_or(op.name()), &[lhs, rhs])?,
            },
            ExprKind::Ternary {
                op,
                func,
                first,
                second,
                third,
            } => self.write_call(
                out,
                func.as_deref().unwrap_or(op.name()),
                &[first, second, third],
            )?,
            ExprKind::Nary { op, func, args } => match (op, func) {
                (NaryOpKind::And | NaryOpKind::Or, None) if args.len() >= 2 => {
                    let (symbol, op_prec) = if *op == NaryOpKind::And {
                        (" and ", PREC_AND)
                    } else {
                        (" or ", PREC_OR)
                    };
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            out.push_str(symbol);
                        }
                        self.write_expr(out, arg, op_prec + 1)?;
                    }
                }
                _ => {
                    let args: Vec<&Expr> = args.iter().collect();
                    self.write_call(out, func.as_deref().unwrap_or(op.name()), &args)?;
                }
            },
            ExprKind::Compare { ops, args } => {
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        if let Some(op) = ops.get(i - 1) {
                            write!(out, " {} ", op.symbol())?;
                        }
                    }
                    self.write_expr(out, arg, PREC_CMP + 1)?;
                }
            }
            ExprKind::Call {
                func, args, kwargs, ..
            } => {
                write!(out, "{func}(")?;
                let positional: Vec<&Expr> = args.iter().collect();
                self.write_args(out, &positional)?;
                self.write_kwargs(out, !args.is_empty(), kwargs)?;
                out.push(')');
            }
            ExprKind::Tuple(elts) => {
                out.push('(');
                let elts: Vec<&Expr> = elts.iter().collect();
                self.write_args(out, &elts)?;
                if elts.len() == 1 {
                    out.push(',');
                }
                out.push(')');
            }
            ExprKind::List(elts) => {
                out.push('[');
                let elts: Vec<&Expr> = elts.iter().collect();
                self.write_args(out, &elts)?;
                out.push(']');
            }
            ExprKind::ListComp {
                targets,
                iterables,
                elt,
            } => {
                out.push('[');
                self.write_expr(out, elt, PREC_IFEXPR)?;
                for (target, iterable) in targets.iter().zip(iterables) {
                    out.push_str(" for ");
                    write_binding(out, target, true)?;
                    out.push_str(" in ");
                    self.write_expr(out, iterable, PREC_OR)?;
                }
                out.push(']');
            }
            ExprKind::ListRef { value, index } => {
                self.write_expr(out, value, PREC_ATOM)?;
                out.push('[');
                self.write_expr(out, index, PREC_IFEXPR)?;
                out.push(']');
            }
            ExprKind::ListSlice { value, start, stop } => {
                self.write_expr(out, value, PREC_ATOM)?;
                out.push('[');
                if let Some(start) = start {
                    self.write_expr(out, start, PREC_IFEXPR)?;
                }
                out.push(':');
                if let Some(stop) = stop {
                    self.write_expr(out, stop, PREC_IFEXPR)?;
                }
                out.push(']');
            }
            ExprKind::ListSet {
                value,
                indices,
                elt,
            } => {
                out.push_str("set(");
                self.write_expr(out, value, PREC_IFEXPR)?;
                out.push_str(", (");
                let indices: Vec<&Expr> = indices.iter().collect();
                self.write_args(out, &indices)?;
                if indices.len() == 1 {
                    out.push(',');
                }
                out.push_str("), ");
                self.write_expr(out, elt, PREC_IFEXPR)?;
                out.push(')');
            }
            ExprKind::IfExpr { cond, ift, iff } => {
                self.write_expr(out, ift, PREC_OR)?;
                out.push_str(" if ");
                self.write_expr(out, cond, PREC_OR)?;
                out.push_str(" else ");
                self.write_expr(out, iff, PREC_IFEXPR)?;
            }
            ExprKind::Context { ctor, args, kwargs } => {
                write!(out, "{ctor}(")?;
                let positional: Vec<&Expr> = args.iter().collect();
                self.write_args(out, &positional)?;
                self.write_kwargs(out, !args.is_empty(), kwargs)?;
                out.push(')');
            }
        }
        if parens {
            out.push(')');
        }
        Ok(())
    }
}

fn infix(op: BinaryOpKind) -> Option<(&'static str, u8)> {
    match op {
        BinaryOpKind::Add => Some(("+", PREC_ADD)),
        BinaryOpKind::Sub => Some(("-", PREC_ADD)),
        BinaryOpKind::Mul => Some(("*", PREC_MUL)),
        BinaryOpKind::Div => Some(("/", PREC_MUL)),
        _ => None,
    }
}

fn precedence(expr: &Expr) -> u8 {
    match &expr.kind {
        ExprKind::IfExpr { .. } => PREC_IFEXPR,
        ExprKind::Nary {
            op: NaryOpKind::Or,
            func: None,
            args,
        } if args.len() >= 2 => PREC_OR,
        ExprKind::Nary {
            op: NaryOpKind::And,
            func: None,
            args,
        } if args.len() >= 2 => PREC_AND,
        ExprKind::Unary {
            op: UnaryOpKind::Not,
            func: None,
            ..
        } => PREC_NOT,
        ExprKind::Compare { .. } => PREC_CMP,
        ExprKind::Binary { op, func: None, .. } => infix(*op).map_or(PREC_ATOM, |(_, p)| p),
        ExprKind::Unary {
            op: UnaryOpKind::Neg,
            func: None,
            ..
        } => PREC_NEG,
        ExprKind::Integer(n) if n.sign() == num::bigint::Sign::Minus => PREC_NEG,
        _ => PREC_ATOM,
    }
}

fn write_binding(out: &mut String, binding: &Binding, top: bool) -> fmt::Result {
    match binding {
        Binding::Id(id) => write!(out, "{id}"),
        Binding::Tuple(elts) => {
            if !top {
                out.push('(');
            }
            for (i, elt) in elts.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_binding(out, elt, false)?;
            }
            if elts.len() == 1 {
                out.push(',');
            }
            if !top {
                out.push(')');
            }
            Ok(())
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Printer::default().expr(self))
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Printer::default().stmt(self))
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        Printer::default().write_block(&mut out, self, 0)?;
        f.write_str(&out)
    }
}

impl fmt::Display for FuncDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Printer::default().func(self))
    }
}
