//! Pattern-based rewriting.
//!
//! Rules are written as ordinary FPy functions. A pattern function's parameters are its
//! pattern variables. Any other name is free: it matches any name, consistently across one
//! match. A function whose body is a single effect statement is an expression pattern; any
//! other body is a statement pattern matched against windows of consecutive statements.
//!
//! # Architecture
//!
//! - [`pattern`] - [`Pattern`]: an expression or statement-window template
//! - [`matcher`] - [`Matcher`]: structural matching producing a [`Subst`]
//! - [`applier`] - [`Applier`]: instantiation of a pattern under a substitution
//! - [`engine`] - [`Rewrite`]: a left/right pattern pair applied to whole functions
//!
//! # Usage
//!
//! ```rust
//! use fpy_core::prelude::*;
//!
//! // def lhs(a, b, c): a * b + c
//! let lhs = FuncDef::new(
//!     "lhs",
//!     vec![Argument::new("a"), Argument::new("b"), Argument::new("c")],
//!     Block::new(vec![Stmt::effect(Expr::add(
//!         Expr::mul(Expr::var("a"), Expr::var("b")),
//!         Expr::var("c"),
//!     ))]),
//! );
//! // def rhs(a, b, c): fma(a, b, c)
//! let rhs = FuncDef::new(
//!     "rhs",
//!     vec![Argument::new("a"), Argument::new("b"), Argument::new("c")],
//!     Block::new(vec![Stmt::effect(
//!         Expr::ternary(TernaryOpKind::Fma, Expr::var("a"), Expr::var("b"), Expr::var("c"))
//!             .named("fma"),
//!     )]),
//! );
//! let rule = Rewrite::from_funcs("fma", &lhs, &rhs)?;
//!
//! // def f(x, y): return x * y + 1
//! let f = FuncDef::new(
//!     "f",
//!     vec![Argument::new("x"), Argument::new("y")],
//!     Block::new(vec![Stmt::ret(Expr::add(
//!         Expr::mul(Expr::var("x"), Expr::var("y")),
//!         Expr::int(1),
//!     ))]),
//! );
//! let (out, stats) = rule.apply_all(&f)?;
//! assert_eq!(stats.applications, 1);
//! assert!(rule.matches(&out).is_empty());
//! # Ok::<(), fpy_core::Error>(())
//! ```

pub mod applier;
pub mod engine;
pub mod matcher;
pub mod pattern;

pub use applier::{Applier, Replacement};
pub use engine::{Rewrite, RewriteStats};
pub use matcher::{Match, MatchSite, Matcher, Subst};
pub use pattern::{Pattern, PatternKind};
