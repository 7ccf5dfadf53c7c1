// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![warn(missing_docs)]
#![allow(clippy::too_many_arguments)]

//! # fpy-core
//!
//! The analysis and transformation core of the FPy compiler.
//!
//! FPy programs are small imperative functions that describe floating-point computations under
//! explicit, lexically scoped rounding contexts. This crate holds everything between the
//! frontend (which produces an AST) and the backends (which consume one): the tree itself,
//! the dataflow analyses over it, a pattern-based rewrite engine and the structural
//! transformation passes.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  ast         FuncDef / Block / Stmt / Expr, Visit, Fold, Printer  │
//! ├───────────────────────────────────────────────────────────────────┤
//! │  analysis    ReachingDefs ──► DefineUse ──► ContextInfer          │
//! │              TypeInfer  Purity  Reachability  LiveVars  Syntax    │
//! ├───────────────────────────────────────────────────────────────────┤
//! │  rewrite     Pattern ──► matcher ──► applier ──► Rewrite          │
//! ├───────────────────────────────────────────────────────────────────┤
//! │  compiler    Pass trait, passes, EventLog, PassScheduler          │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every analysis is computed per invocation from a `&FuncDef` and keyed by
//! [`ast::NodeId`]. Every pass consumes a `&FuncDef` and returns a new one; results are
//! re-verified before they are handed back.
//!
//! ## Quick Start
//!
//! ```rust
//! use fpy_core::prelude::*;
//!
//! // def f(x):
//! //     a = x
//! //     b = a + 1
//! //     return b
//! let func = FuncDef::new(
//!     "f",
//!     vec![Argument::new("x")],
//!     Block::new(vec![
//!         Stmt::assign("a", Expr::var("x")),
//!         Stmt::assign("b", Expr::add(Expr::var("a"), Expr::int(1))),
//!         Stmt::ret(Expr::var("b")),
//!     ]),
//! );
//!
//! let func = CopyPropagate::new().apply(&func)?;
//! let func = DeadCodeEliminate::new().apply(&func)?;
//! assert_eq!(func.body.len(), 2);
//! # Ok::<(), fpy_core::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, Error>`](Result). Analyses report the offending
//! node through [`Error::site`]; passes propagate analysis errors and turn verification
//! failures into [`Error::InvariantViolation`].

pub mod analysis;
pub mod ast;
pub mod compiler;
pub(crate) mod error;
pub mod prelude;
pub mod rewrite;
pub mod utils;

#[cfg(test)]
mod test;

pub use error::Error;

/// `fpy-core` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
