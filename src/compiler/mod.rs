//! Pass infrastructure and the built-in transformation passes.
//!
//! This module sits on top of the analyses:
//!
//! - [`crate::analysis`] - reaching definitions, define-use, contexts, types, purity
//! - [`crate::rewrite`] - pattern-based rewriting
//! - [`compiler`](self) - structural passes and the scheduler that drives them
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      Compiler Pipeline                           │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  CompilerContext              Shared state of a compilation      │
//! │    ├─ functions               (DashMap, replaced by passes)      │
//! │    ├─ PipelineConfig          (thresholds, enabled passes)       │
//! │    └─ EventLog                (append-only, lock-free)           │
//! │                                                                  │
//! │  PassScheduler               Fixpoint execution                  │
//! │    └─ each round: every pass over every function, in parallel    │
//! │                                                                  │
//! │  Pass trait                  Interface for all passes            │
//! │    ├─ run_on_function()       &FuncDef -> (FuncDef, changed)     │
//! │    └─ apply()                 standalone use with a fresh ctx    │
//! │                                                                  │
//! │  Passes                                                          │
//! │    ├─ Value: const fold, copy propagation                        │
//! │    ├─ Cleanup: dead code elimination, context lifting            │
//! │    ├─ Structure: if simplification, unrolling, bundling          │
//! │    └─ Interprocedural: inlining, monomorphization                │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use fpy_core::prelude::*;
//!
//! let ctx = CompilerContext::new();
//! ctx.add_function(FuncDef::new("f", vec![Argument::new("x")], Block::new(vec![
//!     Stmt::assign("a", Expr::var("x")),
//!     Stmt::ret(Expr::var("a")),
//! ])));
//!
//! PassScheduler::default().run(&ctx)?;
//! assert_eq!(ctx.function("f").unwrap().body.len(), 1);
//! assert!(ctx.events.has(EventKind::CopyPropagated));
//! # Ok::<(), fpy_core::Error>(())
//! ```

mod config;
mod context;
mod events;
mod pass;
mod passes;
mod scheduler;

pub use config::PipelineConfig;
pub use context::CompilerContext;
pub use events::{Event, EventBuilder, EventKind, EventLog};
pub use pass::{verify, Pass};
pub use passes::{
    literal_value, Bundle, BundleTargets, ConstEvaluator, ConstFold, CopyPropagate,
    DeadCodeEliminate, ExactEvaluator, ForUnroll, FuncInline, LiftContext, Monomorphize,
    SimplifyIf, UnrollStrategy,
};
pub use scheduler::PassScheduler;
