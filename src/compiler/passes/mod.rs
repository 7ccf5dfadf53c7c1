//! Built-in transformation passes.
//!
//! Every pass implements [`Pass`](crate::compiler::Pass): it takes a function, returns a new
//! one, records what it changed in an [`EventLog`](crate::compiler::EventLog) and verifies
//! its output with [`SyntaxCheck`](crate::analysis::SyntaxCheck).
//!
//! # Default Pipeline
//!
//! [`PassScheduler::from_config`](crate::compiler::PassScheduler::from_config) runs these, in
//! order, until a round changes nothing:
//!
//! | Pass | Description |
//! |------|-------------|
//! | [`FuncInline`] | Splices bodies of small user-defined callees into the caller |
//! | [`LiftContext`] | Hoists statically known contexts to top-level bindings (opt-in) |
//! | [`ConstFold`] | Folds operators over literals under the statically known context |
//! | [`SimplifyIf`] | Turns `if` statements into straight-line code (opt-in) |
//! | [`CopyPropagate`] | Replaces uses of copies with their sources |
//! | [`DeadCodeEliminate`] | Removes dead assignments, unreachable code and unused free variables |
//!
//! # Parameterized Passes
//!
//! These need arguments only the caller knows and are never scheduled implicitly:
//!
//! | Pass | Description |
//! |------|-------------|
//! | [`ForUnroll`] | Unrolls `for` loops by a constant factor |
//! | [`Monomorphize`] | Substitutes concrete types and contexts for annotation variables |
//! | [`Bundle`] | Packs the names merged by a loop or branch into one tuple |

mod bundle;
mod constfold;
mod copyprop;
mod deadcode;
mod inline;
mod liftctx;
mod monomorphize;
mod simplify_if;
mod unroll;

pub use bundle::{Bundle, BundleTargets};
pub use constfold::{literal_value, ConstEvaluator, ConstFold, ExactEvaluator};
pub use copyprop::CopyPropagate;
pub use deadcode::DeadCodeEliminate;
pub use inline::FuncInline;
pub use liftctx::LiftContext;
pub use monomorphize::Monomorphize;
pub use simplify_if::SimplifyIf;
pub use unroll::{ForUnroll, UnrollStrategy};
