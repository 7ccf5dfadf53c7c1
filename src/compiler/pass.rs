//! The pass interface.

use crate::{
    analysis::SyntaxCheck,
    ast::FuncDef,
    compiler::{context::CompilerContext, events::EventLog},
    error::invariant_error,
    Result,
};

/// A transformation over one function.
///
/// All passes must be thread-safe (Send + Sync) so the scheduler can process independent
/// functions in parallel. A pass never mutates its input: it returns a new function together
/// with a flag telling whether anything changed, and records what it did in `ctx.events`.
/// Every result is checked with [`SyntaxCheck`] before it is returned.
pub trait Pass: Send + Sync {
    /// Unique name for logging and debugging.
    fn name(&self) -> &'static str;

    /// Get a description of what this pass does.
    fn description(&self) -> &'static str {
        "No description available"
    }

    /// Should this pass run on a specific function?
    ///
    /// Called by the scheduler before `run_on_function`.
    fn should_run(&self, _func: &FuncDef, _ctx: &CompilerContext) -> bool {
        true
    }

    /// Runs the pass on a single function.
    ///
    /// # Arguments
    ///
    /// * `func` - The function to transform.
    /// * `ctx` - The shared compiler context; events are merged into `ctx.events`.
    ///
    /// # Errors
    ///
    /// Propagates analysis errors, and returns [`crate::Error::InvariantViolation`] if the
    /// result is not well formed.
    fn run_on_function(&self, func: &FuncDef, ctx: &CompilerContext) -> Result<(FuncDef, bool)>;

    /// Runs the pass on a standalone function with a fresh context.
    ///
    /// # Errors
    ///
    /// See [`Pass::run_on_function`].
    fn apply(&self, func: &FuncDef) -> Result<FuncDef> {
        let ctx = CompilerContext::new();
        self.run_on_function(func, &ctx).map(|(func, _)| func)
    }
}

/// Checks that a pass produced a well-formed function.
///
/// # Errors
///
/// Returns [`crate::Error::InvariantViolation`] describing the check that failed.
pub fn verify(pass: &str, func: &FuncDef) -> Result<()> {
    SyntaxCheck::check(func)
        .map_err(|err| invariant_error!("{} produced malformed `{}`: {}", pass, func.name, err))
}

/// Verifies a pass result, then publishes the pass's events to the shared log.
pub(crate) fn finish(
    pass: &str,
    func: FuncDef,
    changes: EventLog,
    ctx: &CompilerContext,
) -> Result<(FuncDef, bool)> {
    verify(pass, &func)?;
    let changed = !changes.is_empty();
    if changed {
        log::debug!("{pass} on `{}`: {}", func.name, changes.summary());
        ctx.events.merge(changes);
    }
    Ok((func, changed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::{Expr, Stmt},
        test::helpers::{func, scenario_simple},
        Error,
    };

    struct Identity;

    impl Pass for Identity {
        fn name(&self) -> &'static str {
            "identity"
        }

        fn run_on_function(
            &self,
            func: &FuncDef,
            ctx: &CompilerContext,
        ) -> Result<(FuncDef, bool)> {
            finish(self.name(), func.clone(), EventLog::new(), ctx)
        }
    }

    #[test]
    fn test_apply_uses_a_fresh_context() {
        let f = scenario_simple();
        let out = Identity.apply(&f).unwrap();
        assert!(out.is_equiv(&f));
        assert_eq!(Identity.description(), "No description available");
    }

    #[test]
    fn test_malformed_results_are_invariant_violations() {
        let broken = func(&[], vec![Stmt::ret(Expr::var("missing"))]);
        assert!(matches!(
            Identity.apply(&broken),
            Err(Error::InvariantViolation { .. })
        ));
    }
}
