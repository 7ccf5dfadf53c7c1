//! Pass scheduler for running a pass list to fixpoint.
//!
//! The `PassScheduler` runs its passes in order over every function of a
//! [`CompilerContext`], and repeats the whole list until a round changes nothing
//! or the iteration limit is reached.

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;

use crate::{
    ast::Symbol,
    compiler::{
        config::PipelineConfig,
        context::CompilerContext,
        pass::Pass,
        passes::{ConstFold, CopyPropagate, DeadCodeEliminate, FuncInline, LiftContext, SimplifyIf},
    },
    Result,
};

/// Orchestrates pass execution.
///
/// Within one round each pass runs over all functions before the next pass starts. Functions
/// are independent, so a pass processes them in parallel; the function map and the event log
/// of the context are safe to share.
pub struct PassScheduler {
    /// Maximum rounds of the pass list.
    max_iterations: usize,
    /// Process functions in parallel.
    parallel: bool,
    /// The passes, in execution order.
    passes: Vec<Box<dyn Pass>>,
}

impl Default for PassScheduler {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

impl PassScheduler {
    /// Creates an empty scheduler.
    ///
    /// # Arguments
    ///
    /// * `max_iterations` - Maximum rounds of the pass list before stopping.
    #[must_use]
    pub fn new(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            parallel: true,
            passes: Vec::new(),
        }
    }

    /// Creates the default pipeline selected by `config`.
    ///
    /// The order is inlining, context lifting, constant folding, if simplification, copy
    /// propagation and dead code elimination.
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        let mut scheduler = Self::new(config.max_iterations);
        scheduler.parallel = config.parallel;
        if config.enable_inlining {
            scheduler.add(FuncInline::new());
        }
        if config.enable_context_lifting {
            scheduler.add(LiftContext::new());
        }
        if config.enable_constant_folding {
            scheduler.add(ConstFold::new());
        }
        if config.enable_simplify_if {
            scheduler.add(SimplifyIf::new());
        }
        if config.enable_copy_propagation {
            scheduler.add(CopyPropagate::new());
        }
        if config.enable_dead_code_elimination {
            scheduler.add(DeadCodeEliminate::new());
        }
        scheduler
    }

    /// Appends a pass.
    pub fn add(&mut self, pass: impl Pass + 'static) -> &mut Self {
        self.passes.push(Box::new(pass));
        self
    }

    /// Appends a pass, builder style.
    #[must_use]
    pub fn with_pass(mut self, pass: impl Pass + 'static) -> Self {
        self.add(pass);
        self
    }

    /// Enables or disables parallel processing.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Names of the scheduled passes, in order.
    #[must_use]
    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|pass| pass.name()).collect()
    }

    /// Runs the pass list until a round changes nothing.
    ///
    /// # Returns
    ///
    /// The number of rounds that changed something.
    ///
    /// # Errors
    ///
    /// Returns the first error a pass reported; the failing function keeps its last good
    /// version.
    pub fn run(&self, ctx: &CompilerContext) -> Result<usize> {
        let mut rounds = 0;
        for iteration in 0..self.max_iterations {
            let changed = self.run_once(ctx)?;
            log::debug!("pipeline round {iteration}: changed = {changed}");
            if !changed {
                break;
            }
            rounds += 1;
        }
        if rounds == self.max_iterations && rounds > 0 {
            log::warn!(
                "pipeline stopped after {} rounds without reaching a fixpoint",
                self.max_iterations
            );
        }
        Ok(rounds)
    }

    /// Runs every pass once over every function.
    ///
    /// Returns `true` if any pass changed any function.
    ///
    /// # Errors
    ///
    /// Returns the first error a pass reported.
    pub fn run_once(&self, ctx: &CompilerContext) -> Result<bool> {
        let any_changed = AtomicBool::new(false);
        let names = ctx.function_names();

        for pass in &self.passes {
            let step = |name: &Symbol| -> Result<()> {
                let Some(func) = ctx.function(name) else {
                    return Ok(());
                };
                if !pass.should_run(&func, ctx) {
                    return Ok(());
                }
                let (out, changed) = pass.run_on_function(&func, ctx)?;
                if changed {
                    log::trace!("{} changed `{}`", pass.name(), name);
                    ctx.functions.insert(name.clone(), out);
                    ctx.mark_changed(name);
                    any_changed.store(true, Ordering::Relaxed);
                }
                Ok(())
            };
            if self.parallel {
                names.par_iter().try_for_each(step)?;
            } else {
                names.iter().try_for_each(step)?;
            }
        }

        Ok(any_changed.load(Ordering::Relaxed))
    }
}
