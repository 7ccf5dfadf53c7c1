//! Configuration for the pass pipeline.

/// Controls which passes the default pipeline runs and how long it iterates.
///
/// Built with [`Default`] and refined with the `with_*` setters:
///
/// ```rust
/// use fpy_core::compiler::PipelineConfig;
///
/// let config = PipelineConfig::default()
///     .with_max_iterations(4)
///     .with_inlining(false);
/// assert_eq!(config.max_iterations, 4);
/// assert!(!config.enable_inlining);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Maximum rounds of the whole pass list (default: 10).
    pub max_iterations: usize,

    /// Process functions in parallel (default: true).
    pub parallel: bool,

    /// Enable function inlining.
    pub enable_inlining: bool,

    /// Maximum statement count of a callee considered for inlining (default: 64).
    pub inline_threshold: usize,

    /// Enable constant folding.
    pub enable_constant_folding: bool,

    /// Enable copy propagation.
    pub enable_copy_propagation: bool,

    /// Enable dead code elimination.
    pub enable_dead_code_elimination: bool,

    /// Enable if simplification.
    ///
    /// Off by default: the pass evaluates both arms, so an index or a division the condition
    /// guards runs even when the guard is false.
    pub enable_simplify_if: bool,

    /// Enable context lifting.
    pub enable_context_lifting: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            parallel: true,
            enable_inlining: true,
            inline_threshold: 64,
            enable_constant_folding: true,
            enable_copy_propagation: true,
            enable_dead_code_elimination: true,
            enable_simplify_if: false,
            enable_context_lifting: false,
        }
    }
}

impl PipelineConfig {
    /// Sets the iteration limit.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Enables or disables parallel processing.
    #[must_use]
    pub const fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Enables or disables inlining.
    #[must_use]
    pub const fn with_inlining(mut self, enable: bool) -> Self {
        self.enable_inlining = enable;
        self
    }

    /// Sets the inlining size limit.
    #[must_use]
    pub const fn with_inline_threshold(mut self, threshold: usize) -> Self {
        self.inline_threshold = threshold;
        self
    }

    /// Enables or disables constant folding.
    #[must_use]
    pub const fn with_constant_folding(mut self, enable: bool) -> Self {
        self.enable_constant_folding = enable;
        self
    }

    /// Enables or disables copy propagation.
    #[must_use]
    pub const fn with_copy_propagation(mut self, enable: bool) -> Self {
        self.enable_copy_propagation = enable;
        self
    }

    /// Enables or disables dead code elimination.
    #[must_use]
    pub const fn with_dead_code_elimination(mut self, enable: bool) -> Self {
        self.enable_dead_code_elimination = enable;
        self
    }

    /// Enables or disables if simplification.
    #[must_use]
    pub const fn with_simplify_if(mut self, enable: bool) -> Self {
        self.enable_simplify_if = enable;
        self
    }

    /// Enables or disables context lifting.
    #[must_use]
    pub const fn with_context_lifting(mut self, enable: bool) -> Self {
        self.enable_context_lifting = enable;
        self
    }
}
