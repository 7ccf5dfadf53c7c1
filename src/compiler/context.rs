//! Shared state of a compilation.
//!
//! The [`CompilerContext`] holds every function of a compilation unit and the event log. All
//! fields use thread-safe types so the scheduler can hand a shared reference to passes running
//! on different functions at the same time.

use dashmap::{DashMap, DashSet};

use crate::{
    ast::{FuncDef, Symbol},
    compiler::{config::PipelineConfig, events::EventLog},
};

/// State shared by all passes of a compilation.
#[derive(Debug, Default)]
pub struct CompilerContext {
    /// Functions by name. Passes replace entries with their output.
    pub functions: DashMap<Symbol, FuncDef>,

    /// Accumulated events from all passes.
    pub events: EventLog,

    /// Pipeline configuration (for pass-specific thresholds).
    pub config: PipelineConfig,

    /// Functions some pass changed.
    changed: DashSet<Symbol>,
}

impl CompilerContext {
    /// Creates an empty context with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty context with the given configuration.
    #[must_use]
    pub fn with_config(config: PipelineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Adds or replaces a function.
    pub fn add_function(&self, func: FuncDef) {
        self.functions.insert(func.name.clone(), func);
    }

    /// A copy of the named function.
    #[must_use]
    pub fn function(&self, name: &str) -> Option<FuncDef> {
        self.functions.get(name).map(|entry| entry.value().clone())
    }

    /// Function names in sorted order.
    #[must_use]
    pub fn function_names(&self) -> Vec<Symbol> {
        let mut names: Vec<Symbol> = self.functions.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Number of functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Returns `true` if the context holds no function.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Records that a pass changed the named function.
    pub fn mark_changed(&self, name: &Symbol) {
        self.changed.insert(name.clone());
    }

    /// Returns `true` if some pass changed the named function.
    #[must_use]
    pub fn is_changed(&self, name: &str) -> bool {
        self.changed.contains(name)
    }

    /// Consumes the context and returns the functions sorted by name.
    #[must_use]
    pub fn into_functions(self) -> Vec<FuncDef> {
        let mut funcs: Vec<FuncDef> = self.functions.into_iter().map(|(_, f)| f).collect();
        funcs.sort_by(|a, b| a.name.cmp(&b.name));
        funcs
    }
}
