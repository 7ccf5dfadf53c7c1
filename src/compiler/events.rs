//! Structured record of what the passes did.
//!
//! Passes collect their events in a local [`EventLog`] and merge it into the shared log of the
//! [`crate::compiler::CompilerContext`] once they finish a function. The log is append-only and
//! can be written through a shared reference, so functions processed in parallel never
//! contend on a lock.

use std::{collections::BTreeMap, fmt};

use strum::{EnumCount, EnumIter, IntoStaticStr};

use crate::ast::{NodeId, Symbol};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter, EnumCount, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    /// An operator node was replaced by its value
    ConstantFolded,
    /// A use of a copy was replaced by the copy's source
    CopyPropagated,
    /// A dead assignment was removed
    AssignmentRemoved,
    /// An unreachable or redundant statement was removed
    StatementRemoved,
    /// An unused free variable was dropped from the function
    FreeVarPruned,
    /// An `if` statement was turned into straight-line code
    IfSimplified,
    /// A `for` loop was unrolled
    LoopUnrolled,
    /// A call was replaced by the callee body
    CallInlined,
    /// A context expression was hoisted to a top-level binding
    ContextLifted,
    /// A polymorphic annotation was made concrete
    Monomorphized,
    /// Loop-carried or branch-assigned names were packed into one tuple
    VariablesBundled,
    /// A rewrite rule replaced an occurrence
    RewriteApplied,
    /// A pass could not process a function
    Warning,
    /// Informational message
    Info,
}

/// One recorded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// What happened
    pub kind: EventKind,
    /// The function it happened in
    pub function: Option<Symbol>,
    /// The node it happened at
    pub node: Option<NodeId>,
    /// The pass responsible
    pub pass: Option<&'static str>,
    /// Free-form details
    pub message: String,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind: &'static str = self.kind.into();
        write!(f, "[{kind}]")?;
        if let Some(pass) = self.pass {
            write!(f, " {pass}")?;
        }
        if let Some(function) = &self.function {
            write!(f, " in `{function}`")?;
        }
        if let Some(node) = self.node {
            write!(f, " at {node}")?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

/// Fluent builder returned by [`EventLog::record`]; the event is appended when it is dropped.
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    event: Option<Event>,
}

impl EventBuilder<'_> {
    fn update(mut self, f: impl FnOnce(&mut Event)) -> Self {
        if let Some(event) = self.event.as_mut() {
            f(event);
        }
        self
    }

    /// Sets the function.
    #[must_use]
    pub fn function(self, name: &Symbol) -> Self {
        let name = name.clone();
        self.update(|event| event.function = Some(name))
    }

    /// Sets the function and the node.
    #[must_use]
    pub fn at(self, name: &Symbol, node: NodeId) -> Self {
        let name = name.clone();
        self.update(|event| {
            event.function = Some(name);
            event.node = Some(node);
        })
    }

    /// Sets the node.
    #[must_use]
    pub fn node(self, node: NodeId) -> Self {
        self.update(|event| event.node = Some(node))
    }

    /// Sets the responsible pass.
    #[must_use]
    pub fn pass(self, pass: &'static str) -> Self {
        self.update(|event| event.pass = Some(pass))
    }

    /// Sets the message.
    #[allow(clippy::return_self_not_must_use)]
    pub fn message(self, message: impl Into<String>) -> Self {
        let message = message.into();
        self.update(|event| event.message = message)
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        if let Some(event) = self.event.take() {
            self.log.push(event);
        }
    }
}

/// Append-only event log.
#[derive(Default)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl fmt::Debug for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLog")
            .field("events", &self.len())
            .finish()
    }
}

impl EventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts recording an event of the given kind.
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder {
            log: self,
            event: Some(Event {
                kind,
                function: None,
                node: None,
                pass: None,
                message: String::new(),
            }),
        }
    }

    /// Appends a complete event.
    pub fn push(&self, event: Event) {
        self.events.push(event);
    }

    /// Records an informational message.
    pub fn info(&self, message: impl Into<String>) {
        drop(self.record(EventKind::Info).message(message));
    }

    /// Records a warning.
    pub fn warn(&self, message: impl Into<String>) {
        drop(self.record(EventKind::Warning).message(message));
    }

    /// Appends every event of `other`.
    pub fn merge(&self, other: EventLog) {
        for (_, event) in other.events.iter() {
            self.events.push(event.clone());
        }
    }

    /// Moves all events out, leaving the log empty.
    pub fn take(&mut self) -> EventLog {
        std::mem::take(self)
    }

    /// Number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Events in the order they were appended.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|(_, event)| event)
    }

    /// Number of events of one kind.
    #[must_use]
    pub fn count(&self, kind: EventKind) -> usize {
        self.iter().filter(|event| event.kind == kind).count()
    }

    /// Returns `true` if an event of this kind was recorded.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.iter().any(|event| event.kind == kind)
    }

    /// One-line summary with the count of every recorded kind, e.g.
    /// `constant_folded: 3, assignment_removed: 1`.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut counts: BTreeMap<EventKind, usize> = BTreeMap::new();
        for event in self.iter() {
            *counts.entry(event.kind).or_default() += 1;
        }
        if counts.is_empty() {
            return "no changes".to_string();
        }
        counts
            .into_iter()
            .map(|(kind, count)| {
                let kind: &'static str = kind.into();
                format!("{kind}: {count}")
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_builder_appends_on_drop() {
        let log = EventLog::new();
        let node = NodeId::fresh();
        log.record(EventKind::ConstantFolded)
            .at(&Symbol::from("f"), node)
            .pass("const-fold")
            .message("1 + 2 -> 3");
        assert_eq!(log.len(), 1);
        let event = log.iter().next().unwrap();
        assert_eq!(event.node, Some(node));
        assert_eq!(event.function.as_deref(), Some("f"));
        assert!(event.to_string().starts_with("[constant_folded] const-fold in `f`"));
    }

    #[test]
    fn test_merge_take_and_summary() {
        let mut shared = EventLog::new();
        let local = EventLog::new();
        local.record(EventKind::AssignmentRemoved);
        local.record(EventKind::AssignmentRemoved);
        local.warn("skipped");
        shared.merge(local);
        assert_eq!(shared.count(EventKind::AssignmentRemoved), 2);
        assert!(shared.has(EventKind::Warning));
        assert_eq!(shared.summary(), "assignment_removed: 2, warning: 1");

        let taken = shared.take();
        assert!(shared.is_empty());
        assert_eq!(taken.len(), 3);
        assert_eq!(EventLog::new().summary(), "no changes");
    }

    #[test]
    fn test_every_kind_has_a_name() {
        assert_eq!(EventKind::iter().count(), EventKind::COUNT);
        for kind in EventKind::iter() {
            let name: &'static str = kind.into();
            assert!(!name.is_empty());
        }
    }
}
