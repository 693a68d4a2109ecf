//! Per-dispatch outcome summary.

use std::time::Duration;

/// What happened during one dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// Name of the dispatched event.
    pub event_name: String,
    /// Handlers in the snapshot taken for this dispatch.
    pub handlers: usize,
    /// Handlers that called `Completion::done`.
    pub completed: usize,
    /// Handlers that dropped their completion without signaling.
    pub abandoned: usize,
    /// Handlers that panicked before signaling.
    pub panicked: usize,
    /// Time from snapshot to barrier release.
    pub elapsed: Duration,
}

impl DispatchReport {
    pub(crate) fn empty(event_name: &str) -> Self {
        Self {
            event_name: event_name.to_string(),
            handlers: 0,
            completed: 0,
            abandoned: 0,
            panicked: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// True when every handler signaled completion
    pub fn is_clean(&self) -> bool {
        self.completed == self.handlers
    }
}

impl std::fmt::Display for DispatchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}/{} completed, {} abandoned, {} panicked in {:?}",
            self.event_name,
            self.completed,
            self.handlers,
            self.abandoned,
            self.panicked,
            self.elapsed
        )
    }
}
