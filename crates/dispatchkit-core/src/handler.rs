//! Handler capability consumed by the dispatcher
//!
//! Defines the handler trait, the identity-compared handler reference the
//! dispatcher stores, and the completion signal each handler must fire.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::types::SharedEvent;

/// Handler trait for dispatched events
///
/// Implement this trait to receive events. The handler must eventually call
/// [`Completion::done`], on every code path. It may do so after `handle`
/// returns by moving the completion into other work.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Called once per dispatch of an event this handler is registered for
    async fn handle(&self, event: SharedEvent, done: Completion);

    /// Human readable name, used in logs
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Identity of a handler reference.
///
/// Derived from the address of the shared allocation, so two references
/// share an ID exactly when they point at the same handler instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(usize);

impl std::fmt::Display for HandlerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handler({:#x})", self.0)
    }
}

/// Shared reference to a handler instance.
///
/// Equality is identity: clones of one reference are equal, while two
/// separately allocated handlers are never equal even if their values are.
#[derive(Clone)]
pub struct HandlerRef(Arc<dyn EventHandler>);

impl HandlerRef {
    /// Allocate a handler and return a reference to it
    pub fn new<H: EventHandler + 'static>(handler: H) -> Self {
        Self(Arc::new(handler))
    }

    /// Identity of the referenced handler
    pub fn id(&self) -> HandlerId {
        HandlerId(Arc::as_ptr(&self.0) as *const () as usize)
    }

    /// Name of the referenced handler
    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub(crate) fn handler(&self) -> Arc<dyn EventHandler> {
        Arc::clone(&self.0)
    }
}

impl<H: EventHandler + 'static> From<Arc<H>> for HandlerRef {
    fn from(handler: Arc<H>) -> Self {
        Self(handler)
    }
}

impl PartialEq for HandlerRef {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for HandlerRef {}

impl std::fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRef")
            .field("id", &self.id())
            .field("name", &self.name())
            .finish()
    }
}

/// How a handler's barrier slot was released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotOutcome {
    Completed,
    Abandoned,
    Panicked,
}

type SlotSender = Arc<Mutex<Option<oneshot::Sender<SlotOutcome>>>>;

fn resolve(slot: &SlotSender, outcome: SlotOutcome) -> bool {
    match slot.lock().take() {
        Some(tx) => {
            // The receiver is gone once the dispatch timed out
            let _ = tx.send(outcome);
            true
        }
        None => false,
    }
}

/// Completion signal handed to a handler for one dispatch.
///
/// Calling [`done`](Self::done) consumes the signal, so it can fire at most
/// once. Dropping it without calling `done` releases the barrier anyway and
/// the dispatch reports the handler as abandoned.
#[must_use = "dropping a Completion without calling done() marks the handler as abandoned"]
pub struct Completion {
    slot: SlotSender,
}

impl Completion {
    /// Create a signal together with the dispatcher-side slot and receiver
    pub(crate) fn channel() -> (Self, CompletionSlot, oneshot::Receiver<SlotOutcome>) {
        let (tx, rx) = oneshot::channel();
        let slot = Arc::new(Mutex::new(Some(tx)));
        (
            Self {
                slot: Arc::clone(&slot),
            },
            CompletionSlot { slot },
            rx,
        )
    }

    /// Signal that the handler has finished with the event
    pub fn done(self) {
        resolve(&self.slot, SlotOutcome::Completed);
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        // While unwinding, leave the slot for the task wrapper to mark as panicked
        if std::thread::panicking() {
            return;
        }
        resolve(&self.slot, SlotOutcome::Abandoned);
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("pending", &self.slot.lock().is_some())
            .finish()
    }
}

/// Dispatcher-side handle on a completion slot
pub(crate) struct CompletionSlot {
    slot: SlotSender,
}

impl CompletionSlot {
    /// Release the slot if the handler has not already done so
    pub(crate) fn resolve(&self, outcome: SlotOutcome) -> bool {
        resolve(&self.slot, outcome)
    }
}
