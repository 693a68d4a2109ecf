//! Concurrent fan-out and completion barrier.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tokio::time::Instant;

use super::registry::EventDispatcher;
use super::report::DispatchReport;
use crate::error::DispatchError;
use crate::handler::{Completion, HandlerRef, SlotOutcome};
use crate::types::SharedEvent;

impl EventDispatcher {
    /// Dispatch an event to every handler registered for its name
    ///
    /// Each handler runs on its own tokio task. Returns once every handler
    /// has signaled completion, dropped its completion, or panicked. Uses
    /// the configured deadline, if any.
    ///
    /// # Panics
    ///
    /// Panics if polled outside a tokio runtime, since handler tasks are
    /// started with `tokio::spawn`.
    pub async fn dispatch(&self, event: SharedEvent) -> Result<DispatchReport, DispatchError> {
        self.dispatch_with_timeout(event, self.config.dispatch_timeout()).await
    }

    /// Dispatch an event with an explicit barrier deadline
    ///
    /// `None` waits indefinitely, and so does a deadline too far out to be
    /// represented. On expiry the handlers still running are left to finish
    /// on their own; they are not cancelled.
    ///
    /// # Panics
    ///
    /// Panics if polled outside a tokio runtime.
    pub async fn dispatch_with_timeout(
        &self,
        event: SharedEvent,
        timeout: Option<Duration>,
    ) -> Result<DispatchReport, DispatchError> {
        let event_name = event.name().to_string();
        let snapshot = self.snapshot(&event_name);

        if snapshot.is_empty() {
            tracing::trace!("No handlers for '{}'", event_name);
            return Ok(DispatchReport::empty(&event_name));
        }

        tracing::debug!(
            "Dispatching '{}' to {} handler(s)",
            event_name,
            snapshot.len()
        );

        let started = Instant::now();
        let signals: Vec<_> = snapshot
            .iter()
            .map(|handler| (handler, spawn_handler(handler, Arc::clone(&event))))
            .collect();

        let mut report = DispatchReport::empty(&event_name);
        report.handlers = snapshot.len();

        // A deadline past the end of the clock is the same as no deadline
        let deadline = timeout.and_then(|timeout| started.checked_add(timeout));
        let mut signals = signals.into_iter();

        while let Some((handler, signal)) = signals.next() {
            let outcome = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, signal).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        let mut pending = 1;
                        for (rest, mut signal) in signals {
                            match signal.try_recv() {
                                Ok(outcome) => self.tally(&mut report, rest, outcome),
                                Err(TryRecvError::Empty) => pending += 1,
                                Err(TryRecvError::Closed) => {
                                    self.tally(&mut report, rest, SlotOutcome::Abandoned)
                                }
                            }
                        }
                        report.elapsed = started.elapsed();

                        let timeout_ms = timeout.map_or(0, |t| {
                            u64::try_from(t.as_millis()).unwrap_or(u64::MAX)
                        });
                        tracing::warn!(
                            "Dispatch of '{}' timed out after {}ms, {} handler(s) pending",
                            event_name,
                            timeout_ms,
                            pending
                        );
                        return Err(DispatchError::Timeout {
                            event_name,
                            pending,
                            timeout_ms,
                            partial: report,
                        });
                    }
                },
                None => signal.await,
            }
            // Every sender gone without a value means the completion was lost
            .unwrap_or(SlotOutcome::Abandoned);

            self.tally(&mut report, handler, outcome);
        }

        report.elapsed = started.elapsed();
        tracing::debug!("Dispatch finished: {}", report);
        Ok(report)
    }

    /// Count how one handler released its barrier slot
    fn tally(&self, report: &mut DispatchReport, handler: &HandlerRef, outcome: SlotOutcome) {
        match outcome {
            SlotOutcome::Completed => report.completed += 1,
            SlotOutcome::Panicked => report.panicked += 1,
            SlotOutcome::Abandoned => {
                report.abandoned += 1;
                if self.config.warn_on_abandoned {
                    tracing::warn!(
                        "{} ({}) dropped its completion for '{}' without signaling",
                        handler.id(),
                        handler.name(),
                        report.event_name
                    );
                }
            }
        }
    }

    /// Copy of the handler sequence for an event name
    ///
    /// The read guard is released before returning, so registrations made
    /// after this point do not affect the dispatch that took the copy.
    fn snapshot(&self, event_name: &str) -> Vec<HandlerRef> {
        self.handlers
            .read()
            .get(event_name)
            .cloned()
            .unwrap_or_default()
    }
}

/// Start one handler on its own task and return its completion receiver
fn spawn_handler(handler: &HandlerRef, event: SharedEvent) -> oneshot::Receiver<SlotOutcome> {
    let (done, slot, signal) = Completion::channel();
    let handler = handler.clone();

    tokio::spawn(async move {
        let target = handler.handler();
        let invocation = AssertUnwindSafe(target.handle(event, done)).catch_unwind();
        tokio::pin!(invocation);

        // Resolve before the invocation is dropped, which would otherwise
        // release the slot as abandoned
        if let Err(panic) = invocation.as_mut().await {
            tracing::error!(
                "{} ({}) panicked: {}",
                handler.id(),
                handler.name(),
                panic_message(panic.as_ref())
            );
            slot.resolve(SlotOutcome::Panicked);
        }
    });

    signal
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DispatcherConfig;
    use crate::event::NamedEvent;
    use crate::handler::EventHandler;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingHandler {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn handle(&self, _event: SharedEvent, done: Completion) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            done.done();
        }
    }

    struct PanickingHandler;

    #[async_trait]
    impl EventHandler for PanickingHandler {
        async fn handle(&self, _event: SharedEvent, _done: Completion) {
            panic!("handler failed");
        }
    }

    struct DroppingHandler;

    #[async_trait]
    impl EventHandler for DroppingHandler {
        async fn handle(&self, _event: SharedEvent, done: Completion) {
            drop(done);
        }
    }

    struct StalledHandler;

    #[async_trait]
    impl EventHandler for StalledHandler {
        async fn handle(&self, _event: SharedEvent, done: Completion) {
            // Hold the signal well past any test deadline
            tokio::time::sleep(Duration::from_secs(3600)).await;
            done.done();
        }
    }

    fn event(name: &str) -> SharedEvent {
        NamedEvent::empty(name).into_shared()
    }

    #[tokio::test]
    async fn test_dispatch_without_handlers() {
        let dispatcher = EventDispatcher::new();
        let report = dispatcher.dispatch(event("order.cancelled")).await.unwrap();
        assert_eq!(report.handlers, 0);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_dispatch_calls_each_handler_once() {
        let dispatcher = EventDispatcher::new();
        let first = Arc::new(CountingHandler::default());
        let second = Arc::new(CountingHandler::default());

        dispatcher
            .register("test", &HandlerRef::from(first.clone()))
            .unwrap();
        dispatcher
            .register("test", &HandlerRef::from(second.clone()))
            .unwrap();

        let report = dispatcher.dispatch(event("test")).await.unwrap();
        assert_eq!(report.handlers, 2);
        assert_eq!(report.completed, 2);
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_handler_is_isolated() {
        let dispatcher = EventDispatcher::new();
        let counting = Arc::new(CountingHandler::default());

        dispatcher
            .register("test", &HandlerRef::new(PanickingHandler))
            .unwrap();
        dispatcher
            .register("test", &HandlerRef::from(counting.clone()))
            .unwrap();

        let report = dispatcher.dispatch(event("test")).await.unwrap();
        assert_eq!(report.panicked, 1);
        assert_eq!(report.completed, 1);
        assert!(!report.is_clean());
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dropped_completion_is_abandoned() {
        let dispatcher = EventDispatcher::new();
        dispatcher
            .register("test", &HandlerRef::new(DroppingHandler))
            .unwrap();

        let report = dispatcher.dispatch(event("test")).await.unwrap();
        assert_eq!(report.abandoned, 1);
        assert_eq!(report.completed, 0);
    }

    #[tokio::test]
    async fn test_configured_timeout() {
        let config = DispatcherConfig::new().with_dispatch_timeout(Duration::from_millis(50));
        let dispatcher = EventDispatcher::with_config(config);

        dispatcher
            .register("test", &HandlerRef::new(StalledHandler))
            .unwrap();
        dispatcher
            .register("test", &HandlerRef::new(CountingHandler::default()))
            .unwrap();

        let err = dispatcher.dispatch(event("test")).await.unwrap_err();
        let DispatchError::Timeout {
            event_name,
            pending,
            timeout_ms,
            partial,
        } = err;
        assert_eq!(event_name, "test");
        assert_eq!(pending, 1);
        assert_eq!(timeout_ms, 50);

        // The handler that finished is still accounted for
        assert_eq!(partial.handlers, 2);
        assert_eq!(partial.completed, 1);
        assert_eq!(partial.abandoned + partial.panicked, 0);
    }

    #[tokio::test]
    async fn test_unrepresentable_deadline_waits() {
        let dispatcher = EventDispatcher::new();
        let counting = Arc::new(CountingHandler::default());
        dispatcher
            .register("test", &HandlerRef::from(counting.clone()))
            .unwrap();

        let report = dispatcher
            .dispatch_with_timeout(event("test"), Some(Duration::MAX))
            .await
            .unwrap();
        assert!(report.is_clean());
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_explicit_timeout_overrides_config() {
        let dispatcher = EventDispatcher::new();
        dispatcher
            .register("test", &HandlerRef::new(StalledHandler))
            .unwrap();

        let result = dispatcher
            .dispatch_with_timeout(event("test"), Some(Duration::from_millis(20)))
            .await;
        assert!(matches!(result, Err(DispatchError::Timeout { pending: 1, .. })));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(payload.as_ref()), "static message");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(payload.as_ref()), "owned message");

        let payload: Box<dyn Any + Send> = Box::new(7_u32);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
