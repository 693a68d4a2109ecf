//! Handler registration table.
//!
//! Provides the core EventDispatcher struct, its registration bookkeeping
//! and the global instance for process-wide dispatch.

use std::sync::OnceLock;

use crate::config::DispatcherConfig;
use crate::error::DispatcherError;
use crate::handler::HandlerRef;
use crate::types::{HandlerMap, HandlerTable};

/// Registry of handlers keyed by event name, with concurrent dispatch
pub struct EventDispatcher {
    /// Ordered handler sequences per event name
    pub(super) handlers: HandlerTable,
    /// Configuration
    pub(super) config: DispatcherConfig,
}

impl EventDispatcher {
    /// Create a new dispatcher with default configuration
    pub fn new() -> Self {
        Self::with_config(DispatcherConfig::default())
    }

    /// Create a new dispatcher with custom configuration
    ///
    /// An invalid configuration falls back to the defaults.
    pub fn with_config(config: DispatcherConfig) -> Self {
        let config = match config.validate() {
            Ok(()) => config,
            Err(e) => {
                tracing::warn!("Ignoring dispatcher config: {}", e);
                DispatcherConfig::default()
            }
        };

        Self {
            handlers: HandlerTable::new(HandlerMap::new()),
            config,
        }
    }

    /// Register a handler for an event name
    ///
    /// The handler is appended after any handlers already registered for
    /// `event_name`. Registering the same handler instance twice for one
    /// name fails and leaves the table unchanged.
    pub fn register(&self, event_name: &str, handler: &HandlerRef) -> Result<(), DispatcherError> {
        let mut handlers = self.handlers.write();

        match handlers.get_mut(event_name) {
            Some(registered) if registered.contains(handler) => {
                tracing::warn!(
                    "{} ({}) already registered for '{}'",
                    handler.id(),
                    handler.name(),
                    event_name
                );
                return Err(DispatcherError::HandlerAlreadyRegistered {
                    event_name: event_name.to_string(),
                    handler: handler.id(),
                });
            }
            Some(registered) => registered.push(handler.clone()),
            None => {
                handlers.insert(event_name.to_string(), vec![handler.clone()]);
            }
        }

        tracing::debug!(
            "{} ({}) registered for '{}'",
            handler.id(),
            handler.name(),
            event_name
        );
        Ok(())
    }

    /// Remove a handler from an event name
    ///
    /// Unknown names and handlers that are not registered are ignored, so
    /// removal is idempotent. The name's entry is kept even when its last
    /// handler goes away.
    pub fn remove(&self, event_name: &str, handler: &HandlerRef) -> Result<(), DispatcherError> {
        let mut handlers = self.handlers.write();

        if let Some(registered) = handlers.get_mut(event_name) {
            if let Some(position) = registered.iter().position(|h| h == handler) {
                registered.remove(position);
                tracing::debug!("{} removed from '{}'", handler.id(), event_name);
            }
        }

        Ok(())
    }

    /// Check whether a handler is registered for an event name
    pub fn has(&self, event_name: &str, handler: &HandlerRef) -> bool {
        self.handlers
            .read()
            .get(event_name)
            .is_some_and(|registered| registered.contains(handler))
    }

    /// Remove every registration for every event name
    pub fn clear(&self) {
        let mut handlers = self.handlers.write();
        let names = handlers.len();
        handlers.clear();
        tracing::debug!("Cleared handlers for {} event name(s)", names);
    }

    /// Number of handlers registered for an event name
    pub fn handler_count(&self, event_name: &str) -> usize {
        self.handlers.read().get(event_name).map_or(0, Vec::len)
    }

    /// Handlers registered for an event name, in registration order
    ///
    /// Returns `None` if the name was never registered (or was cleared) and
    /// `Some` of an empty list if its handlers were all removed.
    pub fn handlers(&self, event_name: &str) -> Option<Vec<HandlerRef>> {
        self.handlers.read().get(event_name).cloned()
    }

    /// Check whether the event name has an entry, possibly empty
    pub fn contains_event(&self, event_name: &str) -> bool {
        self.handlers.read().contains_key(event_name)
    }

    /// Event names with an entry, in no particular order
    pub fn event_names(&self) -> Vec<String> {
        self.handlers.read().keys().cloned().collect()
    }

    /// Number of event names with an entry
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// True when no event name has an entry
    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    /// Get the current configuration
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("event_names", &self.len())
            .field("config", &self.config)
            .finish()
    }
}

/// Global dispatcher instance
static DISPATCHER: OnceLock<EventDispatcher> = OnceLock::new();

/// Get or initialize the global dispatcher
pub fn dispatcher() -> &'static EventDispatcher {
    DISPATCHER.get_or_init(EventDispatcher::new)
}

/// Initialize the global dispatcher with custom configuration
///
/// Must be called before any call to [`dispatcher`]. Returns the rejected
/// configuration if the global dispatcher already exists.
pub fn init_dispatcher(config: DispatcherConfig) -> Result<(), DispatcherConfig> {
    DISPATCHER
        .set(EventDispatcher::with_config(config))
        .map_err(|dispatcher| dispatcher.config.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{Completion, EventHandler};
    use crate::types::SharedEvent;
    use async_trait::async_trait;

    struct TestHandler;

    #[async_trait]
    impl EventHandler for TestHandler {
        async fn handle(&self, _event: SharedEvent, done: Completion) {
            done.done();
        }
    }

    fn handler() -> HandlerRef {
        HandlerRef::new(TestHandler)
    }

    #[test]
    fn test_register_preserves_order() {
        let dispatcher = EventDispatcher::new();
        let first = handler();
        let second = handler();

        dispatcher.register("test", &first).unwrap();
        assert_eq!(dispatcher.handler_count("test"), 1);
        dispatcher.register("test", &second).unwrap();
        assert_eq!(dispatcher.handler_count("test"), 2);

        let registered = dispatcher.handlers("test").unwrap();
        assert_eq!(registered[0], first);
        assert_eq!(registered[1], second);
    }

    #[test]
    fn test_register_same_handler_twice() {
        let dispatcher = EventDispatcher::new();
        let h = handler();

        dispatcher.register("test", &h).unwrap();
        let err = dispatcher.register("test", &h).unwrap_err();
        assert_eq!(
            err,
            DispatcherError::HandlerAlreadyRegistered {
                event_name: "test".to_string(),
                handler: h.id(),
            }
        );
        assert_eq!(dispatcher.handler_count("test"), 1);
    }

    #[test]
    fn test_same_handler_under_different_names() {
        let dispatcher = EventDispatcher::new();
        let h = handler();

        dispatcher.register("test", &h).unwrap();
        dispatcher.register("test2", &h).unwrap();
        assert!(dispatcher.has("test", &h));
        assert!(dispatcher.has("test2", &h));
        assert_eq!(dispatcher.len(), 2);
    }

    #[test]
    fn test_clear() {
        let dispatcher = EventDispatcher::new();
        dispatcher.register("test", &handler()).unwrap();
        dispatcher.register("test", &handler()).unwrap();
        dispatcher.register("test2", &handler()).unwrap();
        assert_eq!(dispatcher.len(), 2);

        dispatcher.clear();
        assert_eq!(dispatcher.len(), 0);
        assert!(dispatcher.is_empty());
        assert!(dispatcher.handlers("test").is_none());
    }

    #[test]
    fn test_has() {
        let dispatcher = EventDispatcher::new();
        let first = handler();
        let second = handler();

        assert!(!dispatcher.has("test", &first));
        dispatcher.register("test", &first).unwrap();
        dispatcher.register("test", &second).unwrap();

        assert!(dispatcher.has("test", &first));
        assert!(dispatcher.has("test", &second));
        assert!(!dispatcher.has("test", &handler()));
        assert!(!dispatcher.has("other", &first));
    }

    #[test]
    fn test_remove() {
        let dispatcher = EventDispatcher::new();
        let first = handler();
        let second = handler();
        let third = handler();

        dispatcher.register("test", &first).unwrap();
        dispatcher.register("test", &second).unwrap();
        dispatcher.register("test", &third).unwrap();

        dispatcher.remove("test", &second).unwrap();
        assert_eq!(
            dispatcher.handlers("test").unwrap(),
            vec![first.clone(), third.clone()]
        );

        dispatcher.remove("test", &first).unwrap();
        dispatcher.remove("test", &third).unwrap();
        assert_eq!(dispatcher.handler_count("test"), 0);

        // Removing again is a no-op
        dispatcher.remove("test", &third).unwrap();
        assert!(!dispatcher.has("test", &third));
    }

    #[test]
    fn test_remove_keeps_empty_entry() {
        let dispatcher = EventDispatcher::new();
        let h = handler();

        dispatcher.register("test", &h).unwrap();
        dispatcher.remove("test", &h).unwrap();

        assert!(dispatcher.contains_event("test"));
        assert_eq!(dispatcher.handlers("test"), Some(Vec::new()));
        assert_eq!(dispatcher.event_names(), vec!["test".to_string()]);
    }

    #[test]
    fn test_remove_unknown_name() {
        let dispatcher = EventDispatcher::new();
        assert!(dispatcher.remove("missing", &handler()).is_ok());
        assert!(dispatcher.is_empty());
        assert!(!dispatcher.contains_event("missing"));
    }

    #[test]
    fn test_invalid_config_falls_back_to_defaults() {
        let dispatcher = EventDispatcher::with_config(DispatcherConfig {
            dispatch_timeout_ms: Some(0),
            warn_on_abandoned: false,
        });
        assert_eq!(dispatcher.config(), &DispatcherConfig::default());

        let valid = DispatcherConfig {
            dispatch_timeout_ms: Some(10),
            warn_on_abandoned: false,
        };
        assert_eq!(EventDispatcher::with_config(valid.clone()).config(), &valid);
    }

    #[test]
    fn test_global_dispatcher_is_shared() {
        let a = dispatcher() as *const EventDispatcher;
        let b = dispatcher() as *const EventDispatcher;
        assert_eq!(a, b);
        assert!(init_dispatcher(DispatcherConfig::default()).is_err());
    }
}
