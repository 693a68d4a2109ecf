//! # DispatchKit Core
//!
//! In-process publish/subscribe event dispatch.
//! Provides the event and handler capabilities, the registration table,
//! concurrent fan-out with a completion barrier, and dispatcher settings.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod handler;
pub mod types;

pub use config::DispatcherConfig;

pub use dispatcher::{dispatcher, init_dispatcher, DispatchReport, EventDispatcher};

pub use error::{ConfigError, DispatchError, DispatcherError, Error, Result};

pub use event::{Event, NamedEvent};

pub use handler::{Completion, EventHandler, HandlerId, HandlerRef};

// Re-export type aliases for convenience
pub use types::{HandlerMap, HandlerTable, SharedEvent};
