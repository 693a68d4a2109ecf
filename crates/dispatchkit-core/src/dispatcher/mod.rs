//! # Dispatcher Module
//!
//! In-process publish/subscribe dispatch keyed by event name.
//!
//! ## Overview
//!
//! - Handlers register under an event name and keep their registration order
//! - A handler instance is registered at most once per name (identity check)
//! - Dispatch runs every handler for the event's name on its own task and
//!   waits until each one has signaled completion
//! - An optional deadline turns a stalled handler into a reportable timeout
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dispatchkit_core::{EventDispatcher, HandlerRef, NamedEvent};
//!
//! let dispatcher = EventDispatcher::new();
//! let audit = HandlerRef::new(AuditHandler::default());
//!
//! dispatcher.register("order.created", &audit)?;
//!
//! let report = dispatcher
//!     .dispatch(NamedEvent::new("order.created", json!({ "id": 7 })).into_shared())
//!     .await?;
//! assert_eq!(report.completed, 1);
//!
//! dispatcher.remove("order.created", &audit)?;
//! ```

mod fanout;
mod registry;
mod report;

pub use registry::*;
pub use report::*;
