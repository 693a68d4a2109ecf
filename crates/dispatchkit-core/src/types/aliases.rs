//! Type aliases for commonly used complex types.
//!
//! Gives names to the nested types the dispatcher passes around, so the
//! signatures in `dispatcher` and `handler` stay readable.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::event::Event;
use crate::handler::HandlerRef;

// =============================================================================
// EVENT TYPES
// =============================================================================

/// An event shared between the dispatching caller and every handler task.
///
/// Handlers run on separate tasks, so the event is reference counted rather
/// than borrowed.
pub type SharedEvent = Arc<dyn Event>;

// =============================================================================
// HANDLER TABLE TYPES
// =============================================================================

/// Ordered handler sequences keyed by event name.
///
/// An empty `Vec` under a key is distinct from the key being absent.
pub type HandlerMap = HashMap<String, Vec<HandlerRef>>;

/// A reader-writer locked handler table.
///
/// Uses `parking_lot::RwLock`; guards are never held across an `.await`.
pub type HandlerTable = RwLock<HandlerMap>;
