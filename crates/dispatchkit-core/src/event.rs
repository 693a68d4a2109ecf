//! Event capability consumed by the dispatcher
//!
//! Provides:
//! - The [`Event`] trait: routing name, opaque payload, creation timestamp
//! - [`NamedEvent`], a ready-made serializable implementation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::types::SharedEvent;

/// An event that can be routed by the dispatcher.
///
/// The dispatcher only reads [`Event::name`] to select the handler sequence.
/// Payload and timestamp are passed through to handlers untouched.
pub trait Event: Send + Sync + std::fmt::Debug {
    /// Routing key.
    fn name(&self) -> &str;

    /// Opaque payload.
    fn payload(&self) -> &Value;

    /// Creation time.
    fn timestamp(&self) -> DateTime<Utc>;
}

/// General purpose event carrying a JSON payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedEvent {
    /// Unique event ID.
    id: Uuid,
    /// Routing key.
    name: String,
    /// Payload, opaque to the dispatcher.
    payload: Value,
    /// When the event was created.
    timestamp: DateTime<Utc>,
}

impl NamedEvent {
    /// Create a new event stamped with the current time
    pub fn new(name: impl Into<String>, payload: impl Into<Value>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            payload: payload.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create an event with no payload
    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, Value::Null)
    }

    /// Override the creation timestamp
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Get the event ID
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wrap the event for dispatch
    pub fn into_shared(self) -> SharedEvent {
        Arc::new(self)
    }
}

impl Event for NamedEvent {
    fn name(&self) -> &str {
        &self.name
    }

    fn payload(&self) -> &Value {
        &self.payload
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl std::fmt::Display for NamedEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}) at {}",
            self.name,
            &self.id.to_string()[..8],
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f UTC")
        )
    }
}
