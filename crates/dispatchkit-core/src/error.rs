//! Error handling for DispatchKit
//!
//! Provides the error types for each layer of the dispatcher:
//! - Registration errors (handler table bookkeeping)
//! - Dispatch errors (the completion barrier)
//! - Configuration errors (loading, saving and validating settings)
//!
//! All error types use `thiserror` for ergonomic error handling.

use crate::dispatcher::DispatchReport;
use crate::handler::HandlerId;
use thiserror::Error;

/// Registration error type
///
/// Returned by operations that mutate the handler table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatcherError {
    /// The identical handler reference is already registered for this event name
    #[error("Handler {handler} already registered for event '{event_name}'")]
    HandlerAlreadyRegistered {
        /// The event name the registration was attempted for.
        event_name: String,
        /// Identity of the rejected handler.
        handler: HandlerId,
    },
}

/// Dispatch error type
///
/// Raised when the completion barrier of a dispatch cannot be satisfied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Not every handler signaled completion before the deadline
    #[error("Dispatch of '{event_name}' timed out after {timeout_ms}ms with {pending} handler(s) pending")]
    Timeout {
        /// The name of the dispatched event.
        event_name: String,
        /// Handlers that had neither completed nor abandoned their signal.
        pending: usize,
        /// The deadline that expired, in milliseconds.
        timeout_ms: u64,
        /// Outcomes of the handlers that did release their slot in time.
        partial: DispatchReport,
    },
}

/// Configuration error type
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file extension is neither `.json` nor `.toml`
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// A configuration value is out of its valid range
    #[error("Invalid setting '{key}': {reason}")]
    InvalidValue {
        /// The offending key.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// I/O error during file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML deserialization error
    #[error("TOML error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

/// Main error type for DispatchKit
///
/// A unified error type that can represent any error from all layers.
#[derive(Error, Debug)]
pub enum Error {
    /// Registration error
    #[error(transparent)]
    Dispatcher(#[from] DispatcherError),

    /// Dispatch error
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Check if this is a dispatch timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Dispatch(DispatchError::Timeout { .. }))
    }

    /// Check if this is a duplicate registration
    pub fn is_already_registered(&self) -> bool {
        matches!(
            self,
            Error::Dispatcher(DispatcherError::HandlerAlreadyRegistered { .. })
        )
    }

    /// Check if this is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
