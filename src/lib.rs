//! # DispatchKit
//!
//! An in-process publish/subscribe event dispatcher:
//! - Handlers register under an event name, in order, at most once each
//! - Dispatch fans an event out to every handler on its own tokio task
//! - The caller resumes once every handler has signaled completion
//! - An optional deadline turns a stalled handler into a timeout error
//!
//! ## Architecture
//!
//! 1. **dispatchkit-core** - Event and handler traits, dispatcher, errors, config
//! 2. **dispatchkit** - Facade crate re-exporting the core plus logging setup

pub use dispatchkit_core::{config, error, event, handler, types};

// `dispatcher` brings in both the module and the global accessor
pub use dispatchkit_core::{
    dispatcher, init_dispatcher, Completion, ConfigError, DispatchError,
    DispatchReport, DispatcherConfig, DispatcherError, Error, Event, EventDispatcher,
    EventHandler, HandlerId, HandlerRef, NamedEvent, Result, SharedEvent,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Output format for [`init_logging_with`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human readable, multi-line output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output with pretty formatting
/// - RUST_LOG environment variable support
pub fn init_logging() -> anyhow::Result<()> {
    init_logging_with(LogFormat::default())
}

/// Initialize logging with the given output format
///
/// Fails if a global subscriber has already been installed.
pub fn init_logging_with(format: LogFormat) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let filter = env_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stdout)
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_line_number(true)
                .pretty();
            registry.with(fmt_layer).try_init()?;
        }
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stdout)
                .with_target(true)
                .with_thread_ids(true)
                .json();
            registry.with(fmt_layer).try_init()?;
        }
    }

    tracing::debug!("DispatchKit {} logging initialized", VERSION);
    Ok(())
}

/// Filter from `RUST_LOG`-style directives, or `info` when they are absent or invalid
fn env_filter(directives: Option<String>) -> tracing_subscriber::EnvFilter {
    use tracing_subscriber::EnvFilter;

    directives
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}
