//! Type aliases shared across the dispatcher.
//!
//! ## Modules
//!
//! - [`aliases`]: Aliases for shared events and the handler table.

pub mod aliases;

pub use aliases::*;
