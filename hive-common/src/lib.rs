//! Hive Common
//!
//! Common utilities shared by the Hive service broker crates.
//!
//! This crate provides:
//! - Component-based structured logging with node ID context
//! - Logging macros that avoid allocating the message when the level is off
//! - Dot-segmented event patterns with `*` and `**` wildcards

// Export modules
pub mod logging;
pub mod macros;
pub mod routing;

// Re-export traits and types at the root level
pub use logging::{Component, ComponentKey, LogLevel, Logger, LoggingConfig};
pub use routing::{EventPattern, PatternError, PatternSegment};
