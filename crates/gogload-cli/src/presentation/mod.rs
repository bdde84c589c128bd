//! Shared CLI presentation utilities.
//!
//! Format-only helpers: nothing here talks to the supervisor.

pub mod progress;
pub mod tables;

// Re-export commonly used items
pub use progress::ProgressDisplay;
pub use tables::{format_bytes, format_timestamp, print_separator, truncate_string};
