//! Command handlers that delegate to the download supervisor.
//!
//! Handlers follow the canonical pattern:
//! - Signature: `pub async fn execute(ctx: &CliContext, ...) -> Result<(), CliError>`
//! - Thin wrappers that:
//!   1. Parse/validate CLI-specific input
//!   2. Call supervisor methods
//!   3. Format output for the terminal
//!
//! Handlers should NOT touch the database or the filesystem directly.

pub mod batch;
pub mod control;
pub mod fetch;
pub mod follow;
pub mod prune;
pub mod status;
