//! Metacard CLI
//!
//! Library half of the `metacard` binary:
//!
//! - [`commands`]: `check` a rule document against a vocabulary, `replay` an
//!   edit script and render the settled card
//! - [`script`]: replay script format
//! - [`logging`]: tracing subscriber setup

#![warn(missing_docs)]

pub mod commands;
pub mod logging;
pub mod script;

// Re-exports
pub use commands::{ReplayOutcome, StepOutcome};
pub use script::{Assignment, ReplayScript, Step};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
