//! Parley – a scoped, resumable dialog runtime
//!
//! This crate lets a host program describe a conversational agent as
//! nested actions:
//! - Skills are plain callable actions with a typed parameter/return contract
//! - Tasks are interactive actions that open a scope, declare local actions,
//!   and suspend at a prompt until the user supplies the next action
//! - Action expressions are parsed, checked, and evaluated against the
//!   actions visible from the innermost scope
//! - Exit signals terminate a task (or any ancestor) with a result value
//! - Inspection walks the whole task tree without side effects

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Sample calculator dialog
pub mod calculator;
/// Drivers feeding input to a runtime and printing its events
pub mod driver;
/// Action expression language
pub mod interpreter;
/// Dialog runtime: scopes, execution units, exit signals
pub mod runtime;

// Re-export key types for convenience
pub use interpreter::{Value, ValueTag};
pub use runtime::{DialogEvent, Runtime, RuntimeConfig, RuntimeError};

/// Current version of the Parley runtime
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
