//! # memwatch CLI
//!
//! Runs a watch script (see [`script`]) under a
//! [`Monitor`](memwatch_monitor::Monitor) and stops it when memory
//! crosses the configured limits.
//!
//! The script host is the event source: it delivers one
//! [`ExecutionEvent`](memwatch_monitor::ExecutionEvent) before every
//! instruction and unwinds as soon as the monitor says stop.

pub mod cli;
pub mod host;
pub mod runner;
pub mod script;

pub use cli::Cli;
pub use host::{RunError, RunSummary, ScriptHost};
pub use runner::{exit_code, watch, EXIT_ABORTED, EXIT_FAILURE};
pub use script::{Script, ScriptError};
