//! Execution events delivered by the host, and the memory samples taken
//! for them.

use serde::{Deserialize, Serialize};

/// Kind of executable step the host is about to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// A new source line is about to execute.
    Line,
    /// A function is being entered.
    Call,
    /// A function is returning.
    Return,
    /// An exception or error is being raised.
    Exception,
}

/// One executable step of the target program.
///
/// Produced by the host, read-only to the monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionEvent {
    /// Kind of step.
    pub kind: EventKind,
    /// Name of the function the step executes in.
    pub function_name: String,
    /// Module the step belongs to, when the host knows it.
    pub module_name: Option<String>,
    /// 1-based source line.
    pub line_number: u32,
    /// Source text of the line.
    pub source_text: String,
}

impl ExecutionEvent {
    /// Creates an event with the given kind and location.
    #[must_use]
    pub fn new(
        kind: EventKind,
        function_name: impl Into<String>,
        module_name: Option<String>,
        line_number: u32,
        source_text: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            function_name: function_name.into(),
            module_name,
            line_number,
            source_text: source_text.into(),
        }
    }

    /// Shorthand for a [`EventKind::Line`] event in `module`.
    #[must_use]
    pub fn line(module: &str, line_number: u32, source_text: impl Into<String>) -> Self {
        Self::new(
            EventKind::Line,
            "<module>",
            Some(module.to_string()),
            line_number,
            source_text,
        )
    }

    /// Module name, or `<unknown>` when the host did not supply one.
    #[must_use]
    pub fn module_label(&self) -> &str {
        self.module_name.as_deref().unwrap_or("<unknown>")
    }
}

/// Memory footprint of the process at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MemorySample {
    /// Resident set size in bytes.
    pub rss: u64,
    /// Virtual memory size in bytes.
    pub vms: u64,
    /// RSS as a percentage of total physical memory.
    pub percent: f64,
}

impl MemorySample {
    /// Creates a sample.
    #[must_use]
    pub const fn new(rss: u64, vms: u64, percent: f64) -> Self {
        Self { rss, vms, percent }
    }
}
