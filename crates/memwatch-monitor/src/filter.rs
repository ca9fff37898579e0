//! Event eligibility.
//!
//! Two separate questions are asked of every event:
//!
//! | Question | Gates | Rule |
//! |----------|-------|------|
//! | Sampling | memory sample + threshold checks | function is not [`WRITE_FUNCTION`] |
//! | Emission | trace line | `Line` event, tracing on, window open, module not ignored |
//!
//! The `write` exclusion breaks a feedback loop: printing a trace line runs
//! the host's output path, which would otherwise deliver fresh events back
//! into the monitor.

use std::collections::BTreeSet;

use crate::config::{is_internal_module, MonitorConfig};
use crate::event::{EventKind, ExecutionEvent};

/// Function name the host's output-printing path runs under.
pub const WRITE_FUNCTION: &str = "write";

/// Decides which events are sampled and which are traced.
#[derive(Debug, Clone)]
pub struct EventFilter {
    line_trace: bool,
    ignore_modules: BTreeSet<String>,
}

impl EventFilter {
    /// Builds the filter from the tracing part of `config`.
    #[must_use]
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            line_trace: config.line_trace,
            ignore_modules: config.ignore_modules.clone(),
        }
    }

    /// Returns true if the event takes part in sampling and threshold
    /// evaluation.
    #[inline]
    #[must_use]
    pub fn is_sampling_eligible(&self, event: &ExecutionEvent) -> bool {
        event.function_name != WRITE_FUNCTION
    }

    /// Returns true if a sampling-eligible event should also print a trace
    /// line, given the current state of the activation window.
    #[must_use]
    pub fn is_emission_eligible(&self, event: &ExecutionEvent, window_open: bool) -> bool {
        if event.kind != EventKind::Line || !self.line_trace || !window_open {
            return false;
        }
        event
            .module_name
            .as_deref()
            .map_or(true, |module| !self.is_ignored(module))
    }

    /// Returns true if `module` is suppressed from trace output.
    #[must_use]
    pub fn is_ignored(&self, module: &str) -> bool {
        self.ignore_modules.contains(module) || is_internal_module(module)
    }
}
