//! # Stop Conditions
//!
//! The threshold engine holds the checks that were enabled at
//! construction and evaluates them against each fresh sample.
//!
//! ## Check Order
//!
//! | Check | Fires when | Message |
//! |-------|------------|---------|
//! | RSS | `rss > max_rss` | `RSS Exceeded {n} bytes [{human}]` |
//! | VMS | `vms > max_vms` | `VMS Exceeded {n} bytes [{human}]` |
//! | Percent | `percent > max_percent` | `Memory Percent Exceeded {p}%` |
//!
//! Evaluation stops at the first check that fires. A limit of `0` leaves
//! the check out entirely; the set never changes after construction.
//!
//! The reserved minimum slots (`min_rss`, `min_vms`) have no predicate
//! and never fire.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::MonitorConfig;
use crate::event::{ExecutionEvent, MemorySample};
use crate::size;

/// What a single check compares.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CheckKind {
    /// Resident set size limit in bytes.
    MaxRss(u64),
    /// Virtual memory size limit in bytes.
    MaxVms(u64),
    /// Memory percentage limit.
    MaxPercent(f64),
}

/// One enabled stop condition.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdCheck {
    kind: CheckKind,
    message: String,
}

impl ThresholdCheck {
    /// Builds the check and renders its message once.
    #[must_use]
    pub fn new(kind: CheckKind) -> Self {
        let message = match kind {
            CheckKind::MaxRss(limit) => {
                format!("RSS Exceeded {limit} bytes [{}]", size::format(limit))
            }
            CheckKind::MaxVms(limit) => {
                format!("VMS Exceeded {limit} bytes [{}]", size::format(limit))
            }
            CheckKind::MaxPercent(limit) => format!("Memory Percent Exceeded {limit}%"),
        };
        Self { kind, message }
    }

    /// Short name of the check.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self.kind {
            CheckKind::MaxRss(_) => "maxrss",
            CheckKind::MaxVms(_) => "maxvms",
            CheckKind::MaxPercent(_) => "maxpc",
        }
    }

    /// The compared quantity and its limit.
    #[must_use]
    pub const fn kind(&self) -> CheckKind {
        self.kind
    }

    /// Message reported when the check fires.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns true if `sample` violates the limit.
    #[must_use]
    pub fn is_violated(&self, sample: &MemorySample) -> bool {
        match self.kind {
            CheckKind::MaxRss(limit) => sample.rss > limit,
            CheckKind::MaxVms(limit) => sample.vms > limit,
            CheckKind::MaxPercent(limit) => sample.percent > limit,
        }
    }
}

/// Where in the target program a stop fired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopLocation {
    /// Module of the triggering event.
    pub module: String,
    /// Line of the triggering event.
    pub line: u32,
    /// Source text of the triggering line, trimmed.
    pub source: String,
}

impl StopLocation {
    /// Captures the location of `event`.
    #[must_use]
    pub fn from_event(event: &ExecutionEvent) -> Self {
        Self {
            module: event.module_label().to_string(),
            line: event.line_number,
            source: event.source_text.trim().to_string(),
        }
    }
}

impl fmt::Display for StopLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.line)
    }
}

/// Terminal outcome of threshold evaluation.
///
/// Carries the message of the check that fired plus the location of the
/// event that triggered it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopSignal {
    /// Check name (`maxrss`, `maxvms`, `maxpc`).
    pub check: String,
    /// Formatted threshold message.
    pub message: String,
    /// Location of the triggering event.
    pub location: StopLocation,
    /// Sample that violated the threshold.
    pub sample: MemorySample,
}

impl fmt::Display for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "stopped at {} \"{}\": {}",
            self.location, self.location.source, self.message
        )
    }
}

/// Ordered set of enabled stop conditions.
#[derive(Debug, Clone, Default)]
pub struct ThresholdEngine {
    checks: Vec<ThresholdCheck>,
}

impl ThresholdEngine {
    /// Builds the engine from the non-zero limits in `config`.
    #[must_use]
    pub fn new(config: &MonitorConfig) -> Self {
        let mut checks = Vec::with_capacity(3);
        if config.max_rss != 0 {
            checks.push(ThresholdCheck::new(CheckKind::MaxRss(config.max_rss)));
        }
        if config.max_vms != 0 {
            checks.push(ThresholdCheck::new(CheckKind::MaxVms(config.max_vms)));
        }
        if config.max_percent != 0.0 {
            checks.push(ThresholdCheck::new(CheckKind::MaxPercent(config.max_percent)));
        }

        if config.min_rss != 0 || config.min_vms != 0 {
            warn!(
                min_rss = config.min_rss,
                min_vms = config.min_vms,
                "minimum memory thresholds are reserved and ignored"
            );
        }

        Self { checks }
    }

    /// Enabled checks in evaluation order.
    #[must_use]
    pub fn checks(&self) -> &[ThresholdCheck] {
        &self.checks
    }

    /// Returns true if no check is enabled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Evaluates every check in order and returns the first violation.
    #[must_use]
    pub fn evaluate(&self, sample: &MemorySample, event: &ExecutionEvent) -> Option<StopSignal> {
        self.checks
            .iter()
            .find(|check| check.is_violated(sample))
            .map(|check| StopSignal {
                check: check.name().to_string(),
                message: check.message().to_string(),
                location: StopLocation::from_event(event),
                sample: *sample,
            })
    }
}
