//! # Memory Watch Monitor
//!
//! Supervises a running program one executable step at a time, samples
//! the process memory footprint at every step, and stops the run when a
//! configured limit is crossed.
//!
//! ## Components
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`Monitor`] | Orchestrator wired in as the host's event callback |
//! | [`MemorySampler`] | Fresh RSS/VMS/percent reading per event |
//! | [`ActivationWindow`] | One-way gate that holds back tracing until a marker is reached |
//! | [`EventFilter`] | Sampling and emission eligibility |
//! | [`ThresholdEngine`] | Ordered stop conditions |
//! | [`TraceEmitter`] | Header plus one line per traced event |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use memwatch_monitor::{ExecutionEvent, Flow, Monitor, WatchOptions};
//!
//! let config = serde_json::from_str::<WatchOptions>(r#"{"maxRss": "512M", "lineTrace": true}"#)
//!     .expect("valid options")
//!     .into_config()?;
//! let mut monitor = Monitor::for_current_process(config)?;
//!
//! // The host calls this before every executable step:
//! match monitor.on_event(&ExecutionEvent::line("app", 1, "load()"))? {
//!     Flow::Continue => { /* run the step */ }
//!     Flow::Stop(signal) => eprintln!("{signal}"),
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Notes
//!
//! - Every eligible event triggers a fresh memory read. There is no timer.
//! - A threshold of `0` disables that check.
//! - Hitting a limit is a [`Flow::Stop`] value. A broken monitor is a
//!   [`MonitorError`]. Hosts report the two differently.

mod config;
mod error;
mod event;
mod filter;
mod monitor;
mod sampler;
pub mod size;
mod threshold;
mod trace;
mod window;

pub use config::{
    is_internal_module, ActivationMarker, MonitorConfig, SizeSpec, WatchOptions, INTERNAL_MODULES,
};
pub use error::{ConfigError, MonitorError, Result, SizeError};
pub use event::{EventKind, ExecutionEvent, MemorySample};
pub use filter::{EventFilter, WRITE_FUNCTION};
pub use monitor::{EventHandler, Flow, Monitor, MonitorStatus};
pub use sampler::{MemorySampler, ProcessSampler};
pub use threshold::{CheckKind, StopLocation, StopSignal, ThresholdCheck, ThresholdEngine};
pub use trace::{TraceEmitter, TRACE_HEADER};
pub use window::ActivationWindow;
