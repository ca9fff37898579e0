//! # Memory Monitor
//!
//! The orchestrator the host calls once per executable step.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                         Monitor                           │
//! │  ┌─────────┐  ┌────────┐  ┌────────┐  ┌───────┐  ┌──────┐ │
//! │  │ Sampler │→ │ Filter │→ │ Window │→ │ Trace │→ │ Thr. │ │
//! │  └─────────┘  └────────┘  └────────┘  └───────┘  └──────┘ │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## State Machine
//!
//! `Running → Stopped(signal)`. The transition happens when a threshold
//! fires and is never undone. Events delivered after the stop are
//! ignored; the stored signal is returned again.
//!
//! ## Example
//!
//! ```rust
//! use memwatch_monitor::{
//!     ExecutionEvent, Flow, MemorySample, MemorySampler, Monitor, MonitorConfig,
//!     TraceEmitter,
//! };
//!
//! struct Growing(u64);
//! impl MemorySampler for Growing {
//!     fn sample(&mut self) -> memwatch_monitor::Result<MemorySample> {
//!         self.0 += 400_000;
//!         Ok(MemorySample::new(self.0, self.0, 0.0))
//!     }
//! }
//!
//! let config = MonitorConfig::new().with_max_rss(1_048_576);
//! let mut monitor = Monitor::new(config, Growing(0), TraceEmitter::new(Vec::new()));
//!
//! assert!(monitor.on_event(&ExecutionEvent::line("app", 1, ""))?.is_continue());
//! assert!(monitor.on_event(&ExecutionEvent::line("app", 2, ""))?.is_continue());
//! let flow = monitor.on_event(&ExecutionEvent::line("app", 3, ""))?;
//! assert!(matches!(flow, Flow::Stop(_)));
//! # Ok::<(), memwatch_monitor::MonitorError>(())
//! ```

use std::io::{Stderr, Write};

use tracing::{debug, info};

use crate::config::MonitorConfig;
use crate::error::Result;
use crate::event::{ExecutionEvent, MemorySample};
use crate::filter::EventFilter;
use crate::sampler::{MemorySampler, ProcessSampler};
use crate::threshold::{StopSignal, ThresholdEngine};
use crate::trace::TraceEmitter;
use crate::window::ActivationWindow;

/// What the host should do after delivering an event.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Run the step and keep going.
    Continue,
    /// Abort the run. The host must not deliver further events.
    Stop(StopSignal),
}

impl Flow {
    /// Returns true for [`Flow::Continue`].
    #[must_use]
    pub const fn is_continue(&self) -> bool {
        matches!(self, Self::Continue)
    }

    /// The stop signal, if the run must abort.
    #[must_use]
    pub const fn stop_signal(&self) -> Option<&StopSignal> {
        match self {
            Self::Continue => None,
            Self::Stop(signal) => Some(signal),
        }
    }
}

/// Callback interface the host invokes for every executable step.
pub trait EventHandler {
    /// Handles one event before the step's effects become visible.
    ///
    /// # Errors
    ///
    /// Returns an error when the handler itself fails. Threshold
    /// violations are reported as [`Flow::Stop`], not as errors.
    fn on_event(&mut self, event: &ExecutionEvent) -> Result<Flow>;
}

/// Per-run execution-event monitor.
///
/// Owns every piece of mutable run state. Build one per run.
///
/// # Thread Safety
///
/// Not thread-safe. Events are delivered from the target program's own
/// control flow, one at a time.
#[derive(Debug)]
pub struct Monitor<S = ProcessSampler, W: Write = Stderr> {
    config: MonitorConfig,
    sampler: S,
    filter: EventFilter,
    window: ActivationWindow,
    thresholds: ThresholdEngine,
    trace: TraceEmitter<W>,
    last_sample: Option<MemorySample>,
    events_seen: u64,
    events_sampled: u64,
    stopped: Option<StopSignal>,
}

impl Monitor {
    /// Monitor for the current process, tracing to stderr.
    ///
    /// # Errors
    ///
    /// Fails if process memory metrics are unavailable.
    pub fn for_current_process(config: MonitorConfig) -> Result<Self> {
        Ok(Self::new(config, ProcessSampler::new()?, TraceEmitter::stderr()))
    }
}

impl<S: MemorySampler, W: Write> Monitor<S, W> {
    /// Creates a monitor from a validated config, a sampler and a trace sink.
    pub fn new(config: MonitorConfig, sampler: S, trace: TraceEmitter<W>) -> Self {
        let thresholds = ThresholdEngine::new(&config);
        debug!(
            checks = thresholds.checks().len(),
            line_trace = config.line_trace,
            marker = ?config.activation_marker,
            "monitor created"
        );

        Self {
            filter: EventFilter::new(&config),
            window: ActivationWindow::new(config.activation_marker.clone()),
            thresholds,
            config,
            sampler,
            trace,
            last_sample: None,
            events_seen: 0,
            events_sampled: 0,
            stopped: None,
        }
    }

    /// Processes one execution event.
    ///
    /// Steps, in order: sampling eligibility, fresh sample, window
    /// transition, trace emission, `last_sample` update, threshold checks.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError`](crate::MonitorError) when sampling or
    /// trace output fails. The run cannot continue after that.
    pub fn on_event(&mut self, event: &ExecutionEvent) -> Result<Flow> {
        self.events_seen += 1;

        if let Some(signal) = &self.stopped {
            return Ok(Flow::Stop(signal.clone()));
        }

        if !self.filter.is_sampling_eligible(event) {
            return Ok(Flow::Continue);
        }

        let sample = self.sampler.sample()?;
        self.events_sampled += 1;

        self.window.observe(event);

        if self.filter.is_emission_eligible(event, self.window.is_open()) {
            self.trace.emit(&sample, event)?;
        }

        self.last_sample = Some(sample);

        let Some(signal) = self.thresholds.evaluate(&sample, event) else {
            return Ok(Flow::Continue);
        };

        self.trace.ensure_header()?;
        info!(
            check = %signal.check,
            location = %signal.location,
            rss = sample.rss,
            vms = sample.vms,
            "{}",
            signal.message
        );
        self.stopped = Some(signal.clone());
        Ok(Flow::Stop(signal))
    }

    /// Sample taken at the most recent sampling-eligible event.
    #[must_use]
    pub const fn last_sample(&self) -> Option<&MemorySample> {
        self.last_sample.as_ref()
    }

    /// Returns true once a threshold has fired.
    #[inline]
    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        self.stopped.is_some()
    }

    /// The signal that stopped the run, if any.
    #[must_use]
    pub const fn stop_signal(&self) -> Option<&StopSignal> {
        self.stopped.as_ref()
    }

    /// Returns true once the activation window is open.
    #[must_use]
    pub const fn window_open(&self) -> bool {
        self.window.is_open()
    }

    /// The validated configuration.
    #[must_use]
    pub const fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Borrows the trace emitter.
    pub const fn trace(&self) -> &TraceEmitter<W> {
        &self.trace
    }

    /// Consumes the monitor, returning its trace emitter.
    pub fn into_trace(self) -> TraceEmitter<W> {
        self.trace
    }

    /// Snapshot of the monitor's counters and state.
    #[must_use]
    pub fn status(&self) -> MonitorStatus {
        MonitorStatus {
            events_seen: self.events_seen,
            events_sampled: self.events_sampled,
            lines_emitted: self.trace.lines_emitted(),
            window_open: self.window.is_open(),
            last_sample: self.last_sample,
            stopped: self.stopped.is_some(),
        }
    }
}

impl<S: MemorySampler, W: Write> EventHandler for Monitor<S, W> {
    fn on_event(&mut self, event: &ExecutionEvent) -> Result<Flow> {
        Monitor::<S, W>::on_event(self, event)
    }
}

/// Snapshot of monitor state.
///
/// Useful for logging at the end of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorStatus {
    /// Events delivered, including excluded and post-stop ones.
    pub events_seen: u64,
    /// Events that were sampled.
    pub events_sampled: u64,
    /// Trace lines written.
    pub lines_emitted: u64,
    /// Whether the activation window is open.
    pub window_open: bool,
    /// Most recent sample.
    pub last_sample: Option<MemorySample>,
    /// Whether a threshold fired.
    pub stopped: bool,
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::config::ActivationMarker;
    use crate::error::MonitorError;
    use crate::event::EventKind;

    /// Replays a fixed list of samples, failing once it runs dry.
    struct Scripted(VecDeque<MemorySample>);

    impl Scripted {
        fn rss(values: &[u64]) -> Self {
            Self(values.iter().map(|&rss| MemorySample::new(rss, rss * 4, 1.0)).collect())
        }
    }

    impl MemorySampler for Scripted {
        fn sample(&mut self) -> Result<MemorySample> {
            self.0
                .pop_front()
                .ok_or_else(|| MonitorError::Sampling("no more samples".to_string()))
        }
    }

    fn monitor(config: MonitorConfig, rss: &[u64]) -> Monitor<Scripted, Vec<u8>> {
        Monitor::new(config, Scripted::rss(rss), TraceEmitter::new(Vec::new()))
    }

    fn trace_text(monitor: Monitor<Scripted, Vec<u8>>) -> String {
        String::from_utf8(monitor.into_trace().into_sink()).unwrap()
    }

    #[test]
    fn test_monitor_creation() {
        let monitor = monitor(MonitorConfig::new(), &[]);
        assert!(!monitor.is_stopped());
        assert!(monitor.last_sample().is_none());
        assert!(monitor.window_open());
        assert_eq!(monitor.status().events_seen, 0);
    }

    #[test]
    fn test_write_events_have_no_effect() {
        let mut monitor = monitor(MonitorConfig::new().with_max_rss(1), &[]);
        let write = ExecutionEvent::new(EventKind::Call, "write", Some("app".to_string()), 1, "");

        // The sampler is empty: sampling would fail.
        assert!(monitor.on_event(&write).unwrap().is_continue());
        assert!(monitor.last_sample().is_none());
        assert_eq!(monitor.status().events_sampled, 0);
    }

    #[test]
    fn test_last_sample_replaced_each_event() {
        let mut monitor = monitor(MonitorConfig::new(), &[10, 20]);
        monitor.on_event(&ExecutionEvent::line("app", 1, "")).unwrap();
        assert_eq!(monitor.last_sample().unwrap().rss, 10);
        monitor.on_event(&ExecutionEvent::line("app", 2, "")).unwrap();
        assert_eq!(monitor.last_sample().unwrap().rss, 20);
    }

    #[test]
    fn test_sampling_failure_propagates() {
        let mut monitor = monitor(MonitorConfig::new(), &[]);
        let result = monitor.on_event(&ExecutionEvent::line("app", 1, ""));
        assert!(matches!(result, Err(MonitorError::Sampling(_))));
        assert!(!monitor.is_stopped());
    }

    #[test]
    fn test_stop_shows_header_without_trace() {
        let mut monitor = monitor(MonitorConfig::new().with_max_rss(5), &[10]);
        let flow = monitor.on_event(&ExecutionEvent::line("app", 1, "x")).unwrap();

        assert!(matches!(flow, Flow::Stop(_)));
        assert_eq!(trace_text(monitor), "RSS:VMS:module:line:source\n");
    }

    #[test]
    fn test_stopped_state_persists() {
        let mut monitor = monitor(MonitorConfig::new().with_max_rss(5), &[10]);
        let first = monitor.on_event(&ExecutionEvent::line("app", 1, "x")).unwrap();

        // No samples left: a second read would fail if the monitor sampled.
        for line in 2..5 {
            let again = monitor.on_event(&ExecutionEvent::line("app", line, "")).unwrap();
            assert_eq!(again, first);
        }
        assert!(monitor.is_stopped());
        assert_eq!(monitor.status().events_sampled, 1);
        assert_eq!(monitor.status().events_seen, 4);
    }

    #[test]
    fn test_window_gates_trace_but_not_thresholds() {
        let config = MonitorConfig::new()
            .with_line_trace(true)
            .with_max_rss(25)
            .with_activation_marker(ActivationMarker::new("app", Some(3)));
        let mut monitor = monitor(config, &[10, 20, 22, 30]);

        for line in 1..=2 {
            assert!(monitor
                .on_event(&ExecutionEvent::line("app", line, ""))
                .unwrap()
                .is_continue());
        }
        assert!(!monitor.window_open());

        monitor.on_event(&ExecutionEvent::line("app", 3, "open")).unwrap();
        assert!(monitor.window_open());

        let flow = monitor.on_event(&ExecutionEvent::line("lib", 9, "grow")).unwrap();
        assert_eq!(flow.stop_signal().unwrap().location.to_string(), "lib:9");

        let status = monitor.status();
        assert_eq!(status.lines_emitted, 2);
        assert_eq!(
            trace_text(monitor),
            "RSS:VMS:module:line:source\n22B:88B:app:3:open\n30B:120B:lib:9:grow\n"
        );
    }

    #[test]
    fn test_non_line_events_are_sampled_not_traced() {
        let config = MonitorConfig::new().with_line_trace(true).with_max_vms(50);
        let mut monitor = monitor(config, &[10, 20]);

        let call = ExecutionEvent::new(EventKind::Call, "f", Some("app".to_string()), 4, "");
        assert!(monitor.on_event(&call).unwrap().is_continue());

        let ret = ExecutionEvent::new(EventKind::Return, "f", Some("app".to_string()), 5, "");
        let flow = monitor.on_event(&ret).unwrap();
        assert_eq!(flow.stop_signal().unwrap().check, "maxvms");

        assert_eq!(monitor.status().lines_emitted, 0);
    }

    #[test]
    fn test_event_handler_trait_dispatch() {
        let mut monitor = monitor(MonitorConfig::new(), &[1]);
        let handler: &mut dyn EventHandler = &mut monitor;
        assert!(handler
            .on_event(&ExecutionEvent::line("app", 1, ""))
            .unwrap()
            .is_continue());
    }
}
