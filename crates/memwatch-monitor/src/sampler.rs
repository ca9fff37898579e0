//! Process memory sampling.
//!
//! [`MemorySampler`] is the seam between the monitor and the operating
//! system. [`ProcessSampler`] reads the current process through `sysinfo`;
//! hosts and tests can plug in anything that produces [`MemorySample`]s.

use sysinfo::{Pid, System};

use crate::error::{MonitorError, Result};
use crate::event::MemorySample;

/// Source of memory samples.
///
/// Every call must perform a fresh read. Implementations never cache.
pub trait MemorySampler {
    /// Reads the current memory footprint.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Sampling`] when the metrics are unavailable.
    fn sample(&mut self) -> Result<MemorySample>;
}

impl<S: MemorySampler + ?Sized> MemorySampler for Box<S> {
    fn sample(&mut self) -> Result<MemorySample> {
        (**self).sample()
    }
}

/// Samples the memory of the current process.
#[derive(Debug)]
pub struct ProcessSampler {
    system: System,
    pid: Pid,
    total_memory: u64,
}

impl ProcessSampler {
    /// Creates a sampler bound to the calling process.
    ///
    /// # Errors
    ///
    /// Fails when the platform does not expose process metrics, or when
    /// total physical memory reads as zero.
    pub fn new() -> Result<Self> {
        let pid = sysinfo::get_current_pid()
            .map_err(|e| MonitorError::Sampling(format!("cannot resolve current pid: {e}")))?;

        let mut system = System::new();
        system.refresh_memory();
        let total_memory = system.total_memory();
        if total_memory == 0 {
            return Err(MonitorError::Sampling(
                "total physical memory unavailable".to_string(),
            ));
        }

        Ok(Self {
            system,
            pid,
            total_memory,
        })
    }

    /// Total physical memory used as the percentage base.
    #[must_use]
    pub const fn total_memory(&self) -> u64 {
        self.total_memory
    }
}

impl MemorySampler for ProcessSampler {
    fn sample(&mut self) -> Result<MemorySample> {
        if !self.system.refresh_process(self.pid) {
            return Err(MonitorError::Sampling(format!(
                "process {} not found",
                self.pid
            )));
        }

        let process = self.system.process(self.pid).ok_or_else(|| {
            MonitorError::Sampling(format!("process {} vanished during refresh", self.pid))
        })?;

        let rss = process.memory();
        let vms = process.virtual_memory();
        let percent = rss as f64 / self.total_memory as f64 * 100.0;

        Ok(MemorySample::new(rss, vms, percent))
    }
}
