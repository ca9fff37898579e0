//! Trace line output.
//!
//! Format on the diagnostic sink:
//!
//! ```text
//! RSS:VMS:module:line:source
//! 488K:12M:app:10:alloc 100K
//! 878K:12M:app:11:alloc 400K
//! ```

use std::io::{self, Stderr, Write};

use crate::event::{ExecutionEvent, MemorySample};
use crate::size;

/// Header written once before the first data line.
pub const TRACE_HEADER: &str = "RSS:VMS:module:line:source";

/// Writes the trace header and per-event lines to a diagnostic sink.
#[derive(Debug)]
pub struct TraceEmitter<W: Write = Stderr> {
    sink: W,
    headers_shown: bool,
    lines_emitted: u64,
}

impl TraceEmitter<Stderr> {
    /// Emitter writing to standard error.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write> TraceEmitter<W> {
    /// Emitter writing to `sink`.
    pub const fn new(sink: W) -> Self {
        Self {
            sink,
            headers_shown: false,
            lines_emitted: 0,
        }
    }

    /// Writes the header unless it has already been shown.
    ///
    /// # Errors
    ///
    /// Propagates sink write failures.
    pub fn ensure_header(&mut self) -> io::Result<()> {
        if !self.headers_shown {
            writeln!(self.sink, "{TRACE_HEADER}")?;
            self.headers_shown = true;
        }
        Ok(())
    }

    /// Writes one data line for `event`, preceded by the header on first use.
    ///
    /// # Errors
    ///
    /// Propagates sink write failures.
    pub fn emit(&mut self, sample: &MemorySample, event: &ExecutionEvent) -> io::Result<()> {
        self.ensure_header()?;
        writeln!(
            self.sink,
            "{}:{}:{}:{}:{}",
            size::format(sample.rss),
            size::format(sample.vms),
            event.module_label(),
            event.line_number,
            event.source_text.trim_end()
        )?;
        self.lines_emitted += 1;
        Ok(())
    }

    /// Returns true once the header has been written.
    #[must_use]
    pub const fn headers_shown(&self) -> bool {
        self.headers_shown
    }

    /// Number of data lines written.
    #[must_use]
    pub const fn lines_emitted(&self) -> u64 {
        self.lines_emitted
    }

    /// Borrows the sink.
    pub const fn sink(&self) -> &W {
        &self.sink
    }

    /// Consumes the emitter, returning the sink.
    pub fn into_sink(self) -> W {
        self.sink
    }
}
