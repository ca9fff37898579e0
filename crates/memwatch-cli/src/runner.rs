//! Glue between the monitor and the script host.

use std::io::Write;

use memwatch_monitor::{MemorySampler, Monitor};
use tracing::info;

use crate::host::{RunError, RunSummary, ScriptHost};
use crate::script::Script;

/// Exit code for a run the monitor aborted on a threshold.
pub const EXIT_ABORTED: u8 = 2;
/// Exit code for configuration, script or monitor failures.
pub const EXIT_FAILURE: u8 = 1;

/// Runs `script` under `monitor`, writing script output to `output`.
///
/// # Errors
///
/// [`RunError::Aborted`] when a threshold fired; any other variant when
/// the script or the monitor failed.
pub fn watch<S, W, O>(
    monitor: &mut Monitor<S, W>,
    script: &Script,
    args: &[String],
    output: &mut O,
) -> Result<RunSummary, RunError>
where
    S: MemorySampler,
    W: Write,
    O: Write,
{
    info!(
        module = script.module(),
        instructions = script.instructions().len(),
        "starting watched run"
    );

    let result = ScriptHost::new(monitor, output, args).run(script);

    let status = monitor.status();
    info!(
        events = status.events_seen,
        sampled = status.events_sampled,
        traced = status.lines_emitted,
        window_open = status.window_open,
        stopped = status.stopped,
        "watched run finished"
    );
    result
}

/// Maps a run result to the process exit code.
#[must_use]
pub fn exit_code(result: &Result<RunSummary, RunError>) -> u8 {
    match result {
        Ok(_) => 0,
        Err(err) if err.is_aborted() => EXIT_ABORTED,
        Err(_) => EXIT_FAILURE,
    }
}
