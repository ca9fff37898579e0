//! Script execution host.
//!
//! Runs a [`Script`] and delivers an [`ExecutionEvent`] to the monitor
//! before every step. A [`Flow::Stop`] unwinds the run as
//! [`RunError::Aborted`]; monitor failures surface as
//! [`RunError::Monitor`] so callers can tell the two apart.

use std::io::{self, Write};

use memwatch_monitor::{
    EventHandler, EventKind, ExecutionEvent, Flow, MonitorError, StopSignal, WRITE_FUNCTION,
};
use thiserror::Error;
use tracing::debug;

use crate::script::{Instruction, Op, Script, ScriptError};

/// Function name reported for top-level script lines.
pub const TOP_LEVEL: &str = "<module>";

/// Why a run did not complete.
#[derive(Debug, Error)]
pub enum RunError {
    /// The monitor hit a limit and aborted the run.
    #[error("{0}")]
    Aborted(StopSignal),

    /// The monitor itself failed.
    #[error(transparent)]
    Monitor(#[from] MonitorError),

    /// The script failed.
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// Writing script output failed.
    #[error("script output failed: {0}")]
    Output(#[source] io::Error),
}

impl RunError {
    /// Returns true if the monitor stopped the run on a threshold.
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted(_))
    }
}

/// Counters for a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Instructions executed, counting loop iterations.
    pub steps: u64,
    /// Bytes still retained when the script finished.
    pub retained_bytes: u64,
}

/// Interprets a script under a monitor.
pub struct ScriptHost<'a, H, O> {
    handler: &'a mut H,
    output: &'a mut O,
    args: &'a [String],
    frames: Vec<String>,
    retained: Vec<Vec<u8>>,
    retained_bytes: u64,
    steps: u64,
}

impl<'a, H: EventHandler, O: Write> ScriptHost<'a, H, O> {
    /// Creates a host delivering events to `handler` and writing `print`
    /// output to `output`. `args` are visible to `print` as `$1`, `$2`, …
    pub fn new(handler: &'a mut H, output: &'a mut O, args: &'a [String]) -> Self {
        Self {
            handler,
            output,
            args,
            frames: Vec::new(),
            retained: Vec::new(),
            retained_bytes: 0,
            steps: 0,
        }
    }

    /// Runs `script` to completion or until the monitor stops it.
    ///
    /// # Errors
    ///
    /// See [`RunError`].
    pub fn run(mut self, script: &Script) -> Result<RunSummary, RunError> {
        let instructions = script.instructions();
        let mut loops: Vec<u64> = Vec::new();
        let mut pc = 0;

        while let Some(instruction) = instructions.get(pc) {
            self.steps += 1;
            self.deliver(script, instruction, EventKind::Line, self.current_function())?;

            pc = match &instruction.op {
                Op::Alloc(bytes) => {
                    self.alloc(instruction, *bytes)?;
                    pc + 1
                }
                Op::Free => {
                    debug!(bytes = self.retained_bytes, "releasing retained memory");
                    self.retained = Vec::new();
                    self.retained_bytes = 0;
                    pc + 1
                }
                Op::Print(text) => {
                    self.deliver(script, instruction, EventKind::Call, WRITE_FUNCTION.to_string())?;
                    let rendered = expand_args(text, self.args);
                    writeln!(self.output, "{rendered}").map_err(RunError::Output)?;
                    pc + 1
                }
                Op::Call(name) => {
                    self.frames.push(name.clone());
                    self.deliver(script, instruction, EventKind::Call, name.clone())?;
                    pc + 1
                }
                Op::Ret => {
                    let name = self.frames.pop().ok_or_else(|| ScriptError::Runtime {
                        line: instruction.line,
                        message: "ret outside of any call".to_string(),
                    })?;
                    self.deliver(script, instruction, EventKind::Return, name)?;
                    pc + 1
                }
                Op::Repeat { count: 0, end } => end + 1,
                Op::Repeat { count, .. } => {
                    loops.push(*count);
                    pc + 1
                }
                Op::End { start } => match loops.last_mut() {
                    Some(remaining) if *remaining > 1 => {
                        *remaining -= 1;
                        start + 1
                    }
                    _ => {
                        loops.pop();
                        pc + 1
                    }
                },
                Op::Raise(message) => {
                    self.deliver(
                        script,
                        instruction,
                        EventKind::Exception,
                        self.current_function(),
                    )?;
                    return Err(ScriptError::Raised {
                        line: instruction.line,
                        message: message.clone(),
                    }
                    .into());
                }
            };
        }

        Ok(RunSummary {
            steps: self.steps,
            retained_bytes: self.retained_bytes,
        })
    }

    fn current_function(&self) -> String {
        self.frames
            .last()
            .map_or_else(|| TOP_LEVEL.to_string(), Clone::clone)
    }

    fn deliver(
        &mut self,
        script: &Script,
        instruction: &Instruction,
        kind: EventKind,
        function: String,
    ) -> Result<(), RunError> {
        let event = ExecutionEvent::new(
            kind,
            function,
            Some(script.module().to_string()),
            instruction.line,
            instruction.source.clone(),
        );
        match self.handler.on_event(&event)? {
            Flow::Continue => Ok(()),
            Flow::Stop(signal) => Err(RunError::Aborted(signal)),
        }
    }

    fn alloc(&mut self, instruction: &Instruction, bytes: u64) -> Result<(), RunError> {
        let refused = || ScriptError::Runtime {
            line: instruction.line,
            message: format!("cannot allocate {bytes} bytes"),
        };
        let len = usize::try_from(bytes).map_err(|_| refused())?;
        let mut block = Vec::new();
        block.try_reserve_exact(len).map_err(|_| refused())?;
        // Filled with a non-zero byte so every page is actually touched.
        block.resize(len, 0xA5_u8);
        self.retained.push(block);
        self.retained_bytes = self.retained_bytes.saturating_add(bytes);
        Ok(())
    }
}

/// Replaces `$N` with the N-th argument (1-based). Missing arguments
/// expand to nothing; a `$` not followed by digits is kept.
#[must_use]
pub fn expand_args(text: &str, args: &[String]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let mut digits = String::new();
        while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
            digits.push(d);
            chars.next();
        }
        match digits.parse::<usize>() {
            Ok(n) => {
                if let Some(arg) = n.checked_sub(1).and_then(|i| args.get(i)) {
                    out.push_str(arg);
                }
            }
            Err(_) if digits.is_empty() => out.push('$'),
            Err(_) => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Vec<ExecutionEvent>,
    }

    impl EventHandler for Recorder {
        fn on_event(&mut self, event: &ExecutionEvent) -> memwatch_monitor::Result<Flow> {
            self.events.push(event.clone());
            Ok(Flow::Continue)
        }
    }

    fn run(text: &str, args: &[String]) -> (Recorder, String, Result<RunSummary, RunError>) {
        let script = Script::parse("demo", text).unwrap();
        let mut recorder = Recorder::default();
        let mut output = Vec::new();
        let result = ScriptHost::new(&mut recorder, &mut output, args).run(&script);
        (recorder, String::from_utf8(output).unwrap(), result)
    }

    #[test]
    fn test_line_event_per_step() {
        let (recorder, _, result) = run("alloc 1K\nfree", &[]);
        let summary = result.unwrap();

        assert_eq!(summary.steps, 2);
        assert_eq!(summary.retained_bytes, 0);
        let lines: Vec<_> = recorder.events.iter().map(|e| e.line_number).collect();
        assert_eq!(lines, [1, 2]);
        assert!(recorder.events.iter().all(|e| e.kind == EventKind::Line));
        assert!(recorder
            .events
            .iter()
            .all(|e| e.module_name.as_deref() == Some("demo")));
    }

    #[test]
    fn test_print_goes_through_write() {
        let args = vec!["world".to_string()];
        let (recorder, output, result) = run("print hello $1", &args);
        result.unwrap();

        assert_eq!(output, "hello world\n");
        assert_eq!(recorder.events.len(), 2);
        assert_eq!(recorder.events[1].kind, EventKind::Call);
        assert_eq!(recorder.events[1].function_name, WRITE_FUNCTION);
    }

    #[test]
    fn test_call_and_ret_frames() {
        let (recorder, _, result) = run("call load\nalloc 1K\nret\nfree", &[]);
        result.unwrap();

        let seen: Vec<_> = recorder
            .events
            .iter()
            .map(|e| (e.kind, e.function_name.as_str()))
            .collect();
        assert_eq!(
            seen,
            [
                (EventKind::Line, TOP_LEVEL),
                (EventKind::Call, "load"),
                (EventKind::Line, "load"),
                (EventKind::Line, "load"),
                (EventKind::Return, "load"),
                (EventKind::Line, TOP_LEVEL),
            ]
        );
    }

    #[test]
    fn test_repeat_runs_body() {
        let (recorder, _, result) = run("repeat 3\nalloc 1K\nend", &[]);
        let summary = result.unwrap();

        assert_eq!(summary.retained_bytes, 3 * 1024);
        let lines: Vec<_> = recorder.events.iter().map(|e| e.line_number).collect();
        assert_eq!(lines, [1, 2, 3, 2, 3, 2, 3]);
    }

    #[test]
    fn test_repeat_zero_skips_body() {
        let (recorder, _, result) = run("repeat 0\nalloc 1K\nend\nfree", &[]);
        assert_eq!(result.unwrap().retained_bytes, 0);
        let lines: Vec<_> = recorder.events.iter().map(|e| e.line_number).collect();
        assert_eq!(lines, [1, 4]);
    }

    #[test]
    fn test_nested_repeat() {
        let (_, _, result) = run("repeat 2\nrepeat 3\nalloc 1\nend\nend", &[]);
        assert_eq!(result.unwrap().retained_bytes, 6);
    }

    #[test]
    fn test_raise_reports_exception() {
        let (recorder, _, result) = run("free\nraise out of cheese", &[]);

        assert!(matches!(
            result,
            Err(RunError::Script(ScriptError::Raised { line: 2, .. }))
        ));
        assert_eq!(recorder.events.last().unwrap().kind, EventKind::Exception);
    }

    #[test]
    fn test_ret_without_call_fails() {
        let (_, _, result) = run("ret", &[]);
        assert!(matches!(
            result,
            Err(RunError::Script(ScriptError::Runtime { line: 1, .. }))
        ));
    }

    #[test]
    fn test_oversized_alloc_fails_cleanly() {
        let (recorder, _, result) = run("free\nalloc 8E", &[]);

        assert!(matches!(
            result,
            Err(RunError::Script(ScriptError::Runtime { line: 2, .. }))
        ));
        assert_eq!(recorder.events.len(), 2);
    }

    #[test]
    fn test_expand_args() {
        let args = vec!["a".to_string(), "b".to_string()];
        assert_eq!(expand_args("$1-$2", &args), "a-b");
        assert_eq!(expand_args("$3|$0", &args), "|");
        assert_eq!(expand_args("cost $ 5", &args), "cost $ 5");
        assert_eq!(expand_args("plain", &args), "plain");
    }
}
