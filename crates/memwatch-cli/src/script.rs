//! Watch scripts.
//!
//! A line-oriented program format used as the monitored target:
//!
//! ```text
//! # grow until the limit trips
//! call build_cache
//! repeat 100
//!     alloc 8M
//! end
//! ret
//! print done $1
//! ```
//!
//! | Command | Effect |
//! |---------|--------|
//! | `alloc <SIZE>` | allocate and touch SIZE bytes, kept until `free` |
//! | `free` | release every retained allocation |
//! | `print <TEXT>` | write TEXT to the output, `$N` expands to argument N |
//! | `call <NAME>` / `ret` | enter / leave a named frame |
//! | `repeat <N>` … `end` | run the body N times |
//! | `raise <MESSAGE>` | fail the run |
//!
//! Blank lines and lines starting with `#` are skipped.

use std::fs;
use std::path::{Path, PathBuf};

use memwatch_monitor::{size, SizeError};
use thiserror::Error;

/// Script loading, parsing and runtime failures.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// The script file could not be read.
    #[error("cannot read script {path}: {source}")]
    Io {
        /// Script path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A line could not be parsed.
    #[error("line {line}: {message}")]
    Parse {
        /// 1-based line number.
        line: u32,
        /// What is wrong with it.
        message: String,
    },

    /// An `alloc` size failed to parse.
    #[error("line {line}: {source}")]
    Size {
        /// 1-based line number.
        line: u32,
        /// Underlying size error.
        #[source]
        source: SizeError,
    },

    /// The script executed `raise`.
    #[error("raised at line {line}: {message}")]
    Raised {
        /// 1-based line number.
        line: u32,
        /// Raised message.
        message: String,
    },

    /// A runtime rule was broken (e.g. `ret` outside any `call`).
    #[error("line {line}: {message}")]
    Runtime {
        /// 1-based line number.
        line: u32,
        /// What went wrong.
        message: String,
    },
}

/// One parsed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Allocate and retain this many bytes.
    Alloc(u64),
    /// Drop all retained allocations.
    Free,
    /// Write a line of text.
    Print(String),
    /// Enter a frame.
    Call(String),
    /// Leave the innermost frame.
    Ret,
    /// Loop header; `end` is the index of the matching `end`.
    Repeat {
        /// Iteration count.
        count: u64,
        /// Index of the matching `end` instruction.
        end: usize,
    },
    /// Loop footer; `start` is the index of the matching `repeat`.
    End {
        /// Index of the matching `repeat` instruction.
        start: usize,
    },
    /// Fail the run with a message.
    Raise(String),
}

/// A command together with its source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// 1-based line number.
    pub line: u32,
    /// Raw source line.
    pub source: String,
    /// Parsed command.
    pub op: Op,
}

/// A parsed script, ready to run.
#[derive(Debug, Clone)]
pub struct Script {
    module: String,
    instructions: Vec<Instruction>,
}

impl Script {
    /// Reads and parses a script file. The module name is the file stem.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError::Io`] if the file cannot be read, or a parse
    /// error for malformed content.
    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        let text = fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let module = path
            .file_stem()
            .map_or_else(|| "__main__".to_string(), |s| s.to_string_lossy().into_owned());
        Self::parse(&module, &text)
    }

    /// Parses script text under the given module name.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError::Parse`] or [`ScriptError::Size`] for the
    /// first malformed line.
    pub fn parse(module: &str, text: &str) -> Result<Self, ScriptError> {
        let mut instructions: Vec<Instruction> = Vec::new();
        let mut open_loops: Vec<(usize, u32)> = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let line = u32::try_from(idx + 1).map_err(|_| ScriptError::Parse {
                line: u32::MAX,
                message: "script too long".to_string(),
            })?;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let (command, rest) = match trimmed.split_once(char::is_whitespace) {
                Some((command, rest)) => (command, rest.trim()),
                None => (trimmed, ""),
            };
            let parse_err = |message: String| ScriptError::Parse { line, message };

            let op = match command {
                "alloc" => {
                    let bytes = size::parse(rest)
                        .map_err(|source| ScriptError::Size { line, source })?;
                    Op::Alloc(bytes)
                }
                "free" => Op::Free,
                "print" => Op::Print(rest.to_string()),
                "call" if !rest.is_empty() => Op::Call(rest.to_string()),
                "call" => return Err(parse_err("call needs a function name".to_string())),
                "ret" => Op::Ret,
                "repeat" => {
                    let count = rest
                        .parse::<u64>()
                        .map_err(|_| parse_err(format!("invalid repeat count '{rest}'")))?;
                    open_loops.push((instructions.len(), line));
                    Op::Repeat { count, end: 0 }
                }
                "end" => {
                    let (start, _) = open_loops
                        .pop()
                        .ok_or_else(|| parse_err("end without repeat".to_string()))?;
                    let end_idx = instructions.len();
                    if let Some(Instruction {
                        op: Op::Repeat { end, .. },
                        ..
                    }) = instructions.get_mut(start)
                    {
                        *end = end_idx;
                    }
                    Op::End { start }
                }
                "raise" => Op::Raise(rest.to_string()),
                other => return Err(parse_err(format!("unknown command '{other}'"))),
            };

            instructions.push(Instruction {
                line,
                source: raw.to_string(),
                op,
            });
        }

        if let Some((_, line)) = open_loops.pop() {
            return Err(ScriptError::Parse {
                line,
                message: "repeat without end".to_string(),
            });
        }

        Ok(Self {
            module: module.to_string(),
            instructions,
        })
    }

    /// Module name reported in events.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Parsed instructions in source order.
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }
}
