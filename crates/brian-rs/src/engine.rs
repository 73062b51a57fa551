//! Execution delegate.
//!
//! The compiler never interprets the script itself; a [`ScriptEngine`]
//! evaluates the text and reports what happened. Engine failures are mapped
//! back to the entity whose statements raised them using the script's
//! source map.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::assemble::Script;
use crate::{ForgeError, Result};

/// Marker the Python interpreter puts in tracebacks for piped source
const STDIN_FILE: &str = "File \"<stdin>\", line ";

/// Error classes raised before any statement runs
const COMPILE_ERRORS: &[&str] = &["SyntaxError", "IndentationError", "TabError"];

/// Captured output of a successful evaluation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Error, Debug)]
pub enum EngineFailure {
    #[error("Cannot start '{program}': {source}")]
    Unavailable {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Engine exited with status {status:?}")]
    Raised {
        stdout: String,
        stderr: String,
        status: Option<i32>,
    },
}

/// Something that can evaluate script text
pub trait ScriptEngine {
    fn evaluate(&self, source: &str) -> std::result::Result<ExecutionResult, EngineFailure>;
}

/// Interpreter process fed the script on stdin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEngine {
    program: String,
    args: Vec<String>,
}

impl ProcessEngine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// `python3 -`
    pub fn python() -> Self {
        Self::new("python3").arg("-")
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn unavailable(&self, source: io::Error) -> EngineFailure {
        EngineFailure::Unavailable {
            program: self.program.clone(),
            source,
        }
    }
}

impl ScriptEngine for ProcessEngine {
    fn evaluate(&self, source: &str) -> std::result::Result<ExecutionResult, EngineFailure> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.unavailable(e))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| self.unavailable(io::Error::new(io::ErrorKind::Other, "stdin not captured")))?;

        // stdin is fed while stdout and stderr drain
        let text = source.to_string();
        let writer = thread::spawn(move || stdin.write_all(text.as_bytes()));

        let output = child.wait_with_output().map_err(|e| self.unavailable(e))?;

        match writer.join() {
            Ok(Err(e)) if e.kind() != io::ErrorKind::BrokenPipe => return Err(self.unavailable(e)),
            Ok(_) => {}
            Err(_) => warn!(program = %self.program, "stdin writer panicked"),
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        debug!(program = %self.program, status = ?output.status.code(), "engine finished");

        if output.status.success() {
            Ok(ExecutionResult { stdout, stderr })
        } else {
            Err(EngineFailure::Raised {
                stdout,
                stderr,
                status: output.status.code(),
            })
        }
    }
}

/// Last line number the traceback attributes to the piped script
fn traceback_line(stderr: &str) -> Option<usize> {
    stderr
        .lines()
        .filter_map(|line| {
            let (_, rest) = line.split_once(STDIN_FILE)?;
            let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
            digits.parse().ok()
        })
        .last()
}

fn is_compile_error(message: &str) -> bool {
    let class = message.split(':').next().unwrap_or("").trim();
    let class = class.rsplit('.').next().unwrap_or(class);
    COMPILE_ERRORS.contains(&class)
}

/// Hand `script` to `engine`.
///
/// A failure raised by the engine becomes [`ForgeError::TargetCompile`] or
/// [`ForgeError::TargetRuntime`], labelled with the segment that produced
/// the failing line when the traceback names one.
pub fn execute(engine: &dyn ScriptEngine, script: &Script) -> Result<ExecutionResult> {
    info!(
        lines = script.text().lines().count(),
        segments = script.segments().len(),
        "executing script"
    );

    match engine.evaluate(script.text()) {
        Ok(result) => {
            info!(stdout_bytes = result.stdout.len(), "script finished");
            Ok(result)
        }
        Err(EngineFailure::Unavailable { program, source }) => Err(ForgeError::Io {
            path: PathBuf::from(program),
            source,
        }),
        Err(EngineFailure::Raised { stdout: _, stderr, status }) => {
            let line = traceback_line(&stderr);
            let segment = line
                .and_then(|line| script.segment_at(line))
                .map(|seg| seg.label.clone());
            let message = stderr
                .lines()
                .rev()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("engine exited with status {status:?}"));

            warn!(segment = ?segment, line = ?line, "script failed: {}", message);
            if is_compile_error(&message) {
                Err(ForgeError::TargetCompile { segment, line, message })
            } else {
                Err(ForgeError::TargetRuntime { segment, line, message })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::{Experiment, NeuronGroupSpec};

    /// Replays a canned result
    struct CannedEngine {
        stderr: &'static str,
    }

    impl ScriptEngine for CannedEngine {
        fn evaluate(&self, _source: &str) -> std::result::Result<ExecutionResult, EngineFailure> {
            if self.stderr.is_empty() {
                return Ok(ExecutionResult {
                    stdout: "done\n".to_string(),
                    stderr: String::new(),
                });
            }
            Err(EngineFailure::Raised {
                stdout: String::new(),
                stderr: self.stderr.to_string(),
                status: Some(1),
            })
        }
    }

    fn script() -> Script {
        let mut exp = Experiment::default();
        exp.neuron_groups.push(NeuronGroupSpec::new("G", 5, "dv/dt = -v/tau : 1"));
        crate::compile(&exp).unwrap()
    }

    #[test]
    fn test_success() {
        let result = execute(&CannedEngine { stderr: "" }, &script()).unwrap();
        assert_eq!(result.stdout, "done\n");
    }

    #[test]
    fn test_runtime_error_maps_to_segment() {
        let engine = CannedEngine {
            stderr: "Traceback (most recent call last):\n  File \"<stdin>\", line 6, in <module>\nNameError: name 'tau' is not defined\n",
        };
        match execute(&engine, &script()) {
            Err(ForgeError::TargetRuntime { segment, line, message }) => {
                assert_eq!(segment.as_deref(), Some("NeuronGroup 'G'"));
                assert_eq!(line, Some(6));
                assert_eq!(message, "NameError: name 'tau' is not defined");
            }
            other => panic!("expected runtime error, got {other:?}"),
        }
    }

    #[test]
    fn test_syntax_error_is_compile_error() {
        let engine = CannedEngine {
            stderr: "  File \"<stdin>\", line 3\n    tau = (\n          ^\nSyntaxError: '(' was never closed\n",
        };
        match execute(&engine, &script()) {
            Err(ForgeError::TargetCompile { segment, line, .. }) => {
                assert_eq!(segment.as_deref(), Some("run parameters"));
                assert_eq!(line, Some(3));
            }
            other => panic!("expected compile error, got {other:?}"),
        }
    }

    #[test]
    fn test_traceback_helpers() {
        let stderr = "  File \"<stdin>\", line 12, in <module>\n  File \"/lib/brian2/core.py\", line 40, in run\n  File \"<stdin>\", line 14\n";
        assert_eq!(traceback_line(stderr), Some(14));
        assert_eq!(traceback_line("no traceback"), None);
        assert!(is_compile_error("IndentationError: unexpected indent"));
        assert!(!is_compile_error("brian2.core.base.BrianObjectException: boom"));
    }

    #[test]
    fn test_missing_interpreter() {
        let engine = ProcessEngine::new("forge-no-such-interpreter");
        assert!(matches!(
            execute(&engine, &script()),
            Err(ForgeError::Io { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_process_engine_pipes_stdin() {
        let engine = ProcessEngine::new("sh");
        let result = engine.evaluate("echo hello\n").unwrap();
        assert_eq!(result.stdout, "hello\n");

        match engine.evaluate("echo oops >&2\nexit 3\n") {
            Err(EngineFailure::Raised { stderr, status, .. }) => {
                assert_eq!(stderr, "oops\n");
                assert_eq!(status, Some(3));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
