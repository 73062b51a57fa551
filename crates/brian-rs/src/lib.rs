//! # Forge-Brian: Brian 2 Script Compiler
//!
//! Compiles an experiment snapshot (neuron groups, inputs, synapses,
//! monitors, run parameters) into a runnable Brian 2 script
//! (https://briansimulator.org/), including its plotting stage.
//!
//! This crate provides:
//! - Name registry: identifier synthesis, collision and reference checks
//! - One code emitter per entity kind
//! - Script assembler with a line-to-entity source map
//! - Script store (save/load as plain UTF-8 text)
//! - Execution delegate that hands the script to a Python interpreter
//!
//! ```no_run
//! use forge_brian::{compile, execute, ProcessEngine};
//! use forge_core::{Experiment, NeuronGroupSpec};
//!
//! let mut experiment = Experiment::default();
//! experiment.neuron_groups.push(NeuronGroupSpec::new("G", 10, "dv/dt = -v/(10*ms) : 1"));
//!
//! let script = compile(&experiment)?;
//! let output = execute(&ProcessEngine::python(), &script)?;
//! println!("{}", output.stdout);
//! # Ok::<(), forge_brian::ForgeError>(())
//! ```
//!
//! Compilation is a pure function of the snapshot: the same snapshot always
//! yields byte-identical text. Free-form fields are spliced verbatim, so
//! mistakes inside equations or conditions surface only when the engine
//! runs the script, as [`ForgeError::TargetCompile`] or
//! [`ForgeError::TargetRuntime`].

use std::path::PathBuf;
use thiserror::Error;

pub mod assemble;
pub mod emit;
pub mod engine;
pub mod equations;
pub mod legacy;
pub mod literal;
pub mod registry;
pub mod store;

pub use assemble::{assemble, compile, Script, Segment, PRELUDE};
pub use engine::{execute, EngineFailure, ExecutionResult, ProcessEngine, ScriptEngine};
pub use registry::{resolve_sources, resolve_targets, CompilerContext, NameRegistry};
pub use store::{load, save};

#[derive(Error, Debug)]
pub enum ForgeError {
    #[error("Invalid {entity}: '{field}' {reason}")]
    Validation {
        entity: String,
        field: String,
        reason: String,
    },

    #[error("{kind} '{entity}': {field} '{value}' does not name a known entity")]
    UnresolvedReference {
        kind: &'static str,
        entity: String,
        field: &'static str,
        value: String,
    },

    #[error("Duplicate name '{name}' used by {first} and {second}")]
    DuplicateName {
        name: String,
        first: String,
        second: String,
    },

    #[error("Cannot read record of {entity} ('{value}'): {reason}")]
    RecordParse {
        entity: String,
        value: String,
        reason: String,
    },

    #[error("Script rejected by engine{}: {message}", at_segment(.segment, .line))]
    TargetCompile {
        segment: Option<String>,
        line: Option<usize>,
        message: String,
    },

    #[error("Script failed while running{}: {message}", at_segment(.segment, .line))]
    TargetRuntime {
        segment: Option<String>,
        line: Option<usize>,
        message: String,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl ForgeError {
    pub fn validation(
        entity: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Validation {
            entity: entity.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True for errors raised by the engine rather than by the compiler
    pub fn is_target_error(&self) -> bool {
        matches!(self, Self::TargetCompile { .. } | Self::TargetRuntime { .. })
    }
}

fn at_segment(segment: &Option<String>, line: &Option<usize>) -> String {
    match (segment, line) {
        (Some(segment), Some(line)) => format!(" in {segment} (line {line})"),
        (None, Some(line)) => format!(" at line {line}"),
        (Some(segment), None) => format!(" in {segment}"),
        (None, None) => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, ForgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ForgeError::UnresolvedReference {
            kind: "Synapses",
            entity: "S".to_string(),
            field: "target",
            value: "H".to_string(),
        };
        assert_eq!(err.to_string(), "Synapses 'S': target 'H' does not name a known entity");

        let err = ForgeError::TargetRuntime {
            segment: Some("NeuronGroup 'G'".to_string()),
            line: Some(5),
            message: "NameError: name 'tau' is not defined".to_string(),
        };
        assert!(err.is_target_error());
        assert_eq!(
            err.to_string(),
            "Script failed while running in NeuronGroup 'G' (line 5): NameError: name 'tau' is not defined"
        );

        let err = ForgeError::validation("NeuronGroup 'G'", "reset", "is set but threshold is empty");
        assert!(!err.is_target_error());
        assert_eq!(err.to_string(), "Invalid NeuronGroup 'G': 'reset' is set but threshold is empty");
    }
}
