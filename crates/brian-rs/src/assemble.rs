//! Script assembly.
//!
//! Statement order is fixed: prelude, run parameters, neuron groups, inputs,
//! synapses, monitors (each with its own run and plots). Entities keep the
//! order they were supplied in; nothing is reordered to satisfy forward
//! references.

use std::fmt;

use forge_core::{
    Experiment, InputSpec, MonitorSpec, NeuronGroupSpec, RunConfig, SynapseSpec,
};
use tracing::{debug, info};

use crate::emit::{
    emit_input, emit_monitor, emit_neuron_group, emit_synapse, run_statement, Fragment,
};
use crate::registry::{CompilerContext, NameRegistry};
use crate::{ForgeError, Result};

/// First statement of every generated script
pub const PRELUDE: &str = "from brian2 import *";

/// Lines of the script produced for one entity (1-based, inclusive)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub label: String,
    pub first_line: usize,
    pub last_line: usize,
}

/// Generated script text plus the segment each line came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    text: String,
    segments: Vec<Segment>,
}

impl Script {
    /// Wrap text that was not produced by the assembler (e.g. a loaded file)
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            segments: Vec::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Segment that produced `line` (1-based)
    pub fn segment_at(&self, line: usize) -> Option<&Segment> {
        self.segments
            .iter()
            .find(|seg| seg.first_line <= line && line <= seg.last_line)
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Accumulates fragments, one blank line between them
#[derive(Debug, Default)]
struct ScriptBuilder {
    lines: Vec<String>,
    segments: Vec<Segment>,
}

impl ScriptBuilder {
    fn push(&mut self, fragment: Fragment) {
        if fragment.lines.is_empty() {
            return;
        }
        if !self.lines.is_empty() {
            self.lines.push(String::new());
        }
        let first_line = self.lines.len() + 1;
        self.lines.extend(fragment.lines);
        self.segments.push(Segment {
            label: fragment.label,
            first_line,
            last_line: self.lines.len(),
        });
    }

    fn finish(self) -> Script {
        let mut text = self.lines.join("\n");
        text.push('\n');
        Script {
            text,
            segments: self.segments,
        }
    }
}

fn parameters_fragment(run: &RunConfig) -> Fragment {
    let mut fragment = Fragment::new("run parameters");
    let free_text = run.free_text_parameters.trim_end();
    if !free_text.trim().is_empty() {
        fragment.lines.extend(free_text.lines().map(str::to_string));
    }
    let timestep = run.timestep.trim();
    if !timestep.is_empty() {
        fragment.lines.push(format!("defaultclock.dt = {timestep}"));
    }
    fragment
}

/// Compile the collections of one snapshot into a script.
///
/// Names are resolved and every reference checked before any code is
/// emitted; the first structural error aborts assembly.
pub fn assemble(
    run: &RunConfig,
    neuron_groups: &[NeuronGroupSpec],
    inputs: &[InputSpec],
    synapses: &[SynapseSpec],
    monitors: &[MonitorSpec],
) -> Result<Script> {
    let mut ctx = CompilerContext::new(run, neuron_groups, inputs, synapses, monitors);
    assemble_context(&mut ctx)
}

/// Compile a whole experiment snapshot
pub fn compile(experiment: &Experiment) -> Result<Script> {
    let mut ctx = CompilerContext::from_experiment(experiment);
    assemble_context(&mut ctx)
}

fn assemble_context(ctx: &mut CompilerContext<'_>) -> Result<Script> {
    let run = ctx.run;
    let duration = run.duration.trim();
    if duration.is_empty() {
        return Err(ForgeError::validation("run configuration", "duration", "is required"));
    }

    let names = NameRegistry::resolve(ctx)?;
    let mut builder = ScriptBuilder::default();

    builder.push(Fragment::new("imports").line(PRELUDE));
    builder.push(parameters_fragment(run));

    for (spec, name) in ctx.neuron_groups.iter().zip(&names.neuron_groups) {
        builder.push(emit_neuron_group(spec, name)?);
    }

    for (spec, name) in ctx.inputs.iter().zip(&names.inputs) {
        builder.push(emit_input(spec, name)?);
    }

    for (spec, name) in ctx.synapses.iter().zip(&names.synapses) {
        builder.push(emit_synapse(spec, name)?);
    }

    for (spec, name) in ctx.monitors.iter().zip(&names.monitors) {
        let source_model = ctx
            .neuron_groups
            .iter()
            .zip(&names.neuron_groups)
            .find(|(_, group)| group.as_str() == spec.source.trim())
            .map(|(group, _)| group.model_text.as_str());
        builder.push(emit_monitor(spec, name, source_model, duration)?);
    }

    if ctx.monitors.is_empty() {
        builder.push(Fragment::new("run").line(run_statement(duration)));
    }

    let script = builder.finish();
    info!(
        entities = ctx.neuron_groups.len() + ctx.inputs.len() + ctx.synapses.len() + ctx.monitors.len(),
        lines = script.text.lines().count(),
        "script assembled"
    );
    debug!(segments = script.segments.len(), "source map built");
    Ok(script)
}
