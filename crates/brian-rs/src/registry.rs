//! Name resolution for one compile.
//!
//! Every entity ends up with exactly one script identifier: its own name
//! when the user supplied one, otherwise a synthesized `<class>_<k>`. The
//! registry derives the valid synapse sources (inputs and neuron groups)
//! and the valid synapse targets and monitor sources (neuron groups) from
//! those identifiers and rejects collisions before any code is emitted.

use std::collections::{BTreeSet, HashMap, HashSet};

use forge_core::{
    Entity, InputKind, InputSpec, MonitorSpec, NeuronGroupSpec, RunConfig, SynapseSpec,
};
use tracing::debug;

use crate::{ForgeError, Result};

/// Identifiers the generated script binds or refers to, plus Python keywords
const RESERVED: &[&str] = &[
    "eqs", "run", "plot", "show", "xlabel", "ylabel", "defaultclock",
    "second", "ms", "volt", "mV", "amp", "nA", "siemens", "nS", "Hz", "hertz",
    "Equations", "NeuronGroup", "Synapses", "BinomialFunction", "PoissonGroup", "PoissonInput",
    "SpikeGeneratorGroup", "TimedArray", "SpikeMonitor", "StateMonitor",
    "PopulationRateMonitor", "EventMonitor",
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise",
    "return", "try", "while", "with", "yield",
];

/// ASCII identifier check: letter or underscore first, then word characters
pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ============================================================================
// COMPILER CONTEXT
// ============================================================================

/// Borrowed snapshot plus the per-compile name counter.
///
/// A fresh context is built for every compile, so compiling the same
/// snapshot twice synthesizes the same names.
#[derive(Debug, Clone)]
pub struct CompilerContext<'a> {
    pub run: &'a RunConfig,
    pub neuron_groups: &'a [NeuronGroupSpec],
    pub inputs: &'a [InputSpec],
    pub synapses: &'a [SynapseSpec],
    pub monitors: &'a [MonitorSpec],
    counter: usize,
}

impl<'a> CompilerContext<'a> {
    pub fn new(
        run: &'a RunConfig,
        neuron_groups: &'a [NeuronGroupSpec],
        inputs: &'a [InputSpec],
        synapses: &'a [SynapseSpec],
        monitors: &'a [MonitorSpec],
    ) -> Self {
        Self {
            run,
            neuron_groups,
            inputs,
            synapses,
            monitors,
            counter: 0,
        }
    }

    pub fn from_experiment(experiment: &'a forge_core::Experiment) -> Self {
        Self::new(
            &experiment.run,
            &experiment.neuron_groups,
            &experiment.inputs,
            &experiment.synapses,
            &experiment.monitors,
        )
    }

    /// Next `<class>_<k>` name not present in `taken`
    pub fn synthesize(&mut self, class_name: &str, taken: &HashSet<String>) -> String {
        let prefix = class_name.to_lowercase();
        loop {
            let candidate = format!("{}_{}", prefix, self.counter);
            self.counter += 1;
            if !taken.contains(&candidate) {
                return candidate;
            }
        }
    }

    /// Every entity in statement order
    fn entities(&self) -> impl Iterator<Item = &'a dyn Entity> + '_ {
        let groups = self.neuron_groups.iter().map(|e| e as &dyn Entity);
        let inputs = self.inputs.iter().map(|e| e as &dyn Entity);
        let synapses = self.synapses.iter().map(|e| e as &dyn Entity);
        let monitors = self.monitors.iter().map(|e| e as &dyn Entity);
        groups.chain(inputs).chain(synapses).chain(monitors)
    }
}

// ============================================================================
// NAME REGISTRY
// ============================================================================

/// Resolved identifiers for every entity of one snapshot
#[derive(Debug, Clone, Default)]
pub struct NameRegistry {
    pub neuron_groups: Vec<String>,
    pub inputs: Vec<String>,
    pub synapses: Vec<String>,
    pub monitors: Vec<String>,
    sources: BTreeSet<String>,
    targets: BTreeSet<String>,
}

impl NameRegistry {
    /// Assign identifiers without checking them.
    ///
    /// Blank names are synthesized in statement order.
    pub fn assign(ctx: &mut CompilerContext<'_>) -> Self {
        let taken: HashSet<String> = ctx
            .entities()
            .map(|entity| entity.name().trim())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();

        let (groups, inputs, synapses, monitors) =
            (ctx.neuron_groups, ctx.inputs, ctx.synapses, ctx.monitors);

        let neuron_groups: Vec<String> =
            groups.iter().map(|e| resolve_name(ctx, e, &taken)).collect();
        let inputs: Vec<String> = inputs.iter().map(|e| resolve_name(ctx, e, &taken)).collect();
        let synapses = synapses.iter().map(|e| resolve_name(ctx, e, &taken)).collect();
        let monitors = monitors.iter().map(|e| resolve_name(ctx, e, &taken)).collect();

        let targets: BTreeSet<String> = neuron_groups.iter().cloned().collect();
        let sources = targets.iter().chain(inputs.iter()).cloned().collect();

        Self {
            neuron_groups,
            inputs,
            synapses,
            monitors,
            sources,
            targets,
        }
    }

    /// Assign identifiers, then reject invalid names, collisions and
    /// dangling references.
    pub fn resolve(ctx: &mut CompilerContext<'_>) -> Result<Self> {
        let registry = Self::assign(ctx);
        registry.check_names(ctx)?;
        registry.check_references(ctx)?;
        debug!(
            sources = registry.sources.len(),
            targets = registry.targets.len(),
            "names resolved"
        );
        Ok(registry)
    }

    /// Valid synapse sources: inputs and neuron groups
    pub fn sources(&self) -> &BTreeSet<String> {
        &self.sources
    }

    /// Valid synapse and PoissonInput targets and monitor sources: neuron groups
    pub fn targets(&self) -> &BTreeSet<String> {
        &self.targets
    }

    fn check_names(&self, ctx: &CompilerContext<'_>) -> Result<()> {
        let resolved = self
            .neuron_groups
            .iter()
            .chain(&self.inputs)
            .chain(&self.synapses)
            .chain(&self.monitors);

        let mut seen: HashMap<&str, String> = HashMap::new();
        let mut positions: HashMap<&'static str, usize> = HashMap::new();

        for (entity, name) in ctx.entities().zip(resolved) {
            let class = entity.class_name();
            let position = positions.entry(class).or_insert(0);
            *position += 1;
            let label = format!("{} #{}", class, position);

            if !is_identifier(name) || RESERVED.contains(&name.as_str()) {
                return Err(ForgeError::validation(
                    format!("{class} '{name}'"),
                    "name",
                    "must be a Python identifier the script does not already bind",
                ));
            }

            if let Some(first) = seen.get(name.as_str()) {
                return Err(ForgeError::DuplicateName {
                    name: name.clone(),
                    first: first.clone(),
                    second: label,
                });
            }
            seen.insert(name.as_str(), label);
        }
        Ok(())
    }

    fn check_references(&self, ctx: &CompilerContext<'_>) -> Result<()> {
        for (spec, name) in ctx.inputs.iter().zip(&self.inputs) {
            if let InputKind::PoissonInput { target, .. } = &spec.kind {
                self.require(&self.targets, spec.class_name(), name, "target", target)?;
            }
        }

        for (spec, name) in ctx.synapses.iter().zip(&self.synapses) {
            self.require(&self.sources, spec.class_name(), name, "source", &spec.source)?;
            self.require(&self.targets, spec.class_name(), name, "target", &spec.target)?;
        }

        for (spec, name) in ctx.monitors.iter().zip(&self.monitors) {
            self.require(&self.targets, spec.class_name(), name, "source", &spec.source)?;
        }
        Ok(())
    }

    fn require(
        &self,
        scope: &BTreeSet<String>,
        kind: &'static str,
        entity: &str,
        field: &'static str,
        value: &str,
    ) -> Result<()> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ForgeError::validation(
                format!("{kind} '{entity}'"),
                field,
                "is required",
            ));
        }
        if scope.contains(value) {
            Ok(())
        } else {
            Err(ForgeError::UnresolvedReference {
                kind,
                entity: entity.to_string(),
                field,
                value: value.to_string(),
            })
        }
    }
}

fn resolve_name(ctx: &mut CompilerContext<'_>, entity: &dyn Entity, taken: &HashSet<String>) -> String {
    let name = entity.name().trim();
    if name.is_empty() {
        ctx.synthesize(entity.class_name(), taken)
    } else {
        name.to_string()
    }
}

/// Identifiers a synapse may use as `source`: every input and neuron group
pub fn resolve_sources(inputs: &[InputSpec], neuron_groups: &[NeuronGroupSpec]) -> BTreeSet<String> {
    let run = RunConfig::default();
    let mut ctx = CompilerContext::new(&run, neuron_groups, inputs, &[], &[]);
    NameRegistry::assign(&mut ctx).sources
}

/// Identifiers a synapse may use as `target`: every neuron group
pub fn resolve_targets(neuron_groups: &[NeuronGroupSpec]) -> BTreeSet<String> {
    let run = RunConfig::default();
    let mut ctx = CompilerContext::new(&run, neuron_groups, &[], &[], &[]);
    NameRegistry::assign(&mut ctx).targets
}
