//! # Forge Core
//!
//! Entity model for Brian experiment snapshots.
//!
//! A snapshot is what the form layer hands to the compiler: ordered
//! collections of neuron groups, inputs, synapses and monitors, plus the
//! global run parameters. Everything in here is plain data; the compiler
//! in `forge-brian` borrows a snapshot for one compile and never mutates it.
//!
//! ## Entity kinds
//!
//! | Collection | Kinds |
//! |------------|-------|
//! | `inputs` | BinomialFunction, PoissonGroup, PoissonInput, SpikeGeneratorGroup, TimedArray |
//! | `neuron_groups` | NeuronGroup |
//! | `synapses` | Synapses |
//! | `monitors` | SpikeMonitor, StateMonitor, PopulationRateMonitor, EventMonitor |
//!
//! Free-form fields (equations, conditions, rate expressions) are kept as
//! target-language text. Empty strings and `None` are equivalent for every
//! optional field.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while reading model values from text
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Unknown {kind}: '{value}' (expected one of: {expected})")]
    UnknownVariant {
        kind: &'static str,
        value: String,
        expected: String,
    },
}

pub type Result<T> = std::result::Result<T, ModelError>;

// ============================================================================
// UNITS
// ============================================================================

/// Physical units the generated script refers to by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    // Time
    Second,
    Millisecond,  // ms

    // Voltage
    Volt,
    Millivolt,    // mV

    // Current
    Ampere,
    Nanoampere,   // nA

    // Conductance
    Siemens,
    Nanosiemens,  // nS

    // Frequency
    Hertz,
}

impl Unit {
    /// Name of the unit inside the target engine's namespace
    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::Second => "second",
            Unit::Millisecond => "ms",
            Unit::Volt => "volt",
            Unit::Millivolt => "mV",
            Unit::Ampere => "amp",
            Unit::Nanoampere => "nA",
            Unit::Siemens => "siemens",
            Unit::Nanosiemens => "nS",
            Unit::Hertz => "Hz",
        }
    }

    /// Look a unit up by its engine symbol
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let unit = match symbol {
            "second" => Unit::Second,
            "ms" => Unit::Millisecond,
            "volt" => Unit::Volt,
            "mV" => Unit::Millivolt,
            "amp" => Unit::Ampere,
            "nA" => Unit::Nanoampere,
            "siemens" => Unit::Siemens,
            "nS" => Unit::Nanosiemens,
            "Hz" | "hertz" => Unit::Hertz,
            _ => return None,
        };
        Some(unit)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

// ============================================================================
// SCHEDULING AND INTEGRATION
// ============================================================================

/// Scheduling slot of an input within a time step (`when=`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Schedule {
    #[default]
    Start,
    During,
    End,
}

impl Schedule {
    pub const ALL: [Schedule; 3] = [Schedule::Start, Schedule::During, Schedule::End];

    pub fn as_str(&self) -> &'static str {
        match self {
            Schedule::Start => "start",
            Schedule::During => "during",
            Schedule::End => "end",
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Schedule {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        Schedule::ALL
            .into_iter()
            .find(|slot| slot.as_str() == s.trim())
            .ok_or_else(|| ModelError::UnknownVariant {
                kind: "schedule",
                value: s.to_string(),
                expected: join_names(Schedule::ALL.iter().map(|slot| slot.as_str())),
            })
    }
}

/// State-update integration methods understood by the target engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationMethod {
    #[default]
    Linear,
    Euler,
    Heun,
    Exact,
    Rk2,
    Rk4,
    ExponentialEuler,  // For conditionally linear ODEs
    Milstein,          // For SDEs
}

impl IntegrationMethod {
    pub const ALL: [IntegrationMethod; 8] = [
        IntegrationMethod::Linear,
        IntegrationMethod::Euler,
        IntegrationMethod::Heun,
        IntegrationMethod::Exact,
        IntegrationMethod::Rk2,
        IntegrationMethod::Rk4,
        IntegrationMethod::ExponentialEuler,
        IntegrationMethod::Milstein,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrationMethod::Linear => "linear",
            IntegrationMethod::Euler => "euler",
            IntegrationMethod::Heun => "heun",
            IntegrationMethod::Exact => "exact",
            IntegrationMethod::Rk2 => "rk2",
            IntegrationMethod::Rk4 => "rk4",
            IntegrationMethod::ExponentialEuler => "exponential_euler",
            IntegrationMethod::Milstein => "milstein",
        }
    }
}

impl fmt::Display for IntegrationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntegrationMethod {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        IntegrationMethod::ALL
            .into_iter()
            .find(|method| method.as_str() == s.trim())
            .ok_or_else(|| ModelError::UnknownVariant {
                kind: "integration method",
                value: s.to_string(),
                expected: join_names(IntegrationMethod::ALL.iter().map(|m| m.as_str())),
            })
    }
}

fn join_names<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.collect::<Vec<_>>().join(", ")
}

// ============================================================================
// ENTITIES
// ============================================================================

/// Behaviour shared by every configurable object
pub trait Entity {
    /// Engine class constructed by this entity (e.g. `NeuronGroup`)
    fn class_name(&self) -> &'static str;

    /// User-supplied identifier, possibly empty
    fn name(&self) -> &str;
}

/// Population sizes at or below zero are treated as a single element
pub fn coerce_population(n: i64) -> u64 {
    if n <= 0 {
        1
    } else {
        n as u64
    }
}

/// Read an optional free-form field; blank text counts as unset
pub fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|text| !text.is_empty())
}

fn default_true() -> bool {
    true
}

fn default_population() -> i64 {
    1
}

fn default_probability() -> f64 {
    1.0
}

// ----------------------------------------------------------------------------
// Inputs
// ----------------------------------------------------------------------------

/// External input generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSpec {
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub kind: InputKind,
}

/// The five input generator kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum InputKind {
    /// Binomially distributed random numbers
    BinomialFunction {
        n: i64,
        p: f64,
        #[serde(default = "default_true")]
        approximate: bool,
    },

    /// Independent Poisson spike sources
    PoissonGroup {
        #[serde(rename = "N", default = "default_population")]
        n: i64,
        /// Rate expression, in Hz once suffixed
        rates: String,
        #[serde(default)]
        dt: Option<String>,
        #[serde(default)]
        clock: Option<String>,
        #[serde(default)]
        when: Schedule,
        #[serde(default)]
        order: u8,
    },

    /// Poisson events added straight to a target variable
    PoissonInput {
        target: String,
        target_var: String,
        #[serde(rename = "N", default = "default_population")]
        n: i64,
        /// Rate expression, in Hz once suffixed
        rate: String,
        weight: String,
        #[serde(default)]
        when: Schedule,
        #[serde(default)]
        order: u8,
    },

    /// Spikes at predetermined times
    SpikeGeneratorGroup {
        #[serde(rename = "N", default = "default_population")]
        n: i64,
        indices: String,
        /// Spike times, in seconds once suffixed
        times: String,
        #[serde(default)]
        period: Option<String>,
        #[serde(default)]
        dt: Option<String>,
        #[serde(default)]
        clock: Option<String>,
        #[serde(default)]
        when: Schedule,
        #[serde(default)]
        order: u8,
        #[serde(default)]
        sorted: bool,
    },

    /// Values sampled on a fixed time grid
    TimedArray { values: String, dt: String },
}

impl InputKind {
    pub fn class_name(&self) -> &'static str {
        match self {
            InputKind::BinomialFunction { .. } => "BinomialFunction",
            InputKind::PoissonGroup { .. } => "PoissonGroup",
            InputKind::PoissonInput { .. } => "PoissonInput",
            InputKind::SpikeGeneratorGroup { .. } => "SpikeGeneratorGroup",
            InputKind::TimedArray { .. } => "TimedArray",
        }
    }
}

impl InputSpec {
    pub fn new(name: &str, kind: InputKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }
}

impl Entity for InputSpec {
    fn class_name(&self) -> &'static str {
        self.kind.class_name()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ----------------------------------------------------------------------------
// Neuron groups
// ----------------------------------------------------------------------------

/// A population of neurons sharing one equation block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuronGroupSpec {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "N", default = "default_population")]
    pub n: i64,
    /// Differential-equation block, e.g. `dv/dt = -v/tau : volt`
    #[serde(default)]
    pub model_text: String,
    #[serde(default)]
    pub method: IntegrationMethod,
    #[serde(default)]
    pub threshold: Option<String>,
    #[serde(default)]
    pub reset: Option<String>,
    #[serde(default)]
    pub refractory: Option<String>,
}

impl NeuronGroupSpec {
    pub fn new(name: &str, n: i64, model_text: &str) -> Self {
        Self {
            name: name.to_string(),
            n,
            model_text: model_text.to_string(),
            method: IntegrationMethod::default(),
            threshold: None,
            reset: None,
            refractory: None,
        }
    }

    pub fn population(&self) -> u64 {
        coerce_population(self.n)
    }
}

impl Entity for NeuronGroupSpec {
    fn class_name(&self) -> &'static str {
        "NeuronGroup"
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ----------------------------------------------------------------------------
// Synapses
// ----------------------------------------------------------------------------

/// Synaptic connection from a source (input or group) to a neuron group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynapseSpec {
    #[serde(default)]
    pub name: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub on_pre: Option<String>,
    #[serde(default)]
    pub on_post: Option<String>,
    #[serde(default)]
    pub on_event: Option<String>,
    #[serde(default)]
    pub delay: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub i: Option<String>,
    #[serde(default)]
    pub j: Option<String>,
    #[serde(default = "default_probability")]
    pub p: f64,
    #[serde(default = "default_population")]
    pub n: i64,
    #[serde(default)]
    pub method: Option<IntegrationMethod>,
}

impl SynapseSpec {
    pub fn new(name: &str, source: &str, target: &str) -> Self {
        Self {
            name: name.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            model: None,
            on_pre: None,
            on_post: None,
            on_event: None,
            delay: None,
            condition: None,
            i: None,
            j: None,
            p: 1.0,
            n: 1,
            method: None,
        }
    }
}

impl Entity for SynapseSpec {
    fn class_name(&self) -> &'static str {
        "Synapses"
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ----------------------------------------------------------------------------
// Monitors
// ----------------------------------------------------------------------------

/// Which elements a monitor records: everything/nothing, or a literal
/// sequence of indices such as `[0, 1]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordSpec {
    Flag(bool),
    Indices(String),
}

impl Default for RecordSpec {
    fn default() -> Self {
        RecordSpec::Flag(true)
    }
}

/// Recording device attached to a neuron group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSpec {
    #[serde(default)]
    pub name: String,
    pub source: String,
    #[serde(flatten)]
    pub kind: MonitorKind,
}

/// The four monitor kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum MonitorKind {
    SpikeMonitor {
        #[serde(default)]
        variables: Option<String>,
        #[serde(default)]
        record: RecordSpec,
    },
    StateMonitor {
        /// Literal list of variable names, e.g. `['v']`
        variables: String,
        #[serde(default)]
        record: RecordSpec,
    },
    PopulationRateMonitor,
    EventMonitor {
        event: String,
        #[serde(default)]
        variables: Option<String>,
        #[serde(default)]
        record: RecordSpec,
    },
}

impl MonitorKind {
    pub fn class_name(&self) -> &'static str {
        match self {
            MonitorKind::SpikeMonitor { .. } => "SpikeMonitor",
            MonitorKind::StateMonitor { .. } => "StateMonitor",
            MonitorKind::PopulationRateMonitor => "PopulationRateMonitor",
            MonitorKind::EventMonitor { .. } => "EventMonitor",
        }
    }
}

impl MonitorSpec {
    pub fn new(name: &str, source: &str, kind: MonitorKind) -> Self {
        Self {
            name: name.to_string(),
            source: source.to_string(),
            kind,
        }
    }
}

impl Entity for MonitorSpec {
    fn class_name(&self) -> &'static str {
        self.kind.class_name()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// RUN PARAMETERS AND SNAPSHOT
// ============================================================================

/// Global run parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Simulation time step, e.g. `0.1*ms`
    #[serde(default)]
    pub timestep: String,
    /// Simulated duration, e.g. `100*ms`
    #[serde(default)]
    pub duration: String,
    /// Statements copied verbatim ahead of the entity definitions
    #[serde(default, alias = "parameters")]
    pub free_text_parameters: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timestep: "0.1*ms".to_string(),
            duration: "100*ms".to_string(),
            free_text_parameters: String::new(),
        }
    }
}

/// Everything one compile needs, in the order the form layer supplied it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub neuron_groups: Vec<NeuronGroupSpec>,
    #[serde(default)]
    pub inputs: Vec<InputSpec>,
    #[serde(default)]
    pub synapses: Vec<SynapseSpec>,
    #[serde(default)]
    pub monitors: Vec<MonitorSpec>,
}

impl Experiment {
    pub fn new(run: RunConfig) -> Self {
        Self {
            run,
            ..Default::default()
        }
    }

    /// Total number of configured entities
    pub fn entity_count(&self) -> usize {
        self.neuron_groups.len() + self.inputs.len() + self.synapses.len() + self.monitors.len()
    }
}
