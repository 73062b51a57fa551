//! Per-kind code emitters.
//!
//! Each emitter turns one validated record into the statements that build
//! it in the target script. Shared rules:
//!
//! - unset optional fields are left out of the call entirely, so the
//!   engine's defaults apply;
//! - fields with an implicit unit (`rates`, `rate`, `times`, `period`) get
//!   the unit appended;
//! - free-form text is spliced verbatim. Syntax errors inside it surface
//!   only when the engine runs the script.

use forge_core::{
    coerce_population, non_empty, InputKind, InputSpec, MonitorKind, MonitorSpec,
    NeuronGroupSpec, RecordSpec, SynapseSpec, Unit,
};
use tracing::{debug, warn};

use crate::equations::parse_equations;
use crate::literal::{index_list, name_list, sequence_len};
use crate::{ForgeError, Result};

/// Largest scheduling `order` the form layer offers
pub const MAX_ORDER: u8 = 10;

/// Statements generated for one entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Human-readable origin, e.g. `NeuronGroup 'G'`
    pub label: String,
    pub lines: Vec<String>,
}

impl Fragment {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            lines: Vec::new(),
        }
    }

    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }
}

// ============================================================================
// TEXT HELPERS
// ============================================================================

/// Quote text as a Python string literal whose value is exactly `text`.
///
/// Multi-line text goes through [`py_block`].
pub fn py_str(text: &str) -> String {
    if text.contains(['\n', '\r']) {
        return py_block(text);
    }
    let text = text.replace('\\', "\\\\");
    if !text.contains('\'') {
        format!("'{text}'")
    } else if !text.contains('"') {
        format!("\"{text}\"")
    } else {
        format!("'{}'", text.replace('\'', "\\'"))
    }
}

/// Quote a (possibly multi-line) block as a triple-quoted Python string
pub fn py_block(text: &str) -> String {
    let text = text.replace('\\', "\\\\");
    let fits = |quote: &str| !text.contains(&quote.repeat(3)) && !text.ends_with(quote);
    if fits("'") {
        format!("'''{text}'''")
    } else if fits("\"") {
        format!("\"\"\"{text}\"\"\"")
    } else {
        format!("'''{}'''", text.replace('\'', "\\'"))
    }
}

pub fn py_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

/// Append `*<unit>` to an expression.
///
/// An expression with a top-level `+`/`-` is parenthesized first. A quoted
/// string expression is evaluated by the engine and carries its own units,
/// so it is returned as is.
pub fn with_unit(expr: &str, unit: Unit) -> String {
    let expr = expr.trim();
    if expr.starts_with(['\'', '"']) {
        return expr.to_string();
    }
    if has_top_level_sum(expr) {
        format!("({expr})*{unit}")
    } else {
        format!("{expr}*{unit}")
    }
}

fn has_top_level_sum(expr: &str) -> bool {
    let chars: Vec<char> = expr.chars().collect();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;

    for (idx, &c) in chars.iter().enumerate() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            '+' | '-' if depth == 0 => {
                let prev = chars[..idx].iter().rev().find(|ch| !ch.is_whitespace());
                let binary = matches!(prev, Some(p) if p.is_ascii_alphanumeric() || matches!(p, ')' | ']' | '_' | '.'));
                let exponent = matches!(prev, Some('e' | 'E'))
                    && idx >= 2
                    && (chars[idx - 2].is_ascii_digit() || chars[idx - 2] == '.');
                if binary && !exponent {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

/// Python call expression assembled argument by argument
#[derive(Debug, Clone)]
struct Call {
    callee: &'static str,
    args: Vec<String>,
}

impl Call {
    fn new(callee: &'static str) -> Self {
        Self {
            callee,
            args: Vec::new(),
        }
    }

    fn arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(value.into());
        self
    }

    fn kwarg(mut self, key: &str, value: impl AsRef<str>) -> Self {
        self.args.push(format!("{}={}", key, value.as_ref()));
        self
    }

    fn opt_kwarg(self, key: &str, value: Option<String>) -> Self {
        match value {
            Some(value) => self.kwarg(key, value),
            None => self,
        }
    }

    fn render(&self) -> String {
        format!("{}({})", self.callee, self.args.join(", "))
    }

    fn bind(&self, name: &str) -> String {
        format!("{} = {}", name, self.render())
    }
}

fn label(class: &str, name: &str) -> String {
    format!("{class} '{name}'")
}

fn required<'t>(text: &'t str, entity: &str, field: &str) -> Result<&'t str> {
    let text = text.trim();
    if text.is_empty() {
        Err(ForgeError::validation(entity, field, "is required"))
    } else {
        Ok(text)
    }
}

fn check_order(order: u8, entity: &str) -> Result<()> {
    if order > MAX_ORDER {
        return Err(ForgeError::validation(
            entity,
            "order",
            format!("must be between 0 and {MAX_ORDER}, got {order}"),
        ));
    }
    Ok(())
}

fn check_probability(p: f64, entity: &str) -> Result<()> {
    if !(0.0..=1.0).contains(&p) {
        return Err(ForgeError::validation(
            entity,
            "p",
            format!("must be a probability in [0, 1], got {p}"),
        ));
    }
    Ok(())
}

// ============================================================================
// NEURON GROUPS
// ============================================================================

/// Equation block binding followed by the group construction
pub fn emit_neuron_group(spec: &NeuronGroupSpec, name: &str) -> Result<Fragment> {
    let entity = label("NeuronGroup", name);
    let threshold = non_empty(&spec.threshold);
    let reset = non_empty(&spec.reset);

    if reset.is_some() && threshold.is_none() {
        return Err(ForgeError::validation(
            entity,
            "reset",
            "is set but threshold is empty",
        ));
    }

    let call = Call::new("NeuronGroup")
        .arg(spec.population().to_string())
        .kwarg("model", "eqs")
        .opt_kwarg("threshold", threshold.map(py_str))
        .opt_kwarg("reset", reset.map(py_str))
        .opt_kwarg("refractory", non_empty(&spec.refractory).map(str::to_string))
        .kwarg("method", py_str(spec.method.as_str()));

    debug!(group = name, n = spec.population(), "emitting neuron group");
    Ok(Fragment::new(entity)
        .line(format!("eqs = Equations({})", py_block(&spec.model_text)))
        .line(call.bind(name)))
}

// ============================================================================
// INPUTS
// ============================================================================

/// One construction statement per input, dispatched on its kind tag
pub fn emit_input(spec: &InputSpec, name: &str) -> Result<Fragment> {
    let entity = label(spec.kind.class_name(), name);

    let call = match &spec.kind {
        InputKind::BinomialFunction { n, p, approximate } => {
            if *n < 1 {
                return Err(ForgeError::validation(entity, "n", format!("must be positive, got {n}")));
            }
            check_probability(*p, &entity)?;
            Call::new("BinomialFunction")
                .arg(n.to_string())
                .arg(p.to_string())
                .kwarg("approximate", py_bool(*approximate))
        }

        InputKind::PoissonGroup { n, rates, dt, clock, when, order } => {
            let rates = required(rates, &entity, "rates")?;
            check_order(*order, &entity)?;
            Call::new("PoissonGroup")
                .arg(coerce_population(*n).to_string())
                .kwarg("rates", with_unit(rates, Unit::Hertz))
                .opt_kwarg("dt", non_empty(dt).map(str::to_string))
                .opt_kwarg("clock", non_empty(clock).map(str::to_string))
                .kwarg("when", py_str(when.as_str()))
                .kwarg("order", order.to_string())
        }

        InputKind::PoissonInput { target, target_var, n, rate, weight, when, order } => {
            let target_var = required(target_var, &entity, "target_var")?;
            let rate = required(rate, &entity, "rate")?;
            let weight = required(weight, &entity, "weight")?;
            check_order(*order, &entity)?;
            Call::new("PoissonInput")
                .arg(target.trim())
                .arg(py_str(target_var))
                .arg(coerce_population(*n).to_string())
                .arg(with_unit(rate, Unit::Hertz))
                .arg(weight)
                .kwarg("when", py_str(when.as_str()))
                .kwarg("order", order.to_string())
        }

        InputKind::SpikeGeneratorGroup {
            n,
            indices,
            times,
            period,
            dt,
            clock,
            when,
            order,
            sorted,
        } => {
            let indices = required(indices, &entity, "indices")?;
            let times = required(times, &entity, "times")?;
            check_order(*order, &entity)?;
            if let (Some(n_idx), Some(n_times)) = (sequence_len(indices), sequence_len(times)) {
                if n_idx != n_times {
                    return Err(ForgeError::validation(
                        entity,
                        "times",
                        format!("has {n_times} entries but indices has {n_idx}"),
                    ));
                }
            }
            Call::new("SpikeGeneratorGroup")
                .arg(coerce_population(*n).to_string())
                .arg(indices)
                .arg(with_unit(times, Unit::Second))
                .opt_kwarg("period", non_empty(period).map(|p| with_unit(p, Unit::Second)))
                .opt_kwarg("dt", non_empty(dt).map(str::to_string))
                .opt_kwarg("clock", non_empty(clock).map(str::to_string))
                .kwarg("when", py_str(when.as_str()))
                .kwarg("order", order.to_string())
                .kwarg("sorted", py_bool(*sorted))
        }

        InputKind::TimedArray { values, dt } => {
            let values = required(values, &entity, "values")?;
            let dt = required(dt, &entity, "dt")?;
            Call::new("TimedArray").arg(values).kwarg("dt", dt)
        }
    };

    debug!(input = name, kind = spec.kind.class_name(), "emitting input");
    Ok(Fragment::new(entity).line(call.bind(name)))
}

// ============================================================================
// SYNAPSES
// ============================================================================

/// Synapses construction plus its `connect` call
pub fn emit_synapse(spec: &SynapseSpec, name: &str) -> Result<Fragment> {
    let entity = label("Synapses", name);
    check_probability(spec.p, &entity)?;
    if spec.n < 0 {
        return Err(ForgeError::validation(
            entity,
            "n",
            format!("must not be negative, got {}", spec.n),
        ));
    }

    let synapses = Call::new("Synapses")
        .arg(spec.source.trim())
        .arg(spec.target.trim())
        .opt_kwarg("model", non_empty(&spec.model).map(py_str))
        .opt_kwarg("on_pre", non_empty(&spec.on_pre).map(py_str))
        .opt_kwarg("on_post", non_empty(&spec.on_post).map(py_str))
        .opt_kwarg("on_event", non_empty(&spec.on_event).map(py_str))
        .opt_kwarg("delay", non_empty(&spec.delay).map(str::to_string))
        .opt_kwarg("method", spec.method.map(|m| py_str(m.as_str())));

    let connect = Call::new("connect")
        .opt_kwarg("condition", non_empty(&spec.condition).map(py_str))
        .opt_kwarg("i", non_empty(&spec.i).map(str::to_string))
        .opt_kwarg("j", non_empty(&spec.j).map(str::to_string))
        .kwarg("p", spec.p.to_string())
        .opt_kwarg("n", (spec.n != 1).then(|| spec.n.to_string()));

    debug!(synapses = name, source = %spec.source, target = %spec.target, "emitting synapses");
    Ok(Fragment::new(entity)
        .line(synapses.bind(name))
        .line(format!("{}.{}", name, connect.render())))
}

// ============================================================================
// MONITORS
// ============================================================================

/// How a StateMonitor trace is scaled and labelled
#[derive(Debug, Clone, PartialEq, Eq)]
enum TraceScale {
    /// Divide by a unit and show it on the axis
    Scaled(Unit),
    /// Dimensionless: plot as is
    Plain,
    /// Compound unit: plot raw SI values and show the declared unit
    Raw(String),
}

fn display_for(unit: &str) -> TraceScale {
    match unit {
        "volt" => TraceScale::Scaled(Unit::Millivolt),
        "amp" => TraceScale::Scaled(Unit::Nanoampere),
        "siemens" => TraceScale::Scaled(Unit::Nanosiemens),
        "second" => TraceScale::Scaled(Unit::Millisecond),
        "Hz" | "hertz" => TraceScale::Scaled(Unit::Hertz),
        "1" | "boolean" | "integer" | "radian" => TraceScale::Plain,
        other => match Unit::from_symbol(other) {
            Some(unit) => TraceScale::Scaled(unit),
            None => TraceScale::Raw(other.to_string()),
        },
    }
}

fn render_record(record: &RecordSpec, entity: &str) -> Result<String> {
    match record {
        RecordSpec::Flag(flag) => Ok(py_bool(*flag).to_string()),
        RecordSpec::Indices(text) => Ok(required(text, entity, "record")?.to_string()),
    }
}

fn time_axis(name: &str) -> String {
    format!("{name}.t/{}", Unit::Millisecond)
}

/// Monitor construction, a run of the configured duration, then the plot
/// and labelling statements for that monitor.
///
/// `source_model` is the equation block of the monitored group, used to
/// pick a display unit for StateMonitor traces.
pub fn emit_monitor(
    spec: &MonitorSpec,
    name: &str,
    source_model: Option<&str>,
    duration: &str,
) -> Result<Fragment> {
    let entity = label(spec.kind.class_name(), name);
    let source = spec.source.trim();
    let run = run_statement(duration);

    let mut plots = Vec::new();
    let y_label;

    let call = match &spec.kind {
        MonitorKind::SpikeMonitor { variables, record } => {
            plots.push(format!("plot({}, {name}.i, '.')", time_axis(name)));
            y_label = "Neuron index".to_string();
            Call::new("SpikeMonitor")
                .arg(source)
                .opt_kwarg("variables", non_empty(variables).map(str::to_string))
                .kwarg("record", render_record(record, &entity)?)
        }

        MonitorKind::EventMonitor { event, variables, record } => {
            let event = required(event, &entity, "event")?;
            plots.push(format!("plot({}, {name}.i, '.')", time_axis(name)));
            y_label = "Neuron index".to_string();
            Call::new("EventMonitor")
                .arg(source)
                .kwarg("event", py_str(event))
                .opt_kwarg("variables", non_empty(variables).map(str::to_string))
                .kwarg("record", render_record(record, &entity)?)
        }

        MonitorKind::PopulationRateMonitor => {
            plots.push(format!("plot({}, {name}.rate/{})", time_axis(name), Unit::Hertz));
            y_label = format!("Rate ({})", Unit::Hertz);
            Call::new("PopulationRateMonitor").arg(source)
        }

        MonitorKind::StateMonitor { variables, record } => {
            let variables = required(variables, &entity, "variables")?;
            let names = name_list(variables).filter(|names| !names.is_empty()).ok_or_else(|| {
                ForgeError::validation(&entity, "variables", "must list at least one variable name")
            })?;
            if names.len() > 1 {
                warn!(
                    monitor = name,
                    recorded = names.len(),
                    "only the first recorded variable is plotted and labelled"
                );
            }
            let variable = &names[0];

            let record_text = match record {
                RecordSpec::Indices(text) => text.trim(),
                RecordSpec::Flag(flag) => {
                    return Err(ForgeError::RecordParse {
                        entity,
                        value: py_bool(*flag).to_string(),
                        reason: "plotting needs a literal list of indices".to_string(),
                    })
                }
            };
            let indices = index_list(record_text).map_err(|e| ForgeError::RecordParse {
                entity: entity.clone(),
                value: record_text.to_string(),
                reason: e.to_string(),
            })?;

            let display = match source_model.and_then(|model| {
                parse_equations(model).unit_of(variable).map(display_for)
            }) {
                Some(display) => display,
                None => TraceScale::Scaled(Unit::Millivolt),
            };

            for idx in &indices {
                let trace = match &display {
                    TraceScale::Scaled(unit) => format!("{name}[{idx}].{variable}/{unit}"),
                    TraceScale::Plain => format!("{name}[{idx}].{variable}"),
                    TraceScale::Raw(_) => format!("{name}[{idx}].{variable}_"),
                };
                plots.push(format!("plot({}, {trace})", time_axis(name)));
            }

            y_label = match &display {
                TraceScale::Scaled(unit) => format!("{variable} ({unit})"),
                TraceScale::Plain => variable.clone(),
                TraceScale::Raw(unit) => {
                    warn!(monitor = name, unit = %unit, "no display unit for '{}', plotting SI values", variable);
                    format!("{variable} ({unit})")
                }
            };

            Call::new("StateMonitor")
                .arg(source)
                .kwarg("variables", variables)
                .kwarg("record", record_text)
        }
    };

    debug!(monitor = name, kind = spec.kind.class_name(), plots = plots.len(), "emitting monitor");

    let mut fragment = Fragment::new(entity).line(call.bind(name)).line(run);
    fragment.lines.extend(plots);
    Ok(fragment
        .line(format!("xlabel({})", py_str("t (ms)")))
        .line(format!("ylabel({})", py_str(&y_label)))
        .line("show()"))
}

/// `run(<duration>, report='text')`
pub fn run_statement(duration: &str) -> String {
    format!("run({}, report='text')", duration.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::{IntegrationMethod, Schedule};

    fn group() -> NeuronGroupSpec {
        let mut spec = NeuronGroupSpec::new("G", 10, "dv/dt = -v/tau : volt");
        spec.method = IntegrationMethod::Euler;
        spec.threshold = Some("v>1".to_string());
        spec.reset = Some("v=0".to_string());
        spec
    }

    #[test]
    fn test_quoting() {
        assert_eq!(py_str("v>1"), "'v>1'");
        assert_eq!(py_str("s == 'a'"), "\"s == 'a'\"");
        assert_eq!(py_str(r#"a'b"c"#), r#"'a\'b"c'"#);
        assert_eq!(py_block("dv/dt = -v/tau : volt"), "'''dv/dt = -v/tau : volt'''");
        assert_eq!(py_block("x = '''"), "\"\"\"x = '''\"\"\"");
    }

    #[test]
    fn test_quoting_keeps_backslashes() {
        assert_eq!(py_str(r"a\nb"), r"'a\\nb'");
        assert_eq!(py_str(r"x == 'a\'"), r#""x == 'a\\'""#);
        assert_eq!(py_str(r#"a\'b"c"#), r#"'a\\\'b"c'"#);
        assert_eq!(py_block(r"v = 1 \"), r"'''v = 1 \\'''");
    }

    #[test]
    fn test_multi_line_text_is_triple_quoted() {
        assert_eq!(py_str("v += w\nw = 0*mV"), "'''v += w\nw = 0*mV'''");
        assert_eq!(py_str("x : 1\r\ny : 1"), "'''x : 1\r\ny : 1'''");
        assert_eq!(py_str("a = 'x'\nb = \"y\""), "'''a = 'x'\nb = \"y\"'''");
    }

    #[test]
    fn test_block_ending_in_quote() {
        assert_eq!(py_block("s = 'a'"), "\"\"\"s = 'a'\"\"\"");
        assert_eq!(py_block("s = \"a\""), "'''s = \"a\"'''");
        assert_eq!(py_block("a = '''\nb = \"\"\""), "'''a = \\'\\'\\'\nb = \"\"\"'''");
        assert_eq!(py_block("a = \"\"\" 'x'"), "'''a = \"\"\" \\'x\\''''");
    }

    #[test]
    fn test_unit_suffix() {
        assert_eq!(with_unit("50", Unit::Hertz), "50*Hz");
        assert_eq!(with_unit(" [1, 2] ", Unit::Second), "[1, 2]*second");
        assert_eq!(with_unit("10 + 5", Unit::Hertz), "(10 + 5)*Hz");
        assert_eq!(with_unit("-5", Unit::Hertz), "-5*Hz");
        assert_eq!(with_unit("1e-3", Unit::Second), "1e-3*second");
        assert_eq!(with_unit("f(t - 1)", Unit::Hertz), "f(t - 1)*Hz");
        assert_eq!(with_unit("'10*Hz + t/ms*Hz'", Unit::Hertz), "'10*Hz + t/ms*Hz'");
    }

    #[test]
    fn test_neuron_group() {
        let fragment = emit_neuron_group(&group(), "G").unwrap();
        assert_eq!(fragment.label, "NeuronGroup 'G'");
        assert_eq!(
            fragment.lines,
            vec![
                "eqs = Equations('''dv/dt = -v/tau : volt''')".to_string(),
                "G = NeuronGroup(10, model=eqs, threshold='v>1', reset='v=0', method='euler')".to_string(),
            ]
        );
    }

    #[test]
    fn test_neuron_group_elides_unset_fields() {
        let mut spec = group();
        spec.reset = Some(String::new());
        spec.refractory = Some("5*ms".to_string());
        spec.n = 0;
        let fragment = emit_neuron_group(&spec, "G").unwrap();
        assert_eq!(
            fragment.lines[1],
            "G = NeuronGroup(1, model=eqs, threshold='v>1', refractory=5*ms, method='euler')"
        );
    }

    #[test]
    fn test_reset_without_threshold() {
        let mut spec = group();
        spec.threshold = None;
        assert!(matches!(
            emit_neuron_group(&spec, "G"),
            Err(ForgeError::Validation { field, .. }) if field == "reset"
        ));
    }

    #[test]
    fn test_poisson_group() {
        let spec = InputSpec::new(
            "P",
            InputKind::PoissonGroup {
                n: 100,
                rates: "50".to_string(),
                dt: Some("0.1*ms".to_string()),
                clock: None,
                when: Schedule::Start,
                order: 0,
            },
        );
        let fragment = emit_input(&spec, "P").unwrap();
        assert_eq!(
            fragment.lines,
            vec!["P = PoissonGroup(100, rates=50*Hz, dt=0.1*ms, when='start', order=0)"]
        );
    }

    #[test]
    fn test_poisson_input() {
        let spec = InputSpec::new(
            "PI",
            InputKind::PoissonInput {
                target: "G".to_string(),
                target_var: "v".to_string(),
                n: 50,
                rate: "10".to_string(),
                weight: "0.1*mV".to_string(),
                when: Schedule::End,
                order: 2,
            },
        );
        let fragment = emit_input(&spec, "PI").unwrap();
        assert_eq!(
            fragment.lines[0],
            "PI = PoissonInput(G, 'v', 50, 10*Hz, 0.1*mV, when='end', order=2)"
        );
    }

    #[test]
    fn test_binomial_function() {
        let spec = InputSpec::new("B", InputKind::BinomialFunction { n: 100, p: 0.1, approximate: false });
        let fragment = emit_input(&spec, "B").unwrap();
        assert_eq!(fragment.lines[0], "B = BinomialFunction(100, 0.1, approximate=False)");

        let bad = InputSpec::new("B", InputKind::BinomialFunction { n: 100, p: 1.5, approximate: true });
        assert!(emit_input(&bad, "B").is_err());
    }

    #[test]
    fn test_spike_generator_group() {
        let spec = InputSpec::new(
            "SG",
            InputKind::SpikeGeneratorGroup {
                n: 3,
                indices: "[0, 1, 2]".to_string(),
                times: "[0.01, 0.02, 0.03]".to_string(),
                period: Some("0.1".to_string()),
                dt: None,
                clock: None,
                when: Schedule::Start,
                order: 0,
                sorted: true,
            },
        );
        let fragment = emit_input(&spec, "SG").unwrap();
        assert_eq!(
            fragment.lines[0],
            "SG = SpikeGeneratorGroup(3, [0, 1, 2], [0.01, 0.02, 0.03]*second, period=0.1*second, when='start', order=0, sorted=True)"
        );
    }

    #[test]
    fn test_spike_generator_length_mismatch() {
        let spec = InputSpec::new(
            "SG",
            InputKind::SpikeGeneratorGroup {
                n: 3,
                indices: "[0, 1]".to_string(),
                times: "[0.01, 0.02, 0.03]".to_string(),
                period: None,
                dt: None,
                clock: None,
                when: Schedule::Start,
                order: 0,
                sorted: false,
            },
        );
        match emit_input(&spec, "SG") {
            Err(ForgeError::Validation { field, reason, .. }) => {
                assert_eq!(field, "times");
                assert!(reason.contains("3 entries"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_order_out_of_range() {
        let spec = InputSpec::new(
            "P",
            InputKind::PoissonGroup {
                n: 1,
                rates: "5".to_string(),
                dt: None,
                clock: None,
                when: Schedule::Start,
                order: 11,
            },
        );
        assert!(matches!(
            emit_input(&spec, "P"),
            Err(ForgeError::Validation { field, .. }) if field == "order"
        ));
    }

    #[test]
    fn test_timed_array() {
        let spec = InputSpec::new(
            "stim",
            InputKind::TimedArray { values: "[1, 2, 3]*nA".to_string(), dt: "1*ms".to_string() },
        );
        let fragment = emit_input(&spec, "stim").unwrap();
        assert_eq!(fragment.lines[0], "stim = TimedArray([1, 2, 3]*nA, dt=1*ms)");
    }

    #[test]
    fn test_synapse() {
        let mut spec = SynapseSpec::new("S", "P", "G");
        spec.model = Some("w : volt".to_string());
        spec.on_pre = Some("v += w".to_string());
        spec.p = 0.1;
        let fragment = emit_synapse(&spec, "S").unwrap();
        assert_eq!(
            fragment.lines,
            vec![
                "S = Synapses(P, G, model='w : volt', on_pre='v += w')".to_string(),
                "S.connect(p=0.1)".to_string(),
            ]
        );
    }

    #[test]
    fn test_synapse_connect_arguments() {
        let mut spec = SynapseSpec::new("S", "G", "G");
        spec.condition = Some("i != j".to_string());
        spec.n = 2;
        spec.delay = Some("2*ms".to_string());
        let fragment = emit_synapse(&spec, "S").unwrap();
        assert_eq!(fragment.lines[0], "S = Synapses(G, G, delay=2*ms)");
        assert_eq!(fragment.lines[1], "S.connect(condition='i != j', p=1, n=2)");
    }

    #[test]
    fn test_synapse_multi_line_code() {
        let mut spec = SynapseSpec::new("S", "P", "G");
        spec.model = Some("w : volt\nplastic : 1".to_string());
        spec.on_pre = Some("v += w\nw = clip(w, 0*mV, 1*mV)".to_string());
        let fragment = emit_synapse(&spec, "S").unwrap();
        assert_eq!(
            fragment.lines[0],
            "S = Synapses(P, G, model='''w : volt\nplastic : 1''', on_pre='''v += w\nw = clip(w, 0*mV, 1*mV)''')"
        );
    }

    #[test]
    fn test_state_monitor() {
        let spec = MonitorSpec::new(
            "M",
            "G",
            MonitorKind::StateMonitor {
                variables: "['v']".to_string(),
                record: RecordSpec::Indices("[0,1]".to_string()),
            },
        );
        let fragment = emit_monitor(&spec, "M", Some("dv/dt = -v/tau : volt"), "100*ms").unwrap();
        assert_eq!(
            fragment.lines,
            vec![
                "M = StateMonitor(G, variables=['v'], record=[0,1])",
                "run(100*ms, report='text')",
                "plot(M.t/ms, M[0].v/mV)",
                "plot(M.t/ms, M[1].v/mV)",
                "xlabel('t (ms)')",
                "ylabel('v (mV)')",
                "show()",
            ]
        );
    }

    #[test]
    fn test_state_monitor_display_units() {
        let spec = MonitorSpec::new(
            "M",
            "G",
            MonitorKind::StateMonitor {
                variables: "'x'".to_string(),
                record: RecordSpec::Indices("[3]".to_string()),
            },
        );
        let fragment = emit_monitor(&spec, "M", Some("dx/dt = -x/tau : 1"), "1*second").unwrap();
        assert!(fragment.lines.contains(&"plot(M.t/ms, M[3].x)".to_string()));
        assert!(fragment.lines.contains(&"ylabel('x')".to_string()));

        let fragment = emit_monitor(&spec, "M", Some("dx/dt = -x/tau : volt/second"), "1*second").unwrap();
        assert!(fragment.lines.contains(&"plot(M.t/ms, M[3].x_)".to_string()));
    }

    #[test]
    fn test_state_monitor_record_must_be_list() {
        let spec = MonitorSpec::new(
            "M",
            "G",
            MonitorKind::StateMonitor { variables: "['v']".to_string(), record: RecordSpec::Flag(true) },
        );
        assert!(matches!(
            emit_monitor(&spec, "M", None, "100*ms"),
            Err(ForgeError::RecordParse { .. })
        ));

        let spec = MonitorSpec::new(
            "M",
            "G",
            MonitorKind::StateMonitor {
                variables: "['v']".to_string(),
                record: RecordSpec::Indices("range(3)".to_string()),
            },
        );
        match emit_monitor(&spec, "M", None, "100*ms") {
            Err(ForgeError::RecordParse { value, .. }) => assert_eq!(value, "range(3)"),
            other => panic!("expected record parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_spike_and_rate_monitors() {
        let spike = MonitorSpec::new(
            "SM",
            "G",
            MonitorKind::SpikeMonitor { variables: None, record: RecordSpec::Flag(true) },
        );
        let fragment = emit_monitor(&spike, "SM", None, "1*second").unwrap();
        assert_eq!(fragment.lines[0], "SM = SpikeMonitor(G, record=True)");
        assert_eq!(fragment.lines[2], "plot(SM.t/ms, SM.i, '.')");
        assert_eq!(fragment.lines[4], "ylabel('Neuron index')");

        let rate = MonitorSpec::new("R", "G", MonitorKind::PopulationRateMonitor);
        let fragment = emit_monitor(&rate, "R", None, "1*second").unwrap();
        assert_eq!(fragment.lines[0], "R = PopulationRateMonitor(G)");
        assert_eq!(fragment.lines[2], "plot(R.t/ms, R.rate/Hz)");
        assert_eq!(fragment.lines[4], "ylabel('Rate (Hz)')");
    }

    #[test]
    fn test_event_monitor() {
        let spec = MonitorSpec::new(
            "EM",
            "G",
            MonitorKind::EventMonitor {
                event: "custom".to_string(),
                variables: None,
                record: RecordSpec::Flag(false),
            },
        );
        let fragment = emit_monitor(&spec, "EM", None, "1*second").unwrap();
        assert_eq!(fragment.lines[0], "EM = EventMonitor(G, event='custom', record=False)");
        assert_eq!(fragment.lines[4], "ylabel('Neuron index')");
    }
}
