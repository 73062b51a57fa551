//! Migration shim for input records saved without a `kind` tag.
//!
//! Older snapshots identified an input's kind by which fields it carried.
//! Those records are upgraded here, once, before normal deserialization;
//! tagged records pass through untouched.

use forge_core::{Experiment, InputSpec};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::{ForgeError, Result};

/// Field pairs that identify an untagged input, checked in order
const PRESENCE_RULES: &[(&str, &str, &str)] = &[
    ("n", "p", "BinomialFunction"),
    ("N", "rates", "PoissonGroup"),
    ("target", "target_var", "PoissonInput"),
    ("indices", "times", "SpikeGeneratorGroup"),
    ("values", "dt", "TimedArray"),
];

/// Kind implied by the fields present in an untagged input record
pub fn infer_input_kind(fields: &Map<String, Value>) -> Option<&'static str> {
    PRESENCE_RULES
        .iter()
        .find(|(a, b, _)| fields.contains_key(*a) && fields.contains_key(*b))
        .map(|(_, _, kind)| *kind)
}

fn tag_input(fields: &mut Map<String, Value>, position: usize) -> Result<()> {
    if fields.contains_key("kind") {
        return Ok(());
    }
    let kind = infer_input_kind(fields).ok_or_else(|| {
        ForgeError::validation(
            format!("input #{position}"),
            "kind",
            "is missing and cannot be inferred from the fields present",
        )
    })?;
    warn!(position, kind, "untagged input record, kind inferred from its fields");
    fields.insert("kind".to_string(), Value::String(kind.to_string()));
    Ok(())
}

/// Build an input from an untagged field map
pub fn input_from_fields(mut fields: Map<String, Value>) -> Result<InputSpec> {
    tag_input(&mut fields, 1)?;
    Ok(serde_json::from_value(Value::Object(fields))?)
}

/// Deserialize a snapshot, upgrading untagged inputs first
pub fn experiment_from_value(mut value: Value) -> Result<Experiment> {
    if let Some(inputs) = value.get_mut("inputs").and_then(Value::as_array_mut) {
        for (idx, input) in inputs.iter_mut().enumerate() {
            if let Some(fields) = input.as_object_mut() {
                tag_input(fields, idx + 1)?;
            }
        }
    }
    let experiment: Experiment = serde_json::from_value(value)?;
    debug!(entities = experiment.entity_count(), "snapshot decoded");
    Ok(experiment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::{InputKind, Schedule};
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_presence_dispatch() {
        let input = input_from_fields(fields(json!({ "name": "B", "n": 10, "p": 0.5 }))).unwrap();
        assert_eq!(input.kind, InputKind::BinomialFunction { n: 10, p: 0.5, approximate: true });

        let input = input_from_fields(fields(json!({ "N": 100, "rates": "50" }))).unwrap();
        assert_eq!(input.kind.class_name(), "PoissonGroup");

        let input = input_from_fields(fields(json!({
            "target": "G", "target_var": "v", "N": 5, "rate": "10", "weight": "0.1*mV"
        })))
        .unwrap();
        assert!(matches!(input.kind, InputKind::PoissonInput { when: Schedule::Start, order: 0, .. }));

        let input = input_from_fields(fields(json!({ "indices": "[0]", "times": "[1]" }))).unwrap();
        assert_eq!(input.kind.class_name(), "SpikeGeneratorGroup");

        let input = input_from_fields(fields(json!({ "values": "[1, 2]", "dt": "1*ms" }))).unwrap();
        assert_eq!(input.kind.class_name(), "TimedArray");
    }

    #[test]
    fn test_first_rule_wins() {
        // A TimedArray-looking record that also has n and p
        let map = fields(json!({ "n": 3, "p": 0.2, "values": "[1]", "dt": "1*ms" }));
        assert_eq!(infer_input_kind(&map), Some("BinomialFunction"));
    }

    #[test]
    fn test_uninferable_record() {
        let err = input_from_fields(fields(json!({ "name": "X", "rate": "5" }))).unwrap_err();
        assert!(matches!(err, ForgeError::Validation { ref field, .. } if field == "kind"));
    }

    #[test]
    fn test_experiment_upgrade() {
        let value = json!({
            "run": { "duration": "50*ms" },
            "neuron_groups": [{ "name": "G", "N": 10, "model_text": "dv/dt = -v/(10*ms) : 1" }],
            "inputs": [
                { "name": "P", "N": 20, "rates": "15" },
                { "name": "T", "kind": "TimedArray", "values": "[0, 1]", "dt": "1*ms" }
            ]
        });
        let exp = experiment_from_value(value).unwrap();
        assert_eq!(exp.inputs.len(), 2);
        assert_eq!(exp.inputs[0].kind.class_name(), "PoissonGroup");
        assert_eq!(exp.inputs[1].kind.class_name(), "TimedArray");
        assert_eq!(exp.run.duration, "50*ms");
    }

    #[test]
    fn test_malformed_snapshot() {
        let value = json!({ "inputs": [{ "kind": "PoissonGroup", "N": 20 }] });
        assert!(matches!(experiment_from_value(value), Err(ForgeError::Snapshot(_))));
    }
}
