//! Snapshot files: TOML (`.toml`) or JSON

use std::path::Path;

use anyhow::{Context, Result};
use forge_brian::legacy::experiment_from_value;
use forge_core::Experiment;
use serde_json::Value;

pub fn load_snapshot(path: &Path) -> Result<Experiment> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;

    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("toml"));

    let value: Value = if is_toml {
        toml::from_str(&text).with_context(|| format!("Invalid TOML in {}", path.display()))?
    } else {
        serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))?
    };

    experiment_from_value(value).with_context(|| format!("Invalid snapshot {}", path.display()))
}
