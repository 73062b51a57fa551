//! `forge.toml` handling

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use forge_brian::ProcessEngine;
use forge_core::RunConfig;
use serde::{Deserialize, Serialize};

/// Values used when a snapshot's `[run]` table leaves them empty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunDefaults {
    pub timestep: String,
    pub duration: String,
}

impl Default for RunDefaults {
    fn default() -> Self {
        let run = RunConfig::default();
        Self {
            timestep: run.timestep,
            duration: run.duration,
        }
    }
}

/// Global CLI configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    /// Program that evaluates generated scripts
    pub interpreter: String,
    /// Arguments making the interpreter read the script from stdin
    pub interpreter_args: Vec<String>,
    pub log_level: String,
    pub defaults: RunDefaults,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            interpreter_args: vec!["-".to_string()],
            log_level: "info".to_string(),
            defaults: RunDefaults::default(),
        }
    }
}

impl ForgeConfig {
    /// Load configuration from file; a missing file means defaults
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// `--config` when given (it must exist), else the platform config dir
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) if !path.exists() => bail!("Config file {} does not exist", path.display()),
            Some(path) => Self::load_from_file(path),
            None => match Self::default_config_path() {
                Some(path) => Self::load_from_file(&path),
                None => Ok(Self::default()),
            },
        }
    }

    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("brian-forge").join("forge.toml"))
    }

    /// Fill empty run parameters from `[defaults]`
    pub fn apply_defaults(&self, run: &mut RunConfig) {
        if run.timestep.trim().is_empty() {
            run.timestep = self.defaults.timestep.clone();
        }
        if run.duration.trim().is_empty() {
            run.duration = self.defaults.duration.clone();
        }
    }

    pub fn engine(&self) -> ProcessEngine {
        ProcessEngine::new(self.interpreter.as_str()).args(self.interpreter_args.iter().cloned())
    }
}
