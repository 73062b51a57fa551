//! # Brian Forge CLI
//!
//! Command-line front end for the Brian 2 script compiler.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use dialoguer::Confirm;
use forge_brian::{
    compile, execute, load, resolve_sources, resolve_targets, save, ExecutionResult, Script,
};
use forge_core::{Experiment, IntegrationMethod, Schedule};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod snapshot;

use config::ForgeConfig;
use snapshot::load_snapshot;

#[derive(Parser)]
#[command(name = "forge")]
#[command(version)]
#[command(about = "Compile Brian 2 experiment snapshots into runnable scripts", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (default: <config dir>/brian-forge/forge.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Interpreter that runs generated scripts
    #[arg(long, global = true)]
    interpreter: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a snapshot and print or save the script
    Build {
        /// Snapshot file (.toml or .json)
        snapshot: PathBuf,
        /// Write the script here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Overwrite an existing output file without asking
        #[arg(long)]
        force: bool,
    },

    /// Compile a snapshot and report resolved names, without output
    Check {
        /// Snapshot file (.toml or .json)
        snapshot: PathBuf,
    },

    /// Compile a snapshot and execute the script
    Run {
        /// Snapshot file (.toml or .json)
        snapshot: PathBuf,
        /// Also save the compiled script
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Execute a previously saved script
    Exec {
        /// Script file
        script: PathBuf,
    },

    /// List supported entity kinds
    Kinds,
}

fn init_logging(verbose: u8, configured: &str) {
    let level = match verbose {
        0 => configured,
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ForgeConfig::resolve(cli.config.as_deref())?;
    if let Some(interpreter) = cli.interpreter {
        config.interpreter = interpreter;
    }
    init_logging(cli.verbose, &config.log_level);
    debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Build { snapshot, output, force } => {
            let script = compile_snapshot(&snapshot, &config)?;
            match output {
                Some(path) => {
                    if path.exists() && !force && !confirm_overwrite(&path)? {
                        bail!("{} exists; pass --force to overwrite", path.display());
                    }
                    save(script.text(), &path)?;
                    println!("{} {}", "Wrote".green().bold(), path.display());
                }
                None => print!("{script}"),
            }
        }

        Commands::Check { snapshot } => {
            let experiment = read_snapshot(&snapshot, &config)?;
            let script = compile(&experiment)
                .with_context(|| format!("Cannot compile {}", snapshot.display()))?;
            print_summary(&experiment, &script);
        }

        Commands::Run { snapshot, save: save_path } => {
            let script = compile_snapshot(&snapshot, &config)?;
            if let Some(path) = save_path {
                save(script.text(), &path)?;
                println!("{} {}", "Saved".green().bold(), path.display());
            }
            let output = run_with_spinner(&config, &script)?;
            print_output(&output);
        }

        Commands::Exec { script } => {
            let text = load(&script)?;
            let output = run_with_spinner(&config, &Script::from_text(text))?;
            print_output(&output);
        }

        Commands::Kinds => print_kinds(),
    }

    Ok(())
}

fn read_snapshot(path: &Path, config: &ForgeConfig) -> Result<Experiment> {
    let mut experiment = load_snapshot(path)?;
    config.apply_defaults(&mut experiment.run);
    info!(path = %path.display(), entities = experiment.entity_count(), "snapshot loaded");
    Ok(experiment)
}

fn compile_snapshot(path: &Path, config: &ForgeConfig) -> Result<Script> {
    let experiment = read_snapshot(path, config)?;
    compile(&experiment).with_context(|| format!("Cannot compile {}", path.display()))
}

fn confirm_overwrite(path: &Path) -> Result<bool> {
    if !console::user_attended() {
        return Ok(false);
    }
    let answer = Confirm::new()
        .with_prompt(format!("Overwrite {}?", path.display()))
        .default(false)
        .interact()?;
    Ok(answer)
}

fn run_with_spinner(config: &ForgeConfig, script: &Script) -> Result<ExecutionResult> {
    let engine = config.engine();

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    spinner.set_message(format!("Running script with {}", engine.program()));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = execute(&engine, script);
    spinner.finish_and_clear();

    Ok(result?)
}

fn print_output(output: &ExecutionResult) {
    print!("{}", output.stdout);
    if !output.stderr.is_empty() {
        eprint!("{}", output.stderr.dimmed());
    }
    println!("{}", "Simulation finished".green().bold());
}

fn print_summary(experiment: &Experiment, script: &Script) {
    println!("{}", "Snapshot OK".green().bold());
    println!("  Neuron groups: {}", experiment.neuron_groups.len());
    println!("  Inputs:        {}", experiment.inputs.len());
    println!("  Synapses:      {}", experiment.synapses.len());
    println!("  Monitors:      {}", experiment.monitors.len());
    println!("  Script lines:  {}", script.text().lines().count());

    let sources = resolve_sources(&experiment.inputs, &experiment.neuron_groups);
    let targets = resolve_targets(&experiment.neuron_groups);
    println!();
    println!("  {} {}", "Sources:".cyan(), join(&sources));
    println!("  {} {}", "Targets:".cyan(), join(&targets));
}

fn join<'a>(names: impl IntoIterator<Item = &'a String>) -> String {
    let names: Vec<&str> = names.into_iter().map(String::as_str).collect();
    if names.is_empty() {
        "(none)".to_string()
    } else {
        names.join(", ")
    }
}

fn print_kinds() {
    println!("{}", "Inputs:".green().bold());
    println!("  {} - n, p, approximate", "BinomialFunction".cyan());
    println!("  {} - N, rates, dt, clock, when, order", "PoissonGroup".cyan());
    println!("  {} - target, target_var, N, rate, weight, when, order", "PoissonInput".cyan());
    println!(
        "  {} - N, indices, times, period, dt, clock, when, order, sorted",
        "SpikeGeneratorGroup".cyan()
    );
    println!("  {} - values, dt", "TimedArray".cyan());
    println!();
    println!("{}", "Neuron groups:".green().bold());
    println!("  {} - N, model_text, method, threshold, reset, refractory", "NeuronGroup".cyan());
    println!();
    println!("{}", "Synapses:".green().bold());
    println!(
        "  {} - source, target, model, on_pre, on_post, on_event, delay, condition, i, j, p, n, method",
        "Synapses".cyan()
    );
    println!();
    println!("{}", "Monitors:".green().bold());
    println!("  {} - source, variables, record", "SpikeMonitor".cyan());
    println!("  {} - source, variables, record", "StateMonitor".cyan());
    println!("  {} - source", "PopulationRateMonitor".cyan());
    println!("  {} - source, event, variables, record", "EventMonitor".cyan());
    println!();
    let methods: Vec<&str> = IntegrationMethod::ALL.iter().map(|m| m.as_str()).collect();
    let schedules: Vec<&str> = Schedule::ALL.iter().map(|s| s.as_str()).collect();
    println!("{} {}", "Methods:".green().bold(), methods.join(", "));
    println!("{} {}", "Schedules:".green().bold(), schedules.join(", "));
}
