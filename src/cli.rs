// src/cli.rs

//! Command-line arguments (`clap` derive).

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::types::RunMode;

/// Command-line arguments for `pinplan`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "pinplan",
    version,
    about = "Build a module graph from a TOML description and train, run or gradient-check it.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the model description (TOML).
    #[arg(long, value_name = "PATH", default_value = "model.toml")]
    pub config: String,

    /// Run mode: train, predict or verify.
    #[arg(long, value_name = "MODE", default_value = "train")]
    pub mode: RunMode,

    /// Load module state from this file instead of initialising it.
    #[arg(long, value_name = "PATH")]
    pub init: Option<PathBuf>,

    /// Where training writes the model (and its numbered snapshots).
    #[arg(long, value_name = "PATH")]
    pub model: Option<PathBuf>,

    /// Overrides `[train].max_loops`.
    #[arg(long, value_name = "N")]
    pub max_loops: Option<usize>,

    /// Overrides `[train].report_every`.
    #[arg(long, value_name = "N")]
    pub report_every: Option<usize>,

    /// Overrides `[train].snapshot_every`.
    #[arg(long, value_name = "N")]
    pub snapshot_every: Option<usize>,

    /// At every report, run a prediction-mode copy of the model over the data.
    #[arg(long)]
    pub eval: bool,

    /// Parameter module to check in verify mode.
    #[arg(long, value_name = "NAME")]
    pub verify_module: Option<String>,

    /// Finite-difference step for verify mode.
    #[arg(long, default_value_t = 1e-4)]
    pub epsilon: f64,

    /// Components to check in verify mode (0 = all).
    #[arg(long, default_value_t = 0)]
    pub samples: usize,

    /// Log every executed task as `<module-name>:<module-type>:<operation-kind>`.
    #[arg(long)]
    pub trace: bool,

    /// Build the model and plan, print the plan and walk it once without
    /// invoking any task.
    #[arg(long)]
    pub dry_run: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PINPLAN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}
