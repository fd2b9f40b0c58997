//! CLI arguments and subcommands for pstree-prof.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Default, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, Default, ValueEnum)]
pub enum ConfigFormat {
    #[default]
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug, Default)]
#[command(
    name = "pstree-prof",
    about = "Profile the process tree of a command by sampling the process table",
    long_about = "Profile the process tree of a command by sampling the process table.\n\n\
                  Launches a command (or watches every process matching a pattern), polls \
                  `ps` at a fixed interval, rebuilds the subtree below it and reports either \
                  a histogram of the commands seen or one trace span per process lifetime.",
    version,
    propagate_version = true,
    after_help = "Example: pstree-prof --output-mode trace -- make -j8"
)]
pub struct Args {
    #[command(subcommand)]
    pub subcommand: Option<Commands>,

    /// Command to run, split on whitespace
    #[arg(short = 'c', long, conflicts_with = "program")]
    pub command: Option<String>,

    /// Watch every process whose command line contains this substring
    #[arg(short = 'p', long)]
    pub pattern: Option<String>,

    /// Milliseconds to sleep between samples
    #[arg(long = "sampling-interval", value_name = "MS")]
    pub sampling_interval_ms: Option<u64>,

    /// How to summarize the samples (count | trace)
    #[arg(long)]
    pub output_mode: Option<String>,

    /// Process identity across samples (pid | pid-start-time)
    #[arg(long)]
    pub identity: Option<String>,

    /// Program used to list processes
    #[arg(long)]
    pub ps_program: Option<String>,

    /// Process table columns, comma-separated (command must be last)
    #[arg(long)]
    pub columns: Option<String>,

    /// Service name attached to exported traces
    #[arg(long)]
    pub service_name: Option<String>,

    /// Write the trace to this file instead of stderr
    #[arg(long)]
    pub trace_output: Option<PathBuf>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Config file (YAML/JSON/TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Program and arguments to run, as an alternative to --command
    #[arg(last = true, value_name = "PROGRAM")]
    pub program: Vec<String>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Capture one snapshot and report what the root rule selects
    Check {
        /// Root pid to select from (defaults to the configured pattern)
        #[arg(long)]
        pid: Option<u32>,

        /// Print every selected process
        #[arg(long)]
        verbose: bool,
    },
}
