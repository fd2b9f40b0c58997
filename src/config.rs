//! Configuration management for pstree-prof.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat};
use pstree_prof::{split_command_line, ColumnLayout, Identity, LaunchError, OutputMode, RootRule};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

// Default configuration constants
pub const DEFAULT_SAMPLING_INTERVAL_MS: u64 = 100;
pub const DEFAULT_PS_PROGRAM: &str = "ps";
pub const DEFAULT_SERVICE_NAME: &str = "pstree-prof";
pub const DEFAULT_COLUMNS: [&str; 5] = ["user", "pid", "ppid", "pgid", "command"];

/// Effective configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // What to monitor
    /// Command line split on whitespace.
    pub command: Option<String>,
    /// Program and arguments taken as given. Wins over `command`.
    pub argv: Option<Vec<String>>,
    pub pattern: Option<String>,

    // Sampling
    #[serde(alias = "sampling-interval-ms", alias = "samplingInterval")]
    pub sampling_interval_ms: Option<u64>,
    /// "pid" | "pid-start-time"
    pub identity: Option<String>,

    // Process table source
    #[serde(alias = "ps-program")]
    pub ps_program: Option<String>,
    pub columns: Option<Vec<String>>,

    // Output
    /// "count" | "trace"
    #[serde(alias = "output-mode", alias = "outputMode")]
    pub output_mode: Option<String>,
    #[serde(alias = "service-name")]
    pub service_name: Option<String>,
    #[serde(alias = "trace-output")]
    pub trace_output: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            command: None,
            argv: None,
            pattern: None,
            sampling_interval_ms: Some(DEFAULT_SAMPLING_INTERVAL_MS),
            identity: Some(Identity::Pid.to_string()),
            ps_program: Some(DEFAULT_PS_PROGRAM.to_string()),
            columns: None,
            output_mode: Some(OutputMode::Count.to_string()),
            service_name: Some(DEFAULT_SERVICE_NAME.to_string()),
            trace_output: None,
        }
    }
}

impl Config {
    pub fn sampling_interval(&self) -> Duration {
        Duration::from_millis(
            self.sampling_interval_ms
                .unwrap_or(DEFAULT_SAMPLING_INTERVAL_MS),
        )
    }

    pub fn output_mode(&self) -> Result<OutputMode, String> {
        self.output_mode.as_deref().unwrap_or("count").parse()
    }

    pub fn identity(&self) -> Result<Identity, String> {
        self.identity.as_deref().unwrap_or("pid").parse()
    }

    pub fn ps_program(&self) -> &str {
        self.ps_program.as_deref().unwrap_or(DEFAULT_PS_PROGRAM)
    }

    pub fn service_name(&self) -> &str {
        self.service_name.as_deref().unwrap_or(DEFAULT_SERVICE_NAME)
    }

    /// Column layout for the process table.
    ///
    /// Without an explicit column list, `pid-start-time` identity adds the
    /// `etimes` column to the default layout.
    pub fn column_layout(&self) -> Result<ColumnLayout, String> {
        let layout = match &self.columns {
            Some(names) => ColumnLayout::from_names(names).map_err(|e| e.to_string())?,
            None => {
                let layout = ColumnLayout::default();
                if self.identity()? == Identity::PidAndStartTime {
                    layout.with_elapsed_seconds()
                } else {
                    layout
                }
            }
        };
        Ok(layout)
    }

    /// Program and arguments to launch, if any.
    pub fn launch_argv(&self) -> Result<Option<(String, Vec<String>)>, LaunchError> {
        if let Some((program, args)) = self.argv.as_deref().and_then(<[String]>::split_first) {
            return Ok(Some((program.clone(), args.to_vec())));
        }
        match self.command.as_deref() {
            Some(command_line) => split_command_line(command_line).map(Some),
            None => Ok(None),
        }
    }

    /// Human-readable form of what is being monitored.
    pub fn run_name(&self) -> Option<String> {
        match self.argv.as_deref() {
            Some(argv) if !argv.is_empty() => Some(argv.join(" ")),
            _ => self.command.clone().or_else(|| self.pattern.clone()),
        }
    }

    /// Root rule used on every tick: the pattern if one is set, otherwise the
    /// pid of the launched command.
    pub fn root_rule(&self, launched_pid: Option<u32>) -> Option<RootRule> {
        match (&self.pattern, launched_pid) {
            (Some(pattern), _) => Some(RootRule::CommandContains(pattern.clone())),
            (None, Some(pid)) => Some(RootRule::ExactPid(pid)),
            (None, None) => None,
        }
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let has_command = cfg.command.as_deref().is_some_and(|c| !c.trim().is_empty())
        || cfg.argv.as_deref().is_some_and(|a| !a.is_empty());
    let has_pattern = cfg.pattern.as_deref().is_some_and(|p| !p.is_empty());

    if !(has_command || has_pattern) {
        return Err("a non-empty command or pattern must be specified".into());
    }
    if cfg.pattern.as_deref() == Some("") {
        return Err("pattern must not be empty".into());
    }

    if cfg.sampling_interval_ms == Some(0) {
        return Err("sampling_interval_ms must be greater than 0".into());
    }

    cfg.output_mode()?;
    let identity = cfg.identity()?;

    if cfg.ps_program().trim().is_empty() {
        return Err("ps_program must not be empty".into());
    }

    let layout = cfg.column_layout()?;
    if identity == Identity::PidAndStartTime && !layout.has(pstree_prof::Column::ElapsedSeconds) {
        return Err(
            "identity 'pid-start-time' requires an 'etimes' column in columns".into(),
        );
    }

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    // What to monitor: CLI wins if provided
    if let Some(command) = &args.command {
        config.command = Some(command.clone());
        config.argv = None;
    }
    if !args.program.is_empty() {
        config.argv = Some(args.program.clone());
        config.command = None;
    }
    if let Some(pattern) = &args.pattern {
        config.pattern = Some(pattern.clone());
    }

    if let Some(interval) = args.sampling_interval_ms {
        config.sampling_interval_ms = Some(interval);
    }
    if let Some(identity) = &args.identity {
        config.identity = Some(identity.clone());
    }

    if let Some(program) = &args.ps_program {
        config.ps_program = Some(program.clone());
    }
    // Parse comma-separated column names
    if let Some(columns) = &args.columns {
        config.columns = Some(columns.split(',').map(|s| s.trim().to_string()).collect());
    }

    if let Some(mode) = &args.output_mode {
        config.output_mode = Some(mode.clone());
    }
    if let Some(name) = &args.service_name {
        config.service_name = Some(name.clone());
    }
    if let Some(path) = &args.trace_output {
        config.trace_output = Some(path.clone());
    }

    Ok(config)
}

/// Configuration loading with multiple format support
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(format!("config file not found: {}", p.display()).into());
            }
            p.to_path_buf()
        }
        None => {
            // Try default locations
            let defaults = [
                "/etc/pstree-prof/config.yaml",
                "./pstree-prof.yaml",
                "./pstree-prof.yml",
                "./pstree-prof.json",
                "./pstree-prof.toml",
            ];

            match defaults.iter().map(Path::new).find(|p| p.exists()) {
                Some(p) => p.to_path_buf(),
                None => return Ok(Config::default()),
            }
        }
    };

    let content = fs::read_to_string(&path)?;

    let config: Config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(&content)?,
        Some("toml") => toml::from_str(&content)?,
        // Default to YAML
        _ => serde_yaml::from_str(&content)?,
    };
    info!("Loaded configuration from: {}", path.display());
    Ok(fill_defaults(config))
}

/// Fills fields a config file left out with the built-in defaults.
fn fill_defaults(mut config: Config) -> Config {
    let defaults = Config::default();
    config.sampling_interval_ms = config.sampling_interval_ms.or(defaults.sampling_interval_ms);
    config.identity = config.identity.or(defaults.identity);
    config.ps_program = config.ps_program.or(defaults.ps_program);
    config.output_mode = config.output_mode.or(defaults.output_mode);
    config.service_name = config.service_name.or(defaults.service_name);
    config
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };
    println!("{output}");
    Ok(())
}
