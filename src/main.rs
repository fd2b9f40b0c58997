//! pstree-prof - version 0.1.0
//!
//! Process tree profiler with tracing logging.
//! This is the main entry point that resolves configuration and dispatches to
//! the run mode or a subcommand.

mod cli;
mod commands;
mod config;

use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing::{error, info};

use cli::{Args, Commands, LogLevel};
use commands::{command_check, command_run};
use config::{resolve_config, show_config, validate_effective_config};

/// Initializes tracing logging subsystem with configured log level.
///
/// Logs go to stderr; stdout carries the count table.
fn setup_logging(args: &Args) {
    let log_level = match args.log_level {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Main application entry point.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    setup_logging(&args);

    let config = match resolve_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Could not load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if args.show_config {
        if let Err(e) = show_config(&config, args.config_format.clone()) {
            eprintln!("❌ Could not render configuration: {}", e);
            std::process::exit(1);
        }
        return Ok(());
    }

    if let Some(Commands::Check { pid, verbose }) = &args.subcommand {
        if let Err(e) = command_check(*pid, *verbose, &config) {
            eprintln!("❌ Check failed: {}", e);
            std::process::exit(1);
        }
        return Ok(());
    }

    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    if args.check_config {
        println!("✅ Configuration is valid");
        return Ok(());
    }

    info!("Starting pstree-prof");
    if let Err(e) = command_run(&config).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
    Ok(())
}
