//! TriggerFlow CLI - Command-line interface
//!
//! This binary provides a command-line interface to the TriggerFlow
//! library.
//!
//! # Architecture
//!
//! The CLI is organized into:
//! - `Cli` / `Commands`: Argument parsing (clap)
//! - `CliRunner`: Common setup (logging, configuration)
//! - `CliError`: Centralized error handling with user-friendly messages
//! - `sim`: Simulated TRB worker pool driven by the `run` command

mod error;
mod runner;
mod sim;

use clap::{Parser, Subcommand};
use error::CliError;
use runner::CliRunner;
use std::path::PathBuf;
use std::time::Duration;
use triggerflow::config::OrchestratorConfig;

#[derive(Parser)]
#[command(name = "triggerflow", version = triggerflow::VERSION)]
#[command(about = "Dispatch trigger decisions to a pool of trigger record builders")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the orchestrator against a simulated worker pool
    Run {
        /// Path to the INI configuration file
        #[arg(short, long, default_value = "triggerflow.ini")]
        config: PathBuf,

        /// How long to run, in seconds
        #[arg(short, long, default_value_t = 10)]
        duration: u64,

        /// Decisions produced per second
        #[arg(short, long, default_value_t = 100)]
        rate: u64,

        /// Simulated record-building time per decision, in milliseconds
        #[arg(short, long, default_value_t = 20)]
        build_time: u64,

        /// Enable debug logging
        #[arg(long)]
        debug: bool,
    },

    /// Validate a configuration file and print the parsed result
    CheckConfig {
        /// Path to the INI configuration file
        config: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            config,
            duration,
            rate,
            build_time,
            debug,
        } => run(&config, duration, rate, build_time, debug),
        Commands::CheckConfig { config } => check_config(&config),
    };

    if let Err(error) = result {
        error.exit();
    }
}

fn run(
    config_path: &PathBuf,
    duration: u64,
    rate: u64,
    build_time: u64,
    debug: bool,
) -> Result<(), CliError> {
    let runner = CliRunner::new(config_path, debug)?;
    runner.log_startup("run");
    sim::run_simulation(
        runner.config(),
        Duration::from_secs(duration),
        rate,
        Duration::from_millis(build_time),
    )
}

fn check_config(config_path: &PathBuf) -> Result<(), CliError> {
    let config = OrchestratorConfig::load(config_path)?;

    println!("Configuration OK");
    println!(
        "  queue timeout: {} ms",
        config.general_queue_timeout.as_millis()
    );
    println!("  token connection: {}", config.token_connection);
    println!("  send retries: {}", config.td_send_retries);
    println!("  workers:");
    for app in &config.dataflow_applications {
        println!("    {} (capacity {})", app.decision_connection, app.capacity);
    }
    Ok(())
}
