// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use clap::{Parser, Subcommand};
use schemars::schema_for;
use tracing::{error, info, warn};

use crate::config;
use crate::server::ShutdownOutcome;

type LogInitFn = fn(
    &config::LogConfig,
)
    -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "hapcam.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Starts the camera gateway
    Serve,
    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Checks that the configured transcoder can be launched
    CheckTranscoder,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate a default config file and print it to stdout
    Default,
    /// Generate a JSON schema for the config and print it to stdout
    Schema,
}

/// Initialize telemetry (metrics) if enabled in configuration
/// Returns the meter provider that must be kept alive
#[allow(clippy::collection_is_never_read)] // Meter provider must be kept alive
fn init_telemetry_if_enabled(
    config: &config::Config,
) -> Option<opentelemetry_sdk::metrics::SdkMeterProvider> {
    if !config.telemetry.enable {
        return None;
    }

    match crate::telemetry::init_metrics(&config.telemetry) {
        Ok(provider) => {
            info!("OpenTelemetry metrics enabled");
            Some(provider)
        },
        Err(e) => {
            warn!(error = %e, "Failed to initialize OpenTelemetry metrics");
            None
        },
    }
}

fn log_startup_info(config: &config::Config) {
    info!(
        bridges = config.bridges.len(),
        cameras = config.cameras().count(),
        transcoder = %config.transcoder.program,
        snapshot_dir = %config.snapshots.cache_dir.display(),
        console_level = ?config.log.console_level,
        file_enable = config.log.file_enable,
        "Starting hapcam"
    );
}

// Allow eprintln before logging is initialized
#[allow(clippy::disallowed_macros)]
fn load_config_or_exit(config_path: &str) -> config::ConfigLoadResult {
    match config::load(config_path) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        },
    }
}

/// Handle the "serve" command. Exits with status 1 on startup failure and with
/// the configured restart code when a bridge gets stuck during shutdown.
#[allow(clippy::disallowed_macros)]
async fn handle_serve_command(config_path: &str, init_logging: LogInitFn) {
    let config_result = load_config_or_exit(config_path);

    let log_guard = match init_logging(&config_result.config.log) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            std::process::exit(1);
        },
    };

    let meter_provider = init_telemetry_if_enabled(&config_result.config);

    if let Some(missing_file) = &config_result.file_missing {
        warn!(config_path = %missing_file, "Config file not found, using defaults");
    }

    log_startup_info(&config_result.config);

    let restart_exit_code = config_result.config.shutdown.restart_exit_code;
    let outcome = crate::server::run(config_result.config).await;

    if let Some(provider) = meter_provider {
        if let Err(e) = provider.shutdown() {
            warn!(error = %e, "Failed to flush metrics");
        }
    }

    match outcome {
        Ok(ShutdownOutcome::Clean) => {},
        Ok(ShutdownOutcome::RestartRequired { .. }) => {
            drop(log_guard);
            std::process::exit(restart_exit_code);
        },
        Err(e) => {
            error!(error = %e, "Camera gateway failed");
            drop(log_guard);
            std::process::exit(1);
        },
    }
}

// Allow println for CLI output to stdout (intentional)
#[allow(clippy::disallowed_macros)]
fn handle_config_default_command() {
    match config::generate_default() {
        Ok(toml_string) => {
            println!("# Default hapcam configuration file");
            println!("{toml_string}");
        },
        Err(e) => {
            eprintln!("Failed to generate default config: {e}");
            std::process::exit(1);
        },
    }
}

// Allow println for CLI output to stdout (intentional)
#[allow(clippy::disallowed_macros)]
fn handle_config_schema_command() {
    let schema = schema_for!(config::Config);
    match serde_json::to_string_pretty(&schema) {
        Ok(json) => {
            println!("{json}");
        },
        Err(e) => {
            eprintln!("Failed to generate config schema: {e}");
            std::process::exit(1);
        },
    }
}

#[allow(clippy::disallowed_macros)]
async fn handle_check_transcoder_command(config_path: &str) {
    let config_result = load_config_or_exit(config_path);
    let program = &config_result.config.transcoder.program;
    match hapcam_stream::check_transcoder(program).await {
        Ok(version) => {
            println!("{version}");
        },
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        },
    }
}

/// Handle CLI commands
#[allow(clippy::disallowed_macros)]
pub async fn handle_command(cli: &Cli, init_logging: LogInitFn) {
    match cli.command.as_ref().unwrap_or(&Commands::Serve) {
        Commands::Serve => {
            handle_serve_command(&cli.config, init_logging).await;
        },
        Commands::Config(ConfigCommands::Default) => {
            handle_config_default_command();
        },
        Commands::Config(ConfigCommands::Schema) => {
            handle_config_schema_command();
        },
        Commands::CheckTranscoder => {
            handle_check_transcoder_command(&cli.config).await;
        },
    }
}
