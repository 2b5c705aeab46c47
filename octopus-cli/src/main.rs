//! Octopus script runner

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use octopus_remap::{InstanceArgs, RemapConfig, RemapPlugin};
use octopus_scripting::diagnostics::SCRIPT_LOG_TARGET;
use octopus_scripting::TracingSink;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "octopus-script")]
#[command(about = "Run Octopus remap scripts outside the gateway", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an instance and call its entry point
    Run {
        /// Script file, relative to the config directory
        script: String,

        /// Seed option (key=value), repeatable
        #[arg(short = 'o', long = "option")]
        options: Vec<String>,

        /// Number of entry point calls
        #[arg(short = 'n', long, default_value_t = 1)]
        iterations: u32,

        /// Path to remap configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Log filter, e.g. `info` or `octopus_remap=debug`
        #[arg(short, long, default_value = "info")]
        log_level: String,
    },

    /// Load and compile a script without calling its entry point
    Check {
        /// Script file, relative to the config directory
        script: String,

        /// Path to remap configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Log filter, e.g. `info` or `octopus_remap=debug`
        #[arg(short, long, default_value = "warn")]
        log_level: String,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            script,
            options,
            iterations,
            config,
            log_level,
        } => {
            init_tracing(&log_level)?;

            let options = InstanceArgs::parse_options(&options)?;
            let plugin = Arc::new(init_plugin(config)?);
            let id = plugin
                .create_instance(&script, options)
                .with_context(|| format!("failed to create instance for {}", script))?;

            for _ in 0..iterations {
                let status = Arc::clone(&plugin).do_remap_async(id).await;
                tracing::debug!(instance = %id, %status, "Remap complete");
            }

            let options = plugin
                .instance_options(id)
                .context("instance disappeared while running")?;
            println!("{}", serde_json::to_string_pretty(&options)?);

            plugin.delete_instance(id);
            Ok(())
        }

        Commands::Check {
            script,
            config,
            log_level,
        } => {
            init_tracing(&log_level)?;

            let plugin = init_plugin(config)?;
            match plugin.create_instance(&script, Default::default()) {
                Ok(id) => {
                    println!("✓ {} is valid", script);
                    plugin.delete_instance(id);
                    Ok(())
                }
                Err(e) => {
                    tracing::error!("✗ Script check failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Version => {
            println!("Octopus Script Runner");
            println!("Version: {}", env!("CARGO_PKG_VERSION"));
            println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
            Ok(())
        }
    }
}

fn init_plugin(config: Option<PathBuf>) -> Result<RemapPlugin> {
    let config = match config {
        Some(path) => RemapConfig::load(&path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => RemapConfig::default().with_config_dir(std::env::current_dir()?),
    };

    Ok(RemapPlugin::init(config, Arc::new(TracingSink))?)
}

/// `RUST_LOG` wins; otherwise `level` applies.
fn init_tracing(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => log_filter(level)?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    Ok(())
}

/// Filter for a `--log-level` value; script output is always shown.
fn log_filter(level: &str) -> Result<EnvFilter> {
    let filter = EnvFilter::try_new(level)
        .with_context(|| format!("invalid log level '{}'", level))?
        .add_directive(format!("{}=debug", SCRIPT_LOG_TARGET).parse()?);
    Ok(filter)
}
