//! Command-line interface for iot-telemetry-simulator
//!
//! # Usage Examples
//!
//! ```bash
//! # Print 5 messages from each of 3 devices
//! iot-telemetry-simulator --transport console --device-count 3 --message-count 5
//!
//! # Check a configuration without sending anything
//! iot-telemetry-simulator check --config-file simulator.json --transport console
//!
//! # Send to Kafka, configured from the environment
//! KafkaConnectionProperties='{"bootstrap.servers":"localhost:9092"}' \
//! KafkaTopic=telemetry DeviceCount=100 MessageCount=0 \
//!   iot-telemetry-simulator
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use iot_telemetry_simulator::{run, worker::log_banner, RunOpts, RunnerConfig};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "iot-telemetry-simulator")]
#[command(about = "Simulates IoT devices sending telemetry")]
#[command(version, long_about = None, args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunOpts,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the simulation (default)
    Run(RunOpts),

    /// Load and validate the configuration, then exit
    Check(RunOpts),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run_cli().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run_cli() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Check(opts)) => {
            let config = RunnerConfig::load(&opts).context("Failed to load configuration")?;
            config
                .ensure_is_valid()
                .context("Invalid configuration")?;
            log_banner(&config, &config.device_ids());
            info!("Configuration is valid");
            Ok(())
        }
        Some(Commands::Run(opts)) => run_simulation(opts).await,
        None => run_simulation(cli.run).await,
    }
}

async fn run_simulation(opts: RunOpts) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, stopping devices");
            trigger.cancel();
        }
    });

    run(opts, cancel).await?;
    Ok(())
}
