use std::{path::PathBuf, time::Duration};

use anyhow::Context;
use clap::{Parser, Subcommand};
use slot_orchestrator::{
    config::DEFAULT_CONFIG_PATH, session::run_single_service_session, AppConfig, EngineConfig,
    Reconciler, ReservationClient,
};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "slot-orchestrator", about = "Books matching slots across reservation services")]
struct Args {
    /// INI file with a [global] section and one section per service
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// View, reserve and release slots on a single service
    Single {
        #[arg(long, default_value = "hotel")]
        service: String,
    },
    /// Book the earliest slots two services have in common
    Pair {
        #[arg(long, default_value = "hotel")]
        first: String,
        #[arg(long, default_value = "band")]
        second: String,
        /// Pause before rechecking for earlier slots
        #[arg(long, default_value_t = 1000)]
        settle_ms: u64,
        /// Skip the recheck for earlier slots
        #[arg(long)]
        no_improve: bool,
        /// Release a slot again when the partner service refuses it
        #[arg(long)]
        release_partial: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let args = Args::parse();
    let app = AppConfig::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;

    match args.command {
        Command::Single { service } => {
            let client = ReservationClient::new(app.client_config(&service)?)
                .context("Failed to create client")?;
            let report = run_single_service_session(&client).await;
            info!("Session finished: {:?}", report);
        }
        Command::Pair {
            first,
            second,
            settle_ms,
            no_improve,
            release_partial,
        } => {
            let first = ReservationClient::new(app.client_config(&first)?)
                .context("Failed to create first client")?;
            let second = ReservationClient::new(app.client_config(&second)?)
                .context("Failed to create second client")?;

            let engine = Reconciler::new(
                &first,
                &second,
                EngineConfig {
                    settle_delay: Duration::from_millis(settle_ms),
                    release_partial_reservations: release_partial,
                    ..Default::default()
                },
            );
            let outcome = engine.run(!no_improve).await;
            info!("Booking outcome: {:?}", outcome);
        }
    }

    Ok(())
}
