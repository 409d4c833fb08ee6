//! # airq
//!
//! Samples the particulate and VOC sensors every few seconds and serves the latest reading as
//! JSON over HTTP.
//!
//! ## Usage
//! ```bash
//! airq --config /etc/airq.toml --verbose
//! ```

mod config;
mod hardware;

use std::path::PathBuf;

use airq_common::sensor::{ParticulateSensorPointer, VocSensorPointer};
use airq_common::{dummy_sensors, http, ReadingStore, Sampler};
use anyhow::Context;
use clap::Parser;
use log::{error, info};
use tokio_util::sync::CancellationToken;

use crate::config::{Config, SensorConfig};

#[derive(Parser)]
#[command(
    name = "airq",
    about = "Serves air quality sensor readings as JSON over HTTP",
    version
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // RUST_LOG still refines the level chosen on the command line.
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn open_sensors(
    config: &SensorConfig,
) -> anyhow::Result<(ParticulateSensorPointer, VocSensorPointer)> {
    if config.dummy {
        info!("using dummy sensors");
        let (particulate, voc) = dummy_sensors()?;
        return Ok((Box::new(particulate), Box::new(voc)));
    }

    hardware::open(&config.bus)
}

/// Cancels `shutdown` on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_on_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(e) => {
                error!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("cannot listen for Ctrl-C: {e}");
                return;
            }
        }
        _ = terminate => {}
    }

    info!("shutting down...");
    shutdown.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config = Config::load(&cli.config)?;

    let store = ReadingStore::new();
    let shutdown = CancellationToken::new();

    let (particulate, voc) = open_sensors(&config.sensors)?;
    let sampler = tokio::spawn(Sampler::new(particulate, voc, store.clone()).run(shutdown.clone()));

    let address = (config.server.listen.as_str(), config.server.port);
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .with_context(|| format!("binding {}:{}", address.0, address.1))?;

    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    let served = http::serve(listener, store, shutdown.clone()).await;

    shutdown.cancel();
    sampler.await.context("sensor task panicked")?;

    served.context("web server failed")
}
