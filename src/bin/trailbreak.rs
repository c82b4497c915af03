//! Capture laps until interrupted.
//!
//! Usage: `trailbreak [config.yaml]`. The config path may also come from
//! `TRAILBREAK_CONFIG`; without either the defaults are used.

use anyhow::Context;
use futures::StreamExt;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use trailbreak::{Capture, CaptureConfig};

const CONFIG_ENV: &str = "TRAILBREAK_CONFIG";

fn load_config() -> anyhow::Result<CaptureConfig> {
    let path = std::env::args_os()
        .nth(1)
        .or_else(|| std::env::var_os(CONFIG_ENV));

    let config = match path {
        Some(path) => CaptureConfig::load(&path)
            .with_context(|| format!("loading config from {}", path.to_string_lossy()))?,
        None => CaptureConfig::default(),
    };
    Ok(config.with_env_overrides())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config()?;
    info!(
        sim = %config.sim_address,
        shared_memory = config.shared_memory.enabled,
        ingest = config.ingest.url.as_deref().unwrap_or("log only"),
        "Starting capture"
    );

    let handle = match Capture::start(config).await {
        Ok(handle) => handle,
        Err(e) => {
            error!("Capture failed to start: {}", e);
            for suggestion in e.recovery_suggestions() {
                error!("  - {}", suggestion);
            }
            return Err(e).context("starting capture");
        }
    };

    let mut laps = Box::pin(handle.laps());
    tokio::spawn(async move {
        while let Some(lap) = laps.next().await {
            info!(
                lap = lap.lap_number,
                time = %lap.lap_time,
                s1 = lap.sector_times.sector1,
                s2 = lap.sector_times.sector2,
                s3 = lap.sector_times.sector3,
                samples = lap.samples,
                "Lap completed"
            );
        }
    });

    let cancel = handle.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            cancel.cancel();
        }
    });

    let report = handle.join().await.context("capture task panicked")?;
    info!(
        ticks = report.ticks,
        rejected = report.datagrams_rejected,
        receive_errors = report.receive_errors,
        laps = report.laps_completed,
        delivered = report.laps_delivered,
        failed = report.laps_failed,
        abandoned = report.laps_abandoned,
        "Capture finished"
    );
    Ok(())
}
