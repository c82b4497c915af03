//! Lap delivery sinks
//!
//! A sink receives each completed lap as one metadata record followed by its
//! chunks in index order. Delivery is single-attempt; callers log failures
//! and move on to the next lap.

mod http;
mod log;

pub use http::{CHUNK_PATH, HttpSink, REGISTER_PATH};
pub use log::LogSink;

use std::sync::Arc;
use tracing::info;

use crate::Result;
use crate::config::IngestConfig;
use crate::types::{LapChunk, LapMetadata};

/// Outbound ingestion boundary.
#[async_trait::async_trait]
pub trait LapSink: Send + Sync + 'static {
    /// Register a lap before any of its chunks.
    async fn register_lap(&self, metadata: &LapMetadata) -> Result<()>;

    /// Submit one chunk of a registered lap.
    async fn submit_chunk(&self, chunk: &LapChunk<'_>) -> Result<()>;
}

/// HTTP sink when an ingest URL is configured, log sink otherwise.
pub fn from_config(config: &IngestConfig) -> Result<Arc<dyn LapSink>> {
    match &config.url {
        Some(url) => {
            info!(url, "Delivering laps over HTTP");
            Ok(Arc::new(HttpSink::new(url, std::time::Duration::from_millis(config.timeout_ms))?))
        }
        None => {
            info!("No ingest URL configured, laps will be logged only");
            Ok(Arc::new(LogSink))
        }
    }
}
