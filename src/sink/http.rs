//! JSON-over-HTTP delivery to the ingestion endpoint
//!
//! Both procedures take a tRPC-style body: `{"json": <payload>}`.

use serde::Serialize;
use std::time::Duration;
use tracing::{debug, trace};

use super::LapSink;
use crate::types::{LapChunk, LapMetadata};
use crate::{Result, TelemetryError};

/// Procedure registering one lap's metadata.
pub const REGISTER_PATH: &str = "/api/trpc/lap.register";
/// Procedure accepting one chunk of a registered lap.
pub const CHUNK_PATH: &str = "/api/trpc/lap.submitChunk";

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    json: &'a T,
}

/// Posts laps to `{base}/api/trpc/...`.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: reqwest::Client,
    register_url: String,
    chunk_url: String,
}

impl HttpSink {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("trailbreak/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| {
                TelemetryError::ingest_failed_with_source("building HTTP client", Box::new(e))
            })?;

        let base = base_url.trim_end_matches('/');
        Ok(Self {
            client,
            register_url: format!("{}{}", base, REGISTER_PATH),
            chunk_url: format!("{}{}", base, CHUNK_PATH),
        })
    }

    async fn post<T: Serialize + Sync>(&self, url: &str, payload: &T) -> Result<()> {
        trace!(url, "POST");
        let response = self.client.post(url).json(&Envelope { json: payload }).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TelemetryError::ingest_failed(format!(
                "{} returned {}: {}",
                url,
                status,
                body.chars().take(200).collect::<String>()
            )));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl LapSink for HttpSink {
    async fn register_lap(&self, metadata: &LapMetadata) -> Result<()> {
        self.post(&self.register_url, metadata).await?;
        debug!(lap_id = %metadata.lap_id, "Lap registered");
        Ok(())
    }

    async fn submit_chunk(&self, chunk: &LapChunk<'_>) -> Result<()> {
        self.post(&self.chunk_url, chunk).await?;
        debug!(lap_id = %chunk.lap_id, chunk = chunk.chunk_index, "Chunk submitted");
        Ok(())
    }
}
