//! Capture configuration
//!
//! Every section carries `#[serde(default)]`, so a YAML file only needs the keys
//! it changes:
//!
//! ```yaml
//! sim_address: 127.0.0.1:9996
//! lap:
//!   sector_strategy: sector_index
//! ingest:
//!   url: http://localhost:3000
//! ```

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::lap::SectorStrategy;
use crate::protocol::DEFAULT_TELEMETRY_PORT;
use crate::{Result, TelemetryError};

/// Environment variable overriding [`IngestConfig::url`].
pub const INGEST_URL_ENV: &str = "TRAILBREAK_INGEST_URL";

/// Top-level capture settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Simulation remote telemetry endpoint
    pub sim_address: SocketAddr,
    /// Local socket address
    pub bind_address: SocketAddr,
    pub handshake_timeout_ms: u64,
    /// Pause after a failed receive before trying again
    pub receive_backoff_ms: u64,
    /// Ticks between status log lines
    pub status_interval_ticks: u64,
    /// How long shutdown waits for in-flight lap deliveries
    pub shutdown_grace_ms: u64,
    /// Conditions label attached to every lap
    pub conditions: String,
    pub shared_memory: SharedMemoryConfig,
    pub lap: LapConfig,
    pub chunk: ChunkConfig,
    pub ingest: IngestConfig,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sim_address: SocketAddr::V4(SocketAddrV4::new(
                Ipv4Addr::LOCALHOST,
                DEFAULT_TELEMETRY_PORT,
            )),
            bind_address: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)),
            handshake_timeout_ms: 5_000,
            receive_backoff_ms: 1_000,
            status_interval_ticks: 60,
            shutdown_grace_ms: 5_000,
            conditions: "Dry".to_string(),
            shared_memory: SharedMemoryConfig::default(),
            lap: LapConfig::default(),
            chunk: ChunkConfig::default(),
            ingest: IngestConfig::default(),
        }
    }
}

/// Named segment settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedMemoryConfig {
    pub enabled: bool,
    pub static_name: String,
    pub physics_name: String,
    pub graphics_name: String,
    /// Ticks between attempts to open segments that were missing
    pub reopen_interval_ticks: u64,
    /// Ticks between static re-reads until one succeeds
    pub static_retry_ticks: u64,
}

impl Default for SharedMemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            static_name: "Local\\acpmf_static".to_string(),
            physics_name: "Local\\acpmf_physics".to_string(),
            graphics_name: "Local\\acpmf_graphics".to_string(),
            reopen_interval_ticks: 300,
            static_retry_ticks: 60,
        }
    }
}

/// Lap segmentation settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LapConfig {
    /// A lap must hold strictly more samples than this to be emitted
    pub min_samples: usize,
    /// Vendor lap times below this are replaced by the sample span
    pub min_plausible_lap_ms: u32,
    pub sector_strategy: SectorStrategy,
}

impl Default for LapConfig {
    fn default() -> Self {
        Self {
            min_samples: 300,
            min_plausible_lap_ms: 10_000,
            sector_strategy: SectorStrategy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    pub max_samples: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self { max_samples: 500 }
    }
}

/// Ingestion endpoint settings. With no URL, laps go to the log sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Base URL, e.g. `http://localhost:3000`
    pub url: Option<String>,
    pub timeout_ms: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { url: None, timeout_ms: 10_000 }
    }
}

impl CaptureConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            TelemetryError::io_error(format!("reading config {}", path.display()), e)
        })?;
        debug!(path = %path.display(), "Loaded capture config");
        Self::from_yaml_str(&yaml)
    }

    /// Apply environment overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(INGEST_URL_ENV) {
            let url = url.trim();
            if !url.is_empty() {
                debug!(url, "Ingest URL overridden from environment");
                self.ingest.url = Some(url.to_string());
            }
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk.max_samples == 0 {
            return Err(TelemetryError::Config {
                details: "chunk.max_samples must be at least 1".to_string(),
            });
        }
        if self.handshake_timeout_ms == 0 {
            return Err(TelemetryError::Config {
                details: "handshake_timeout_ms must be positive".to_string(),
            });
        }
        if self.shared_memory.reopen_interval_ticks == 0
            || self.shared_memory.static_retry_ticks == 0
        {
            return Err(TelemetryError::Config {
                details: "shared_memory tick intervals must be positive".to_string(),
            });
        }
        if let Some(url) = &self.ingest.url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(TelemetryError::Config {
                    details: format!("ingest.url must be an http(s) URL, got {:?}", url),
                });
            }
        }
        Ok(())
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn receive_backoff(&self) -> Duration {
        Duration::from_millis(self.receive_backoff_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = CaptureConfig::default();
        assert_eq!(config.sim_address.to_string(), "127.0.0.1:9996");
        assert_eq!(config.bind_address.port(), 0);
        assert_eq!(config.handshake_timeout(), Duration::from_secs(5));
        assert_eq!(config.receive_backoff(), Duration::from_secs(1));
        assert_eq!(config.lap.min_samples, 300);
        assert_eq!(config.lap.min_plausible_lap_ms, 10_000);
        assert_eq!(config.lap.sector_strategy, SectorStrategy::FixedFraction);
        assert_eq!(config.chunk.max_samples, 500);
        assert_eq!(config.ingest.timeout_ms, 10_000);
        assert_eq!(config.shared_memory.physics_name, "Local\\acpmf_physics");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_yaml_fills_remaining_defaults() {
        let yaml = r#"
sim_address: 192.168.1.20:9996
conditions: Wet
lap:
  sector_strategy: sector_index
ingest:
  url: http://localhost:3000
"#;
        let config = CaptureConfig::from_yaml_str(yaml).unwrap();

        assert_eq!(config.sim_address.to_string(), "192.168.1.20:9996");
        assert_eq!(config.conditions, "Wet");
        assert_eq!(config.lap.sector_strategy, SectorStrategy::SectorIndex);
        assert_eq!(config.lap.min_samples, 300);
        assert_eq!(config.ingest.url.as_deref(), Some("http://localhost:3000"));
        assert_eq!(config.ingest.timeout_ms, 10_000);
        assert_eq!(config.chunk, ChunkConfig::default());
        assert_eq!(config.shared_memory, SharedMemoryConfig::default());
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(CaptureConfig::from_yaml_str("{}").unwrap(), CaptureConfig::default());
    }

    #[test]
    fn invalid_values_are_config_errors() {
        let zero_chunk = "chunk:\n  max_samples: 0\n";
        assert!(matches!(
            CaptureConfig::from_yaml_str(zero_chunk),
            Err(TelemetryError::Config { .. })
        ));

        let bad_url = "ingest:\n  url: localhost:3000\n";
        assert!(matches!(CaptureConfig::from_yaml_str(bad_url), Err(TelemetryError::Config { .. })));

        let bad_yaml = "lap: [unterminated";
        assert!(matches!(CaptureConfig::from_yaml_str(bad_yaml), Err(TelemetryError::Config { .. })));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = CaptureConfig::load("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, TelemetryError::Io { .. }));
    }
}
