//! Lap capture for Assetto Corsa telemetry.
//!
//! Trailbreak subscribes to the simulation's UDP telemetry feed, enriches each
//! frame with the shared-memory pages when they are available, cuts the
//! stream into laps and delivers every completed lap in bounded chunks to an
//! ingestion endpoint.
//!
//! # Pipeline
//!
//! - [`protocol`]: handshake and frame codec for the UDP feed
//! - [`shm`]: torn-read-safe snapshots of the physics, graphics and static pages
//! - [`fusion`]: one [`TelemetrySample`] per tick from both sources
//! - [`lap`]: lap boundary detection and sector splits
//! - [`chunk`] and [`sink`]: chunked delivery of completed laps
//! - [`driver`]: the capture loop tying the stages together
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use trailbreak::{Capture, CaptureConfig};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> trailbreak::Result<()> {
//!     let config = CaptureConfig::default().with_env_overrides();
//!     let handle = Capture::start(config).await?;
//!
//!     let mut laps = Box::pin(handle.laps());
//!     while let Some(lap) = laps.next().await {
//!         println!("Lap {} in {}", lap.lap_number, lap.lap_time);
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod bytes;
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Configuration
pub mod config;

// Data sources
pub mod protocol;
pub mod provider;
pub mod shm;

// Lap pipeline
pub mod chunk;
pub mod driver;
pub mod fusion;
pub mod lap;
pub mod sink;

// Platform-specific modules
#[cfg(windows)]
pub mod windows;

// Core exports
pub use error::*;
pub use types::*;

// Main API exports
pub use config::CaptureConfig;
pub use driver::{Capture, CaptureHandle, CaptureReport, LapSummary, LiveStatus};
pub use provider::DatagramProvider;
pub use shm::{SharedMemoryReader, SnapshotSource};
pub use sink::LapSink;
