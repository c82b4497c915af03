//! Core types for the capture pipeline.
//!
//! ## Architecture
//!
//! Data moves through these types strictly downstream:
//! - [`RawDatagram`] is a received UDP frame, validated before decoding
//! - [`SessionInfo`] holds car/track/driver names and environmental baselines
//! - [`TelemetrySample`] is the fused record produced once per tick
//! - [`CompletedLap`] owns the samples of one closed lap
//! - [`LapChunk`] borrows a bounded slice of a lap for delivery
//! - [`LapMetadata`] is the per-lap record registered alongside the chunks
//!
//! ## Usage Example
//!
//! ```rust
//! use trailbreak::types::{LapTime, TelemetrySample, Wheel};
//!
//! let sample = TelemetrySample { speed: 212.5, ..Default::default() };
//! assert_eq!(sample.tyre_pressure[Wheel::RearLeft.index()], 0.0);
//!
//! assert_eq!(LapTime::from_millis(95_234).to_string(), "1:35.234");
//! ```

mod datagram;
mod lap;
mod sample;
mod session;

pub use datagram::{MIN_TELEMETRY_LEN, RawDatagram, TELEMETRY_IDENTIFIER};
pub use lap::{
    CompletedLap, LapChunk, LapMetadata, LapTime, LapTimeSource, SectorMethod, SectorTimes,
};
pub use sample::{TelemetrySample, UNKNOWN_COMPOUND, Wheel, WheelValues};
pub use session::{
    SessionInfo, SessionSource, UNKNOWN_CAR, UNKNOWN_DRIVER, UNKNOWN_TRACK, display_name,
};
