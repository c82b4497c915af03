//! Lap, chunk and lap-metadata types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use super::TelemetrySample;

/// Lap duration with millisecond resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LapTime(Duration);

impl LapTime {
    pub fn from_millis(millis: u64) -> Self {
        Self(Duration::from_millis(millis))
    }

    /// Build from fractional seconds, rounded to the nearest millisecond.
    /// Negative or non-finite input yields zero.
    pub fn from_secs_f64(secs: f64) -> Self {
        if !secs.is_finite() || secs <= 0.0 {
            return Self(Duration::ZERO);
        }
        Self::from_millis((secs * 1000.0).round() as u64)
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn as_millis(&self) -> u64 {
        self.0.as_millis() as u64
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.as_millis() as f64 / 1000.0
    }
}

impl fmt::Display for LapTime {
    /// `m:ss.mmm`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let millis = self.as_millis();
        let minutes = millis / 60_000;
        let seconds = (millis % 60_000) / 1000;
        let fraction = millis % 1000;
        write!(f, "{}:{:02}.{:03}", minutes, seconds, fraction)
    }
}

/// Which input the lap duration was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LapTimeSource {
    /// Vendor-reported last-lap time
    Vendor,
    /// Span of the buffered sample timestamps (vendor value implausible)
    SampleSpan,
}

/// How sector times were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectorMethod {
    /// Fixed fractions of the lap time
    Estimated,
    /// Measured from current-sector transitions
    Measured,
}

/// Three-way split of a lap, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SectorTimes {
    pub sector1: f64,
    pub sector2: f64,
    pub sector3: f64,
}

impl SectorTimes {
    pub fn total(&self) -> f64 {
        self.sector1 + self.sector2 + self.sector3
    }
}

/// A lap confirmed by the segmenter. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedLap {
    /// Client-generated identifier shared by the lap's metadata and chunks
    pub id: Uuid,
    /// 1-based number of the lap that was closed
    pub lap_number: u32,
    pub lap_time: LapTime,
    pub time_source: LapTimeSource,
    pub car: String,
    pub track: String,
    pub driver: String,
    pub conditions: String,
    pub sector_times: SectorTimes,
    pub sector_method: SectorMethod,
    pub samples: Vec<TelemetrySample>,
}

impl CompletedLap {
    /// Lap time formatted as `m:ss.mmm`.
    pub fn formatted_lap_time(&self) -> String {
        self.lap_time.to_string()
    }

    pub fn average_speed(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().map(|s| s.speed).sum::<f32>() / self.samples.len() as f32
    }

    pub fn max_speed(&self) -> f32 {
        self.samples.iter().map(|s| s.speed).fold(0.0, f32::max)
    }
}

/// Contiguous slice of a lap's samples, sized for transport.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LapChunk<'a> {
    pub lap_id: Uuid,
    pub chunk_index: usize,
    /// Time of the first sample in the chunk
    pub start_time: f32,
    /// Time of the last sample in the chunk
    pub end_time: f32,
    pub points: &'a [TelemetrySample],
}

impl LapChunk<'_> {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Per-lap record registered with the ingestion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LapMetadata {
    pub lap_id: Uuid,
    pub lap_number: u32,
    pub lap_time: String,
    pub car: String,
    pub track: String,
    pub driver: String,
    pub conditions: String,
    pub sector_times: SectorTimes,
    pub total_data_points: usize,
    pub chunk_count: usize,
    pub avg_speed: f32,
    pub max_speed: f32,
}
