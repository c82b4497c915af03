//! Lap boundary detection

use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use super::SectorStrategy;
use crate::config::LapConfig;
use crate::types::{CompletedLap, LapTime, LapTimeSource, SessionInfo, TelemetrySample};

/// Per-tick counters from the UDP frame that are not part of the sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LapTiming {
    /// Completed laps reported by the simulation
    pub lap_count: u32,
    /// Vendor duration of the previous lap, milliseconds
    pub last_lap_ms: u32,
}

/// Segmenter state after the most recent tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SegmenterState {
    #[default]
    Accumulating,
    /// A lap closed on the most recent tick
    JustCompleted { lap_number: u32 },
}

/// Splits the sample stream into laps on lap-counter increments.
///
/// Every tick appends its sample first. The lap then closes when all of these
/// hold:
/// - the counter is strictly greater than the highest value seen so far
/// - a previous value exists (the first tick since start only arms the counter)
/// - the buffer, including this tick's sample, holds more than `min_samples`
///
/// The sample on which the counter increments is the last sample of the closed
/// lap, and the buffer is empty afterwards. An increment on a buffer that is
/// too short discards the buffer.
#[derive(Debug)]
pub struct LapSegmenter {
    config: LapConfig,
    buffer: Vec<TelemetrySample>,
    last_observed: Option<u32>,
    ticks: u64,
    state: SegmenterState,
}

impl LapSegmenter {
    pub fn new(config: LapConfig) -> Self {
        Self {
            config,
            buffer: Vec::with_capacity(config.min_samples * 4),
            last_observed: None,
            ticks: 0,
            state: SegmenterState::Accumulating,
        }
    }

    pub fn state(&self) -> SegmenterState {
        self.state
    }

    /// Samples buffered for the lap in progress.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Ticks since the current lap started.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Highest lap counter value seen.
    pub fn last_observed(&self) -> Option<u32> {
        self.last_observed
    }

    /// Number of the lap in progress, 1-based.
    pub fn current_lap(&self) -> u32 {
        self.last_observed.map_or(1, |count| count.saturating_add(1))
    }

    pub fn sector_strategy(&self) -> SectorStrategy {
        self.config.sector_strategy
    }

    /// Feed one tick. Returns the lap closed by this tick, if any.
    pub fn observe(
        &mut self,
        sample: TelemetrySample,
        timing: LapTiming,
        session: &SessionInfo,
    ) -> Option<CompletedLap> {
        self.state = SegmenterState::Accumulating;

        let increment = self.last_observed.is_some_and(|last| timing.lap_count > last);
        self.last_observed =
            Some(self.last_observed.map_or(timing.lap_count, |last| last.max(timing.lap_count)));

        self.buffer.push(sample);
        self.ticks += 1;

        if !increment {
            return None;
        }

        if self.buffer.len() > self.config.min_samples {
            return Some(self.close(timing, session));
        }

        warn!(
            lap_count = timing.lap_count,
            samples = self.buffer.len(),
            min_samples = self.config.min_samples,
            "Lap counter advanced on a short buffer, discarding"
        );
        self.buffer.clear();
        self.ticks = 0;
        None
    }

    fn close(&mut self, timing: LapTiming, session: &SessionInfo) -> CompletedLap {
        let samples = std::mem::take(&mut self.buffer);
        self.buffer.reserve(samples.len());
        self.ticks = 0;

        let (lap_time, time_source) = if timing.last_lap_ms >= self.config.min_plausible_lap_ms {
            (LapTime::from_millis(u64::from(timing.last_lap_ms)), LapTimeSource::Vendor)
        } else {
            let span = lap_span(&samples);
            warn!(
                vendor_ms = timing.last_lap_ms,
                floor_ms = self.config.min_plausible_lap_ms,
                span_secs = span,
                "Implausible vendor lap time, using sample span"
            );
            (LapTime::from_secs_f64(span), LapTimeSource::SampleSpan)
        };

        let (sector_times, sector_method) = self.config.sector_strategy.split(&samples, lap_time);
        trace!(?sector_times, ?sector_method, "Sectors split");

        let lap = CompletedLap {
            id: Uuid::new_v4(),
            lap_number: timing.lap_count,
            lap_time,
            time_source,
            car: session.car.clone(),
            track: session.track.clone(),
            driver: session.driver.clone(),
            conditions: session.conditions.clone(),
            sector_times,
            sector_method,
            samples,
        };

        info!(
            lap = lap.lap_number,
            time = %lap.lap_time,
            samples = lap.samples.len(),
            source = ?lap.time_source,
            "Lap completed"
        );
        debug!(lap_id = %lap.id, car = %lap.car, track = %lap.track, "Lap labelled");

        self.state = SegmenterState::JustCompleted { lap_number: lap.lap_number };
        lap
    }
}

/// Seconds between the first sample and the latest lap-timer value in the lap.
///
/// The boundary sample's timer has already restarted, so the span runs to the
/// largest timestamp rather than the last one.
fn lap_span(samples: &[TelemetrySample]) -> f64 {
    let Some(first) = samples.first() else {
        return 0.0;
    };
    let latest = samples.iter().map(|s| s.time).fold(first.time, f32::max);
    f64::from(latest - first.time)
}
