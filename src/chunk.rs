//! Lap chunking and dispatch
//!
//! Chunks are contiguous borrowed slices of the lap's samples: disjoint,
//! ordered, and together exactly the lap. Nothing is copied until a sink
//! serializes them.

use tracing::{debug, error, info};

use crate::Result;
use crate::sink::LapSink;
use crate::types::{CompletedLap, LapChunk, LapMetadata};

/// Default upper bound on samples per chunk.
pub const DEFAULT_MAX_SAMPLES: usize = 500;

#[derive(Debug, Clone, Copy)]
pub struct ChunkEncoder {
    max_samples: usize,
}

impl Default for ChunkEncoder {
    fn default() -> Self {
        Self { max_samples: DEFAULT_MAX_SAMPLES }
    }
}

impl ChunkEncoder {
    /// `max_samples` of zero is treated as one.
    pub fn new(max_samples: usize) -> Self {
        Self { max_samples: max_samples.max(1) }
    }

    pub fn max_samples(&self) -> usize {
        self.max_samples
    }

    pub fn chunk_count(&self, samples: usize) -> usize {
        samples.div_ceil(self.max_samples)
    }

    pub fn chunks<'a>(&self, lap: &'a CompletedLap) -> Vec<LapChunk<'a>> {
        lap.samples
            .chunks(self.max_samples)
            .enumerate()
            .map(|(chunk_index, points)| LapChunk {
                lap_id: lap.id,
                chunk_index,
                start_time: points.first().map_or(0.0, |p| p.time),
                end_time: points.last().map_or(0.0, |p| p.time),
                points,
            })
            .collect()
    }

    pub fn metadata(&self, lap: &CompletedLap) -> LapMetadata {
        LapMetadata {
            lap_id: lap.id,
            lap_number: lap.lap_number,
            lap_time: lap.formatted_lap_time(),
            car: lap.car.clone(),
            track: lap.track.clone(),
            driver: lap.driver.clone(),
            conditions: lap.conditions.clone(),
            sector_times: lap.sector_times,
            total_data_points: lap.samples.len(),
            chunk_count: self.chunk_count(lap.samples.len()),
            avg_speed: lap.average_speed(),
            max_speed: lap.max_speed(),
        }
    }

    /// Register the lap, then submit its chunks in order. Stops at the first
    /// failure; nothing is retried.
    pub async fn deliver(&self, lap: &CompletedLap, sink: &dyn LapSink) -> Result<usize> {
        let metadata = self.metadata(lap);
        sink.register_lap(&metadata).await?;

        let chunks = self.chunks(lap);
        for chunk in &chunks {
            sink.submit_chunk(chunk).await?;
            debug!(lap_id = %lap.id, chunk = chunk.chunk_index, total = chunks.len(), "Chunk delivered");
        }
        Ok(chunks.len())
    }

    /// [`deliver`](Self::deliver), logging the outcome. Returns whether every
    /// part arrived.
    pub async fn dispatch(&self, lap: CompletedLap, sink: &dyn LapSink) -> bool {
        match self.deliver(&lap, sink).await {
            Ok(chunks) => {
                info!(lap = lap.lap_number, time = %lap.lap_time, chunks, "Lap delivered");
                true
            }
            Err(e) => {
                error!(
                    lap = lap.lap_number,
                    lap_id = %lap.id,
                    error = %e,
                    suggestions = ?e.recovery_suggestions(),
                    "Lap delivery failed, lap dropped"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TelemetryError;
    use crate::types::{LapTime, LapTimeSource, SectorMethod, SectorTimes, TelemetrySample};
    use proptest::prelude::*;
    use std::sync::Mutex;
    use uuid::Uuid;

    fn lap(samples: usize) -> CompletedLap {
        CompletedLap {
            id: Uuid::new_v4(),
            lap_number: 1,
            lap_time: LapTime::from_millis(95_234),
            time_source: LapTimeSource::Vendor,
            car: "Car".into(),
            track: "Track".into(),
            driver: "Driver".into(),
            conditions: "Dry".into(),
            sector_times: SectorTimes::default(),
            sector_method: SectorMethod::Estimated,
            samples: (0..samples)
                .map(|i| TelemetrySample { time: i as f32 * 0.1, speed: i as f32, ..Default::default() })
                .collect(),
        }
    }

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        fail_chunk: Option<usize>,
    }

    #[async_trait::async_trait]
    impl LapSink for Recorder {
        async fn register_lap(&self, metadata: &LapMetadata) -> Result<()> {
            self.calls.lock().unwrap().push(format!("register:{}", metadata.chunk_count));
            Ok(())
        }

        async fn submit_chunk(&self, chunk: &LapChunk<'_>) -> Result<()> {
            if self.fail_chunk == Some(chunk.chunk_index) {
                return Err(TelemetryError::ingest_failed("503"));
            }
            self.calls.lock().unwrap().push(format!("chunk:{}:{}", chunk.chunk_index, chunk.len()));
            Ok(())
        }
    }

    #[test]
    fn splits_on_max_samples() {
        let lap = lap(1200);
        let chunks = ChunkEncoder::default().chunks(&lap);

        assert_eq!(chunks.iter().map(|c| c.len()).collect::<Vec<_>>(), vec![500, 500, 200]);
        assert_eq!(chunks[1].chunk_index, 1);
        assert_eq!(chunks[1].start_time, lap.samples[500].time);
        assert_eq!(chunks[1].end_time, lap.samples[999].time);
        assert!(chunks.iter().all(|c| c.lap_id == lap.id));
    }

    #[test]
    fn metadata_summarizes_the_lap() {
        let lap = lap(1001);
        let metadata = ChunkEncoder::default().metadata(&lap);

        assert_eq!(metadata.lap_time, "1:35.234");
        assert_eq!(metadata.total_data_points, 1001);
        assert_eq!(metadata.chunk_count, 3);
        assert_eq!(metadata.max_speed, 1000.0);
        assert_eq!(metadata.avg_speed, 500.0);

        let json = serde_json::to_value(&metadata).unwrap();
        for key in ["lapId", "lapTime", "car", "track", "driver", "conditions", "sectorTimes", "totalDataPoints", "chunkCount", "avgSpeed", "maxSpeed"] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
    }

    #[tokio::test]
    async fn registers_before_submitting_chunks_in_order() {
        let sink = Recorder::default();
        assert!(ChunkEncoder::default().dispatch(lap(1200), &sink).await);

        let calls = sink.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["register:3", "chunk:0:500", "chunk:1:500", "chunk:2:200"]);
    }

    #[tokio::test]
    async fn failed_chunk_stops_delivery() {
        let _ = tracing_subscriber::fmt::try_init();
        let sink = Recorder { fail_chunk: Some(1), ..Default::default() };
        assert!(!ChunkEncoder::default().dispatch(lap(1200), &sink).await);

        let calls = sink.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["register:3", "chunk:0:500"]);
    }

    proptest! {
        #[test]
        fn chunks_partition_the_lap(samples in 0usize..3000, max in 1usize..800) {
            let lap = lap(samples);
            let encoder = ChunkEncoder::new(max);
            let chunks = encoder.chunks(&lap);

            prop_assert_eq!(chunks.len(), samples.div_ceil(max));
            prop_assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= max));
            prop_assert!(chunks.iter().enumerate().all(|(i, c)| c.chunk_index == i));

            let rejoined: Vec<TelemetrySample> = chunks.iter().flat_map(|c| c.points.iter().cloned()).collect();
            prop_assert_eq!(rejoined, lap.samples.clone());
        }
    }
}
