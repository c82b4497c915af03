use tracing::{debug, info};

use super::LapSink;
use crate::Result;
use crate::types::{LapChunk, LapMetadata};

/// Sink that only logs lap and chunk summaries.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait::async_trait]
impl LapSink for LogSink {
    async fn register_lap(&self, metadata: &LapMetadata) -> Result<()> {
        info!(
            lap_id = %metadata.lap_id,
            lap = metadata.lap_number,
            time = %metadata.lap_time,
            car = %metadata.car,
            track = %metadata.track,
            points = metadata.total_data_points,
            chunks = metadata.chunk_count,
            avg_speed = metadata.avg_speed,
            max_speed = metadata.max_speed,
            "Lap recorded"
        );
        Ok(())
    }

    async fn submit_chunk(&self, chunk: &LapChunk<'_>) -> Result<()> {
        debug!(
            lap_id = %chunk.lap_id,
            chunk = chunk.chunk_index,
            points = chunk.len(),
            start = chunk.start_time,
            end = chunk.end_time,
            "Chunk recorded"
        );
        Ok(())
    }
}
