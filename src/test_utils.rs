//! Test utilities: datagram and page builders, a scripted datagram source and
//! a recording sink.
//!
//! Available to unit tests and, through the `benchmark` feature, to benches.

#![cfg(any(test, feature = "benchmark"))]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

use crate::bytes::write_wide_string;
use crate::protocol::{HandshakeResponse, UdpFrame};
use crate::provider::DatagramProvider;
use crate::shm::{GRAPHICS_LEN, PHYSICS_LEN, STATIC_LEN};
use crate::sink::LapSink;
use crate::types::{LapChunk, LapMetadata, RawDatagram, TelemetrySample};
use crate::{Result, TelemetryError};

/// Milliseconds between scripted ticks (60 Hz, rounded down).
pub const TICK_MS: u32 = 16;

/// Encode a minimal telemetry datagram.
pub fn telemetry_datagram(lap_count: u32, last_lap_ms: u32, lap_time_ms: u32, speed_kmh: f32) -> Vec<u8> {
    UdpFrame {
        speed_kmh,
        lap_count,
        last_lap_ms,
        lap_time_ms,
        throttle: 1.0,
        gear: 3,
        rpm: 6500.0,
        ..Default::default()
    }
    .encode()
}

/// Datagrams for consecutive laps. Each `(lap_count, samples)` entry produces
/// `samples` frames whose lap timer restarts at zero; every frame reports
/// `last_lap_ms` as the previous lap time.
pub fn lap_script(laps: &[(u32, usize)], last_lap_ms: u32) -> Vec<Vec<u8>> {
    laps.iter()
        .flat_map(|&(lap_count, samples)| {
            (0..samples).map(move |i| {
                let speed = 80.0 + (i % 100) as f32;
                telemetry_datagram(lap_count, last_lap_ms, i as u32 * TICK_MS, speed)
            })
        })
        .collect()
}

/// Physics page with packet id, speed (km/h) and vendor gear.
pub fn physics_page(packet_id: i32, speed_kmh: f32, gear: i32) -> Vec<u8> {
    let mut page = vec![0u8; PHYSICS_LEN];
    page[0..4].copy_from_slice(&packet_id.to_le_bytes());
    page[16..20].copy_from_slice(&gear.to_le_bytes());
    page[28..32].copy_from_slice(&speed_kmh.to_le_bytes());
    page
}

/// Graphics page with packet id, sector index and tyre compound.
pub fn graphics_page(packet_id: i32, sector: i32, compound: &str) -> Vec<u8> {
    let mut page = vec![0u8; GRAPHICS_LEN];
    page[0..4].copy_from_slice(&packet_id.to_le_bytes());
    page[164..168].copy_from_slice(&sector.to_le_bytes());
    write_wide_string(&mut page, 176, 33, compound);
    page[280..284].copy_from_slice(&1.0f32.to_le_bytes());
    page
}

/// Static page with raw vendor car and track identifiers.
pub fn static_page(car: &str, track: &str, player: &str) -> Vec<u8> {
    let mut page = vec![0u8; STATIC_LEN];
    write_wide_string(&mut page, 68, 33, car);
    write_wide_string(&mut page, 134, 33, track);
    write_wide_string(&mut page, 200, 33, player);
    page[400..404].copy_from_slice(&3i32.to_le_bytes());
    page
}

/// Datagram source replaying a fixed script.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    script: VecDeque<Vec<u8>>,
    failures: usize,
    pend_when_done: bool,
    handshake: Option<HandshakeResponse>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Vec<u8>>) -> Self {
        Self { script: script.into(), ..Default::default() }
    }

    /// Source that never yields.
    pub fn pending() -> Self {
        Self::new(Vec::new()).then_pending()
    }

    /// Idle instead of ending once the script is exhausted.
    pub fn then_pending(mut self) -> Self {
        self.pend_when_done = true;
        self
    }

    /// Fail the first `count` receives.
    pub fn fail_first(mut self, count: usize) -> Self {
        self.failures = count;
        self
    }

    pub fn with_handshake(mut self, response: HandshakeResponse) -> Self {
        self.handshake = Some(response);
        self
    }
}

#[async_trait::async_trait]
impl DatagramProvider for ScriptedProvider {
    async fn next_datagram(&mut self) -> Result<Option<RawDatagram>> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(TelemetryError::io_error(
                "scripted receive",
                std::io::Error::new(std::io::ErrorKind::ConnectionReset, "scripted failure"),
            ));
        }

        match self.script.pop_front() {
            Some(bytes) => Ok(Some(RawDatagram::new(bytes))),
            None if self.pend_when_done => std::future::pending::<Result<Option<RawDatagram>>>().await,
            None => Ok(None),
        }
    }

    fn handshake(&self) -> Option<&HandshakeResponse> {
        self.handshake.as_ref()
    }
}

/// Owned copy of a submitted chunk.
#[derive(Debug, Clone)]
pub struct RecordedChunk {
    pub lap_id: Uuid,
    pub chunk_index: usize,
    pub start_time: f32,
    pub end_time: f32,
    pub points: Vec<TelemetrySample>,
}

impl RecordedChunk {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Sink recording every call, optionally slow.
#[derive(Debug, Default)]
pub struct RecordingSink {
    laps: Mutex<Vec<LapMetadata>>,
    chunks: Mutex<Vec<RecordedChunk>>,
    delay: Option<Duration>,
}

impl RecordingSink {
    /// Sleep for `delay` before recording each registration.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Registered laps in arrival order.
    pub fn laps(&self) -> Vec<LapMetadata> {
        self.laps.lock().map(|laps| laps.clone()).unwrap_or_default()
    }

    /// Chunks of one lap in arrival order.
    pub fn chunks_for(&self, lap_id: Uuid) -> Vec<RecordedChunk> {
        self.chunks
            .lock()
            .map(|chunks| chunks.iter().filter(|c| c.lap_id == lap_id).cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl LapSink for RecordingSink {
    async fn register_lap(&self, metadata: &LapMetadata) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Ok(mut laps) = self.laps.lock() {
            laps.push(metadata.clone());
        }
        Ok(())
    }

    async fn submit_chunk(&self, chunk: &LapChunk<'_>) -> Result<()> {
        if let Ok(mut chunks) = self.chunks.lock() {
            chunks.push(RecordedChunk {
                lap_id: chunk.lap_id,
                chunk_index: chunk.chunk_index,
                start_time: chunk.start_time,
                end_time: chunk.end_time,
                points: chunk.points.to_vec(),
            });
        }
        Ok(())
    }
}
