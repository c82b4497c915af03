//! Capture driver spawns and manages the capture loop
//!
//! One task owns every pipeline stage: it receives a datagram, reads the
//! shared-memory pages, fuses, segments, and hands completed laps to
//! short-lived delivery tasks so a slow ingest endpoint never stalls receipt.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use futures::{Stream, StreamExt};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::chunk::ChunkEncoder;
use crate::config::CaptureConfig;
use crate::fusion::{SampleFuser, session_from_handshake, session_from_static};
use crate::lap::{LapSegmenter, LapTiming};
use crate::protocol::{UdpClient, UdpFrame};
use crate::provider::DatagramProvider;
use crate::shm::{SharedMemoryReader, SnapshotSource};
use crate::sink::{self, LapSink};
use crate::types::{
    CompletedLap, LapTime, LapTimeSource, RawDatagram, SectorTimes, SessionInfo, TelemetrySample,
};
use crate::Result;

/// Latest driving state, published once per tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStatus {
    /// Lap in progress, 1-based
    pub lap_number: u32,
    /// Current lap timer
    #[serde(serialize_with = "serialize_lap_time")]
    pub lap_time: LapTime,
    pub speed: f32,
    pub throttle: f32,
    pub brake: f32,
    pub gear: i32,
    pub rpm: f32,
    /// Whether shared-memory values were fused this tick
    pub enhanced: bool,
    pub tick: u64,
}

fn serialize_lap_time<S: serde::Serializer>(time: &LapTime, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.collect_str(time)
}

/// Summary of a lap handed to delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct LapSummary {
    pub id: Uuid,
    pub lap_number: u32,
    pub lap_time: LapTime,
    pub time_source: LapTimeSource,
    pub sector_times: SectorTimes,
    pub samples: usize,
    pub average_speed: f32,
    pub max_speed: f32,
}

impl From<&CompletedLap> for LapSummary {
    fn from(lap: &CompletedLap) -> Self {
        Self {
            id: lap.id,
            lap_number: lap.lap_number,
            lap_time: lap.lap_time,
            time_source: lap.time_source,
            sector_times: lap.sector_times,
            samples: lap.samples.len(),
            average_speed: lap.average_speed(),
            max_speed: lap.max_speed(),
        }
    }
}

/// Counters reported when the capture loop ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureReport {
    /// Valid telemetry frames processed
    pub ticks: u64,
    pub datagrams_rejected: u64,
    pub receive_errors: u64,
    pub laps_completed: u64,
    pub laps_delivered: u64,
    pub laps_failed: u64,
    /// Deliveries still running when the shutdown grace period ran out
    pub laps_abandoned: u64,
}

/// Handle to a running capture.
///
/// Dropping the handle cancels the capture loop.
#[derive(Debug)]
pub struct CaptureHandle {
    status: watch::Receiver<Option<Arc<LiveStatus>>>,
    laps: watch::Receiver<Option<Arc<LapSummary>>>,
    session: watch::Receiver<Arc<SessionInfo>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<CaptureReport>>,
}

impl CaptureHandle {
    /// Receiver for the latest live status.
    pub fn status(&self) -> watch::Receiver<Option<Arc<LiveStatus>>> {
        self.status.clone()
    }

    /// Receiver for the current session labels.
    pub fn session(&self) -> watch::Receiver<Arc<SessionInfo>> {
        self.session.clone()
    }

    /// Stream of summaries, one per completed lap from now on.
    pub fn laps(&self) -> impl Stream<Item = Arc<LapSummary>> + Send + 'static {
        WatchStream::from_changes(self.laps.clone()).filter_map(|lap| async move { lap })
    }

    /// Cancellation token for graceful shutdown.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel and wait for the loop to drain.
    pub async fn shutdown(mut self) -> Option<CaptureReport> {
        self.cancel.cancel();
        self.join_inner().await
    }

    /// Wait for the loop to end on its own (source ended or token cancelled).
    pub async fn join(mut self) -> Option<CaptureReport> {
        self.join_inner().await
    }

    async fn join_inner(&mut self) -> Option<CaptureReport> {
        let task = self.task.take()?;
        match task.await {
            Ok(report) => Some(report),
            Err(e) => {
                error!("Capture task failed: {}", e);
                None
            }
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.cancel.cancel();
        }
    }
}

/// Capture entry points
pub struct Capture;

impl Capture {
    /// Open shared memory, handshake with the simulation and start capturing.
    ///
    /// A failed handshake is returned to the caller; every later failure is
    /// absorbed by the loop.
    pub async fn start(config: CaptureConfig) -> Result<CaptureHandle> {
        config.validate()?;
        let snapshots = SharedMemoryReader::open(&config.shared_memory);
        let client = UdpClient::connect(&config).await?;
        let sink = sink::from_config(&config.ingest)?;
        Ok(Self::spawn_with(client, snapshots, sink, config))
    }

    /// Run the capture loop over injected collaborators.
    pub fn spawn_with<P, S>(
        provider: P,
        mut snapshots: S,
        sink: Arc<dyn LapSink>,
        config: CaptureConfig,
    ) -> CaptureHandle
    where
        P: DatagramProvider,
        S: SnapshotSource,
    {
        let session = initial_session(&provider, &mut snapshots, &config.conditions);
        info!(
            car = %session.car,
            track = %session.track,
            driver = %session.driver,
            source = ?session.source,
            enhanced = snapshots.is_enhanced(),
            "Capture session"
        );

        let (status_tx, status_rx) = watch::channel(None);
        let (laps_tx, laps_rx) = watch::channel(None);
        let (session_tx, session_rx) = watch::channel(Arc::new(session.clone()));
        let cancel = CancellationToken::new();

        let capture = CaptureLoop {
            provider,
            snapshots,
            sink,
            fuser: SampleFuser::new(session),
            segmenter: LapSegmenter::new(config.lap),
            encoder: ChunkEncoder::new(config.chunk.max_samples),
            dispatches: JoinSet::new(),
            status_tx,
            laps_tx,
            session_tx,
            report: CaptureReport::default(),
            config,
        };

        let cancel_loop = cancel.clone();
        let task = tokio::spawn(capture.run(cancel_loop));

        CaptureHandle {
            status: status_rx,
            laps: laps_rx,
            session: session_rx,
            cancel,
            task: Some(task),
        }
    }
}

/// Static read first; identify-response names when it is unavailable.
fn initial_session<P, S>(provider: &P, snapshots: &mut S, conditions: &str) -> SessionInfo
where
    P: DatagramProvider,
    S: SnapshotSource,
{
    if let Some(snapshot) = snapshots.read_static().filter(|s| s.has_names) {
        return session_from_static(&snapshot, conditions);
    }
    if let Some(response) = provider.handshake() {
        debug!("Static page unavailable, using identify response names");
        return session_from_handshake(response, conditions);
    }
    SessionInfo { conditions: conditions.to_string(), ..SessionInfo::default() }
}

struct CaptureLoop<P, S> {
    provider: P,
    snapshots: S,
    sink: Arc<dyn LapSink>,
    config: CaptureConfig,
    fuser: SampleFuser,
    segmenter: LapSegmenter,
    encoder: ChunkEncoder,
    dispatches: JoinSet<bool>,
    status_tx: watch::Sender<Option<Arc<LiveStatus>>>,
    laps_tx: watch::Sender<Option<Arc<LapSummary>>>,
    session_tx: watch::Sender<Arc<SessionInfo>>,
    report: CaptureReport,
}

impl<P, S> CaptureLoop<P, S>
where
    P: DatagramProvider,
    S: SnapshotSource,
{
    async fn run(mut self, cancel: CancellationToken) -> CaptureReport {
        info!("Capture loop started");

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Capture cancelled");
                    break;
                }
                Some(done) = self.dispatches.join_next(), if !self.dispatches.is_empty() => {
                    self.record_dispatch(done);
                    continue;
                }
                result = self.provider.next_datagram() => result,
            };

            match result {
                Ok(Some(datagram)) => self.tick(datagram),
                Ok(None) => {
                    info!(ticks = self.report.ticks, "Datagram source ended");
                    break;
                }
                Err(e) => {
                    self.report.receive_errors += 1;
                    warn!(error = %e, "Receive failed, backing off");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.config.receive_backoff()) => {}
                    }
                }
            }
        }

        self.drain().await
    }

    fn tick(&mut self, datagram: RawDatagram) {
        let frame = match UdpFrame::decode(&datagram) {
            Ok(frame) => frame,
            Err(e) => {
                self.report.datagrams_rejected += 1;
                trace!(error = %e, "Datagram dropped");
                return;
            }
        };

        self.report.ticks += 1;
        let tick = self.report.ticks;
        self.maintain_shared_memory(tick);

        let physics = self.snapshots.read_physics();
        let graphics = self.snapshots.read_graphics();
        let enhanced = physics.is_some() || graphics.is_some();
        let sample = self.fuser.fuse(&frame, physics.as_ref(), graphics.as_ref());

        let mut status = live_status(&sample, enhanced, tick);

        let timing = LapTiming { lap_count: frame.lap_count, last_lap_ms: frame.last_lap_ms };
        if let Some(lap) = self.segmenter.observe(sample, timing, self.fuser.session()) {
            self.spawn_dispatch(lap);
        }
        status.lap_number = self.segmenter.current_lap();

        if tick % self.config.status_interval_ticks.max(1) == 0 {
            info!(
                lap = status.lap_number,
                time = %status.lap_time,
                speed = format_args!("{:.1}", status.speed),
                throttle = format_args!("{:.0}%", status.throttle * 100.0),
                brake = format_args!("{:.0}%", status.brake * 100.0),
                gear = status.gear,
                rpm = format_args!("{:.0}", status.rpm),
                enhanced,
                "Live"
            );
        }

        let _ = self.status_tx.send(Some(Arc::new(status)));
    }

    fn maintain_shared_memory(&mut self, tick: u64) {
        let sm = &self.config.shared_memory;
        if !sm.enabled {
            return;
        }

        if tick % sm.reopen_interval_ticks.max(1) == 0 && self.snapshots.reopen_missing() {
            info!("Shared memory segments became available");
        }

        if !self.fuser.session().is_authoritative() && tick % sm.static_retry_ticks.max(1) == 0 {
            let Some(snapshot) = self.snapshots.read_static().filter(|s| s.has_names) else {
                return;
            };
            let session = session_from_static(&snapshot, &self.config.conditions);
            info!(car = %session.car, track = %session.track, driver = %session.driver, "Session read from shared memory");
            if self.fuser.update_session(session.clone()) {
                let _ = self.session_tx.send(Arc::new(session));
            }
        }
    }

    fn spawn_dispatch(&mut self, lap: CompletedLap) {
        self.report.laps_completed += 1;
        let _ = self.laps_tx.send(Some(Arc::new(LapSummary::from(&lap))));

        let sink = Arc::clone(&self.sink);
        let encoder = self.encoder;
        self.dispatches.spawn(async move { encoder.dispatch(lap, sink.as_ref()).await });
        debug!(pending = self.dispatches.len(), "Lap dispatch spawned");
    }

    fn record_dispatch(&mut self, result: std::result::Result<bool, JoinError>) {
        match result {
            Ok(true) => self.report.laps_delivered += 1,
            Ok(false) => self.report.laps_failed += 1,
            Err(e) => {
                self.report.laps_failed += 1;
                error!("Lap dispatch task failed: {}", e);
            }
        }
    }

    async fn drain(mut self) -> CaptureReport {
        if !self.dispatches.is_empty() {
            let grace = self.config.shutdown_grace();
            info!(pending = self.dispatches.len(), ?grace, "Waiting for lap deliveries");

            let deadline = tokio::time::Instant::now() + grace;
            while !self.dispatches.is_empty() {
                match tokio::time::timeout_at(deadline, self.dispatches.join_next()).await {
                    Ok(Some(done)) => self.record_dispatch(done),
                    Ok(None) => break,
                    Err(_) => {
                        self.report.laps_abandoned = self.dispatches.len() as u64;
                        warn!(abandoned = self.dispatches.len(), "Lap deliveries still pending, aborting");
                        self.dispatches.abort_all();
                        break;
                    }
                }
            }
        }

        info!(
            ticks = self.report.ticks,
            laps = self.report.laps_completed,
            delivered = self.report.laps_delivered,
            "Capture loop ended"
        );
        self.report
    }
}

fn live_status(sample: &TelemetrySample, enhanced: bool, tick: u64) -> LiveStatus {
    LiveStatus {
        lap_number: 1,
        lap_time: LapTime::from_secs_f64(f64::from(sample.time)),
        speed: sample.speed,
        throttle: sample.throttle,
        brake: sample.brake,
        gear: sample.gear,
        rpm: sample.rpm,
        enhanced,
        tick,
    }
}
