//! Shared-memory snapshot reader
//!
//! The simulation writes the physics and graphics pages continuously while we
//! read them. Every read copies the page into a local buffer first and only
//! decodes the copy; the leading `packetId` is checked before and after the
//! copy so a torn page is retried once and then skipped for the tick.
//!
//! Segments that are missing (simulation not started, non-Windows host) are
//! `None` and stay that way until [`SnapshotSource::reopen_missing`] finds them.

mod layout;

pub use layout::{
    GRAPHICS_LEN, GraphicsSnapshot, PHYSICS_LEN, PhysicsSnapshot, STATIC_LEN, SimStatus,
    StaticSnapshot,
};

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, trace};

use crate::config::SharedMemoryConfig;

/// A readable block of bytes laid out as one vendor page.
pub trait MappedRegion: Send {
    /// Bytes available in the region.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current value of the leading `packetId` field.
    fn packet_id(&self) -> i32;

    /// Copy up to `buf.len()` bytes from the start of the region, returning the
    /// number copied.
    fn copy_into(&self, buf: &mut [u8]) -> usize;
}

/// Source of per-tick shared-memory snapshots.
///
/// Every method returns `None` when the segment is unavailable or this tick's
/// read failed; callers fall back to UDP-only values.
pub trait SnapshotSource: Send + 'static {
    fn read_static(&mut self) -> Option<StaticSnapshot>;
    fn read_physics(&mut self) -> Option<PhysicsSnapshot>;
    fn read_graphics(&mut self) -> Option<GraphicsSnapshot>;

    /// Try to open segments that were unavailable. Returns true if any opened.
    fn reopen_missing(&mut self) -> bool {
        false
    }

    /// Whether at least one per-tick segment is mapped.
    fn is_enhanced(&self) -> bool;
}

/// Reader over the three vendor segments.
pub struct SharedMemoryReader {
    config: Option<SharedMemoryConfig>,
    static_page: Option<Box<dyn MappedRegion>>,
    physics: Option<Box<dyn MappedRegion>>,
    graphics: Option<Box<dyn MappedRegion>>,
    buf: Vec<u8>,
}

impl std::fmt::Debug for SharedMemoryReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedMemoryReader")
            .field("static", &self.static_page.is_some())
            .field("physics", &self.physics.is_some())
            .field("graphics", &self.graphics.is_some())
            .finish()
    }
}

impl SharedMemoryReader {
    /// Open the configured segments. Missing segments are left unavailable.
    pub fn open(config: &SharedMemoryConfig) -> Self {
        let mut reader = Self::disabled();
        if !config.enabled {
            debug!("Shared memory disabled by configuration");
            return reader;
        }
        reader.config = Some(config.clone());
        reader.reopen_missing();
        reader
    }

    /// Reader with every segment unavailable.
    pub fn disabled() -> Self {
        Self {
            config: None,
            static_page: None,
            physics: None,
            graphics: None,
            buf: vec![0u8; STATIC_LEN.max(PHYSICS_LEN).max(GRAPHICS_LEN)],
        }
    }

    /// Reader over caller-supplied regions; never reopens.
    pub fn with_regions(
        static_page: Option<Box<dyn MappedRegion>>,
        physics: Option<Box<dyn MappedRegion>>,
        graphics: Option<Box<dyn MappedRegion>>,
    ) -> Self {
        Self { static_page, physics, graphics, ..Self::disabled() }
    }

    fn read_guarded<T>(
        region: &dyn MappedRegion,
        buf: &mut [u8],
        decode: fn(&[u8]) -> crate::Result<T>,
        what: &'static str,
    ) -> Option<T> {
        for attempt in 0..2 {
            let before = region.packet_id();
            let copied = region.copy_into(buf);
            let after = region.packet_id();

            if before != after {
                trace!(what, attempt, before, after, "Packet id changed during copy");
                continue;
            }

            return match decode(&buf[..copied]) {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    debug!(what, error = %e, "Snapshot decode failed");
                    None
                }
            };
        }
        trace!(what, "Torn page on both attempts, skipping tick");
        None
    }
}

impl SnapshotSource for SharedMemoryReader {
    fn read_static(&mut self) -> Option<StaticSnapshot> {
        let region = self.static_page.as_deref()?;
        let buf = &mut self.buf[..STATIC_LEN];
        let copied = region.copy_into(buf);
        match StaticSnapshot::decode(&buf[..copied]) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                debug!(error = %e, "Static page decode failed");
                None
            }
        }
    }

    fn read_physics(&mut self) -> Option<PhysicsSnapshot> {
        let region = self.physics.as_deref()?;
        Self::read_guarded(region, &mut self.buf[..PHYSICS_LEN], PhysicsSnapshot::decode, "physics")
    }

    fn read_graphics(&mut self) -> Option<GraphicsSnapshot> {
        let region = self.graphics.as_deref()?;
        Self::read_guarded(
            region,
            &mut self.buf[..GRAPHICS_LEN],
            GraphicsSnapshot::decode,
            "graphics",
        )
    }

    fn reopen_missing(&mut self) -> bool {
        let Some(config) = self.config.as_ref() else {
            return false;
        };

        let mut opened = false;
        for (slot, name, min_len) in [
            (&mut self.static_page, &config.static_name, STATIC_LEN),
            (&mut self.physics, &config.physics_name, PHYSICS_LEN),
            (&mut self.graphics, &config.graphics_name, GRAPHICS_LEN),
        ] {
            if slot.is_none() {
                *slot = open_segment(name, min_len);
                opened |= slot.is_some();
            }
        }
        opened
    }

    fn is_enhanced(&self) -> bool {
        self.physics.is_some() || self.graphics.is_some()
    }
}

#[cfg(windows)]
fn open_segment(name: &str, min_len: usize) -> Option<Box<dyn MappedRegion>> {
    match crate::windows::Segment::open(name, min_len) {
        Ok(segment) => Some(Box::new(segment)),
        Err(e @ crate::TelemetryError::Memory { .. }) => {
            tracing::warn!(name, error = %e, "Shared memory segment smaller than expected");
            None
        }
        Err(e) => {
            trace!(name, error = %e, "Shared memory segment unavailable");
            None
        }
    }
}

#[cfg(not(windows))]
fn open_segment(name: &str, _min_len: usize) -> Option<Box<dyn MappedRegion>> {
    trace!(name, "Shared memory is only available on Windows");
    None
}

/// Heap-backed region, shareable with a writer.
///
/// Used to replay captured pages and to drive the reader without a live
/// simulation. With churn enabled every `packet_id` read returns a new value,
/// which models a writer that never finishes a page during a copy.
#[derive(Debug, Clone, Default)]
pub struct MemoryRegion {
    bytes: Arc<Mutex<Vec<u8>>>,
    churn: Arc<AtomicBool>,
    counter: Arc<std::sync::atomic::AtomicI32>,
}

impl MemoryRegion {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes: Arc::new(Mutex::new(bytes)), ..Default::default() }
    }

    /// Replace the page contents.
    pub fn write(&self, bytes: &[u8]) {
        if let Ok(mut guard) = self.bytes.lock() {
            guard.clear();
            guard.extend_from_slice(bytes);
        }
    }

    pub fn set_churn(&self, churn: bool) {
        self.churn.store(churn, Ordering::SeqCst);
    }
}

impl MappedRegion for MemoryRegion {
    fn len(&self) -> usize {
        self.bytes.lock().map(|b| b.len()).unwrap_or(0)
    }

    fn packet_id(&self) -> i32 {
        if self.churn.load(Ordering::SeqCst) {
            return self.counter.fetch_add(1, Ordering::SeqCst);
        }
        self.bytes
            .lock()
            .ok()
            .and_then(|b| b.get(0..4).map(|id| i32::from_le_bytes([id[0], id[1], id[2], id[3]])))
            .unwrap_or(0)
    }

    fn copy_into(&self, buf: &mut [u8]) -> usize {
        match self.bytes.lock() {
            Ok(bytes) => {
                let n = buf.len().min(bytes.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                n
            }
            Err(_) => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytes::write_wide_string;

    fn physics_page(packet_id: i32, speed: f32) -> Vec<u8> {
        let mut page = vec![0u8; PHYSICS_LEN];
        page[0..4].copy_from_slice(&packet_id.to_le_bytes());
        page[28..32].copy_from_slice(&speed.to_le_bytes());
        page
    }

    #[test]
    fn disabled_reader_yields_nothing() {
        let mut reader = SharedMemoryReader::disabled();
        assert!(reader.read_static().is_none());
        assert!(reader.read_physics().is_none());
        assert!(reader.read_graphics().is_none());
        assert!(!reader.reopen_missing());
        assert!(!reader.is_enhanced());
    }

    #[test]
    fn copies_are_detached_from_the_region() {
        let physics = MemoryRegion::new(physics_page(1, 150.0));
        let mut reader =
            SharedMemoryReader::with_regions(None, Some(Box::new(physics.clone())), None);
        assert!(reader.is_enhanced());

        let first = reader.read_physics().unwrap();
        physics.write(&physics_page(2, 180.0));
        let second = reader.read_physics().unwrap();

        assert_eq!(first.speed_kmh, 150.0);
        assert_eq!(first.packet_id, 1);
        assert_eq!(second.speed_kmh, 180.0);
    }

    #[test]
    fn churning_packet_id_yields_no_snapshot() {
        let physics = MemoryRegion::new(physics_page(1, 150.0));
        physics.set_churn(true);
        let mut reader =
            SharedMemoryReader::with_regions(None, Some(Box::new(physics.clone())), None);

        assert!(reader.read_physics().is_none());

        physics.set_churn(false);
        assert!(reader.read_physics().is_some());
    }

    #[test]
    fn short_region_yields_no_snapshot() {
        let graphics = MemoryRegion::new(vec![0u8; 100]);
        let mut reader = SharedMemoryReader::with_regions(None, None, Some(Box::new(graphics)));
        assert!(reader.read_graphics().is_none());
    }

    #[test]
    fn static_page_decodes_names() {
        let mut page = vec![0u8; STATIC_LEN];
        write_wide_string(&mut page, 68, 33, "ks_audi_r8_lms");
        write_wide_string(&mut page, 134, 33, "imola");
        let mut reader =
            SharedMemoryReader::with_regions(Some(Box::new(MemoryRegion::new(page))), None, None);

        let info = reader.read_static().unwrap();
        assert_eq!(info.car_model, "Ks Audi R8 Lms");
        assert_eq!(info.track, "Imola");
        assert!(!reader.is_enhanced());
    }

    #[cfg(not(windows))]
    #[test]
    fn non_windows_hosts_have_no_segments() {
        let mut reader = SharedMemoryReader::open(&SharedMemoryConfig::default());
        assert!(!reader.is_enhanced());
        assert!(!reader.reopen_missing());
        assert!(reader.read_static().is_none());
    }
}
