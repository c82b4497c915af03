//! Raw datagram packets for the capture pipeline

use std::sync::Arc;
use std::time::Instant;

/// Leading byte of a car-telemetry frame (`RTCarInfo`).
pub const TELEMETRY_IDENTIFIER: u8 = b'a';

/// Minimum length of a telemetry frame; the last consumed field ends here.
pub const MIN_TELEMETRY_LEN: usize = 328;

/// Immutable datagram as received from the simulation socket.
#[derive(Debug, Clone)]
pub struct RawDatagram {
    /// Payload bytes (zero-copy via Arc)
    pub data: Arc<[u8]>,

    /// Receipt time
    pub received_at: Instant,
}

impl RawDatagram {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data: data.into(), received_at: Instant::now() }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// True when the frame carries car telemetry and is long enough to decode.
    pub fn is_telemetry(&self) -> bool {
        self.data.first() == Some(&TELEMETRY_IDENTIFIER) && self.data.len() >= MIN_TELEMETRY_LEN
    }
}

impl From<&[u8]> for RawDatagram {
    fn from(data: &[u8]) -> Self {
        Self::new(data.to_vec())
    }
}
