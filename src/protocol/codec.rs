//! Remote telemetry wire format.
//!
//! # Handshake packet
//!
//! ```c
//! struct handshaker {
//!     int identifier;    // offset 0, always 1
//!     int version;       // offset 4, always 1
//!     int operationId;   // offset 8
//! };
//! ```
//!
//! # Identify response
//!
//! ```c
//! struct handshackerResponse {
//!     wchar_t carName[50];      // offset 0
//!     wchar_t driverName[50];   // offset 100
//!     int identifier;           // offset 200
//!     int version;              // offset 204
//!     wchar_t trackName[50];    // offset 208
//!     wchar_t trackConfig[50];  // offset 308
//! };
//! ```
//!
//! # Car telemetry frame
//!
//! Only the fields consumed by the capture pipeline are decoded. Offsets are
//! fixed by the simulation and must not change.

use crate::bytes::{read_f32_le, read_i32_le, read_u32_le, read_wide_string};
use crate::types::{MIN_TELEMETRY_LEN, RawDatagram, TELEMETRY_IDENTIFIER, display_name};
use crate::{Result, TelemetryError};

/// Protocol identifier sent in every handshake packet.
pub const PROTOCOL_IDENTIFIER: i32 = 1;
/// Protocol version sent in every handshake packet.
pub const PROTOCOL_VERSION: i32 = 1;
/// Size of a handshake packet.
pub const HANDSHAKE_LEN: usize = 12;

/// Default remote telemetry port on loopback.
pub const DEFAULT_TELEMETRY_PORT: u16 = 9996;

const NAME_CHARS: usize = 50;
/// Car + driver names plus identifier and version.
pub const MIN_IDENTIFY_RESPONSE_LEN: usize = 208;
/// Full response including track name and configuration.
pub const FULL_IDENTIFY_RESPONSE_LEN: usize = 408;

// Car telemetry field offsets
const OFFSET_SPEED_KMH: usize = 8;
const OFFSET_ACCG_LATERAL: usize = 32;
const OFFSET_ACCG_LONGITUDINAL: usize = 36;
const OFFSET_LAP_TIME: usize = 40;
const OFFSET_LAST_LAP: usize = 44;
const OFFSET_LAP_COUNT: usize = 52;
const OFFSET_GAS: usize = 56;
const OFFSET_BRAKE: usize = 60;
const OFFSET_ENGINE_RPM: usize = 68;
const OFFSET_STEER: usize = 72;
const OFFSET_GEAR: usize = 76;
const OFFSET_POSITION_X: usize = 316;
const OFFSET_POSITION_Z: usize = 324;

/// Handshake operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Operation {
    /// Identify; the simulation answers with car/driver/track names
    Handshake = 0,
    /// Subscribe to per-physics-step car telemetry frames
    SubscribeUpdate = 1,
    /// End the session
    Dismiss = 3,
}

/// Encode a 12-byte handshake packet for `operation`.
pub fn encode_handshake(operation: Operation) -> [u8; HANDSHAKE_LEN] {
    let mut packet = [0u8; HANDSHAKE_LEN];
    packet[0..4].copy_from_slice(&PROTOCOL_IDENTIFIER.to_le_bytes());
    packet[4..8].copy_from_slice(&PROTOCOL_VERSION.to_le_bytes());
    packet[8..12].copy_from_slice(&(operation as i32).to_le_bytes());
    packet
}

/// Decoded identify response.
///
/// Names are already converted to display form; `None` means the field was
/// blank, undecodable or not present in a short response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandshakeResponse {
    pub car_name: Option<String>,
    pub driver_name: Option<String>,
    pub identifier: i32,
    pub version: i32,
    pub track_name: Option<String>,
    pub track_config: Option<String>,
}

impl HandshakeResponse {
    /// Parse an identify response. Responses shorter than
    /// [`MIN_IDENTIFY_RESPONSE_LEN`] carry no usable fields and are rejected.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < MIN_IDENTIFY_RESPONSE_LEN {
            return Err(TelemetryError::Parse {
                context: "Identify response".to_string(),
                details: format!(
                    "Response too short ({} bytes, expected at least {})",
                    data.len(),
                    MIN_IDENTIFY_RESPONSE_LEN
                ),
            });
        }

        let name_at = |offset: usize| {
            read_wide_string(data, offset, NAME_CHARS).ok().and_then(|raw| display_name(&raw))
        };

        let mut response = Self {
            car_name: name_at(0),
            driver_name: name_at(100),
            identifier: read_i32_le(data, 200)?,
            version: read_i32_le(data, 204)?,
            track_name: None,
            track_config: None,
        };

        if data.len() >= FULL_IDENTIFY_RESPONSE_LEN {
            response.track_name = name_at(208);
            response.track_config = name_at(308);
        }

        Ok(response)
    }
}

/// The UDP fields consumed from one car telemetry frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UdpFrame {
    pub speed_kmh: f32,
    pub g_lateral: f32,
    pub g_longitudinal: f32,
    /// Current lap timer, milliseconds
    pub lap_time_ms: u32,
    /// Vendor-reported duration of the previous lap, milliseconds
    pub last_lap_ms: u32,
    pub lap_count: u32,
    pub throttle: f32,
    pub brake: f32,
    pub rpm: f32,
    pub steering: f32,
    /// Normalized gear: -1 reverse, 0 neutral, 1.. forward
    pub gear: i32,
    pub position_x: f32,
    pub position_z: f32,
}

impl UdpFrame {
    /// Decode a validated car telemetry frame.
    ///
    /// Returns [`TelemetryError::Datagram`] when the identifier byte is wrong or
    /// the frame is shorter than [`MIN_TELEMETRY_LEN`].
    pub fn decode(datagram: &RawDatagram) -> Result<Self> {
        let data = datagram.data.as_ref();

        match data.first() {
            Some(&TELEMETRY_IDENTIFIER) => {}
            Some(&other) => {
                return Err(TelemetryError::datagram_rejected(
                    data.len(),
                    format!("unexpected identifier {:#04x}", other),
                ));
            }
            None => return Err(TelemetryError::datagram_rejected(0, "empty datagram")),
        }

        if data.len() < MIN_TELEMETRY_LEN {
            return Err(TelemetryError::datagram_rejected(
                data.len(),
                format!("shorter than {} bytes", MIN_TELEMETRY_LEN),
            ));
        }

        Ok(Self {
            speed_kmh: read_f32_le(data, OFFSET_SPEED_KMH)?,
            g_lateral: read_f32_le(data, OFFSET_ACCG_LATERAL)?,
            g_longitudinal: read_f32_le(data, OFFSET_ACCG_LONGITUDINAL)?,
            lap_time_ms: read_u32_le(data, OFFSET_LAP_TIME)?,
            last_lap_ms: read_u32_le(data, OFFSET_LAST_LAP)?,
            lap_count: read_u32_le(data, OFFSET_LAP_COUNT)?,
            throttle: read_f32_le(data, OFFSET_GAS)?,
            brake: read_f32_le(data, OFFSET_BRAKE)?,
            rpm: read_f32_le(data, OFFSET_ENGINE_RPM)?,
            steering: read_f32_le(data, OFFSET_STEER)?,
            gear: read_i32_le(data, OFFSET_GEAR)?.saturating_sub(1),
            position_x: read_f32_le(data, OFFSET_POSITION_X)?,
            position_z: read_f32_le(data, OFFSET_POSITION_Z)?,
        })
    }

    /// Encode this frame into a minimum-length telemetry datagram.
    #[cfg(any(test, feature = "benchmark"))]
    pub fn encode(&self) -> Vec<u8> {
        let mut data = vec![0u8; MIN_TELEMETRY_LEN];
        data[0] = TELEMETRY_IDENTIFIER;
        let mut put = |offset: usize, bytes: [u8; 4]| data[offset..offset + 4].copy_from_slice(&bytes);
        put(OFFSET_SPEED_KMH, self.speed_kmh.to_le_bytes());
        put(OFFSET_ACCG_LATERAL, self.g_lateral.to_le_bytes());
        put(OFFSET_ACCG_LONGITUDINAL, self.g_longitudinal.to_le_bytes());
        put(OFFSET_LAP_TIME, self.lap_time_ms.to_le_bytes());
        put(OFFSET_LAST_LAP, self.last_lap_ms.to_le_bytes());
        put(OFFSET_LAP_COUNT, self.lap_count.to_le_bytes());
        put(OFFSET_GAS, self.throttle.to_le_bytes());
        put(OFFSET_BRAKE, self.brake.to_le_bytes());
        put(OFFSET_ENGINE_RPM, self.rpm.to_le_bytes());
        put(OFFSET_STEER, self.steering.to_le_bytes());
        put(OFFSET_GEAR, self.gear.saturating_add(1).to_le_bytes());
        put(OFFSET_POSITION_X, self.position_x.to_le_bytes());
        put(OFFSET_POSITION_Z, self.position_z.to_le_bytes());
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytes::write_wide_string;
    use proptest::prelude::*;

    #[test]
    fn handshake_packets_match_wire_layout() {
        assert_eq!(encode_handshake(Operation::Handshake), [1, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(
            encode_handshake(Operation::SubscribeUpdate),
            [1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0]
        );
        assert_eq!(encode_handshake(Operation::Dismiss), [1, 0, 0, 0, 1, 0, 0, 0, 3, 0, 0, 0]);
    }

    #[test]
    fn decodes_fields_at_vendor_offsets() {
        let mut data = vec![0u8; MIN_TELEMETRY_LEN];
        data[0] = b'a';
        data[8..12].copy_from_slice(&187.5f32.to_le_bytes());
        data[32..36].copy_from_slice(&1.25f32.to_le_bytes());
        data[36..40].copy_from_slice(&(-0.75f32).to_le_bytes());
        data[40..44].copy_from_slice(&61_234u32.to_le_bytes());
        data[44..48].copy_from_slice(&95_234u32.to_le_bytes());
        data[52..56].copy_from_slice(&4u32.to_le_bytes());
        data[56..60].copy_from_slice(&0.9f32.to_le_bytes());
        data[60..64].copy_from_slice(&0.1f32.to_le_bytes());
        data[68..72].copy_from_slice(&7250.0f32.to_le_bytes());
        data[72..76].copy_from_slice(&(-0.2f32).to_le_bytes());
        data[76..80].copy_from_slice(&4i32.to_le_bytes());
        data[316..320].copy_from_slice(&(-512.0f32).to_le_bytes());
        data[324..328].copy_from_slice(&880.5f32.to_le_bytes());

        let frame = UdpFrame::decode(&RawDatagram::new(data)).unwrap();

        assert_eq!(frame.speed_kmh, 187.5);
        assert_eq!(frame.g_lateral, 1.25);
        assert_eq!(frame.g_longitudinal, -0.75);
        assert_eq!(frame.lap_time_ms, 61_234);
        assert_eq!(frame.last_lap_ms, 95_234);
        assert_eq!(frame.lap_count, 4);
        assert_eq!(frame.throttle, 0.9);
        assert_eq!(frame.brake, 0.1);
        assert_eq!(frame.rpm, 7250.0);
        assert_eq!(frame.steering, -0.2);
        assert_eq!(frame.gear, 3, "stored gear value is offset by one");
        assert_eq!(frame.position_x, -512.0);
        assert_eq!(frame.position_z, 880.5);
    }

    #[test]
    fn stored_gear_zero_is_reverse() {
        let frame = UdpFrame { gear: -1, ..Default::default() };
        let decoded = UdpFrame::decode(&RawDatagram::new(frame.encode())).unwrap();
        assert_eq!(decoded.gear, -1);
    }

    #[test]
    fn extreme_stored_gear_does_not_overflow() {
        let mut data = UdpFrame::default().encode();
        data[OFFSET_GEAR..OFFSET_GEAR + 4].copy_from_slice(&i32::MIN.to_le_bytes());
        let frame = UdpFrame::decode(&RawDatagram::new(data)).unwrap();
        assert_eq!(frame.gear, i32::MIN);

        let data = UdpFrame { gear: i32::MAX, ..Default::default() }.encode();
        assert_eq!(read_i32_le(&data, OFFSET_GEAR).unwrap(), i32::MAX);
    }

    #[test]
    fn rejects_wrong_identifier_and_short_frames() {
        let mut data = UdpFrame::default().encode();
        data[0] = b'b';
        assert!(matches!(
            UdpFrame::decode(&RawDatagram::new(data)),
            Err(TelemetryError::Datagram { .. })
        ));

        let mut short = UdpFrame::default().encode();
        short.truncate(MIN_TELEMETRY_LEN - 1);
        assert!(matches!(
            UdpFrame::decode(&RawDatagram::new(short)),
            Err(TelemetryError::Datagram { len, .. }) if len == MIN_TELEMETRY_LEN - 1
        ));

        assert!(UdpFrame::decode(&RawDatagram::new(Vec::new())).is_err());
    }

    #[test]
    fn identify_response_decodes_wide_names() {
        let mut data = vec![0u8; FULL_IDENTIFY_RESPONSE_LEN];
        write_wide_string(&mut data, 0, 50, "ks_mazda_mx5_cup");
        write_wide_string(&mut data, 100, 50, "jane doe");
        data[200..204].copy_from_slice(&4i32.to_le_bytes());
        data[204..208].copy_from_slice(&1i32.to_le_bytes());
        write_wide_string(&mut data, 208, 50, "spa");
        write_wide_string(&mut data, 308, 50, "");

        let response = HandshakeResponse::parse(&data).unwrap();
        assert_eq!(response.car_name.as_deref(), Some("Ks Mazda Mx5 Cup"));
        assert_eq!(response.driver_name.as_deref(), Some("Jane Doe"));
        assert_eq!(response.identifier, 4);
        assert_eq!(response.version, 1);
        assert_eq!(response.track_name.as_deref(), Some("Spa"));
        assert_eq!(response.track_config, None);
    }

    #[test]
    fn short_identify_response_omits_track() {
        let mut data = vec![0u8; MIN_IDENTIFY_RESPONSE_LEN];
        write_wide_string(&mut data, 0, 50, "abarth500");
        let response = HandshakeResponse::parse(&data).unwrap();
        assert_eq!(response.car_name.as_deref(), Some("Abarth500"));
        assert_eq!(response.driver_name, None);
        assert_eq!(response.track_name, None);

        assert!(HandshakeResponse::parse(&data[..100]).is_err());
    }

    proptest! {
        #[test]
        fn datagrams_with_foreign_identifier_never_decode(
            first in any::<u8>().prop_filter("not telemetry", |b| *b != b'a'),
            len in 0usize..1024
        ) {
            let mut data = vec![0u8; len.max(1)];
            data[0] = first;
            prop_assert!(UdpFrame::decode(&RawDatagram::new(data)).is_err());
        }

        #[test]
        fn truncated_telemetry_never_decodes(len in 1usize..MIN_TELEMETRY_LEN) {
            let mut data = vec![0u8; len];
            data[0] = b'a';
            prop_assert!(UdpFrame::decode(&RawDatagram::new(data)).is_err());
        }
    }
}
