//! Shared-memory structure decoders
//!
//! The simulation publishes three `#pragma pack(4)` structures. Strings are
//! `wchar_t[N]` (UTF-16LE) and `bool` fields are 4-byte `BOOL`s. Each decoder
//! reads a local byte copy at fixed offsets; a field that cannot be decoded
//! resolves to its documented default instead of failing the whole snapshot.

use crate::bytes::{read_f32_array, read_f32_le, read_i32_le, read_wide_string};
use crate::types::{UNKNOWN_CAR, UNKNOWN_COMPOUND, UNKNOWN_DRIVER, UNKNOWN_TRACK, WheelValues, display_name};
use crate::{Result, TelemetryError};

/// `SPageFilePhysics` size in bytes.
pub const PHYSICS_LEN: usize = 288;
/// `SPageFileGraphic` size in bytes.
pub const GRAPHICS_LEN: usize = 284;
/// `SPageFileStatic` size in bytes.
pub const STATIC_LEN: usize = 496;

/// The leading `packetId` of a physics or graphics page.
pub(crate) fn packet_id(data: &[u8]) -> Result<i32> {
    read_i32_le(data, 0)
}

fn require_len(data: &[u8], expected: usize, what: &str) -> Result<()> {
    if data.len() < expected {
        return Err(TelemetryError::Parse {
            context: format!("{} page", what),
            details: format!("Page too short ({} bytes, expected {})", data.len(), expected),
        });
    }
    Ok(())
}

fn finite_or(value: f32, default: f32) -> f32 {
    if value.is_finite() { value } else { default }
}

fn f32_at(data: &[u8], offset: usize, default: f32) -> f32 {
    read_f32_le(data, offset).map(|v| finite_or(v, default)).unwrap_or(default)
}

fn i32_at(data: &[u8], offset: usize) -> i32 {
    read_i32_le(data, offset).unwrap_or_default()
}

fn array_at<const N: usize>(data: &[u8], offset: usize) -> [f32; N] {
    let mut values = read_f32_array::<N>(data, offset).unwrap_or([0.0; N]);
    for v in values.iter_mut() {
        *v = finite_or(*v, 0.0);
    }
    values
}

/// Raw text of a wide-string field, empty when undecodable.
fn text_at(data: &[u8], offset: usize, chars: usize) -> String {
    read_wide_string(data, offset, chars).unwrap_or_default().trim().to_string()
}

/// Decoded `SPageFilePhysics`; updated every physics step.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PhysicsSnapshot {
    pub packet_id: i32,
    pub gas: f32,
    pub brake: f32,
    pub fuel: f32,
    /// Raw vendor gear: 0 reverse, 1 neutral, 2.. forward
    pub gear: i32,
    pub rpms: i32,
    pub steer_angle: f32,
    pub speed_kmh: f32,
    pub velocity: [f32; 3],
    /// Lateral, vertical, longitudinal
    pub acc_g: [f32; 3],
    pub wheel_slip: WheelValues,
    pub wheel_load: WheelValues,
    pub wheels_pressure: WheelValues,
    pub wheel_angular_speed: WheelValues,
    pub tyre_wear: WheelValues,
    pub tyre_dirty_level: WheelValues,
    pub tyre_core_temperature: WheelValues,
    pub camber_rad: WheelValues,
    pub suspension_travel: WheelValues,
    pub drs: f32,
    pub tc: f32,
    pub heading: f32,
    pub pitch: f32,
    pub roll: f32,
    pub cg_height: f32,
    pub car_damage: [f32; 5],
    pub number_of_tyres_out: i32,
    pub pit_limiter_on: bool,
    pub abs: f32,
    pub kers_charge: f32,
    pub kers_input: f32,
    pub auto_shifter_on: bool,
    pub ride_height: [f32; 2],
    pub turbo_boost: f32,
    pub ballast: f32,
    pub air_density: f32,
}

impl PhysicsSnapshot {
    pub fn decode(data: &[u8]) -> Result<Self> {
        require_len(data, PHYSICS_LEN, "Physics")?;
        Ok(Self {
            packet_id: packet_id(data)?,
            gas: f32_at(data, 4, 0.0),
            brake: f32_at(data, 8, 0.0),
            fuel: f32_at(data, 12, 0.0),
            gear: i32_at(data, 16),
            rpms: i32_at(data, 20),
            steer_angle: f32_at(data, 24, 0.0),
            speed_kmh: f32_at(data, 28, 0.0),
            velocity: array_at(data, 32),
            acc_g: array_at(data, 44),
            wheel_slip: array_at(data, 56),
            wheel_load: array_at(data, 72),
            wheels_pressure: array_at(data, 88),
            wheel_angular_speed: array_at(data, 104),
            tyre_wear: array_at(data, 120),
            tyre_dirty_level: array_at(data, 136),
            tyre_core_temperature: array_at(data, 152),
            camber_rad: array_at(data, 168),
            suspension_travel: array_at(data, 184),
            drs: f32_at(data, 200, 0.0),
            tc: f32_at(data, 204, 0.0),
            heading: f32_at(data, 208, 0.0),
            pitch: f32_at(data, 212, 0.0),
            roll: f32_at(data, 216, 0.0),
            cg_height: f32_at(data, 220, 0.0),
            car_damage: array_at(data, 224),
            number_of_tyres_out: i32_at(data, 244),
            pit_limiter_on: i32_at(data, 248) != 0,
            abs: f32_at(data, 252, 0.0),
            kers_charge: f32_at(data, 256, 0.0),
            kers_input: f32_at(data, 260, 0.0),
            auto_shifter_on: i32_at(data, 264) != 0,
            ride_height: array_at(data, 268),
            turbo_boost: f32_at(data, 276, 0.0),
            ballast: f32_at(data, 280, 0.0),
            air_density: f32_at(data, 284, 0.0),
        })
    }
}

/// Session status from the graphics page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimStatus {
    #[default]
    Off,
    Replay,
    Live,
    Pause,
    Other(i32),
}

impl From<i32> for SimStatus {
    fn from(value: i32) -> Self {
        match value {
            0 => SimStatus::Off,
            1 => SimStatus::Replay,
            2 => SimStatus::Live,
            3 => SimStatus::Pause,
            other => SimStatus::Other(other),
        }
    }
}

/// Decoded `SPageFileGraphic`; updated every rendered frame.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsSnapshot {
    pub packet_id: i32,
    pub status: SimStatus,
    pub session: i32,
    pub current_time: String,
    pub last_time: String,
    pub best_time: String,
    pub split: String,
    pub completed_laps: i32,
    pub position: i32,
    pub i_current_time: i32,
    pub i_last_time: i32,
    pub i_best_time: i32,
    pub session_time_left: f32,
    pub distance_traveled: f32,
    pub is_in_pit: i32,
    pub current_sector_index: i32,
    pub last_sector_time: i32,
    pub number_of_laps: i32,
    pub tyre_compound: String,
    pub replay_time_multiplier: f32,
    pub normalized_car_position: f32,
    pub car_coordinates: [f32; 3],
    pub penalty_time: f32,
    pub flag: i32,
    pub ideal_line_on: bool,
    pub is_in_pit_lane: bool,
    pub surface_grip: f32,
}

impl Default for GraphicsSnapshot {
    fn default() -> Self {
        Self {
            packet_id: 0,
            status: SimStatus::Off,
            session: 0,
            current_time: String::new(),
            last_time: String::new(),
            best_time: String::new(),
            split: String::new(),
            completed_laps: 0,
            position: 0,
            i_current_time: 0,
            i_last_time: 0,
            i_best_time: 0,
            session_time_left: 0.0,
            distance_traveled: 0.0,
            is_in_pit: 0,
            current_sector_index: 0,
            last_sector_time: 0,
            number_of_laps: 0,
            tyre_compound: UNKNOWN_COMPOUND.to_string(),
            replay_time_multiplier: 1.0,
            normalized_car_position: 0.0,
            car_coordinates: [0.0; 3],
            penalty_time: 0.0,
            flag: 0,
            ideal_line_on: false,
            is_in_pit_lane: false,
            surface_grip: 1.0,
        }
    }
}

impl GraphicsSnapshot {
    pub fn decode(data: &[u8]) -> Result<Self> {
        require_len(data, GRAPHICS_LEN, "Graphics")?;
        let compound = text_at(data, 176, 33);
        Ok(Self {
            packet_id: packet_id(data)?,
            status: SimStatus::from(i32_at(data, 4)),
            session: i32_at(data, 8),
            current_time: text_at(data, 12, 15),
            last_time: text_at(data, 42, 15),
            best_time: text_at(data, 72, 15),
            split: text_at(data, 102, 15),
            completed_laps: i32_at(data, 132),
            position: i32_at(data, 136),
            i_current_time: i32_at(data, 140),
            i_last_time: i32_at(data, 144),
            i_best_time: i32_at(data, 148),
            session_time_left: f32_at(data, 152, 0.0),
            distance_traveled: f32_at(data, 156, 0.0),
            is_in_pit: i32_at(data, 160),
            current_sector_index: i32_at(data, 164),
            last_sector_time: i32_at(data, 168),
            number_of_laps: i32_at(data, 172),
            tyre_compound: if compound.is_empty() { UNKNOWN_COMPOUND.to_string() } else { compound },
            replay_time_multiplier: f32_at(data, 244, 1.0),
            normalized_car_position: f32_at(data, 248, 0.0),
            car_coordinates: array_at(data, 252),
            penalty_time: f32_at(data, 264, 0.0),
            flag: i32_at(data, 268),
            ideal_line_on: i32_at(data, 272) != 0,
            is_in_pit_lane: i32_at(data, 276) != 0,
            surface_grip: f32_at(data, 280, 1.0),
        })
    }
}

/// Decoded `SPageFileStatic`; written once per session.
///
/// Names are in display form, or the matching "unknown" sentinel when blank.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticSnapshot {
    pub sm_version: String,
    pub ac_version: String,
    pub number_of_sessions: i32,
    pub num_cars: i32,
    pub car_model: String,
    pub track: String,
    pub player_name: String,
    pub player_surname: String,
    pub player_nick: String,
    pub sector_count: i32,
    pub max_torque: f32,
    pub max_power: f32,
    pub max_rpm: i32,
    pub max_fuel: f32,
    pub suspension_max_travel: WheelValues,
    pub tyre_radius: WheelValues,
    pub max_turbo_boost: f32,
    pub air_temp: f32,
    pub road_temp: f32,
    pub penalties_enabled: bool,
    pub aid_fuel_rate: f32,
    pub aid_tire_rate: f32,
    pub aid_mechanical_damage: f32,
    pub aid_allow_tyre_blankets: bool,
    pub aid_stability: f32,
    pub aid_auto_clutch: bool,
    pub aid_auto_blip: bool,
    /// Whether car or track decoded to a real name
    pub has_names: bool,
}

impl StaticSnapshot {
    pub fn decode(data: &[u8]) -> Result<Self> {
        require_len(data, STATIC_LEN, "Static")?;

        let car = display_name(&text_at(data, 68, 33));
        let track = display_name(&text_at(data, 134, 33));
        let has_names = car.is_some() || track.is_some();

        let player_name = display_name(&text_at(data, 200, 33))
            .unwrap_or_else(|| UNKNOWN_DRIVER.to_string());

        let sector_count = i32_at(data, 400);

        Ok(Self {
            sm_version: text_at(data, 0, 15),
            ac_version: text_at(data, 30, 15),
            number_of_sessions: i32_at(data, 60),
            num_cars: i32_at(data, 64),
            car_model: car.unwrap_or_else(|| UNKNOWN_CAR.to_string()),
            track: track.unwrap_or_else(|| UNKNOWN_TRACK.to_string()),
            player_name,
            player_surname: text_at(data, 266, 33),
            player_nick: text_at(data, 332, 33),
            sector_count: if sector_count > 0 { sector_count } else { 3 },
            max_torque: f32_at(data, 404, 0.0),
            max_power: f32_at(data, 408, 0.0),
            max_rpm: i32_at(data, 412),
            max_fuel: f32_at(data, 416, 100.0),
            suspension_max_travel: array_at(data, 420),
            tyre_radius: array_at(data, 436),
            max_turbo_boost: f32_at(data, 452, 0.0),
            air_temp: f32_at(data, 456, 20.0),
            road_temp: f32_at(data, 460, 25.0),
            penalties_enabled: i32_at(data, 464) != 0,
            aid_fuel_rate: f32_at(data, 468, 0.0),
            aid_tire_rate: f32_at(data, 472, 0.0),
            aid_mechanical_damage: f32_at(data, 476, 0.0),
            aid_allow_tyre_blankets: i32_at(data, 480) != 0,
            aid_stability: f32_at(data, 484, 0.0),
            aid_auto_clutch: i32_at(data, 488) != 0,
            aid_auto_blip: i32_at(data, 492) != 0,
            has_names,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytes::write_wide_string;

    fn put_f32(buf: &mut [u8], offset: usize, value: f32) {
        buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn put_i32(buf: &mut [u8], offset: usize, value: i32) {
        buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    #[test]
    fn physics_fields_at_vendor_offsets() {
        let mut page = vec![0u8; PHYSICS_LEN];
        put_i32(&mut page, 0, 77);
        put_f32(&mut page, 4, 0.8);
        put_f32(&mut page, 12, 42.5);
        put_i32(&mut page, 16, 4);
        put_i32(&mut page, 20, 6800);
        put_f32(&mut page, 28, 201.0);
        put_f32(&mut page, 44, 1.1);
        put_f32(&mut page, 48, 0.05);
        put_f32(&mut page, 52, -0.9);
        for (i, psi) in [27.1f32, 27.2, 26.9, 27.0].iter().enumerate() {
            put_f32(&mut page, 88 + i * 4, *psi);
        }
        put_f32(&mut page, 152 + 12, 88.0);
        put_f32(&mut page, 204, 0.3);
        put_f32(&mut page, 224 + 16, 0.25);
        put_i32(&mut page, 244, 2);
        put_f32(&mut page, 252, 0.05);
        put_f32(&mut page, 268, 0.06);
        put_f32(&mut page, 272, 0.07);
        put_f32(&mut page, 276, 1.4);
        put_f32(&mut page, 284, 1.2);

        let physics = PhysicsSnapshot::decode(&page).unwrap();
        assert_eq!(physics.packet_id, 77);
        assert_eq!(physics.gas, 0.8);
        assert_eq!(physics.fuel, 42.5);
        assert_eq!(physics.gear, 4);
        assert_eq!(physics.rpms, 6800);
        assert_eq!(physics.speed_kmh, 201.0);
        assert_eq!(physics.acc_g, [1.1, 0.05, -0.9]);
        assert_eq!(physics.wheels_pressure, [27.1, 27.2, 26.9, 27.0]);
        assert_eq!(physics.tyre_core_temperature[3], 88.0);
        assert_eq!(physics.tc, 0.3);
        assert_eq!(physics.car_damage[4], 0.25);
        assert_eq!(physics.number_of_tyres_out, 2);
        assert_eq!(physics.abs, 0.05);
        assert_eq!(physics.ride_height, [0.06, 0.07]);
        assert_eq!(physics.turbo_boost, 1.4);
        assert_eq!(physics.air_density, 1.2);
    }

    #[test]
    fn non_finite_values_resolve_to_defaults() {
        let mut page = vec![0u8; GRAPHICS_LEN];
        put_f32(&mut page, 280, f32::NAN);
        put_f32(&mut page, 248, f32::INFINITY);
        let graphics = GraphicsSnapshot::decode(&page).unwrap();
        assert_eq!(graphics.surface_grip, 1.0);
        assert_eq!(graphics.normalized_car_position, 0.0);
        assert_eq!(graphics.tyre_compound, UNKNOWN_COMPOUND);
    }

    #[test]
    fn graphics_fields_at_vendor_offsets() {
        let mut page = vec![0u8; GRAPHICS_LEN];
        put_i32(&mut page, 4, 2);
        write_wide_string(&mut page, 12, 15, "1:02:345");
        put_i32(&mut page, 132, 5);
        put_i32(&mut page, 160, 1);
        put_i32(&mut page, 164, 2);
        write_wide_string(&mut page, 176, 33, "Semislicks");
        put_f32(&mut page, 248, 0.42);
        put_f32(&mut page, 264, 5.0);
        put_i32(&mut page, 268, 3);
        put_i32(&mut page, 276, 1);
        put_f32(&mut page, 280, 0.97);

        let graphics = GraphicsSnapshot::decode(&page).unwrap();
        assert_eq!(graphics.status, SimStatus::Live);
        assert_eq!(graphics.current_time, "1:02:345");
        assert_eq!(graphics.completed_laps, 5);
        assert_eq!(graphics.is_in_pit, 1);
        assert_eq!(graphics.current_sector_index, 2);
        assert_eq!(graphics.tyre_compound, "Semislicks");
        assert_eq!(graphics.normalized_car_position, 0.42);
        assert_eq!(graphics.penalty_time, 5.0);
        assert_eq!(graphics.flag, 3);
        assert!(graphics.is_in_pit_lane);
        assert_eq!(graphics.surface_grip, 0.97);
    }

    #[test]
    fn static_names_are_display_form() {
        let mut page = vec![0u8; STATIC_LEN];
        write_wide_string(&mut page, 0, 15, "1.7");
        write_wide_string(&mut page, 68, 33, "ks_porsche_911_gt3_r_2016");
        write_wide_string(&mut page, 134, 33, "ks_nordschleife");
        write_wide_string(&mut page, 200, 33, "jane");
        write_wide_string(&mut page, 266, 33, "Doe");
        put_i32(&mut page, 400, 3);
        put_f32(&mut page, 416, 120.0);
        put_f32(&mut page, 456, 18.5);
        put_f32(&mut page, 460, 31.0);
        put_i32(&mut page, 492, 1);

        let info = StaticSnapshot::decode(&page).unwrap();
        assert_eq!(info.sm_version, "1.7");
        assert_eq!(info.car_model, "Ks Porsche 911 Gt3 R 2016");
        assert_eq!(info.track, "Ks Nordschleife");
        assert_eq!(info.player_name, "Jane");
        assert_eq!(info.player_surname, "Doe");
        assert_eq!(info.max_fuel, 120.0);
        assert_eq!(info.air_temp, 18.5);
        assert_eq!(info.road_temp, 31.0);
        assert!(info.aid_auto_blip);
        assert!(info.has_names);
    }

    #[test]
    fn blank_static_names_use_sentinels_and_keep_numbers() {
        let mut page = vec![0u8; STATIC_LEN];
        put_f32(&mut page, 416, 65.0);
        put_f32(&mut page, 456, 22.0);

        let info = StaticSnapshot::decode(&page).unwrap();
        assert_eq!(info.car_model, UNKNOWN_CAR);
        assert_eq!(info.track, UNKNOWN_TRACK);
        assert_eq!(info.player_name, UNKNOWN_DRIVER);
        assert!(!info.has_names);
        assert_eq!(info.max_fuel, 65.0);
        assert_eq!(info.air_temp, 22.0);
        assert_eq!(info.sector_count, 3);
    }

    #[test]
    fn undecodable_name_resolves_to_sentinel() {
        let mut page = vec![0u8; STATIC_LEN];
        page[68..70].copy_from_slice(&0xDC00u16.to_le_bytes());
        write_wide_string(&mut page, 134, 33, "monza");
        let info = StaticSnapshot::decode(&page).unwrap();
        assert_eq!(info.car_model, UNKNOWN_CAR);
        assert_eq!(info.track, "Monza");
    }

    #[test]
    fn short_pages_are_rejected() {
        assert!(PhysicsSnapshot::decode(&[0u8; PHYSICS_LEN - 1]).is_err());
        assert!(GraphicsSnapshot::decode(&[0u8; 10]).is_err());
        assert!(StaticSnapshot::decode(&[]).is_err());
    }
}
