//! Sample fusion
//!
//! One [`UdpFrame`] plus the latest shared-memory snapshots become one
//! [`TelemetrySample`]. Shared memory wins for every field both sources carry;
//! UDP supplies position and the lap timer, and the baseline when shared
//! memory is absent.

use crate::protocol::UdpFrame;
use crate::shm::{GraphicsSnapshot, PhysicsSnapshot, StaticSnapshot};
use crate::types::{SessionInfo, SessionSource, TelemetrySample, UNKNOWN_COMPOUND, display_name};

/// Activation threshold for the ABS and TC intervention levels.
const AID_ACTIVE_THRESHOLD: f32 = 0.1;

/// Stateless merge of one tick's inputs; holds only the session baselines.
#[derive(Debug, Clone, Default)]
pub struct SampleFuser {
    session: SessionInfo,
}

impl SampleFuser {
    pub fn new(session: SessionInfo) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &SessionInfo {
        &self.session
    }

    /// Replace the session, unless the current one is already authoritative.
    pub fn update_session(&mut self, session: SessionInfo) -> bool {
        if self.session.is_authoritative() {
            return false;
        }
        self.session = session;
        true
    }

    pub fn fuse(
        &self,
        frame: &UdpFrame,
        physics: Option<&PhysicsSnapshot>,
        graphics: Option<&GraphicsSnapshot>,
    ) -> TelemetrySample {
        let mut sample = TelemetrySample {
            time: frame.lap_time_ms as f32 / 1000.0,
            x: frame.position_x,
            z: frame.position_z,
            speed: frame.speed_kmh,
            throttle: frame.throttle,
            brake: frame.brake,
            steering: frame.steering,
            g_force_x: frame.g_lateral,
            g_force_z: frame.g_longitudinal,
            gear: frame.gear,
            rpm: frame.rpm,
            air_temp: self.session.air_temp,
            road_temp: self.session.road_temp,
            ..Default::default()
        };

        if let Some(p) = physics {
            sample.speed = p.speed_kmh;
            sample.throttle = p.gas;
            sample.brake = p.brake;
            sample.steering = p.steer_angle;
            sample.g_force_x = p.acc_g[0];
            sample.g_force_y = p.acc_g[1];
            sample.g_force_z = p.acc_g[2];
            sample.gear = p.gear.saturating_sub(1);
            sample.rpm = p.rpms as f32;

            sample.fuel = p.fuel;
            sample.heading = p.heading;
            sample.pitch = p.pitch;
            sample.roll = p.roll;
            sample.tyre_pressure = p.wheels_pressure;
            sample.tyre_temperature = p.tyre_core_temperature;
            sample.tyre_wear = p.tyre_wear;
            sample.tyre_dirty_level = p.tyre_dirty_level;
            sample.wheel_load = p.wheel_load;
            sample.wheel_slip = p.wheel_slip;
            sample.suspension_travel = p.suspension_travel;
            sample.abs_active = p.abs > AID_ACTIVE_THRESHOLD;
            sample.tc_active = p.tc > AID_ACTIVE_THRESHOLD;
            sample.drs = p.drs;
            sample.turbo_boost = p.turbo_boost;
            sample.number_of_tyres_out = p.number_of_tyres_out;
            sample.car_damage = p.car_damage;
            sample.kers_charge = p.kers_charge;
            sample.ride_height = p.ride_height;
        }

        if let Some(g) = graphics {
            sample.is_in_pit = g.is_in_pit == 1;
            sample.surface_grip = g.surface_grip;
            sample.normalized_position = g.normalized_car_position;
            sample.current_sector = g.current_sector_index;
            sample.tyre_compound = if g.tyre_compound.is_empty() {
                UNKNOWN_COMPOUND.to_string()
            } else {
                g.tyre_compound.clone()
            };
            sample.penalty_time = g.penalty_time;
            sample.race_flag = g.flag;
        }

        sample
    }
}

/// Session built from a static page, with the configured conditions label.
pub fn session_from_static(snapshot: &StaticSnapshot, conditions: &str) -> SessionInfo {
    SessionInfo {
        car: snapshot.car_model.clone(),
        track: snapshot.track.clone(),
        driver: snapshot.player_name.clone(),
        sector_count: snapshot.sector_count,
        max_fuel: snapshot.max_fuel,
        air_temp: snapshot.air_temp,
        road_temp: snapshot.road_temp,
        conditions: conditions.to_string(),
        source: SessionSource::SharedMemory,
    }
}

/// Session built from identify-response names; environment stays at defaults.
pub fn session_from_handshake(
    response: &crate::protocol::HandshakeResponse,
    conditions: &str,
) -> SessionInfo {
    let defaults = SessionInfo::default();
    let track = match (&response.track_name, &response.track_config) {
        (Some(track), Some(config)) => display_name(&format!("{} {}", track, config)),
        (Some(track), None) => Some(track.clone()),
        (None, _) => None,
    };
    SessionInfo {
        car: response.car_name.clone().unwrap_or(defaults.car),
        track: track.unwrap_or(defaults.track),
        driver: response.driver_name.clone().unwrap_or(defaults.driver),
        conditions: conditions.to_string(),
        source: SessionSource::Handshake,
        ..SessionInfo::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::HandshakeResponse;
    use crate::types::{UNKNOWN_DRIVER, UNKNOWN_TRACK};

    fn frame() -> UdpFrame {
        UdpFrame {
            speed_kmh: 100.0,
            g_lateral: 0.5,
            g_longitudinal: -0.3,
            lap_time_ms: 42_500,
            lap_count: 3,
            throttle: 0.6,
            brake: 0.0,
            rpm: 5000.0,
            steering: 0.1,
            gear: 2,
            position_x: 10.0,
            position_z: -20.0,
            ..Default::default()
        }
    }

    #[test]
    fn udp_only_uses_baseline_and_documented_defaults() {
        let fuser = SampleFuser::new(SessionInfo { air_temp: 14.0, road_temp: 19.0, ..Default::default() });
        let sample = fuser.fuse(&frame(), None, None);

        assert_eq!(sample.time, 42.5);
        assert_eq!((sample.x, sample.z), (10.0, -20.0));
        assert_eq!(sample.speed, 100.0);
        assert_eq!(sample.g_force_x, 0.5);
        assert_eq!(sample.g_force_y, 0.0);
        assert_eq!(sample.g_force_z, -0.3);
        assert_eq!(sample.gear, 2);
        assert_eq!(sample.rpm, 5000.0);
        assert_eq!(sample.air_temp, 14.0);
        assert_eq!(sample.road_temp, 19.0);
        assert_eq!(sample.surface_grip, 1.0);
        assert_eq!(sample.tyre_compound, UNKNOWN_COMPOUND);
        assert_eq!(sample.tyre_pressure, [0.0; 4]);
        assert!(!sample.abs_active && !sample.tc_active && !sample.is_in_pit);
    }

    #[test]
    fn shared_memory_wins_for_overlapping_fields() {
        let physics = PhysicsSnapshot {
            speed_kmh: 101.5,
            gas: 0.65,
            brake: 0.05,
            steer_angle: 0.12,
            acc_g: [0.55, 0.02, -0.31],
            gear: 3,
            rpms: 5100,
            wheels_pressure: [27.0, 27.1, 26.8, 26.9],
            abs: 0.5,
            tc: 0.1,
            ..Default::default()
        };
        let graphics = GraphicsSnapshot {
            is_in_pit: 1,
            surface_grip: 0.96,
            tyre_compound: "Medium".into(),
            current_sector_index: 1,
            ..Default::default()
        };

        let sample = SampleFuser::default().fuse(&frame(), Some(&physics), Some(&graphics));

        assert_eq!(sample.speed, 101.5);
        assert_eq!(sample.throttle, 0.65);
        assert_eq!(sample.brake, 0.05);
        assert_eq!(sample.steering, 0.12);
        assert_eq!(sample.g_force_x, 0.55);
        assert_eq!(sample.g_force_y, 0.02);
        assert_eq!(sample.g_force_z, -0.31);
        assert_eq!(sample.gear, 2, "vendor gear 3 is second gear");
        assert_eq!(sample.rpm, 5100.0);
        assert_eq!(sample.tyre_pressure, [27.0, 27.1, 26.8, 26.9]);
        assert!(sample.abs_active);
        assert!(!sample.tc_active, "threshold is exclusive");
        assert!(sample.is_in_pit);
        assert_eq!(sample.surface_grip, 0.96);
        assert_eq!(sample.tyre_compound, "Medium");
        assert_eq!(sample.current_sector, 1);
        assert_eq!((sample.x, sample.time), (10.0, 42.5), "UDP-only fields kept");
    }

    #[test]
    fn vendor_reverse_and_neutral_normalize() {
        let fuser = SampleFuser::default();
        let reverse = PhysicsSnapshot { gear: 0, ..Default::default() };
        let neutral = PhysicsSnapshot { gear: 1, ..Default::default() };
        assert_eq!(fuser.fuse(&frame(), Some(&reverse), None).gear, -1);
        assert_eq!(fuser.fuse(&frame(), Some(&neutral), None).gear, 0);

        let corrupt = PhysicsSnapshot { gear: i32::MIN, ..Default::default() };
        assert_eq!(fuser.fuse(&frame(), Some(&corrupt), None).gear, i32::MIN);
    }

    #[test]
    fn authoritative_session_is_never_replaced() {
        let mut fuser = SampleFuser::default();
        let handshake = HandshakeResponse { car_name: Some("Abarth500".into()), ..Default::default() };
        assert!(fuser.update_session(session_from_handshake(&handshake, "Dry")));

        let authoritative = SessionInfo { source: SessionSource::SharedMemory, ..Default::default() };
        assert!(fuser.update_session(authoritative));
        assert!(!fuser.update_session(session_from_handshake(&handshake, "Dry")));
        assert!(fuser.session().is_authoritative());
    }

    #[test]
    fn handshake_session_fills_missing_names_with_sentinels() {
        let response = HandshakeResponse { car_name: Some("Ks Mazda Mx5 Cup".into()), ..Default::default() };
        let session = session_from_handshake(&response, "Wet");
        assert_eq!(session.car, "Ks Mazda Mx5 Cup");
        assert_eq!(session.track, UNKNOWN_TRACK);
        assert_eq!(session.driver, UNKNOWN_DRIVER);
        assert_eq!(session.conditions, "Wet");
        assert_eq!(session.source, SessionSource::Handshake);

        let with_layout = HandshakeResponse {
            track_name: Some("Ks Nordschleife".into()),
            track_config: Some("Endurance".into()),
            ..Default::default()
        };
        assert_eq!(session_from_handshake(&with_layout, "Dry").track, "Ks Nordschleife Endurance");
    }
}
