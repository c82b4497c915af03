//! Fused telemetry sample

use serde::{Deserialize, Serialize};

/// Per-wheel values in vendor order: front-left, front-right, rear-left, rear-right.
pub type WheelValues = [f32; 4];

/// Wheel position, matching the index order of every [`WheelValues`] array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Wheel {
    FrontLeft,
    FrontRight,
    RearLeft,
    RearRight,
}

impl Wheel {
    /// All wheels in array order.
    pub const ALL: [Wheel; 4] = [Wheel::FrontLeft, Wheel::FrontRight, Wheel::RearLeft, Wheel::RearRight];

    /// Index of this wheel in a [`WheelValues`] array.
    pub fn index(self) -> usize {
        match self {
            Wheel::FrontLeft => 0,
            Wheel::FrontRight => 1,
            Wheel::RearLeft => 2,
            Wheel::RearRight => 3,
        }
    }
}

/// Default tyre compound label when graphics data is unavailable.
pub const UNKNOWN_COMPOUND: &str = "Unknown";

/// One fused record per capture tick.
///
/// Baseline fields (time, position, speed, pedals, steering, g-force, gear, RPM)
/// are always populated from the UDP frame and overridden by shared memory when
/// available. The remaining fields come from shared memory only and hold their
/// [`Default`] values in degraded mode.
///
/// Serialized in camelCase to match the ingestion endpoint's point schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySample {
    /// Seconds since the start of the current lap (vendor lap timer)
    pub time: f32,
    pub x: f32,
    pub z: f32,
    /// km/h
    pub speed: f32,
    pub throttle: f32,
    pub brake: f32,
    pub steering: f32,
    /// Lateral
    pub g_force_x: f32,
    /// Vertical (shared memory only)
    pub g_force_y: f32,
    /// Longitudinal
    pub g_force_z: f32,
    /// -1 reverse, 0 neutral, 1.. forward gears
    pub gear: i32,
    pub rpm: f32,

    pub fuel: f32,
    /// Radians
    pub heading: f32,
    pub pitch: f32,
    pub roll: f32,

    pub tyre_pressure: WheelValues,
    pub tyre_temperature: WheelValues,
    pub tyre_wear: WheelValues,
    pub tyre_dirty_level: WheelValues,
    pub wheel_load: WheelValues,
    pub wheel_slip: WheelValues,
    pub suspension_travel: WheelValues,

    pub abs_active: bool,
    pub tc_active: bool,
    pub is_in_pit: bool,
    pub drs: f32,
    pub turbo_boost: f32,
    pub number_of_tyres_out: i32,

    pub air_temp: f32,
    pub road_temp: f32,
    pub surface_grip: f32,

    /// Position along the lap, 0.0..1.0
    pub normalized_position: f32,
    pub current_sector: i32,
    pub tyre_compound: String,
    pub penalty_time: f32,
    pub race_flag: i32,

    pub car_damage: [f32; 5],
    pub kers_charge: f32,
    /// Front, rear
    pub ride_height: [f32; 2],
}

impl Default for TelemetrySample {
    fn default() -> Self {
        Self {
            time: 0.0,
            x: 0.0,
            z: 0.0,
            speed: 0.0,
            throttle: 0.0,
            brake: 0.0,
            steering: 0.0,
            g_force_x: 0.0,
            g_force_y: 0.0,
            g_force_z: 0.0,
            gear: 0,
            rpm: 0.0,
            fuel: 0.0,
            heading: 0.0,
            pitch: 0.0,
            roll: 0.0,
            tyre_pressure: [0.0; 4],
            tyre_temperature: [0.0; 4],
            tyre_wear: [0.0; 4],
            tyre_dirty_level: [0.0; 4],
            wheel_load: [0.0; 4],
            wheel_slip: [0.0; 4],
            suspension_travel: [0.0; 4],
            abs_active: false,
            tc_active: false,
            is_in_pit: false,
            drs: 0.0,
            turbo_boost: 0.0,
            number_of_tyres_out: 0,
            air_temp: 0.0,
            road_temp: 0.0,
            surface_grip: 1.0,
            normalized_position: 0.0,
            current_sector: 0,
            tyre_compound: UNKNOWN_COMPOUND.to_string(),
            penalty_time: 0.0,
            race_flag: 0,
            car_damage: [0.0; 5],
            kers_charge: 0.0,
            ride_height: [0.0; 2],
        }
    }
}

impl TelemetrySample {
    /// All per-wheel arrays, in declaration order.
    pub fn wheel_arrays(&self) -> [&WheelValues; 7] {
        [
            &self.tyre_pressure,
            &self.tyre_temperature,
            &self.tyre_wear,
            &self.tyre_dirty_level,
            &self.wheel_load,
            &self.wheel_slip,
            &self.suspension_travel,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wheel_indices_follow_vendor_order() {
        let indices: Vec<usize> = Wheel::ALL.iter().map(|w| w.index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn serializes_with_endpoint_field_names() {
        let sample = TelemetrySample { g_force_x: 1.5, is_in_pit: true, ..Default::default() };
        let json = serde_json::to_value(&sample).unwrap();

        assert_eq!(json["gForceX"], 1.5);
        assert_eq!(json["isInPit"], true);
        assert_eq!(json["tyreCompound"], "Unknown");
        assert_eq!(json["tyrePressure"].as_array().map(|a| a.len()), Some(4));
        assert_eq!(json["carDamage"].as_array().map(|a| a.len()), Some(5));
        assert_eq!(json["rideHeight"].as_array().map(|a| a.len()), Some(2));
    }

    #[test]
    fn default_surface_grip_is_neutral() {
        assert_eq!(TelemetrySample::default().surface_grip, 1.0);
    }
}
