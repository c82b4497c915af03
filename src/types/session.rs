//! Session-scoped static information

use serde::{Deserialize, Serialize};

/// Sentinel for a car name that could not be read.
pub const UNKNOWN_CAR: &str = "Unknown Car";
/// Sentinel for a track name that could not be read.
pub const UNKNOWN_TRACK: &str = "Unknown Track";
/// Sentinel for a driver name that could not be read.
pub const UNKNOWN_DRIVER: &str = "Unknown Driver";

/// Where the current [`SessionInfo`] values were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionSource {
    /// Static shared-memory segment (authoritative)
    SharedMemory,
    /// UDP identify response (names only)
    Handshake,
    /// Nothing read yet
    Defaults,
}

/// Car, track, driver and environmental baselines for one session.
///
/// Built once at startup and replaced only when a more authoritative source
/// becomes readable; once sourced from shared memory it is never changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub car: String,
    pub track: String,
    pub driver: String,
    pub sector_count: i32,
    pub max_fuel: f32,
    /// Air temperature at session start, degrees C
    pub air_temp: f32,
    /// Road temperature at session start, degrees C
    pub road_temp: f32,
    pub conditions: String,
    pub source: SessionSource,
}

impl Default for SessionInfo {
    fn default() -> Self {
        Self {
            car: UNKNOWN_CAR.to_string(),
            track: UNKNOWN_TRACK.to_string(),
            driver: UNKNOWN_DRIVER.to_string(),
            sector_count: 3,
            max_fuel: 100.0,
            air_temp: 20.0,
            road_temp: 25.0,
            conditions: "Dry".to_string(),
            source: SessionSource::Defaults,
        }
    }
}

impl SessionInfo {
    /// Whether a shared-memory read has already populated this session.
    pub fn is_authoritative(&self) -> bool {
        self.source == SessionSource::SharedMemory
    }
}

/// Convert a raw vendor identifier (`ks_mazda_mx5_cup`) into a display name
/// (`Ks Mazda Mx5 Cup`).
///
/// Returns `None` for blank input so callers can substitute a sentinel.
pub fn display_name(raw: &str) -> Option<String> {
    let cleaned = raw.replace('_', " ").replace('%', "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }

    let words: Vec<String> = cleaned
        .split_whitespace()
        .map(|word| {
            let lower = word.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect();

    Some(words.join(" "))
}
