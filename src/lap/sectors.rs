//! Sector split strategies

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{LapTime, SectorMethod, SectorTimes, TelemetrySample};

/// Share of the lap assigned to each sector by the fixed split.
pub const SECTOR_FRACTIONS: [f64; 3] = [0.33, 0.35, 0.32];

/// How a completed lap is divided into three sectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectorStrategy {
    /// 33% / 35% / 32% of the lap time
    #[default]
    FixedFraction,
    /// Measured from `current_sector` transitions, falling back to the fixed split
    SectorIndex,
}

impl SectorStrategy {
    pub fn split(self, samples: &[TelemetrySample], lap_time: LapTime) -> (SectorTimes, SectorMethod) {
        let total = lap_time.as_secs_f64();
        match self {
            SectorStrategy::FixedFraction => (fixed_fraction(total), SectorMethod::Estimated),
            SectorStrategy::SectorIndex => match measured(samples, total) {
                Some(sectors) => (sectors, SectorMethod::Measured),
                None => {
                    debug!("Sector transitions incomplete, using fixed split");
                    (fixed_fraction(total), SectorMethod::Estimated)
                }
            },
        }
    }
}

/// Fixed split. The third sector absorbs rounding so the parts sum to `total`.
pub fn fixed_fraction(total: f64) -> SectorTimes {
    let sector1 = total * SECTOR_FRACTIONS[0];
    let sector2 = total * SECTOR_FRACTIONS[1];
    SectorTimes { sector1, sector2, sector3: total - sector1 - sector2 }
}

/// Sector times from the times at which `current_sector` moved 0→1 and 1→2.
///
/// Returns `None` unless exactly those two forward transitions occur and every
/// resulting sector is positive. A return to sector 0 on the final sample is
/// the lap boundary itself and is not counted.
pub fn measured(samples: &[TelemetrySample], total: f64) -> Option<SectorTimes> {
    let start = samples.first()?.time as f64;

    let last = samples.len() - 1;
    let transitions: Vec<(i32, i32, f64)> = samples
        .windows(2)
        .enumerate()
        // The closing sample may already report the next lap's first sector.
        .filter(|(i, pair)| !(i + 1 == last && pair[1].current_sector == 0))
        .filter(|(_, pair)| pair[0].current_sector != pair[1].current_sector)
        .map(|(_, pair)| (pair[0].current_sector, pair[1].current_sector, pair[1].time as f64))
        .collect();

    let [(0, 1, into_second), (1, 2, into_third)] = transitions.as_slice() else {
        return None;
    };

    let sector1 = into_second - start;
    let sector2 = into_third - into_second;
    let sector3 = total - sector1 - sector2;

    (sector1 > 0.0 && sector2 > 0.0 && sector3 > 0.0)
        .then_some(SectorTimes { sector1, sector2, sector3 })
}
