//! Lap segmentation
//!
//! [`LapSegmenter`] owns the buffer of the lap in progress and turns lap
//! counter increments into [`CompletedLap`](crate::types::CompletedLap)s with
//! a corrected duration and a sector split.

mod sectors;
mod segmenter;

pub use sectors::{SECTOR_FRACTIONS, SectorStrategy, fixed_fraction, measured};
pub use segmenter::{LapSegmenter, LapTiming, SegmenterState};
