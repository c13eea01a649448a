//! Compass classification of wind bearings.

use crate::model::WindDirection;

const SECTOR_WIDTH: f64 = 45.0;
const HALF_WIDTH: f64 = 22.5;

// Index 8 aliases north so bearings in (337.5, 382.5] wrap around.
const SECTORS: [WindDirection; 9] = [
    WindDirection::N,
    WindDirection::NE,
    WindDirection::E,
    WindDirection::SE,
    WindDirection::S,
    WindDirection::SW,
    WindDirection::W,
    WindDirection::NW,
    WindDirection::N,
];

/// Map a bearing in degrees to one of the eight compass buckets.
///
/// Absent, zero and non-finite bearings map to [`WindDirection::None`]; zero is
/// reported as "no wind bearing" by several providers on calm readings. Bearings
/// outside `[-22.5, 382.5]` match no sector and also map to `None`.
pub fn classify(degrees: Option<f64>) -> WindDirection {
    let Some(degrees) = degrees.filter(|d| d.is_finite() && *d != 0.0) else {
        return WindDirection::None;
    };

    SECTORS
        .iter()
        .enumerate()
        .find(|(i, _)| {
            let center = SECTOR_WIDTH * *i as f64;
            center - HALF_WIDTH <= degrees && degrees <= center + HALF_WIDTH
        })
        .map(|(_, dir)| *dir)
        .unwrap_or(WindDirection::None)
}
