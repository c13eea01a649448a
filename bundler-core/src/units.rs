//! Unit conversions applied while normalizing provider payloads.

const KELVIN_OFFSET: f64 = 273.15;

pub fn kelvin_to_celsius(kelvin: f64) -> f64 {
    kelvin - KELVIN_OFFSET
}

/// Millibar (hPa) to mmHg, using the coarse `3/4` factor.
pub fn mbar_to_mmhg(mbar: f64) -> f64 {
    mbar * 3.0 / 4.0
}

pub fn kph_to_mps(kph: f64) -> f64 {
    kph / 3.6
}
