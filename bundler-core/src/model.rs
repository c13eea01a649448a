use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Compass bucket of the wind origin. `None` is the explicit "unknown" state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WindDirection {
    #[default]
    None,
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl WindDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindDirection::None => "None",
            WindDirection::N => "N",
            WindDirection::NE => "NE",
            WindDirection::E => "E",
            WindDirection::SE => "SE",
            WindDirection::S => "S",
            WindDirection::SW => "SW",
            WindDirection::W => "W",
            WindDirection::NW => "NW",
        }
    }

    pub const fn all() -> &'static [WindDirection] {
        &[
            WindDirection::None,
            WindDirection::N,
            WindDirection::NE,
            WindDirection::E,
            WindDirection::SE,
            WindDirection::S,
            WindDirection::SW,
            WindDirection::W,
            WindDirection::NW,
        ]
    }
}

impl fmt::Display for WindDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WindDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WindDirection::all()
            .iter()
            .find(|d| d.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown wind direction '{s}'"))
    }
}

/// One normalized reading: °C, %, mmHg, m/s.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Observation {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: WindDirection,
}

impl Observation {
    /// The canonical "no data" observation.
    pub const fn empty() -> Self {
        Self {
            temperature: None,
            humidity: None,
            pressure: None,
            wind_speed: None,
            wind_direction: WindDirection::None,
        }
    }

    /// True when every numeric field is absent and the wind direction is unknown.
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none()
            && self.humidity.is_none()
            && self.pressure.is_none()
            && self.wind_speed.is_none()
            && self.wind_direction == WindDirection::None
    }
}

/// A stored place used as the cache key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: i64,
    pub name: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Location {
    pub fn display_name(&self) -> String {
        match (&self.name, &self.country, self.latitude, self.longitude) {
            (Some(name), Some(country), _, _) => format!("{name}, {country}"),
            (Some(name), None, _, _) => name.clone(),
            (None, _, Some(lat), Some(lon)) => format!("{lat}, {lon}"),
            _ => format!("location #{}", self.id),
        }
    }
}

/// Geocoded place as reported by a provider, or the fields used to create a location.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LocationDescriptor {
    pub name: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl LocationDescriptor {
    pub fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

/// An observation row tied to a location and a time bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedObservation {
    pub location_id: i64,
    pub bucket: DateTime<Utc>,
    pub observation: Observation,
}

/// What the caller is asking for.
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherRequest {
    City(String),
    CityCountry { city: String, country: String },
    Coordinates { latitude: f64, longitude: f64 },
}

impl WeatherRequest {
    pub fn city(name: impl Into<String>) -> Self {
        WeatherRequest::City(name.into())
    }

    pub fn city_country(city: impl Into<String>, country: impl Into<String>) -> Self {
        WeatherRequest::CityCountry { city: city.into(), country: country.into() }
    }

    pub fn coordinates(latitude: f64, longitude: f64) -> Self {
        WeatherRequest::Coordinates { latitude, longitude }
    }

    /// Fields a location created for this request is keyed by.
    pub fn key_descriptor(&self) -> LocationDescriptor {
        match self {
            WeatherRequest::City(name) => {
                LocationDescriptor { name: Some(name.clone()), ..Default::default() }
            }
            WeatherRequest::CityCountry { city, country } => LocationDescriptor {
                name: Some(city.clone()),
                country: Some(country.clone()),
                ..Default::default()
            },
            WeatherRequest::Coordinates { latitude, longitude } => LocationDescriptor {
                latitude: Some(*latitude),
                longitude: Some(*longitude),
                ..Default::default()
            },
        }
    }
}

impl fmt::Display for WeatherRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeatherRequest::City(name) => write!(f, "{name}"),
            WeatherRequest::CityCountry { city, country } => write!(f, "{city}, {country}"),
            WeatherRequest::Coordinates { latitude, longitude } => {
                write!(f, "{latitude}, {longitude}")
            }
        }
    }
}
