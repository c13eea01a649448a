use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::{
    error::ProviderError,
    model::{LocationDescriptor, Observation, WeatherRequest},
    provider::{CREDENTIAL_TEST_CITY, ProviderId, ProviderReport, fetch_body, malformed, truncate_body},
    units::{kph_to_mps, mbar_to_mmhg},
    wind::classify,
};

use super::WeatherProvider;

const DEFAULT_BASE_URL: &str = "http://api.weatherstack.com";
const CURRENT_PATH: &str = "/current";

/// Weatherstack current weather. Reports °C, mb and km/h.
///
/// Errors may arrive with HTTP 200 and `{"success": false, "error": {...}}`.
#[derive(Debug, Clone)]
pub struct WeatherStackProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl WeatherStackProvider {
    pub fn new(api_key: String) -> Self {
        Self { api_key, base_url: DEFAULT_BASE_URL.to_string(), http: Client::new() }
    }

    pub fn with_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn request(&self, api_key: &str, query: &str) -> RequestBuilder {
        self.http
            .get(format!("{}{}", self.base_url, CURRENT_PATH))
            .query(&[("access_key", api_key), ("query", query)])
    }

    fn query_for(request: &WeatherRequest) -> String {
        match request {
            WeatherRequest::City(city) => city.clone(),
            WeatherRequest::CityCountry { city, country } => format!("{city}, {country}"),
            WeatherRequest::Coordinates { latitude, longitude } => format!("{latitude},{longitude}"),
        }
    }

    async fn fetch(&self, request: RequestBuilder) -> Result<String, ProviderError> {
        let (status, body) = fetch_body(ProviderId::WeatherStack, request).await?;

        let error = serde_json::from_str::<WsErrorResponse>(&body)
            .ok()
            .filter(|e| e.success == Some(false) || e.error.is_some());

        if status != reqwest::StatusCode::OK || error.is_some() {
            let message = error
                .and_then(|e| e.error)
                .and_then(|e| e.info.or(e.kind))
                .unwrap_or_else(|| truncate_body(&body));
            return Err(ProviderError::Status {
                provider: ProviderId::WeatherStack,
                status: status.as_u16(),
                message,
            });
        }

        Ok(body)
    }

    /// Parse a `/current` body into a normalized report.
    pub fn parse_current(body: &str) -> Result<ProviderReport, ProviderError> {
        let parsed: WsResponse =
            serde_json::from_str(body).map_err(|e| malformed(ProviderId::WeatherStack, e))?;
        let current = parsed.current;

        let observation = Observation {
            temperature: current.temperature,
            humidity: current.humidity,
            pressure: current.pressure.map(mbar_to_mmhg),
            wind_speed: current.wind_speed.map(kph_to_mps),
            wind_direction: classify(current.wind_degree),
        };

        let location = parsed.location.and_then(|loc| {
            let name = loc.name.filter(|n| !n.is_empty())?;
            Some(LocationDescriptor {
                name: Some(name),
                country: loc.country.filter(|c| !c.is_empty()),
                latitude: loc.lat,
                longitude: loc.lon,
            })
        });

        Ok(ProviderReport { observation, location })
    }
}

/// Weatherstack sends coordinates as strings ("55.752"); accept numbers as well.
fn number_or_string<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(n)) => Some(n),
        Some(Raw::Text(s)) => s.trim().parse().ok(),
        None => None,
    })
}

#[derive(Debug, Deserialize)]
struct WsLocation {
    name: Option<String>,
    country: Option<String>,
    #[serde(default, deserialize_with = "number_or_string")]
    lat: Option<f64>,
    #[serde(default, deserialize_with = "number_or_string")]
    lon: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WsCurrent {
    temperature: Option<f64>,
    humidity: Option<f64>,
    pressure: Option<f64>,
    wind_speed: Option<f64>,
    wind_degree: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WsResponse {
    location: Option<WsLocation>,
    current: WsCurrent,
}

#[derive(Debug, Deserialize)]
struct WsError {
    info: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WsErrorResponse {
    success: Option<bool>,
    error: Option<WsError>,
}

#[async_trait]
impl WeatherProvider for WeatherStackProvider {
    fn id(&self) -> ProviderId {
        ProviderId::WeatherStack
    }

    async fn current(&self, request: &WeatherRequest) -> Result<ProviderReport, ProviderError> {
        debug!(provider = %self.id(), %request, "requesting current weather");
        let body = self.fetch(self.request(&self.api_key, &Self::query_for(request))).await?;
        Self::parse_current(&body)
    }

    async fn check_credential(&self, api_key: &str) -> Result<(), ProviderError> {
        self.fetch(self.request(api_key, CREDENTIAL_TEST_CITY))
            .await
            .map(|_| ())
            .map_err(|err| ProviderError::CredentialInvalid {
                provider: ProviderId::WeatherStack,
                reason: err.to_string(),
            })
    }

    fn replace_api_key(&mut self, api_key: String) {
        self.api_key = api_key;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WindDirection;

    #[test]
    fn parses_string_coordinates() {
        let body = r#"{
            "request": {"type": "City", "query": "Kazan, Russia"},
            "location": {"name": "Kazan", "country": "Russia", "lat": "55.750", "lon": "49.133"},
            "current": {"temperature": 4, "wind_speed": 7.2, "wind_degree": 90,
                        "pressure": 1020, "humidity": 75}
        }"#;

        let report = WeatherStackProvider::parse_current(body).expect("valid payload");
        assert_eq!(report.observation.temperature, Some(4.0));
        assert_eq!(report.observation.pressure, Some(765.0));
        assert!((report.observation.wind_speed.expect("wind") - 2.0).abs() < 1e-9);
        assert_eq!(report.observation.wind_direction, WindDirection::E);

        let loc = report.location.expect("descriptor");
        assert_eq!(loc.latitude, Some(55.75));
        assert_eq!(loc.longitude, Some(49.133));
    }

    #[test]
    fn error_body_without_current_is_malformed() {
        let body = r#"{"success": false, "error": {"code": 101, "type": "invalid_access_key"}}"#;
        assert!(WeatherStackProvider::parse_current(body).is_err());
    }

    #[test]
    fn city_country_query_is_comma_space_joined() {
        let q = WeatherStackProvider::query_for(&WeatherRequest::city_country("Kazan", "Russia"));
        assert_eq!(q, "Kazan, Russia");
    }
}
