use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tracing::debug;

use crate::{
    error::ProviderError,
    model::{LocationDescriptor, Observation, WeatherRequest},
    provider::{CREDENTIAL_TEST_CITY, ProviderId, ProviderReport, fetch_body, malformed, truncate_body},
    units::{kph_to_mps, mbar_to_mmhg},
    wind::classify,
};

use super::WeatherProvider;

const DEFAULT_BASE_URL: &str = "https://api.weatherapi.com";
const CURRENT_PATH: &str = "/v1/current.json";

/// WeatherAPI.com current weather. Reports °C, mbar and km/h.
#[derive(Debug, Clone)]
pub struct WeatherApiProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl WeatherApiProvider {
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
            .query(&[("key", api_key), ("q", query), ("aqi", "no")])
    }

    fn query_for(request: &WeatherRequest) -> String {
        match request {
            WeatherRequest::City(city) => city.clone(),
            WeatherRequest::CityCountry { city, country } => format!("{city},{country}"),
            WeatherRequest::Coordinates { latitude, longitude } => format!("{latitude},{longitude}"),
        }
    }

    async fn fetch(&self, request: RequestBuilder) -> Result<String, ProviderError> {
        let (status, body) = fetch_body(ProviderId::WeatherApi, request).await?;

        if !status.is_success() {
            // 4xx bodies carry {"error": {"code": .., "message": ..}}
            let message = serde_json::from_str::<WaErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| truncate_body(&body));
            return Err(ProviderError::Status {
                provider: ProviderId::WeatherApi,
                status: status.as_u16(),
                message,
            });
        }

        Ok(body)
    }

    /// Parse a `/v1/current.json` body into a normalized report.
    pub fn parse_current(body: &str) -> Result<ProviderReport, ProviderError> {
        let parsed: WaResponse =
            serde_json::from_str(body).map_err(|e| malformed(ProviderId::WeatherApi, e))?;
        let current = parsed.current;

        let observation = Observation {
            temperature: current.temp_c,
            humidity: current.humidity,
            pressure: current.pressure_mb.map(mbar_to_mmhg),
            wind_speed: current.wind_kph.map(kph_to_mps),
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

#[derive(Debug, Deserialize)]
struct WaLocation {
    name: Option<String>,
    country: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    temp_c: Option<f64>,
    humidity: Option<f64>,
    pressure_mb: Option<f64>,
    wind_kph: Option<f64>,
    wind_degree: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WaResponse {
    location: Option<WaLocation>,
    current: WaCurrent,
}

#[derive(Debug, Deserialize)]
struct WaError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct WaErrorResponse {
    error: WaError,
}

#[async_trait]
impl WeatherProvider for WeatherApiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::WeatherApi
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
                provider: ProviderId::WeatherApi,
                reason: err.to_string(),
            })
    }

    fn replace_api_key(&mut self, api_key: String) {
        self.api_key = api_key;
    }
}
