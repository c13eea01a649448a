use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tracing::debug;

use crate::{
    error::ProviderError,
    model::{LocationDescriptor, Observation, WeatherRequest},
    provider::{CREDENTIAL_TEST_CITY, ProviderId, ProviderReport, fetch_body, malformed, truncate_body},
    units::{kelvin_to_celsius, mbar_to_mmhg},
    wind::classify,
};

use super::WeatherProvider;

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";
const CURRENT_PATH: &str = "/data/2.5/weather";

/// OpenWeatherMap current weather. Reports Kelvin, hPa and m/s.
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            http: Client::new(),
        }
    }

    pub fn with_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub async fn current_by_city_state_country(
        &self,
        city: &str,
        state: &str,
        country: &str,
    ) -> Result<ProviderReport, ProviderError> {
        let q = format!("{city},{state},{country}");
        let body = self.fetch(self.request(&self.api_key, &[("q", q)])).await?;
        Self::parse_current(&body)
    }

    fn request(&self, api_key: &str, params: &[(&str, String)]) -> RequestBuilder {
        self.http
            .get(format!("{}{}", self.base_url, CURRENT_PATH))
            .query(params)
            .query(&[("appid", api_key)])
    }

    fn params_for(request: &WeatherRequest) -> Vec<(&'static str, String)> {
        match request {
            WeatherRequest::City(city) => vec![("q", city.clone())],
            WeatherRequest::CityCountry { city, country } => {
                vec![("q", format!("{city},,{country}"))]
            }
            WeatherRequest::Coordinates { latitude, longitude } => {
                vec![("lat", latitude.to_string()), ("lon", longitude.to_string())]
            }
        }
    }

    async fn fetch(&self, request: RequestBuilder) -> Result<String, ProviderError> {
        let (status, body) = fetch_body(ProviderId::OpenWeather, request).await?;

        if status != reqwest::StatusCode::OK {
            return Err(ProviderError::Status {
                provider: ProviderId::OpenWeather,
                status: status.as_u16(),
                message: truncate_body(&body),
            });
        }

        Ok(body)
    }

    /// Parse a `/data/2.5/weather` body into a normalized report.
    pub fn parse_current(body: &str) -> Result<ProviderReport, ProviderError> {
        let parsed: OwCurrentResponse =
            serde_json::from_str(body).map_err(|e| malformed(ProviderId::OpenWeather, e))?;

        let observation = Observation {
            temperature: parsed.main.temp.map(kelvin_to_celsius),
            humidity: parsed.main.humidity,
            pressure: parsed.main.pressure.map(mbar_to_mmhg),
            wind_speed: parsed.wind.speed,
            wind_direction: classify(parsed.wind.deg),
        };

        let location = parsed.name.filter(|n| !n.is_empty()).map(|name| LocationDescriptor {
            name: Some(name),
            country: parsed.sys.and_then(|s| s.country).map(country_name),
            latitude: parsed.coord.as_ref().and_then(|c| c.lat),
            longitude: parsed.coord.as_ref().and_then(|c| c.lon),
        });

        Ok(ProviderReport { observation, location })
    }
}

/// OpenWeather reports ISO alpha-2 codes; the other providers report names.
fn country_name(code: String) -> String {
    match isocountry::CountryCode::for_alpha2(&code) {
        Ok(country) => country.name().to_string(),
        Err(_) => code,
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: Option<f64>,
    pressure: Option<f64>,
    humidity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: Option<f64>,
    deg: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwCoord {
    lat: Option<f64>,
    lon: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    main: OwMain,
    wind: OwWind,
    name: Option<String>,
    coord: Option<OwCoord>,
    sys: Option<OwSys>,
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenWeather
    }

    async fn current(&self, request: &WeatherRequest) -> Result<ProviderReport, ProviderError> {
        debug!(provider = %self.id(), %request, "requesting current weather");
        let params = Self::params_for(request);
        let body = self.fetch(self.request(&self.api_key, &params)).await?;
        Self::parse_current(&body)
    }

    async fn check_credential(&self, api_key: &str) -> Result<(), ProviderError> {
        let params = [("q", CREDENTIAL_TEST_CITY.to_string())];
        self.fetch(self.request(api_key, &params))
            .await
            .map(|_| ())
            .map_err(|err| ProviderError::CredentialInvalid {
                provider: ProviderId::OpenWeather,
                reason: err.to_string(),
            })
    }

    fn replace_api_key(&mut self, api_key: String) {
        self.api_key = api_key;
    }
}
