use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::{Client, RequestBuilder, Url};
use indexmap::IndexMap;
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

const DEFAULT_BASE_URL: &str = "https://weather.visualcrossing.com";
const SERVICES_PATH: [&str; 3] = ["VisualCrossingWebServices", "rest", "services"];
const HISTORY_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Visual Crossing timeline (current) and history weather, metric units.
#[derive(Debug, Clone)]
pub struct VisualCrossingProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl VisualCrossingProvider {
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

    pub async fn past_by_city(
        &self,
        city: &str,
        when: NaiveDateTime,
    ) -> Result<ProviderReport, ProviderError> {
        self.past(&WeatherRequest::city(city), when).await
    }

    pub async fn past_by_city_country(
        &self,
        city: &str,
        country: &str,
        when: NaiveDateTime,
    ) -> Result<ProviderReport, ProviderError> {
        self.past(&WeatherRequest::city_country(city, country), when).await
    }

    pub async fn past_by_coordinates(
        &self,
        latitude: f64,
        longitude: f64,
        when: NaiveDateTime,
    ) -> Result<ProviderReport, ProviderError> {
        self.past(&WeatherRequest::coordinates(latitude, longitude), when).await
    }

    fn query_for(request: &WeatherRequest) -> String {
        match request {
            WeatherRequest::City(city) => city.clone(),
            WeatherRequest::CityCountry { city, country } => format!("{city},{country}"),
            WeatherRequest::Coordinates { latitude, longitude } => format!("{latitude},{longitude}"),
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        let invalid = |message: String| ProviderError::InvalidUrl {
            provider: ProviderId::VisualCrossing,
            message,
        };

        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid(format!("'{}' cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(SERVICES_PATH)
            .extend(segments);
        Ok(url)
    }

    fn current_request(&self, api_key: &str, query: &str) -> Result<RequestBuilder, ProviderError> {
        let url = self.endpoint(&["timeline", query])?;
        Ok(self
            .http
            .get(url)
            .query(&[("unitGroup", "metric"), ("key", api_key), ("include", "current")]))
    }

    fn history_request(&self, query: &str, when: NaiveDateTime) -> Result<RequestBuilder, ProviderError> {
        let url = self.endpoint(&["weatherdata", "history"])?;
        let date = when.format(HISTORY_DATE_FORMAT).to_string();
        Ok(self.http.get(url).query(&[
            ("aggregateHours", "24"),
            ("startDateTime", date.as_str()),
            ("endDateTime", date.as_str()),
            ("contentType", "json"),
            ("unitGroup", "metric"),
            ("location", query),
            ("key", self.api_key.as_str()),
        ]))
    }

    async fn fetch(&self, request: RequestBuilder) -> Result<String, ProviderError> {
        let (status, body) = fetch_body(ProviderId::VisualCrossing, request).await?;

        if status != reqwest::StatusCode::OK {
            return Err(ProviderError::Status {
                provider: ProviderId::VisualCrossing,
                status: status.as_u16(),
                message: truncate_body(&body),
            });
        }

        Ok(body)
    }

    /// Parse a timeline body requested with `include=current`.
    pub fn parse_current(body: &str) -> Result<ProviderReport, ProviderError> {
        let parsed: VcTimelineResponse =
            serde_json::from_str(body).map_err(|e| malformed(ProviderId::VisualCrossing, e))?;

        let location = descriptor(parsed.address, parsed.latitude, parsed.longitude);
        Ok(ProviderReport { observation: parsed.current_conditions.into(), location })
    }

    /// Parse a history body; the first location's first value is used.
    pub fn parse_past(body: &str) -> Result<ProviderReport, ProviderError> {
        let parsed: VcHistoryResponse =
            serde_json::from_str(body).map_err(|e| malformed(ProviderId::VisualCrossing, e))?;

        let location = parsed
            .locations
            .into_values()
            .next()
            .ok_or_else(|| malformed(ProviderId::VisualCrossing, "history response has no locations"))?;

        let value = location
            .values
            .into_iter()
            .next()
            .ok_or_else(|| malformed(ProviderId::VisualCrossing, "history response has no values"))?;

        let observation = Observation {
            temperature: value.temp,
            humidity: value.humidity,
            pressure: value.sealevelpressure.map(mbar_to_mmhg),
            wind_speed: value.wspd.map(kph_to_mps),
            wind_direction: classify(value.wdir),
        };

        let location = descriptor(location.address, location.latitude, location.longitude);
        Ok(ProviderReport { observation, location })
    }
}

fn descriptor(
    address: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> Option<LocationDescriptor> {
    let name = address.filter(|a| !a.is_empty())?;
    Some(LocationDescriptor { name: Some(name), country: None, latitude, longitude })
}

#[derive(Debug, Deserialize)]
struct VcConditions {
    temp: Option<f64>,
    humidity: Option<f64>,
    sealevelpressure: Option<f64>,
    pressure: Option<f64>,
    windspeed: Option<f64>,
    winddir: Option<f64>,
}

impl From<VcConditions> for Observation {
    fn from(c: VcConditions) -> Self {
        Observation {
            temperature: c.temp,
            humidity: c.humidity,
            pressure: c.sealevelpressure.or(c.pressure).map(mbar_to_mmhg),
            wind_speed: c.windspeed.map(kph_to_mps),
            wind_direction: classify(c.winddir),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VcTimelineResponse {
    address: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    current_conditions: VcConditions,
}

#[derive(Debug, Deserialize)]
struct VcHistoryValue {
    temp: Option<f64>,
    humidity: Option<f64>,
    sealevelpressure: Option<f64>,
    wspd: Option<f64>,
    wdir: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct VcHistoryLocation {
    address: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    values: Vec<VcHistoryValue>,
}

#[derive(Debug, Deserialize)]
struct VcHistoryResponse {
    /// Response order is kept; the first entry is the one asked for.
    locations: IndexMap<String, VcHistoryLocation>,
}

#[async_trait]
impl WeatherProvider for VisualCrossingProvider {
    fn id(&self) -> ProviderId {
        ProviderId::VisualCrossing
    }

    async fn current(&self, request: &WeatherRequest) -> Result<ProviderReport, ProviderError> {
        debug!(provider = %self.id(), %request, "requesting current weather");
        let body = self
            .fetch(self.current_request(&self.api_key, &Self::query_for(request))?)
            .await?;
        Self::parse_current(&body)
    }

    async fn past(
        &self,
        request: &WeatherRequest,
        when: NaiveDateTime,
    ) -> Result<ProviderReport, ProviderError> {
        debug!(provider = %self.id(), %request, %when, "requesting past weather");
        let body = self.fetch(self.history_request(&Self::query_for(request), when)?).await?;
        Self::parse_past(&body)
    }

    async fn check_credential(&self, api_key: &str) -> Result<(), ProviderError> {
        let request = self.current_request(api_key, CREDENTIAL_TEST_CITY)?;
        self.fetch(request).await.map(|_| ()).map_err(|err| ProviderError::CredentialInvalid {
            provider: ProviderId::VisualCrossing,
            reason: err.to_string(),
        })
    }

    fn replace_api_key(&mut self, api_key: String) {
        self.api_key = api_key;
    }
}
