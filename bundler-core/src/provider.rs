use crate::{
    Config,
    error::ProviderError,
    model::{LocationDescriptor, Observation, WeatherRequest},
    provider::{
        openweather::OpenWeatherProvider, visualcrossing::VisualCrossingProvider,
        weatherapi::WeatherApiProvider, weatherstack::WeatherStackProvider,
    },
};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::{Client, RequestBuilder, StatusCode};
use std::{convert::TryFrom, fmt::Debug, time::Duration};
use tracing::{info, warn};

pub mod openweather;
pub mod visualcrossing;
pub mod weatherapi;
pub mod weatherstack;

/// City used to probe a candidate credential.
pub const CREDENTIAL_TEST_CITY: &str = "Moscow";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenWeather,
    WeatherApi,
    WeatherStack,
    VisualCrossing,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenWeather => "openweather",
            ProviderId::WeatherApi => "weatherapi",
            ProviderId::WeatherStack => "weatherstack",
            ProviderId::VisualCrossing => "visualcrossing",
        }
    }

    /// Environment variable that overrides the configured API key.
    pub fn token_env_var(&self) -> &'static str {
        match self {
            ProviderId::OpenWeather => "OWM_TOKEN",
            ProviderId::WeatherApi => "WAPI_TOKEN",
            ProviderId::WeatherStack => "WSTACK_TOKEN",
            ProviderId::VisualCrossing => "VC_TOKEN",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[
            ProviderId::OpenWeather,
            ProviderId::WeatherApi,
            ProviderId::WeatherStack,
            ProviderId::VisualCrossing,
        ]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "openweather" => Ok(ProviderId::OpenWeather),
            "weatherapi" => Ok(ProviderId::WeatherApi),
            "weatherstack" => Ok(ProviderId::WeatherStack),
            "visualcrossing" => Ok(ProviderId::VisualCrossing),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: openweather, weatherapi, \
                 weatherstack, visualcrossing."
            )),
        }
    }
}

/// A normalized observation plus whatever place the provider geocoded the query to.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProviderReport {
    pub observation: Observation,
    pub location: Option<LocationDescriptor>,
}

#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    fn id(&self) -> ProviderId;

    /// Current conditions for the requested place.
    async fn current(&self, request: &WeatherRequest) -> Result<ProviderReport, ProviderError>;

    /// Issue the probe request with `api_key` and report whether the provider accepted it.
    async fn check_credential(&self, api_key: &str) -> Result<(), ProviderError>;

    /// Unconditionally swap the stored API key.
    fn replace_api_key(&mut self, api_key: String);

    async fn current_by_city(&self, city: &str) -> Result<ProviderReport, ProviderError> {
        self.current(&WeatherRequest::city(city)).await
    }

    async fn current_by_city_country(
        &self,
        city: &str,
        country: &str,
    ) -> Result<ProviderReport, ProviderError> {
        self.current(&WeatherRequest::city_country(city, country)).await
    }

    async fn current_by_coordinates(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<ProviderReport, ProviderError> {
        self.current(&WeatherRequest::coordinates(latitude, longitude)).await
    }

    /// Observation at a past moment; only providers with a history API support this.
    async fn past(
        &self,
        _request: &WeatherRequest,
        _when: NaiveDateTime,
    ) -> Result<ProviderReport, ProviderError> {
        Err(ProviderError::Unsupported { provider: self.id(), operation: "historical lookups" })
    }

    /// Validate `api_key` and keep it only if the provider accepts it.
    async fn set_credential(&mut self, api_key: &str) -> bool {
        match self.check_credential(api_key).await {
            Ok(()) => {
                self.replace_api_key(api_key.to_owned());
                info!(provider = %self.id(), "credential changed");
                true
            }
            Err(err) => {
                warn!(provider = %self.id(), error = %err, "credential unchanged");
                false
            }
        }
    }
}

/// Build the HTTP client shared by every adapter.
pub fn http_client(config: &Config) -> anyhow::Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {e}"))
}

/// Construct a provider from config and explicit ProviderId.
pub fn provider_from_config(
    id: ProviderId,
    config: &Config,
    http: &Client,
) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let api_key = config.provider_api_key(id).ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured for provider '{id}'.\n\
                 Hint: run `weather configure {id}` and enter your API key."
        )
    })?;
    let api_key = api_key.to_owned();
    let http = http.clone();

    let boxed: Box<dyn WeatherProvider> = match id {
        ProviderId::OpenWeather => Box::new(OpenWeatherProvider::new(api_key).with_client(http)),
        ProviderId::WeatherApi => Box::new(WeatherApiProvider::new(api_key).with_client(http)),
        ProviderId::WeatherStack => Box::new(WeatherStackProvider::new(api_key).with_client(http)),
        ProviderId::VisualCrossing => {
            Box::new(VisualCrossingProvider::new(api_key).with_client(http))
        }
    };

    Ok(boxed)
}

/// Every provider that has an API key configured, in `ProviderId::all()` order.
pub fn providers_from_config(
    config: &Config,
    http: &Client,
) -> anyhow::Result<Vec<Box<dyn WeatherProvider>>> {
    let providers = ProviderId::all()
        .iter()
        .filter(|id| config.is_provider_configured(**id))
        .map(|id| provider_from_config(*id, config, http))
        .collect::<anyhow::Result<Vec<_>>>()?;

    if providers.is_empty() {
        return Err(anyhow::anyhow!(
            "No providers configured.\n\
             Hint: run `weather configure <provider>` (e.g. `weather configure openweather`) first."
        ));
    }

    Ok(providers)
}

/// Send `request` and return the status with the full body text.
pub(crate) async fn fetch_body(
    provider: ProviderId,
    request: RequestBuilder,
) -> Result<(StatusCode, String), ProviderError> {
    let res = request
        .send()
        .await
        .map_err(|source| ProviderError::Unreachable { provider, source })?;

    let status = res.status();
    let body = res
        .text()
        .await
        .map_err(|source| ProviderError::Unreachable { provider, source })?;

    Ok((status, body))
}

pub(crate) fn malformed(provider: ProviderId, err: impl std::fmt::Display) -> ProviderError {
    ProviderError::Malformed { provider, message: err.to_string() }
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let cut = (0..=MAX).rev().find(|i| body.is_char_boundary(*i)).unwrap_or(0);
        format!("{}...", &body[..cut])
    } else {
        body.to_string()
    }
}
