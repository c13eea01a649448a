//! Cache-or-fetch orchestration over every configured provider.

use chrono::{DateTime, NaiveDateTime, Utc};
use futures::future::join_all;
use std::{sync::Arc, time::Duration};
use tracing::{debug, error, info, warn};

use crate::{
    Config,
    bucket::{DEFAULT_BUCKET_HOURS, bucket_start},
    error::ProviderError,
    location::LocationResolver,
    merge::merge,
    model::{Location, LocationDescriptor, Observation, PersistedObservation, WeatherRequest},
    provider::{ProviderId, ProviderReport, WeatherProvider, http_client, providers_from_config},
    store::WeatherStore,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Served from rows stored for the current bucket; no provider was called.
    Cache,
    Live,
}

/// Result of one request.
#[derive(Debug)]
pub struct Bundle {
    pub merged: Observation,
    /// Per-provider observations (live) or per-row observations (cache).
    pub observations: Vec<Observation>,
    pub location: Option<Location>,
    pub source: Source,
    /// Providers that failed during a live fetch.
    pub failures: Vec<ProviderError>,
}

pub struct Bundler {
    providers: Vec<Box<dyn WeatherProvider>>,
    store: Arc<dyn WeatherStore>,
    resolver: Arc<LocationResolver>,
    bucket_hours: u32,
    timeout: Duration,
}

impl Bundler {
    pub fn new(providers: Vec<Box<dyn WeatherProvider>>, store: Arc<dyn WeatherStore>) -> Self {
        Self {
            providers,
            resolver: Arc::new(LocationResolver::new(store.clone())),
            store,
            bucket_hours: DEFAULT_BUCKET_HOURS,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Every configured provider, sharing one HTTP client.
    pub fn from_config(config: &Config, store: Arc<dyn WeatherStore>) -> anyhow::Result<Self> {
        let http = http_client(config)?;
        let providers = providers_from_config(config, &http)?;
        Ok(Self::new(providers, store)
            .with_bucket_hours(config.bucket_hours)
            .with_timeout(Duration::from_secs(config.request_timeout_secs)))
    }

    pub fn with_bucket_hours(mut self, hours: u32) -> Self {
        self.bucket_hours = hours.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn bucket_hours(&self) -> u32 {
        self.bucket_hours
    }

    pub fn store(&self) -> &Arc<dyn WeatherStore> {
        &self.store
    }

    pub fn provider_ids(&self) -> Vec<ProviderId> {
        self.providers.iter().map(|p| p.id()).collect()
    }

    pub async fn current_by_city(&self, city: &str) -> Bundle {
        self.current(&WeatherRequest::city(city)).await
    }

    pub async fn current_by_city_country(&self, city: &str, country: &str) -> Bundle {
        self.current(&WeatherRequest::city_country(city, country)).await
    }

    pub async fn current_by_coordinates(&self, latitude: f64, longitude: f64) -> Bundle {
        self.current(&WeatherRequest::coordinates(latitude, longitude)).await
    }

    pub async fn current(&self, request: &WeatherRequest) -> Bundle {
        self.current_at(request, Utc::now()).await
    }

    /// Serve `request` as of `now`: stored rows for the bucket if any, otherwise a live fetch.
    pub async fn current_at(&self, request: &WeatherRequest, now: DateTime<Utc>) -> Bundle {
        let bucket = bucket_start(now, self.bucket_hours);

        if let Some(bundle) = self.cached(request, bucket).await {
            return bundle;
        }

        self.fetch_live(request, bucket).await
    }

    /// Validate and install a new credential for `provider`.
    pub async fn set_credential(&mut self, provider: ProviderId, api_key: &str) -> bool {
        match self.providers.iter_mut().find(|p| p.id() == provider) {
            Some(adapter) => adapter.set_credential(api_key).await,
            None => {
                warn!(%provider, "provider is not configured; credential ignored");
                false
            }
        }
    }

    /// Past observation from the first provider with a history API. Never cached.
    pub async fn past(&self, request: &WeatherRequest, when: NaiveDateTime) -> ProviderReport {
        for provider in &self.providers {
            match provider.past(request, when).await {
                Ok(report) => return report,
                Err(ProviderError::Unsupported { .. }) => continue,
                Err(err) => {
                    error!(provider = %provider.id(), error = %err, %request, "past weather lookup failed");
                    return ProviderReport::default();
                }
            }
        }

        warn!(%request, "no configured provider supports historical lookups");
        ProviderReport::default()
    }

    async fn cached(&self, request: &WeatherRequest, bucket: DateTime<Utc>) -> Option<Bundle> {
        let resolver = self.resolver.clone();
        let store = self.store.clone();
        let request = request.clone();

        tokio::task::spawn_blocking(move || lookup_cached(&resolver, store.as_ref(), &request, bucket))
            .await
            .unwrap_or_else(|err| {
                error!(error = %err, "cache lookup task failed; fetching live");
                None
            })
    }

    async fn fetch_live(&self, request: &WeatherRequest, bucket: DateTime<Utc>) -> Bundle {
        info!(%request, providers = self.providers.len(), "fetching live observations");

        let calls = self.providers.iter().map(|p| self.call_provider(p.as_ref(), request));
        let results = join_all(calls).await;

        let mut observations = Vec::with_capacity(results.len());
        let mut descriptors = Vec::new();
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(report) => {
                    observations.push(report.observation);
                    descriptors.extend(report.location);
                }
                Err(err) => {
                    observations.push(Observation::empty());
                    failures.push(err);
                }
            }
        }

        let location = self.persist(request, descriptors, &observations, bucket).await;

        Bundle {
            merged: merge(&observations),
            observations,
            location,
            source: Source::Live,
            failures,
        }
    }

    async fn call_provider(
        &self,
        provider: &dyn WeatherProvider,
        request: &WeatherRequest,
    ) -> Result<ProviderReport, ProviderError> {
        let id = provider.id();
        let result = match tokio::time::timeout(self.timeout, provider.current(request)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout { provider: id, secs: self.timeout.as_secs() }),
        };

        if let Err(err) = &result {
            error!(provider = %id, %request, error = %err, "provider failed");
        }
        result
    }

    /// Store the non-empty observations under the request's location. Best effort.
    async fn persist(
        &self,
        request: &WeatherRequest,
        descriptors: Vec<LocationDescriptor>,
        observations: &[Observation],
        bucket: DateTime<Utc>,
    ) -> Option<Location> {
        let resolver = self.resolver.clone();
        let store = self.store.clone();
        let request = request.clone();
        let observations = observations.to_vec();

        tokio::task::spawn_blocking(move || {
            store_observations(&resolver, store.as_ref(), &request, &descriptors, &observations, bucket)
        })
        .await
        .unwrap_or_else(|err| {
            error!(error = %err, "persist task failed; observations not stored");
            None
        })
    }
}

fn lookup_cached(
    resolver: &LocationResolver,
    store: &dyn WeatherStore,
    request: &WeatherRequest,
    bucket: DateTime<Utc>,
) -> Option<Bundle> {
    let location = match resolver.find(request) {
        Ok(Some(location)) => location,
        Ok(None) => {
            debug!(%request, "location unknown; fetching live");
            return None;
        }
        Err(err) => {
            error!(%request, error = %err, "location lookup failed; fetching live");
            return None;
        }
    };

    let rows = match store.observations_at(location.id, bucket) {
        Ok(rows) => rows,
        Err(err) => {
            error!(location_id = location.id, error = %err, "observation lookup failed");
            return None;
        }
    };

    if rows.is_empty() {
        debug!(location_id = location.id, %bucket, "no observations in bucket; fetching live");
        return None;
    }

    info!(location_id = location.id, %bucket, rows = rows.len(), "serving cached observations");
    Some(Bundle {
        merged: merge(&rows),
        observations: rows,
        location: Some(location),
        source: Source::Cache,
        failures: Vec::new(),
    })
}

/// Blocking half of [`Bundler::persist`]: resolve locations, then write the rows in one batch.
fn store_observations(
    resolver: &LocationResolver,
    store: &dyn WeatherStore,
    request: &WeatherRequest,
    descriptors: &[LocationDescriptor],
    observations: &[Observation],
    bucket: DateTime<Utc>,
) -> Option<Location> {
    let non_empty: Vec<&Observation> = observations.iter().filter(|o| !o.is_empty()).collect();

    if non_empty.is_empty() {
        warn!(%request, "every provider came back empty; nothing to store");
        return resolver.find(request).unwrap_or_else(|err| {
            error!(%request, error = %err, "location lookup failed");
            None
        });
    }

    let location = match resolver.resolve_request(request, descriptors) {
        Ok(location) => location,
        Err(err) => {
            error!(%request, error = %err, "failed to resolve location; observations not stored");
            return None;
        }
    };

    // After the request's own location, so geocodes naming the same place land on it.
    if let Err(err) = resolver.resolve_descriptors(descriptors) {
        error!(%request, error = %err, "failed to register provider locations");
    }

    let rows: Vec<PersistedObservation> = non_empty
        .into_iter()
        .map(|observation| PersistedObservation {
            location_id: location.id,
            bucket,
            observation: *observation,
        })
        .collect();

    match store.insert_observations(&rows) {
        Ok(()) => {
            debug!(location_id = location.id, %bucket, rows = rows.len(), "observations stored")
        }
        Err(err) => error!(location_id = location.id, error = %err, "failed to store observations"),
    }

    Some(location)
}
