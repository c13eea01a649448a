//! Periodic upkeep: dropping old observations and re-fetching every known place.

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::{
    bucket::bucket_start,
    bundler::{Bundler, Source},
    error::StoreError,
    model::{Location, WeatherRequest},
    store::WeatherStore,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSummary {
    pub fetched_live: usize,
    pub served_from_cache: usize,
    pub skipped: usize,
}

/// Delete observations `retention_days` or more older than the current bucket.
pub fn prune(
    store: &dyn WeatherStore,
    now: DateTime<Utc>,
    bucket_hours: u32,
    retention_days: i64,
) -> Result<usize, StoreError> {
    let cutoff = bucket_start(now, bucket_hours) - Duration::days(retention_days);
    let removed = store.prune_observations_before(cutoff)?;
    info!(%cutoff, removed, "pruned old observations");
    Ok(removed)
}

/// The request that best identifies a stored location, if any.
pub fn request_for(location: &Location) -> Option<WeatherRequest> {
    match (&location.name, &location.country, location.latitude, location.longitude) {
        (Some(name), Some(country), _, _) => Some(WeatherRequest::city_country(name, country)),
        (Some(name), None, _, _) => Some(WeatherRequest::city(name)),
        (None, _, Some(lat), Some(lon)) => Some(WeatherRequest::coordinates(lat, lon)),
        _ => None,
    }
}

/// Bring every known location up to date for the bucket containing `now`.
pub async fn refresh_all(bundler: &Bundler, now: DateTime<Utc>) -> Result<RefreshSummary, StoreError> {
    let locations = bundler.store().locations()?;
    let mut summary = RefreshSummary::default();

    for location in &locations {
        let Some(request) = request_for(location) else {
            warn!(location_id = location.id, "location has neither name nor coordinates; skipped");
            summary.skipped += 1;
            continue;
        };

        match bundler.current_at(&request, now).await.source {
            Source::Live => summary.fetched_live += 1,
            Source::Cache => summary.served_from_cache += 1,
        }
    }

    info!(
        locations = locations.len(),
        live = summary.fetched_live,
        cached = summary.served_from_cache,
        "refresh finished"
    );
    Ok(summary)
}
