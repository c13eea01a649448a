//! Mapping requests and provider geocodes onto stored locations.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::{
    error::StoreError,
    model::{Location, LocationDescriptor, WeatherRequest},
    store::WeatherStore,
};

/// Fetch-or-create over a [`WeatherStore`].
///
/// Every check-then-insert sequence runs under one resolver-wide lock, so two
/// requests discovering the same new place cannot both insert it.
pub struct LocationResolver {
    store: Arc<dyn WeatherStore>,
    lock: Mutex<()>,
}

impl LocationResolver {
    pub fn new(store: Arc<dyn WeatherStore>) -> Self {
        Self { store, lock: Mutex::new(()) }
    }

    /// Look up the location a request is keyed by, without creating anything.
    pub fn find(&self, request: &WeatherRequest) -> Result<Option<Location>, StoreError> {
        match request {
            WeatherRequest::City(name) => self.store.location_by_name(name),
            WeatherRequest::CityCountry { city, country } => {
                self.store.location_by_name_country(city, country)
            }
            WeatherRequest::Coordinates { latitude, longitude } => {
                self.store.location_by_coordinates(*latitude, *longitude)
            }
        }
    }

    /// Register provider geocodes in one pass.
    ///
    /// Descriptors are deduplicated on exact `(name, country)` first. Each is then
    /// matched by name, then by coordinates, and created only when neither hits.
    pub fn resolve_descriptors(
        &self,
        descriptors: &[LocationDescriptor],
    ) -> Result<Vec<Location>, StoreError> {
        let _guard = self.lock.lock();

        let mut seen: Vec<(&Option<String>, &Option<String>)> = Vec::new();
        let mut resolved = Vec::new();
        for descriptor in descriptors {
            let key = (&descriptor.name, &descriptor.country);
            if seen.contains(&key) {
                continue;
            }
            seen.push(key);

            if let Some(location) = self.fetch_or_create(descriptor)? {
                if !resolved.iter().any(|l: &Location| l.id == location.id) {
                    resolved.push(location);
                }
            }
        }
        Ok(resolved)
    }

    /// The location a request's observations are stored under, created if absent.
    ///
    /// A newly created location carries the request's identifying fields, with the
    /// remaining fields filled from the first provider geocode.
    pub fn resolve_request(
        &self,
        request: &WeatherRequest,
        descriptors: &[LocationDescriptor],
    ) -> Result<Location, StoreError> {
        let _guard = self.lock.lock();

        if let Some(location) = self.find(request)? {
            return Ok(location);
        }

        let mut fields = request.key_descriptor();
        if let Some(geocode) = descriptors.first() {
            fields.name = fields.name.or_else(|| geocode.name.clone());
            fields.country = fields.country.or_else(|| geocode.country.clone());
            if !fields.has_coordinates() && geocode.has_coordinates() {
                fields.latitude = geocode.latitude;
                fields.longitude = geocode.longitude;
            }
        }
        self.store.create_location(&fields)
    }

    fn fetch_or_create(
        &self,
        descriptor: &LocationDescriptor,
    ) -> Result<Option<Location>, StoreError> {
        if let Some(name) = &descriptor.name {
            if let Some(location) = self.store.location_by_name(name)? {
                return Ok(Some(location));
            }
        }

        if let (Some(lat), Some(lon)) = (descriptor.latitude, descriptor.longitude) {
            // Catches spelling variants of the same place ("Kazan" / "Kazan'").
            if let Some(location) = self.store.location_by_coordinates(lat, lon)? {
                return Ok(Some(location));
            }
        }

        if descriptor.name.is_none() && !descriptor.has_coordinates() {
            return Ok(None);
        }

        self.store.create_location(descriptor).map(Some)
    }
}
