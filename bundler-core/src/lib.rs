//! Core library for the `weather` bundler.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Adapters over several third-party weather providers, normalizing their units
//! - Field-wise merging of per-provider observations
//! - A SQLite cache keyed by location and a coarse time bucket
//!
//! It is used by `bundler-cli`, but can also be reused by other binaries or services.

pub mod bucket;
pub mod bundler;
pub mod config;
pub mod error;
pub mod location;
pub mod maintenance;
pub mod merge;
pub mod model;
pub mod provider;
pub mod store;
pub mod units;
pub mod wind;

pub use bundler::{Bundle, Bundler, Source};
pub use config::{Config, ProviderConfig};
pub use error::{ProviderError, StoreError};
pub use model::{
    Location, LocationDescriptor, Observation, PersistedObservation, WeatherRequest, WindDirection,
};
pub use provider::{ProviderId, ProviderReport, WeatherProvider};
pub use store::{SqliteStore, WeatherStore};
