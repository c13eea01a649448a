use std::sync::Arc;

use anyhow::{Context, bail};
use bundler_core::{
    Bundler, Config, ProviderId, SqliteStore, WeatherRequest,
    maintenance::{prune, refresh_all},
    provider::{http_client, provider_from_config},
};
use chrono::{NaiveDateTime, Utc};
use clap::{Args, Parser, Subcommand};
use inquire::{Confirm, Password};
use tracing::info;

use crate::output;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Current weather merged from several providers")]
pub struct Cli {
    /// Log progress to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name, e.g. "openweather" or "visualcrossing".
        provider: String,
    },

    /// Show current weather, from cache when the current bucket is already stored.
    Show {
        #[command(flatten)]
        place: PlaceArgs,

        /// Also list every provider's (or stored row's) observation.
        #[arg(long)]
        all: bool,
    },

    /// Show a past observation (providers with a history API only).
    History {
        #[command(flatten)]
        place: PlaceArgs,

        /// Moment to look up, e.g. 2025-07-01T12:00:00.
        #[arg(long)]
        date: String,
    },

    /// Drop old observations, then refresh every known location.
    Refresh,

    /// Drop observations older than the retention window.
    Prune,
}

#[derive(Debug, Clone, Args)]
pub struct PlaceArgs {
    /// City name.
    #[arg(long)]
    pub city: Option<String>,

    /// Country, used together with --city.
    #[arg(long, requires = "city")]
    pub country: Option<String>,

    /// Latitude in degrees.
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    pub lat: Option<f64>,

    /// Longitude in degrees.
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    pub lon: Option<f64>,
}

impl PlaceArgs {
    /// City wins over coordinates when both are given.
    pub fn to_request(&self) -> anyhow::Result<WeatherRequest> {
        match (&self.city, &self.country, self.lat, self.lon) {
            (Some(city), Some(country), _, _) => Ok(WeatherRequest::city_country(city, country)),
            (Some(city), None, _, _) => Ok(WeatherRequest::city(city)),
            (None, _, Some(lat), Some(lon)) => Ok(WeatherRequest::coordinates(lat, lon)),
            _ => bail!("Specify a place with --city [--country] or --lat and --lon."),
        }
    }
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { provider } => configure(&provider).await,
            Command::Show { place, all } => {
                let request = place.to_request()?;
                let bundler = open_bundler()?;
                let bundle = bundler.current(&request).await;
                print!("{}", output::render_bundle(&request, &bundle, all));
                Ok(())
            }
            Command::History { place, date } => {
                let request = place.to_request()?;
                let when = parse_date(&date)?;
                let bundler = open_bundler()?;
                let report = bundler.past(&request, when).await;
                print!("{}", output::render_past(&request, when, &report));
                Ok(())
            }
            Command::Refresh => {
                let config = Config::load()?;
                let bundler = open_bundler_with(&config)?;
                let removed =
                    prune(bundler.store().as_ref(), Utc::now(), config.bucket_hours, config.retention_days)?;
                let summary = refresh_all(&bundler, Utc::now()).await?;
                println!(
                    "Removed {removed} old observation(s). Refreshed {} location(s) live, \
                     {} already current, {} skipped.",
                    summary.fetched_live, summary.served_from_cache, summary.skipped
                );
                Ok(())
            }
            Command::Prune => {
                let config = Config::load()?;
                let store = open_store(&config)?;
                let removed =
                    prune(&store, Utc::now(), config.bucket_hours, config.retention_days)?;
                println!("Removed {removed} old observation(s).");
                Ok(())
            }
        }
    }
}

async fn configure(provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    // Env overrides must not end up in the saved file.
    let path = Config::config_file_path()?;
    let mut config = Config::load_from(&path)?;

    let api_key = Password::new(&format!("API key for {id}:"))
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    let api_key = api_key.trim().to_string();
    if api_key.is_empty() {
        bail!("API key must not be empty");
    }

    let http = http_client(&config)?;
    let mut probe = config.clone();
    probe.upsert_provider_api_key(id, api_key.clone());
    let adapter = provider_from_config(id, &probe, &http)?;

    if let Err(err) = adapter.check_credential(&api_key).await {
        eprintln!("Warning: {err}");
        let keep = Confirm::new("Save this key anyway?")
            .with_default(false)
            .prompt()
            .context("Failed to read confirmation")?;
        if !keep {
            println!("Credential for {id} left unchanged.");
            return Ok(());
        }
    }

    config.upsert_provider_api_key(id, api_key);
    config.save_to(&path)?;
    info!(provider = %id, path = %path.display(), "credential saved");
    println!("Saved credential for {id} to {}", path.display());
    Ok(())
}

fn parse_date(raw: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| {
            chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
        .with_context(|| format!("Invalid date '{raw}', expected YYYY-MM-DD[THH:MM:SS]"))
}

fn open_store(config: &Config) -> anyhow::Result<SqliteStore> {
    let path = config.database_path()?;
    SqliteStore::open(&path).with_context(|| format!("Failed to open database: {}", path.display()))
}

fn open_bundler_with(config: &Config) -> anyhow::Result<Bundler> {
    let store = Arc::new(open_store(config)?);
    let bundler = Bundler::from_config(config, store)?;
    info!(
        providers = ?bundler.provider_ids(),
        bucket_hours = bundler.bucket_hours(),
        "bundler ready"
    );
    Ok(bundler)
}

fn open_bundler() -> anyhow::Result<Bundler> {
    open_bundler_with(&Config::load()?)
}
