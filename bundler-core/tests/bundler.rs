//! End-to-end: four adapters on a mock server, SQLite in memory.

use std::sync::Arc;

use bundler_core::{
    Bundler, ProviderId, Source, SqliteStore, WeatherProvider, WeatherRequest, WeatherStore,
    WindDirection,
    provider::{
        openweather::OpenWeatherProvider, visualcrossing::VisualCrossingProvider,
        weatherapi::WeatherApiProvider, weatherstack::WeatherStackProvider,
    },
};
use chrono::{TimeZone, Utc};
use serde_json::json;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_providers(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "coord": {"lon": 37.6156, "lat": 55.7522},
            "main": {"temp": 295.15, "pressure": 1000, "humidity": 40},
            "wind": {"speed": 2.0, "deg": 45},
            "sys": {"country": "RU"},
            "name": "Moscow"
        })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/current.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "location": {"name": "Moscow", "country": "Russia", "lat": 55.75, "lon": 37.62},
            "current": {"temp_c": 20.0, "humidity": 60, "pressure_mb": 1004.0,
                        "wind_kph": 14.4, "wind_degree": 50}
        })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/current"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/VisualCrossingWebServices/rest/services/timeline/.+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "latitude": 55.7504, "longitude": 37.6175, "address": "Moscow",
            "currentConditions": {"temp": 24.0, "windspeed": 10.8, "winddir": 200.0}
        })))
        .expect(1)
        .mount(server)
        .await;
}

fn providers(base: &str) -> Vec<Box<dyn WeatherProvider>> {
    vec![
        Box::new(OpenWeatherProvider::new("K".into()).with_base_url(base)),
        Box::new(WeatherApiProvider::new("K".into()).with_base_url(base)),
        Box::new(WeatherStackProvider::new("K".into()).with_base_url(base)),
        Box::new(VisualCrossingProvider::new("K".into()).with_base_url(base)),
    ]
}

#[tokio::test]
async fn live_fetch_then_cache_hit() {
    let server = MockServer::start().await;
    mount_providers(&server).await;

    let store = Arc::new(SqliteStore::in_memory().expect("store"));
    let bundler = Bundler::new(providers(&server.uri()), store.clone());
    let now = Utc.with_ymd_and_hms(2026, 4, 2, 9, 15, 0).single().expect("valid date");
    let request = WeatherRequest::city("Moscow");

    let live = bundler.current_at(&request, now).await;

    assert_eq!(live.source, Source::Live);
    assert_eq!(live.observations.len(), 4);
    assert_eq!(live.failures.len(), 1);
    assert_eq!(live.failures[0].provider(), ProviderId::WeatherStack);
    // 22, 20 and 24 °C from the three healthy providers.
    assert!((live.merged.temperature.expect("temp") - 22.0).abs() < 1e-9);
    assert_eq!(live.merged.humidity, Some(50.0));
    assert_eq!(live.merged.pressure, Some(751.5));
    assert_eq!(live.merged.wind_direction, WindDirection::NE);

    let location = live.location.expect("location");
    assert_eq!(location.name.as_deref(), Some("Moscow"));
    assert_eq!(store.locations().expect("list").len(), 1);

    let cached = bundler.current_at(&request, now + chrono::Duration::hours(2)).await;
    assert_eq!(cached.source, Source::Cache);
    assert_eq!(cached.observations.len(), 3);
    assert_eq!(cached.merged.temperature, live.merged.temperature);
    assert_eq!(cached.merged.wind_direction, WindDirection::NE);
    assert_eq!(cached.location.map(|l| l.id), Some(location.id));
}

#[tokio::test]
async fn country_code_and_country_name_resolve_to_one_location() {
    let server = MockServer::start().await;
    mount_providers(&server).await;

    let store = Arc::new(SqliteStore::in_memory().expect("store"));
    let bundler = Bundler::new(providers(&server.uri()), store.clone());
    let now = Utc.with_ymd_and_hms(2026, 4, 2, 9, 15, 0).single().expect("valid date");

    // OpenWeather answers with "RU", WeatherAPI with "Russia".
    let live = bundler.current_at(&WeatherRequest::city_country("Moscow", "Russia"), now).await;
    assert_eq!(live.source, Source::Live);

    let locations = store.locations().expect("list");
    assert_eq!(locations.len(), 1);
    assert_eq!(locations[0].name.as_deref(), Some("Moscow"));
    assert_eq!(locations[0].country.as_deref(), Some("Russia"));
}
