//! Adapter tests against a mock HTTP server.

use bundler_core::{
    ProviderError, ProviderId, WeatherProvider, WeatherRequest, WindDirection,
    provider::{
        openweather::OpenWeatherProvider, visualcrossing::VisualCrossingProvider,
        weatherapi::WeatherApiProvider, weatherstack::WeatherStackProvider,
    },
};
use chrono::NaiveDate;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn owm_body() -> serde_json::Value {
    json!({
        "coord": {"lon": 37.6156, "lat": 55.7522},
        "main": {"temp": 295.15, "pressure": 1000, "humidity": 40},
        "wind": {"speed": 3.0, "deg": 90},
        "sys": {"country": "RU"},
        "name": "Moscow"
    })
}

#[tokio::test]
async fn openweather_current_by_city() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("q", "Moscow"))
        .and(query_param("appid", "KEY"))
        .respond_with(ResponseTemplate::new(200).set_body_json(owm_body()))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenWeatherProvider::new("KEY".into()).with_base_url(server.uri());
    let report = provider.current_by_city("Moscow").await.expect("success");

    assert!((report.observation.temperature.expect("temp") - 22.0).abs() < 1e-9);
    assert_eq!(report.observation.pressure, Some(750.0));
    assert_eq!(report.observation.wind_direction, WindDirection::E);
    assert_eq!(report.location.and_then(|l| l.name).as_deref(), Some("Moscow"));
}

#[tokio::test]
async fn openweather_coordinates_and_state_queries() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("lat", "55.75"))
        .and(query_param("lon", "37.62"))
        .respond_with(ResponseTemplate::new(200).set_body_json(owm_body()))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("q", "Austin,TX,US"))
        .respond_with(ResponseTemplate::new(200).set_body_json(owm_body()))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenWeatherProvider::new("KEY".into()).with_base_url(server.uri());
    assert!(provider.current_by_coordinates(55.75, 37.62).await.is_ok());
    assert!(provider.current_by_city_state_country("Austin", "TX", "US").await.is_ok());
}

#[tokio::test]
async fn openweather_non_200_is_a_status_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "cod": "404", "message": "city not found"
        })))
        .mount(&server)
        .await;

    let provider = OpenWeatherProvider::new("KEY".into()).with_base_url(server.uri());
    let err = provider.current_by_city("Atlantis").await.unwrap_err();

    match err {
        ProviderError::Status { provider, status, message } => {
            assert_eq!(provider, ProviderId::OpenWeather);
            assert_eq!(status, 404);
            assert!(message.contains("city not found"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn weatherapi_reports_error_message_from_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/current.json"))
        .and(query_param("aqi", "no"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": 1006, "message": "No matching location found."}
        })))
        .mount(&server)
        .await;

    let provider = WeatherApiProvider::new("KEY".into()).with_base_url(server.uri());
    let err = provider.current_by_city("Atlantis").await.unwrap_err();
    assert!(err.to_string().contains("No matching location found."));
}

#[tokio::test]
async fn weatherapi_city_country_query() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/current.json"))
        .and(query_param("q", "Paris,France"))
        .and(query_param("key", "KEY"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "location": {"name": "Paris", "country": "France", "lat": 48.87, "lon": 2.33},
            "current": {"temp_c": 9.0, "humidity": 70, "pressure_mb": 1020.0,
                        "wind_kph": 7.2, "wind_degree": 180}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = WeatherApiProvider::new("KEY".into()).with_base_url(server.uri());
    let report = provider.current_by_city_country("Paris", "France").await.expect("success");
    assert_eq!(report.observation.wind_direction, WindDirection::S);
    assert!((report.observation.wind_speed.expect("wind") - 2.0).abs() < 1e-9);
}

#[tokio::test]
async fn weatherstack_success_false_with_200_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/current"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "error": {"code": 101, "type": "invalid_access_key",
                      "info": "You have not supplied a valid API Access Key."}
        })))
        .mount(&server)
        .await;

    let provider = WeatherStackProvider::new("BAD".into()).with_base_url(server.uri());
    let err = provider.current_by_city("Moscow").await.unwrap_err();
    assert!(matches!(err, ProviderError::Status { status: 200, .. }));
    assert!(err.to_string().contains("valid API Access Key"));
}

#[tokio::test]
async fn visualcrossing_timeline_path_carries_the_query() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/VisualCrossingWebServices/rest/services/timeline/55.75,37.62"))
        .and(query_param("unitGroup", "metric"))
        .and(query_param("include", "current"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "latitude": 55.75, "longitude": 37.62, "address": "55.75,37.62",
            "currentConditions": {"temp": 1.0, "humidity": 80.0, "sealevelpressure": 1004.0,
                                  "windspeed": 3.6, "winddir": 0.0}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = VisualCrossingProvider::new("KEY".into()).with_base_url(server.uri());
    let report = provider.current_by_coordinates(55.75, 37.62).await.expect("success");
    assert_eq!(report.observation.pressure, Some(753.0));
    assert_eq!(report.observation.wind_direction, WindDirection::None);
}

#[tokio::test]
async fn visualcrossing_history_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/VisualCrossingWebServices/rest/services/weatherdata/history"))
        .and(query_param("startDateTime", "2025-07-01T12:00:00"))
        .and(query_param("endDateTime", "2025-07-01T12:00:00"))
        .and(query_param("aggregateHours", "24"))
        .and(query_param("location", "Kazan,Russia"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "locations": {"Kazan,Russia": {
                "address": "Kazan,Russia", "latitude": 55.79, "longitude": 49.12,
                "values": [{"temp": 24.0, "humidity": 55.0, "sealevelpressure": 1010.0,
                            "wspd": 14.4, "wdir": 270.0}]
            }}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let when = NaiveDate::from_ymd_opt(2025, 7, 1)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .expect("valid date");
    let provider = VisualCrossingProvider::new("KEY".into()).with_base_url(server.uri());
    let report = provider.past_by_city_country("Kazan", "Russia", when).await.expect("success");

    assert_eq!(report.observation.temperature, Some(24.0));
    assert!((report.observation.wind_speed.expect("wind") - 4.0).abs() < 1e-9);
    assert_eq!(report.observation.wind_direction, WindDirection::W);
}

#[tokio::test]
async fn other_providers_do_not_offer_history() {
    let provider = WeatherApiProvider::new("KEY".into()).with_base_url("http://127.0.0.1:9");
    let when = NaiveDate::from_ymd_opt(2025, 7, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("valid date");

    let err = provider.past(&WeatherRequest::city("Kazan"), when).await.unwrap_err();
    assert!(matches!(err, ProviderError::Unsupported { .. }));
}

#[tokio::test]
async fn set_credential_keeps_previous_key_when_probe_fails() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("appid", "NEW"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"cod": 401})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("q", "Moscow"))
        .and(query_param("appid", "OLD"))
        .respond_with(ResponseTemplate::new(200).set_body_json(owm_body()))
        .expect(1)
        .mount(&server)
        .await;

    let mut provider = OpenWeatherProvider::new("OLD".into()).with_base_url(server.uri());
    assert!(!provider.set_credential("NEW").await);

    // Still talking with the old key.
    assert!(provider.current_by_city("Moscow").await.is_ok());
}

#[tokio::test]
async fn set_credential_installs_accepted_key() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/current.json"))
        .and(query_param("key", "NEW"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "current": {"temp_c": 1.0}
        })))
        .expect(2)
        .mount(&server)
        .await;

    let mut provider = WeatherApiProvider::new("OLD".into()).with_base_url(server.uri());
    assert!(provider.set_credential("NEW").await);
    assert!(provider.current_by_city("Moscow").await.is_ok());
}

#[tokio::test]
async fn unreachable_server_is_reported() {
    let provider = WeatherStackProvider::new("KEY".into()).with_base_url("http://127.0.0.1:9");
    let err = provider.current_by_city("Moscow").await.unwrap_err();
    assert!(matches!(err, ProviderError::Unreachable { provider: ProviderId::WeatherStack, .. }));
}
