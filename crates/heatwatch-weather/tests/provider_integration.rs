//! Integration tests for resolution and aggregation using wiremock.
//!
//! These run the resolver, aggregator and reading store together against a
//! mock provider.

use std::sync::Arc;

use heatwatch_weather::{
    fetch_all, heat_map, LocationQuery, LocationResolver, ReadingStore, Severity, WeatherClient,
    WeatherError,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to create a single search candidate
fn candidate(key: &str, name: &str, country: &str) -> serde_json::Value {
    serde_json::json!([{
        "Key": key,
        "LocalizedName": name,
        "Country": {"ID": "XX", "LocalizedName": country},
        "GeoPosition": {"Latitude": 40.0, "Longitude": 3.0}
    }])
}

fn current(temp: f64, text: &str) -> serde_json::Value {
    serde_json::json!([{
        "LocalObservationDateTime": "2024-07-15T14:00:00+02:00",
        "EpochTime": 1721044800,
        "WeatherText": text,
        "Temperature": {"Metric": {"Value": temp, "Unit": "C"}},
        "RealFeelTemperature": {"Metric": {"Value": temp + 2.0, "Unit": "C"}},
        "RelativeHumidity": 20
    }])
}

async fn mount_city(server: &MockServer, query: &str, key: &str, name: &str, country: &str) {
    Mock::given(method("GET"))
        .and(path("/locations/v1/cities/search"))
        .and(query_param("q", query))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate(key, name, country)))
        .mount(server)
        .await;
}

async fn mount_current(server: &MockServer, key: &str, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(format!("/currentconditions/v1/{}", key)))
        .and(query_param("apikey", "test-key"))
        .respond_with(template)
        .mount(server)
        .await;
}

fn client_for(server: &MockServer) -> Arc<WeatherClient> {
    Arc::new(WeatherClient::with_base_url(Some("test-key".into()), &server.uri()).unwrap())
}

#[tokio::test]
async fn test_resolve_fetch_and_publish() {
    let mock_server = MockServer::start().await;

    mount_city(&mock_server, "Madrid, Spain", "308526", "Madrid", "Spain").await;
    mount_city(&mock_server, "Athens, Greece", "182536", "Athens", "Greece").await;
    mount_city(&mock_server, "London, United Kingdom", "328328", "London", "United Kingdom").await;
    mount_current(&mock_server, "308526", ResponseTemplate::new(200).set_body_json(current(38.2, "Sunny"))).await;
    mount_current(&mock_server, "182536", ResponseTemplate::new(200).set_body_json(current(41.0, "Hot"))).await;
    mount_current(&mock_server, "328328", ResponseTemplate::new(200).set_body_json(current(21.4, "Cloudy"))).await;

    let client = client_for(&mock_server);
    let resolver = LocationResolver::new(client.clone());
    let queries = vec![
        LocationQuery::new("Madrid", Some("Spain")),
        LocationQuery::new("Athens", Some("Greece")),
        LocationQuery::new("London", Some("United Kingdom")),
    ];

    let locations = resolver.resolve_all(&queries).await.unwrap();
    assert_eq!(locations.len(), 3);

    let result = fetch_all(&client, &locations).await;
    assert!(result.failures.is_empty());

    let store = ReadingStore::new();
    store.set_readings(result.into_readings().unwrap());
    assert_eq!(store.len(), 3);

    let madrid = store.get("308526").unwrap();
    assert_eq!(madrid.reading.temperature, 38.0);
    assert_eq!(madrid.reading.severity(), Severity::High);

    let map = heat_map(&store.snapshot());
    let names: Vec<&str> = map.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["Athens", "Madrid", "London"]);
    assert_eq!(map[0].severity, Severity::Extreme);
    assert_eq!(map[2].severity, Severity::Low);
}

#[tokio::test]
async fn test_partial_failure_publishes_successes_only() {
    let mock_server = MockServer::start().await;

    mount_city(&mock_server, "Madrid", "308526", "Madrid", "Spain").await;
    mount_city(&mock_server, "Rome", "213490", "Rome", "Italy").await;

    let client = client_for(&mock_server);
    let resolver = LocationResolver::new(client.clone());
    let locations = resolver
        .resolve_all(&[LocationQuery::new("Madrid", None), LocationQuery::new("Rome", None)])
        .await
        .unwrap();

    let store = ReadingStore::new();
    mount_current(&mock_server, "308526", ResponseTemplate::new(200).set_body_json(current(30.0, "Sunny"))).await;
    mount_current(&mock_server, "213490", ResponseTemplate::new(500)).await;

    let result = fetch_all(&client, &locations).await;
    assert_eq!(result.readings.len(), 1);
    assert_eq!(result.failures.len(), 1);
    assert!(matches!(result.failures[0].error, WeatherError::Transient(_)));

    store.set_readings(result.into_readings().unwrap());
    assert!(store.get("308526").is_some());
    assert!(store.get("213490").is_none());
}

#[tokio::test]
async fn test_unauthorized_key_surfaces_configuration_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Api Authorization failed"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let resolver = LocationResolver::new(client);
    let result = resolver.resolve("Madrid", None).await;

    let err = result.unwrap_err();
    assert!(matches!(err, WeatherError::Configuration(_)));
    assert!(!err.is_retryable());
}
