//! Shared fixtures for tests that run the country stores against a mocked
//! GeoNames server.

#![allow(dead_code)]

use ipapi::geonames::GeoNamesClient;
use serde_json::{Value, json};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const USERNAME: &str = "tester";

/// Client pointed at `server` with a generous timeout.
pub fn client(server: &MockServer) -> GeoNamesClient {
    client_with_timeout(server, Duration::from_secs(5))
}

pub fn client_with_timeout(server: &MockServer, timeout: Duration) -> GeoNamesClient {
    GeoNamesClient::new(&server.uri(), USERNAME, timeout).expect("valid mock server URL")
}

/// `neighboursJSON` body listing the given `(code, name)` pairs.
pub fn neighbours_body(entries: &[(&str, &str)]) -> Value {
    let geonames: Vec<Value> = entries
        .iter()
        .map(|(code, name)| json!({ "countryCode": code, "countryName": name }))
        .collect();
    json!({ "totalResultsCount": geonames.len(), "geonames": geonames })
}

/// `countryInfoJSON` body with a single country carrying `languages`.
pub fn languages_body(languages: &str) -> Value {
    json!({ "geonames": [{ "languages": languages }] })
}

/// Mock for one endpoint and country, answering at most `times` requests
/// when given.
pub fn country_mock(
    endpoint: &str,
    country: &str,
    response: ResponseTemplate,
    times: Option<u64>,
) -> Mock {
    let mock = Mock::given(method("GET"))
        .and(path(format!("/{endpoint}")))
        .and(query_param("country", country))
        .and(query_param("username", USERNAME))
        .respond_with(response);
    match times {
        Some(n) => mock.up_to_n_times(n),
        None => mock,
    }
}

pub fn ok_json(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

/// `(path, country)` of every request the server has seen, in arrival order.
pub async fn request_log(server: &MockServer) -> Vec<(String, String)> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .map(|req| {
            let country = req
                .url
                .query_pairs()
                .find(|(key, _)| key == "country")
                .map(|(_, value)| value.into_owned())
                .unwrap_or_default();
            (req.url.path().to_owned(), country)
        })
        .collect()
}
