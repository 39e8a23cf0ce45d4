//! Place search providers
//!
//! Tried in order: Amap (only registered when an API key is configured),
//! Photon, Nominatim. A provider with zero usable results counts as a failure
//! so the chain moves on.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{coordinate_from, fetch_json, join_address};
use crate::chain::Provider;
use crate::data::LocationCandidate;
use crate::error::{ProviderError, ProviderOutcome};
use crate::normalize::{coerce_number, Document};

const AMAP_BASE_URL: &str = "https://restapi.amap.com";
const PHOTON_BASE_URL: &str = "https://photon.komoot.io";
const NOMINATIM_BASE_URL: &str = "https://nominatim.openstreetmap.org";

/// Most candidates kept from Amap and Photon
pub const MAX_CANDIDATES: usize = 5;

/// Nominatim is slower than the other search backends
const NOMINATIM_TIMEOUT: Duration = Duration::from_secs(5);

fn non_empty(candidates: Vec<LocationCandidate>) -> ProviderOutcome<Vec<LocationCandidate>> {
    if candidates.is_empty() {
        Err(ProviderError::Declined("no results".to_string()))
    } else {
        Ok(candidates)
    }
}

/// Amap (Gaode) place text search
#[derive(Debug, Clone)]
pub struct AmapSearch {
    client: Client,
    base_url: String,
    api_key: String,
}

impl AmapSearch {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: AMAP_BASE_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn parse_poi(poi: &Value) -> Option<LocationCandidate> {
        let poi = Document::new(poi);
        let location = poi.str_or("location", "");
        let mut parts = location.split(',').map(|part| part.trim().parse::<f64>().ok());
        let longitude = parts.next().flatten();
        let latitude = parts.next().flatten();
        let coordinate = coordinate_from(longitude, latitude).ok()?;

        Some(LocationCandidate {
            coordinate,
            display_name: poi.str_or("name", ""),
            address: join_address([
                poi.str_or("pname", "").as_str(),
                poi.str_or("cityname", "").as_str(),
                poi.str_or("adname", "").as_str(),
                poi.str_or("address", "").as_str(),
            ]),
        })
    }
}

#[async_trait]
impl Provider<str, Vec<LocationCandidate>> for AmapSearch {
    fn name(&self) -> &str {
        "amap"
    }

    async fn call(&self, query: &str, cancel: &CancellationToken) -> ProviderOutcome<Vec<LocationCandidate>> {
        let request = self.client.get(format!("{}/v3/place/text", self.base_url)).query(&[
            ("key", self.api_key.as_str()),
            ("keywords", query),
            ("children", "1"),
            ("offset", "10"),
            ("page", "1"),
            ("extensions", "all"),
        ]);
        let payload = fetch_json(request, cancel).await?;
        let doc = Document::new(&payload);

        if doc.str_or("status", "") != "1" {
            return Err(ProviderError::Declined(doc.str_or("info", "unknown error")));
        }
        non_empty(
            doc.array("pois")
                .iter()
                .filter_map(Self::parse_poi)
                .take(MAX_CANDIDATES)
                .collect(),
        )
    }
}

/// Photon (komoot) search over OpenStreetMap data
#[derive(Debug, Clone)]
pub struct PhotonSearch {
    client: Client,
    base_url: String,
}

impl PhotonSearch {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: PHOTON_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn parse_feature(feature: &Value) -> Option<LocationCandidate> {
        let feature = Document::new(feature);
        let coordinate = coordinate_from(
            feature.get("geometry.coordinates.0").and_then(coerce_number),
            feature.get("geometry.coordinates.1").and_then(coerce_number),
        )
        .ok()?;

        let props = feature.at("properties");
        let name = props.str_or("name", "");
        let city = props.str_or("city", "");
        let state = props.str_or("state", "");
        let display_name = [&name, &city, &state]
            .into_iter()
            .find(|s| !s.is_empty())
            .cloned()
            .unwrap_or_default();

        Some(LocationCandidate {
            coordinate,
            display_name,
            address: join_address([
                props.str_or("country", "").as_str(),
                state.as_str(),
                city.as_str(),
                name.as_str(),
            ]),
        })
    }
}

#[async_trait]
impl Provider<str, Vec<LocationCandidate>> for PhotonSearch {
    fn name(&self) -> &str {
        "photon"
    }

    async fn call(&self, query: &str, cancel: &CancellationToken) -> ProviderOutcome<Vec<LocationCandidate>> {
        let request = self
            .client
            .get(format!("{}/api/", self.base_url))
            .query(&[("q", query), ("limit", "5")]);
        let payload = fetch_json(request, cancel).await?;

        non_empty(
            Document::new(&payload)
                .array("features")
                .iter()
                .filter_map(Self::parse_feature)
                .take(MAX_CANDIDATES)
                .collect(),
        )
    }
}

/// OpenStreetMap Nominatim search, restricted to China
#[derive(Debug, Clone)]
pub struct NominatimSearch {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl NominatimSearch {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: NOMINATIM_BASE_URL.to_string(),
            timeout: NOMINATIM_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn parse_place(place: &Value) -> Option<LocationCandidate> {
        let place = Document::new(place);
        let coordinate = coordinate_from(
            place.get("lon").and_then(coerce_number),
            place.get("lat").and_then(coerce_number),
        )
        .ok()?;
        let address = place.str_or("display_name", "");
        let display_name = address.split(',').next().unwrap_or_default().trim().to_string();

        Some(LocationCandidate {
            coordinate,
            display_name,
            address,
        })
    }
}

#[async_trait]
impl Provider<str, Vec<LocationCandidate>> for NominatimSearch {
    fn name(&self) -> &str {
        "nominatim"
    }

    fn timeout(&self) -> Option<Duration> {
        Some(self.timeout)
    }

    async fn call(&self, query: &str, cancel: &CancellationToken) -> ProviderOutcome<Vec<LocationCandidate>> {
        let request = self.client.get(format!("{}/search", self.base_url)).query(&[
            ("format", "json"),
            ("q", query),
            ("limit", "5"),
            ("accept-language", "zh-CN"),
            ("countrycodes", "cn"),
        ]);
        let payload = fetch_json(request, cancel).await?;

        let places = match &payload {
            Value::Array(places) => places,
            _ => return Err(ProviderError::MalformedResponse("expected a list".to_string())),
        };
        non_empty(places.iter().filter_map(Self::parse_place).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::http_client;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> Client {
        http_client("skycast-test").unwrap()
    }

    #[tokio::test]
    async fn test_amap_parses_and_caps_pois() {
        let server = MockServer::start().await;
        let pois: Vec<Value> = (0..8)
            .map(|i| {
                json!({
                    "name": format!("West Lake {i}"),
                    "location": "120.1480,30.2420",
                    "pname": "Zhejiang", "cityname": "Hangzhou", "adname": "Xihu",
                    "address": []
                })
            })
            .collect();
        Mock::given(method("GET"))
            .and(path("/v3/place/text"))
            .and(query_param("key", "KEY"))
            .and(query_param("keywords", "West Lake"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "1", "pois": pois })))
            .mount(&server)
            .await;

        let search = AmapSearch::new(client(), "KEY").with_base_url(server.uri());
        let hits = search.call("West Lake", &CancellationToken::new()).await.unwrap();
        assert_eq!(hits.len(), MAX_CANDIDATES);
        assert_eq!(hits[0].display_name, "West Lake 0");
        assert_eq!(hits[0].address, "Zhejiang Hangzhou Xihu");
        assert!((hits[0].coordinate.longitude() - 120.148).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_amap_error_status_is_declined() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "status": "0", "info": "INVALID_USER_KEY" })),
            )
            .mount(&server)
            .await;

        let search = AmapSearch::new(client(), "bad").with_base_url(server.uri());
        let outcome = search.call("Hangzhou", &CancellationToken::new()).await;
        assert_eq!(outcome, Err(ProviderError::Declined("INVALID_USER_KEY".to_string())));
    }

    #[tokio::test]
    async fn test_photon_parses_features() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/"))
            .and(query_param("q", "Lhasa"))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "features": [
                    {
                        "geometry": { "coordinates": [91.1172, 29.6469] },
                        "properties": { "name": "Lhasa", "state": "Tibet", "country": "China" }
                    },
                    {
                        "geometry": { "coordinates": [] },
                        "properties": { "name": "broken" }
                    }
                ]
            })))
            .mount(&server)
            .await;

        let search = PhotonSearch::new(client()).with_base_url(server.uri());
        let hits = search.call("Lhasa", &CancellationToken::new()).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].display_name, "Lhasa");
        assert_eq!(hits[0].address, "China Tibet Lhasa");
        assert!((hits[0].coordinate.latitude() - 29.6469).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_photon_empty_features_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "features": [] })))
            .mount(&server)
            .await;

        let search = PhotonSearch::new(client()).with_base_url(server.uri());
        let outcome = search.call("nowhere", &CancellationToken::new()).await;
        assert_eq!(outcome, Err(ProviderError::Declined("no results".to_string())));
    }

    #[tokio::test]
    async fn test_nominatim_parses_string_coordinates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("countrycodes", "cn"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "lat": "25.0389", "lon": "102.7183", "display_name": "Kunming, Yunnan, China" }
            ])))
            .mount(&server)
            .await;

        let search = NominatimSearch::new(client()).with_base_url(server.uri());
        let hits = search.call("Kunming", &CancellationToken::new()).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].display_name, "Kunming");
        assert_eq!(hits[0].address, "Kunming, Yunnan, China");
        assert_eq!(search.timeout(), Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_nominatim_non_list_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "error": "oops" })))
            .mount(&server)
            .await;

        let search = NominatimSearch::new(client()).with_base_url(server.uri());
        let outcome = search.call("x", &CancellationToken::new()).await;
        assert!(matches!(outcome, Err(ProviderError::MalformedResponse(_))));
    }

    #[test]
    fn test_nominatim_timeout_is_configurable() {
        let search = NominatimSearch::new(client());
        assert_eq!(search.timeout(), Some(NOMINATIM_TIMEOUT));

        let search = search.with_timeout(Duration::from_secs(8));
        assert_eq!(search.timeout(), Some(Duration::from_secs(8)));
    }
}
