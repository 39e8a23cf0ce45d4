//! IP geolocation providers
//!
//! Tried in order: Meituan (regional, district-level detail, needs a public
//! address), ip-api.com, ipinfo.io. Input `None` asks the provider to locate
//! the address the request arrives from.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, ORIGIN, REFERER};
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use super::{coordinate_from, fetch_json, join_address};
use crate::chain::Provider;
use crate::data::{LocationCandidate, UNKNOWN_LOCATION};
use crate::error::{ProviderError, ProviderOutcome};
use crate::normalize::{coerce_number, Document};

const MEITUAN_BASE_URL: &str = "https://apimobile.meituan.com";
const IP_API_BASE_URL: &str = "http://ip-api.com";
const IPINFO_BASE_URL: &str = "https://ipinfo.io";

/// Headers checked for the client address, most trusted first
const CLIENT_IP_HEADERS: [&str; 9] = [
    "x-real-ip",
    "x-forwarded-for",
    "cf-connecting-ip",
    "x-client-ip",
    "x-forwarded",
    "forwarded-for",
    "forwarded",
    "true-client-ip",
    "x-cluster-client-ip",
];

/// Checks whether `ip` is routable on the public internet
pub fn is_public_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_public_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_public_v4(&v4),
            None => is_public_v6(v6),
        },
    }
}

fn is_public_v4(ip: &Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    // 100.64.0.0/10 carrier-grade NAT
    let shared = a == 100 && (b & 0b1100_0000) == 64;
    !(ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_documentation()
        || ip.is_multicast()
        || shared)
}

fn is_public_v6(ip: &Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    let unique_local = (first & 0xfe00) == 0xfc00;
    let link_local = (first & 0xffc0) == 0xfe80;
    !(ip.is_loopback() || ip.is_unspecified() || ip.is_multicast() || unique_local || link_local)
}

/// Extracts the end user's address from proxy headers
///
/// Takes the first element of list-valued headers, accepts `host:port` and
/// `for=` forms, and skips loopback addresses and `unknown`. `None` means no
/// header carried a usable address.
pub fn client_ip_from_headers(headers: &HeaderMap) -> Option<IpAddr> {
    CLIENT_IP_HEADERS.iter().find_map(|name| {
        let value = headers.get(*name)?.to_str().ok()?;
        let ip = parse_header_ip(value)?;
        tracing::debug!(header = *name, %ip, "client address from header");
        Some(ip)
    })
}

fn parse_header_ip(value: &str) -> Option<IpAddr> {
    let first = value.split(',').next()?.trim();
    let first = first
        .split(';')
        .find_map(|pair| pair.trim().strip_prefix("for="))
        .unwrap_or(first)
        .trim_matches('"');
    if first.is_empty() || first.eq_ignore_ascii_case("unknown") {
        return None;
    }

    let ip = first
        .parse::<IpAddr>()
        .or_else(|_| first.parse::<SocketAddr>().map(|addr| addr.ip()))
        .ok()?;
    (!ip.is_loopback()).then_some(ip)
}

/// Returns the address to send upstream, or `None` for the observed address
///
/// Private, loopback and link-local addresses cannot be located by a public
/// service, so the provider is asked to locate the caller instead.
fn lookup_target(ip: &Option<IpAddr>) -> Option<IpAddr> {
    ip.filter(is_public_ip)
}

fn no_address() -> String {
    UNKNOWN_LOCATION.to_string()
}

/// Builds a candidate from parsed fields
///
/// `display` falls back to the full address, then to the unknown sentinel.
fn candidate(
    longitude: Option<f64>,
    latitude: Option<f64>,
    display: &str,
    address: String,
) -> ProviderOutcome<LocationCandidate> {
    let coordinate = coordinate_from(longitude, latitude)?;
    let address = if address.is_empty() { no_address() } else { address };
    let display_name = if display.trim().is_empty() {
        address.clone()
    } else {
        display.trim().to_string()
    };
    Ok(LocationCandidate {
        coordinate,
        display_name,
        address,
    })
}

/// Meituan IP location, district-level within China
#[derive(Debug, Clone)]
pub struct MeituanIpLocator {
    client: Client,
    base_url: String,
}

impl MeituanIpLocator {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: MEITUAN_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Provider<Option<IpAddr>, LocationCandidate> for MeituanIpLocator {
    fn name(&self) -> &str {
        "meituan"
    }

    async fn call(
        &self,
        ip: &Option<IpAddr>,
        cancel: &CancellationToken,
    ) -> ProviderOutcome<LocationCandidate> {
        let ip = match ip {
            Some(ip) if is_public_ip(ip) => *ip,
            _ => return Err(ProviderError::Declined("needs a public address".to_string())),
        };

        let request = self
            .client
            .get(format!("{}/locate/v2/ip/loc", self.base_url))
            .query(&[("rgeo", "true".to_string()), ("ip", ip.to_string())])
            .header(REFERER, "https://www.meituan.com/")
            .header(ORIGIN, "https://www.meituan.com");
        let payload = fetch_json(request, cancel).await?;
        let doc = Document::new(&payload);

        if let Some(error) = doc.get("error").filter(|e| !e.is_null()) {
            let error = Document::new(error);
            let message = error.str_or("message", &error.str_or("type", "unknown error"));
            return Err(ProviderError::Declined(message));
        }

        let data = doc.at("data");
        let rgeo = data.at("rgeo");
        let city = rgeo.str_or("city", "");
        let province = rgeo.str_or("province", "");
        let province = if province == city { String::new() } else { province };
        let address = join_address([
            rgeo.str_or("country", "").as_str(),
            province.as_str(),
            city.as_str(),
            rgeo.str_or("district", "").as_str(),
            rgeo.str_or("street", "").as_str(),
            rgeo.str_or("town", "").as_str(),
        ]);

        candidate(
            data.get("lng").and_then(coerce_number),
            data.get("lat").and_then(coerce_number),
            &city,
            address,
        )
    }
}

/// ip-api.com, global coverage
#[derive(Debug, Clone)]
pub struct IpApiLocator {
    client: Client,
    base_url: String,
}

impl IpApiLocator {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: IP_API_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Provider<Option<IpAddr>, LocationCandidate> for IpApiLocator {
    fn name(&self) -> &str {
        "ip-api"
    }

    async fn call(
        &self,
        ip: &Option<IpAddr>,
        cancel: &CancellationToken,
    ) -> ProviderOutcome<LocationCandidate> {
        let url = match lookup_target(ip) {
            Some(ip) => format!("{}/json/{}", self.base_url, ip),
            None => format!("{}/json", self.base_url),
        };
        let request = self.client.get(url).query(&[(
            "fields",
            "status,message,lat,lon,country,regionName,city,district",
        )]);
        let payload = fetch_json(request, cancel).await?;
        let doc = Document::new(&payload);

        if doc.str_or("status", "") != "success" {
            return Err(ProviderError::Declined(doc.str_or("message", "unknown error")));
        }

        let city = doc.str_or("city", "");
        let address = join_address([
            doc.str_or("country", "").as_str(),
            doc.str_or("regionName", "").as_str(),
            city.as_str(),
            doc.str_or("district", "").as_str(),
        ]);
        candidate(
            doc.get("lon").and_then(coerce_number),
            doc.get("lat").and_then(coerce_number),
            &city,
            address,
        )
    }
}

/// ipinfo.io, global coverage, coarse
#[derive(Debug, Clone)]
pub struct IpInfoLocator {
    client: Client,
    base_url: String,
}

impl IpInfoLocator {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: IPINFO_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

/// Parses ipinfo's `"lat,lng"` location string
fn parse_loc(loc: &str) -> (Option<f64>, Option<f64>) {
    let mut parts = loc.split(',').map(|part| part.trim().parse::<f64>().ok());
    let lat = parts.next().flatten();
    let lng = parts.next().flatten();
    (lng, lat)
}

#[async_trait]
impl Provider<Option<IpAddr>, LocationCandidate> for IpInfoLocator {
    fn name(&self) -> &str {
        "ipinfo"
    }

    async fn call(
        &self,
        ip: &Option<IpAddr>,
        cancel: &CancellationToken,
    ) -> ProviderOutcome<LocationCandidate> {
        let url = match lookup_target(ip) {
            Some(ip) => format!("{}/{}/json", self.base_url, ip),
            None => format!("{}/json", self.base_url),
        };
        let payload = fetch_json(self.client.get(url), cancel).await?;
        let doc = Document::new(&payload);

        let loc = doc.str_or("loc", "");
        if !loc.contains(',') {
            return Err(ProviderError::MalformedResponse(format!(
                "unexpected loc {:?}",
                loc
            )));
        }
        let (longitude, latitude) = parse_loc(&loc);

        let city = doc.str_or("city", "");
        let address = join_address([
            doc.str_or("country", "").as_str(),
            doc.str_or("region", "").as_str(),
            city.as_str(),
        ]);
        candidate(longitude, latitude, &city, address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::http_client;
    use reqwest::header::HeaderValue;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn public_ip() -> Option<IpAddr> {
        Some("36.110.1.2".parse().unwrap())
    }

    fn client() -> Client {
        http_client("skycast-test").unwrap()
    }

    #[test]
    fn test_public_ip_classification() {
        let public = ["8.8.8.8", "36.110.1.2", "2400:3200::1"];
        let private = [
            "127.0.0.1",
            "10.1.2.3",
            "192.168.1.10",
            "172.16.0.1",
            "169.254.1.1",
            "100.64.0.1",
            "0.0.0.0",
            "::1",
            "fd00::1",
            "fe80::1",
            "::ffff:192.168.1.1",
        ];
        for ip in public {
            assert!(is_public_ip(&ip.parse().unwrap()), "{ip} should be public");
        }
        for ip in private {
            assert!(!is_public_ip(&ip.parse().unwrap()), "{ip} should not be public");
        }
    }

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_client_ip_prefers_header_order() {
        let map = headers(&[
            ("x-forwarded-for", "203.0.113.9, 10.0.0.1"),
            ("x-real-ip", "198.51.100.7"),
        ]);
        assert_eq!(client_ip_from_headers(&map), Some("198.51.100.7".parse().unwrap()));
    }

    #[test]
    fn test_client_ip_takes_first_forwarded_entry_and_strips_port() {
        let map = headers(&[("x-forwarded-for", "203.0.113.9:5123, 10.0.0.1")]);
        assert_eq!(client_ip_from_headers(&map), Some("203.0.113.9".parse().unwrap()));
    }

    #[test]
    fn test_client_ip_skips_loopback_and_unknown() {
        let map = headers(&[
            ("x-real-ip", "127.0.0.1"),
            ("x-forwarded-for", "unknown"),
            ("cf-connecting-ip", "2400:cb00::1"),
        ]);
        assert_eq!(client_ip_from_headers(&map), Some("2400:cb00::1".parse().unwrap()));
    }

    #[test]
    fn test_client_ip_forwarded_syntax() {
        let map = headers(&[("forwarded", "for=\"203.0.113.60\";proto=https")]);
        assert_eq!(client_ip_from_headers(&map), Some("203.0.113.60".parse().unwrap()));
    }

    #[test]
    fn test_client_ip_absent() {
        assert_eq!(client_ip_from_headers(&HeaderMap::new()), None);
        let map = headers(&[("x-real-ip", "not-an-ip")]);
        assert_eq!(client_ip_from_headers(&map), None);
    }

    #[tokio::test]
    async fn test_meituan_declines_private_or_missing_ip() {
        let locator = MeituanIpLocator::new(client()).with_base_url("http://127.0.0.1:9");
        let cancel = CancellationToken::new();
        for ip in [None, Some("192.168.0.2".parse().unwrap())] {
            assert!(matches!(
                locator.call(&ip, &cancel).await,
                Err(ProviderError::Declined(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_meituan_parses_rgeo_address() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/locate/v2/ip/loc"))
            .and(query_param("ip", "36.110.1.2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "lat": 30.27, "lng": 120.15,
                    "rgeo": { "country": "China", "province": "Zhejiang", "city": "Hangzhou", "district": "Xihu" }
                }
            })))
            .mount(&server)
            .await;

        let locator = MeituanIpLocator::new(client()).with_base_url(server.uri());
        let found = locator.call(&public_ip(), &CancellationToken::new()).await.unwrap();
        assert_eq!(found.address, "China Zhejiang Hangzhou Xihu");
        assert_eq!(found.display_name, "Hangzhou");
        assert!((found.coordinate.longitude() - 120.15).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_meituan_error_document_is_declined() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": { "type": "invalid_ip", "message": "ip not found" }
            })))
            .mount(&server)
            .await;

        let locator = MeituanIpLocator::new(client()).with_base_url(server.uri());
        let outcome = locator.call(&public_ip(), &CancellationToken::new()).await;
        assert_eq!(outcome, Err(ProviderError::Declined("ip not found".to_string())));
    }

    #[tokio::test]
    async fn test_meituan_missing_coordinates_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "rgeo": { "city": "Hangzhou" } }
            })))
            .mount(&server)
            .await;

        let locator = MeituanIpLocator::new(client()).with_base_url(server.uri());
        let outcome = locator.call(&public_ip(), &CancellationToken::new()).await;
        assert!(matches!(outcome, Err(ProviderError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_ip_api_success_and_observed_address() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success", "lat": 39.9, "lon": 116.4,
                "country": "China", "regionName": "Beijing", "city": "Beijing"
            })))
            .mount(&server)
            .await;

        let locator = IpApiLocator::new(client()).with_base_url(server.uri());
        let found = locator.call(&None, &CancellationToken::new()).await.unwrap();
        assert_eq!(found.address, "China Beijing Beijing");
        assert!((found.coordinate.latitude() - 39.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_ip_api_fail_status_is_declined() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/36.110.1.2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "fail", "message": "reserved range"
            })))
            .mount(&server)
            .await;

        let locator = IpApiLocator::new(client()).with_base_url(server.uri());
        let outcome = locator.call(&public_ip(), &CancellationToken::new()).await;
        assert_eq!(outcome, Err(ProviderError::Declined("reserved range".to_string())));
    }

    #[tokio::test]
    async fn test_ip_api_private_address_uses_observed_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success", "lat": 31.23, "lon": 121.47,
                "country": "China", "regionName": "Shanghai", "city": "Shanghai"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/json/192.168.1.5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "fail", "message": "private range"
            })))
            .expect(0)
            .mount(&server)
            .await;

        let locator = IpApiLocator::new(client()).with_base_url(server.uri());
        let lan = Some("192.168.1.5".parse().unwrap());
        let found = locator.call(&lan, &CancellationToken::new()).await.unwrap();
        assert_eq!(found.display_name, "Shanghai");
    }

    #[tokio::test]
    async fn test_ipinfo_private_address_uses_observed_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "loc": "39.9042,116.4074", "country": "CN", "region": "Beijing", "city": "Beijing"
            })))
            .expect(2)
            .mount(&server)
            .await;

        let locator = IpInfoLocator::new(client()).with_base_url(server.uri());
        for ip in ["10.0.0.7", "fe80::1"] {
            let found = locator
                .call(&Some(ip.parse().unwrap()), &CancellationToken::new())
                .await
                .unwrap();
            assert_eq!(found.display_name, "Beijing", "{ip} should use the observed endpoint");
        }
    }

    #[test]
    fn test_lookup_target_keeps_only_public_addresses() {
        assert_eq!(lookup_target(&public_ip()), public_ip());
        assert_eq!(lookup_target(&Some("127.0.0.1".parse().unwrap())), None);
        assert_eq!(lookup_target(&None), None);
    }

    #[tokio::test]
    async fn test_ipinfo_parses_loc() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/36.110.1.2/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "loc": "31.2222,121.4581", "country": "CN", "region": "Shanghai", "city": "Shanghai"
            })))
            .mount(&server)
            .await;

        let locator = IpInfoLocator::new(client()).with_base_url(server.uri());
        let found = locator.call(&public_ip(), &CancellationToken::new()).await.unwrap();
        assert!((found.coordinate.latitude() - 31.2222).abs() < 1e-9);
        assert!((found.coordinate.longitude() - 121.4581).abs() < 1e-9);
        assert_eq!(found.address, "CN Shanghai Shanghai");
    }

    #[tokio::test]
    async fn test_ipinfo_without_loc_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "bogon": true })))
            .mount(&server)
            .await;

        let locator = IpInfoLocator::new(client()).with_base_url(server.uri());
        let outcome = locator.call(&None, &CancellationToken::new()).await;
        assert!(matches!(outcome, Err(ProviderError::MalformedResponse(_))));
    }

    #[test]
    fn test_candidate_falls_back_to_unknown_address() {
        let found = candidate(Some(1.0), Some(2.0), "", String::new()).unwrap();
        assert_eq!(found.address, UNKNOWN_LOCATION);
        assert_eq!(found.display_name, UNKNOWN_LOCATION);
    }
}
