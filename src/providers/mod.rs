//! Concrete upstream providers
//!
//! Every provider implements [`crate::chain::Provider`] and funnels its HTTP
//! call through [`fetch_json`], which maps transport failures, non-2xx statuses
//! and unparsable bodies onto [`ProviderError`].

pub mod geocode;
pub mod ip;
pub mod search;
pub mod weather;

pub use geocode::{MeituanReverseGeocoder, NominatimReverseGeocoder};
pub use ip::{client_ip_from_headers, is_public_ip, IpApiLocator, IpInfoLocator, MeituanIpLocator};
pub use search::{AmapSearch, NominatimSearch, PhotonSearch};
pub use weather::{CaiyunWeather, DemoWeather};

use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::data::Coordinate;
use crate::error::{ProviderError, ProviderOutcome};

/// Builds the HTTP client shared by all providers
pub fn http_client(user_agent: &str) -> reqwest::Result<Client> {
    Client::builder().user_agent(user_agent).build()
}

/// Sends `request` and parses the body as JSON
///
/// Cancelling `cancel` abandons the request and reports a timeout.
pub(crate) async fn fetch_json(
    request: RequestBuilder,
    cancel: &CancellationToken,
) -> ProviderOutcome<Value> {
    let exchange = async {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::HttpStatus(status.as_u16()));
        }
        let text = response.text().await?;
        serde_json::from_str::<Value>(&text)
            .map_err(|err| ProviderError::MalformedResponse(err.to_string()))
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProviderError::Timeout),
        outcome = exchange => outcome,
    }
}

/// Joins the non-blank address parts with single spaces
pub(crate) fn join_address<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Validates provider-supplied coordinates
///
/// Out-of-range or missing values are a malformed response, not a success with
/// bogus fields.
pub(crate) fn coordinate_from(longitude: Option<f64>, latitude: Option<f64>) -> ProviderOutcome<Coordinate> {
    match (longitude, latitude) {
        (Some(lng), Some(lat)) => Coordinate::new(lng, lat)
            .map_err(|err| ProviderError::MalformedResponse(err.to_string())),
        _ => Err(ProviderError::MalformedResponse("missing coordinates".to_string())),
    }
}
