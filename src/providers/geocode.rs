//! Reverse geocoding providers: Meituan first, then OpenStreetMap Nominatim

use async_trait::async_trait;
use reqwest::header::REFERER;
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use super::{fetch_json, join_address};
use crate::chain::Provider;
use crate::data::Coordinate;
use crate::error::{ProviderError, ProviderOutcome};
use crate::normalize::Document;

const MEITUAN_BASE_URL: &str = "https://apimobile.meituan.com";
const NOMINATIM_BASE_URL: &str = "https://nominatim.openstreetmap.org";

/// Meituan city lookup by coordinates
#[derive(Debug, Clone)]
pub struct MeituanReverseGeocoder {
    client: Client,
    base_url: String,
}

impl MeituanReverseGeocoder {
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
impl Provider<Coordinate, String> for MeituanReverseGeocoder {
    fn name(&self) -> &str {
        "meituan"
    }

    async fn call(&self, coordinate: &Coordinate, cancel: &CancellationToken) -> ProviderOutcome<String> {
        let url = format!(
            "{}/group/v1/city/latlng/{},{}",
            self.base_url,
            coordinate.latitude(),
            coordinate.longitude()
        );
        let request = self
            .client
            .get(url)
            .query(&[("tag", "0")])
            .header(REFERER, "https://www.meituan.com/");
        let payload = fetch_json(request, cancel).await?;
        let doc = Document::new(&payload);

        if !doc.is_object("data") {
            return Err(ProviderError::MalformedResponse("missing data".to_string()));
        }
        let data = doc.at("data");
        let city = data.str_or("city", "");
        let province = data.str_or("province", "");
        let province = if province == city { String::new() } else { province };

        let address = join_address([
            data.str_or("country", "").as_str(),
            province.as_str(),
            city.as_str(),
            data.str_or("district", "").as_str(),
            data.str_or("areaName", "").as_str(),
            data.str_or("detail", "").as_str(),
        ]);
        if address.is_empty() {
            return Err(ProviderError::MalformedResponse("empty address".to_string()));
        }
        Ok(address)
    }
}

/// OpenStreetMap Nominatim reverse lookup
#[derive(Debug, Clone)]
pub struct NominatimReverseGeocoder {
    client: Client,
    base_url: String,
}

impl NominatimReverseGeocoder {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: NOMINATIM_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Provider<Coordinate, String> for NominatimReverseGeocoder {
    fn name(&self) -> &str {
        "nominatim"
    }

    async fn call(&self, coordinate: &Coordinate, cancel: &CancellationToken) -> ProviderOutcome<String> {
        let request = self.client.get(format!("{}/reverse", self.base_url)).query(&[
            ("format", "json".to_string()),
            ("lat", coordinate.latitude().to_string()),
            ("lon", coordinate.longitude().to_string()),
            ("accept-language", "zh-CN".to_string()),
        ]);
        let payload = fetch_json(request, cancel).await?;
        let doc = Document::new(&payload);

        if let Some(error) = doc.get("error").and_then(|e| e.as_str()) {
            return Err(ProviderError::Declined(error.to_string()));
        }
        let display_name = doc.str_or("display_name", "");
        if display_name.trim().is_empty() {
            return Err(ProviderError::MalformedResponse("missing display_name".to_string()));
        }
        Ok(display_name)
    }
}
