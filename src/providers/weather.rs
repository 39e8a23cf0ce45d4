//! Weather providers
//!
//! [`CaiyunWeather`] queries the Caiyun v2.6 forecast API. [`DemoWeather`] is an
//! offline stand-in used when no API token is configured; it produces a raw
//! payload in the same shape so the rest of the pipeline runs unchanged.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::fetch_json;
use crate::chain::Provider;
use crate::data::{Coordinate, RawWeatherPayload};
use crate::error::{ProviderError, ProviderOutcome};
use crate::normalize::Document;

/// Base URL for the Caiyun weather API
pub const CAIYUN_BASE_URL: &str = "https://api.caiyunapp.com/v2.6";

/// Caiyun forecast client
#[derive(Debug, Clone)]
pub struct CaiyunWeather {
    client: Client,
    base_url: String,
    token: String,
    daily_steps: u8,
    hourly_steps: u8,
}

impl CaiyunWeather {
    /// Creates a client for the public API
    ///
    /// # Arguments
    /// * `client` - Shared HTTP client
    /// * `token` - Caiyun API token
    /// * `daily_steps` - Days of forecast to request
    /// * `hourly_steps` - Hours of forecast to request
    pub fn new(client: Client, token: impl Into<String>, daily_steps: u8, hourly_steps: u8) -> Self {
        Self {
            client,
            base_url: CAIYUN_BASE_URL.to_string(),
            token: token.into(),
            daily_steps,
            hourly_steps,
        }
    }

    /// Points the client at a different host (mirrors, tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, coordinate: &Coordinate) -> String {
        format!(
            "{}/{}/{},{}/weather",
            self.base_url,
            self.token,
            coordinate.longitude(),
            coordinate.latitude()
        )
    }
}

#[async_trait]
impl Provider<Coordinate, RawWeatherPayload> for CaiyunWeather {
    fn name(&self) -> &str {
        "caiyun"
    }

    async fn call(
        &self,
        coordinate: &Coordinate,
        cancel: &CancellationToken,
    ) -> ProviderOutcome<RawWeatherPayload> {
        let request = self.client.get(self.url(coordinate)).query(&[
            ("alert", "true".to_string()),
            ("dailysteps", self.daily_steps.to_string()),
            ("hourlysteps", self.hourly_steps.to_string()),
        ]);
        let payload = fetch_json(request, cancel).await?;

        let doc = Document::new(&payload);
        if doc.str_or("status", "") != "ok" {
            return Err(ProviderError::Declined(doc.str_or("error", "unknown error")));
        }
        Ok(payload)
    }
}

/// Offline weather source returning a fixed moderate-rain forecast
#[derive(Debug, Clone)]
pub struct DemoWeather {
    daily_steps: usize,
    hourly_steps: usize,
}

impl Default for DemoWeather {
    fn default() -> Self {
        Self::new(3, 24)
    }
}

impl DemoWeather {
    pub fn new(daily_steps: u8, hourly_steps: u8) -> Self {
        Self {
            daily_steps: daily_steps as usize,
            hourly_steps: hourly_steps as usize,
        }
    }

    /// Returns the raw payload, in the provider's wire format
    pub fn payload(&self) -> Value {
        let hourly_temperature: Vec<Value> = (0..self.hourly_steps)
            .map(|i| json!({ "value": 26.0 + ((i % 5) as f64 - 2.0) * 0.8 }))
            .collect();
        let hourly_skycon: Vec<Value> = (0..self.hourly_steps)
            .map(|_| json!({ "value": "MODERATE_RAIN" }))
            .collect();

        let daily_temperature: Vec<Value> = (0..self.daily_steps)
            .map(|i| json!({ "min": 24 - i as i64, "max": 29 - i as i64 }))
            .collect();
        let daily_skycon: Vec<Value> = (0..self.daily_steps)
            .map(|_| json!({ "value": "MODERATE_RAIN" }))
            .collect();
        let repeat = |index: &str, desc: &str| -> Vec<Value> {
            (0..self.daily_steps)
                .map(|_| json!({ "index": index, "desc": desc }))
                .collect()
        };

        json!({
            "status": "ok",
            "result": {
                "realtime": {
                    "temperature": 26.0,
                    "apparent_temperature": 30.0,
                    "humidity": 0.87,
                    "wind": { "speed": 7.78, "direction": 0.0 },
                    "pressure": 100_700.0,
                    "visibility": 5.26,
                    "skycon": "MODERATE_RAIN",
                    "air_quality": {
                        "aqi": { "chn": 14 },
                        "description": { "chn": "excellent" },
                        "pm25": 9,
                        "pm10": 14,
                        "o3": 19
                    }
                },
                "hourly": {
                    "temperature": hourly_temperature,
                    "skycon": hourly_skycon
                },
                "daily": {
                    "temperature": daily_temperature,
                    "skycon": daily_skycon,
                    "life_index": {
                        "ultraviolet": repeat("weak", "Low radiation, SPF 12-15 is enough."),
                        "carWashing": repeat("not advised", "Rain will dirty your car."),
                        "dressing": repeat("comfortable", "Long sleeves and light trousers."),
                        "comfort": repeat("fairly comfortable", "Cool with rain in the daytime."),
                        "coldRisk": repeat("low", "No marked temperature drop.")
                    }
                },
                "forecast_keypoint": "Moderate rain today, take an umbrella."
            }
        })
    }
}

#[async_trait]
impl Provider<Coordinate, RawWeatherPayload> for DemoWeather {
    fn name(&self) -> &str {
        "demo"
    }

    async fn call(
        &self,
        _coordinate: &Coordinate,
        _cancel: &CancellationToken,
    ) -> ProviderOutcome<RawWeatherPayload> {
        Ok(self.payload())
    }
}
