//! Core data models for the weather resolution pipeline
//!
//! This module contains the request-scoped location types produced by
//! geolocation providers and the immutable `NormalizedWeather` value that the
//! rest of the system consumes.

pub mod gazetteer;
pub mod skycon;

pub use gazetteer::{search_gazetteer, GazetteerEntry, MatchMode, DEFAULT_LOCATION};
pub use skycon::{weather_info, WeatherInfo, DEFAULT_SKYCON};

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::ResolveError;

/// Address shown when no provider could name a place
pub const UNKNOWN_LOCATION: &str = "unknown location";

/// A validated point on the globe
///
/// Fields are private so that every instance satisfies
/// longitude ∈ [-180, 180] and latitude ∈ [-90, 90].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    longitude: f64,
    latitude: f64,
}

impl Coordinate {
    /// Creates a coordinate, rejecting NaN and out-of-range values
    pub fn new(longitude: f64, latitude: f64) -> Result<Self, ResolveError> {
        let valid = longitude.is_finite()
            && latitude.is_finite()
            && (-180.0..=180.0).contains(&longitude)
            && (-90.0..=90.0).contains(&latitude);
        if !valid {
            return Err(ResolveError::InvalidCoordinate {
                longitude,
                latitude,
            });
        }
        Ok(Self {
            longitude,
            latitude,
        })
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Builds the cache key with 4 decimal places (about 11 m), so near-identical
    /// requests share one entry
    pub fn cache_key(&self) -> String {
        format!("{:.4}_{:.4}", self.longitude, self.latitude)
    }
}

/// A place returned by a geolocation or search provider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationCandidate {
    pub coordinate: Coordinate,
    /// Short name, e.g. "Hangzhou"
    pub display_name: String,
    /// Space-separated administrative path, e.g. "China Zhejiang Hangzhou"
    pub address: String,
}

/// Raw weather provider document, unvalidated
pub type RawWeatherPayload = serde_json::Value;

/// Conditions at the time of the request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentConditions {
    /// Temperature in °C
    pub temperature: i32,
    /// Feels-like temperature in °C
    pub apparent_temperature: i32,
    /// Relative humidity percentage (0-100)
    pub humidity: u8,
    pub wind_speed_kmh: u32,
    /// Direction the wind blows from, [0, 360)
    pub wind_direction_deg: u16,
    pub pressure_hpa: u32,
    pub visibility_km: f64,
    pub skycon: String,
    pub weather_info: WeatherInfo,
    /// Provider air quality block, passed through untouched
    pub air_quality: serde_json::Value,
}

/// One hour of the forecast, labelled with the viewer's local hour
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyPoint {
    /// Local wall-clock hour (0-23)
    pub local_hour: u8,
    pub temperature: i32,
    pub skycon: String,
    pub weather_info: WeatherInfo,
}

/// A single life-index advisory, e.g. ultraviolet "weak"
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifeIndexEntry {
    pub index: String,
    pub description: String,
}

/// One day of the forecast
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyPoint {
    /// "today", "tomorrow", "day after tomorrow" or a weekday name
    pub relative_label: String,
    /// Short weekday name, e.g. "Mon"
    pub weekday: String,
    pub date: NaiveDate,
    pub min_temp: i32,
    pub max_temp: i32,
    pub skycon: String,
    pub weather_info: WeatherInfo,
    pub life_index: BTreeMap<String, LifeIndexEntry>,
}

/// The normalized forecast handed to consumers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedWeather {
    pub current: CurrentConditions,
    /// At most 24 points, starting at the local current hour
    pub hourly: Vec<HourlyPoint>,
    /// At most 7 points, starting today
    pub daily: Vec<DailyPoint>,
    pub forecast_keypoint: String,
}
