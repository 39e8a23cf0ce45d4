//! Weather payload normalization
//!
//! Turns the provider's raw JSON into a [`NormalizedWeather`]. Only the
//! `result` and `result.realtime` blocks are mandatory; every other field is
//! read through [`Document`], which yields a documented default instead of
//! failing when a field is absent, null, or not numeric.
//!
//! Unit conversions:
//! - humidity fraction [0, 1] to percent: `round(x * 100)`
//! - wind speed m/s to km/h: `round(x * 3.6)`
//! - pressure Pa to hPa: `round(x / 100)`
//! - temperatures rounded to whole °C

use std::collections::BTreeMap;

use chrono::{DateTime, Days, Utc};
use serde_json::Value;

use crate::data::{
    weather_info, CurrentConditions, DailyPoint, HourlyPoint, LifeIndexEntry, NormalizedWeather,
    RawWeatherPayload, DEFAULT_SKYCON,
};
use crate::error::ResolveError;
use crate::temporal::{align_hours, local_now, round_half_up};

/// Most hourly points kept from a payload
pub const MAX_HOURLY_POINTS: usize = 24;

/// Most daily points kept from a payload
pub const MAX_DAILY_POINTS: usize = 7;

/// Pressure assumed when the provider omits it (standard atmosphere, Pa)
const DEFAULT_PRESSURE_PA: f64 = 101_325.0;

const DEFAULT_KEYPOINT: &str = "no forecast summary available";

const NO_LIFE_INDEX: &str = "no data";

/// Life-index categories copied into each daily point
const LIFE_INDEX_CATEGORIES: [&str; 5] =
    ["ultraviolet", "carWashing", "dressing", "comfort", "coldRisk"];

static NULL: Value = Value::Null;

/// Read-only view over an untyped JSON document
///
/// Paths are dot-separated; numeric segments index into arrays
/// (`"skycon.3.value"`). Lookups never fail: absent fields come back as
/// `None` or the supplied default.
#[derive(Debug, Clone, Copy)]
pub struct Document<'a> {
    root: &'a Value,
}

impl<'a> Document<'a> {
    pub fn new(root: &'a Value) -> Self {
        Self { root }
    }

    /// Returns the raw value at `path`, if present
    pub fn get(&self, path: &str) -> Option<&'a Value> {
        path.split('.')
            .filter(|segment| !segment.is_empty())
            .try_fold(self.root, |current, segment| match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| items.get(index)),
                _ => None,
            })
    }

    /// Returns the sub-document at `path`; missing paths give an empty (null) document
    pub fn at(&self, path: &str) -> Document<'a> {
        Document::new(self.get(path).unwrap_or(&NULL))
    }

    pub fn is_object(&self, path: &str) -> bool {
        matches!(self.get(path), Some(Value::Object(_)))
    }

    /// Reads a finite number at `path`, accepting numeric strings; otherwise `default`
    pub fn number_or(&self, path: &str, default: f64) -> f64 {
        self.get(path).and_then(coerce_number).unwrap_or(default)
    }

    /// Reads the string at `path`; otherwise `default`
    pub fn str_or(&self, path: &str, default: &str) -> String {
        match self.get(path) {
            Some(Value::String(s)) => s.clone(),
            _ => default.to_string(),
        }
    }

    /// Returns the array elements at `path`; empty when absent or not an array
    pub fn array(&self, path: &str) -> &'a [Value] {
        match self.get(path) {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        }
    }
}

/// Parses a JSON number or numeric string, rejecting NaN and infinities
pub fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

fn round_i32(value: f64) -> i32 {
    round_half_up(value) as i32
}

/// Converts one raw weather payload into a [`NormalizedWeather`]
#[derive(Debug, Clone)]
pub struct ResponseNormalizer {
    hourly_limit: usize,
    daily_limit: usize,
}

impl Default for ResponseNormalizer {
    fn default() -> Self {
        Self {
            hourly_limit: MAX_HOURLY_POINTS,
            daily_limit: MAX_DAILY_POINTS,
        }
    }
}

impl ResponseNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a normalizer keeping at most `hourly` hourly and `daily` daily points (capped at 24 and 7)
    pub fn with_limits(hourly: usize, daily: usize) -> Self {
        Self {
            hourly_limit: hourly.min(MAX_HOURLY_POINTS),
            daily_limit: daily.min(MAX_DAILY_POINTS),
        }
    }

    /// Normalizes `raw` for a viewer at `longitude` at instant `now`
    ///
    /// # Returns
    /// * `Ok(NormalizedWeather)` - Always fully populated, using defaults for
    ///   absent fields
    /// * `Err(ResolveError::Validation)` - If `result` or `result.realtime` is
    ///   missing
    pub fn normalize(
        &self,
        raw: &RawWeatherPayload,
        longitude: f64,
        now: DateTime<Utc>,
    ) -> Result<NormalizedWeather, ResolveError> {
        let doc = Document::new(raw);
        if !doc.is_object("result") {
            return Err(ResolveError::Validation("result".to_string()));
        }
        if !doc.is_object("result.realtime") {
            return Err(ResolveError::Validation("result.realtime".to_string()));
        }
        let result = doc.at("result");

        Ok(NormalizedWeather {
            current: self.current(result.at("realtime")),
            hourly: self.hourly(result.at("hourly"), longitude, now),
            daily: self.daily(result.at("daily"), longitude, now),
            forecast_keypoint: result.str_or("forecast_keypoint", DEFAULT_KEYPOINT),
        })
    }

    fn current(&self, realtime: Document<'_>) -> CurrentConditions {
        let skycon = realtime.str_or("skycon", DEFAULT_SKYCON);
        let humidity = round_half_up(realtime.number_or("humidity", 0.0) * 100.0);
        let wind_speed = round_half_up(realtime.number_or("wind.speed", 0.0) * 3.6);
        let wind_direction = round_half_up(realtime.number_or("wind.direction", 0.0));
        let pressure = round_half_up(realtime.number_or("pressure", DEFAULT_PRESSURE_PA) / 100.0);

        CurrentConditions {
            temperature: round_i32(realtime.number_or("temperature", 0.0)),
            apparent_temperature: round_i32(realtime.number_or("apparent_temperature", 0.0)),
            humidity: humidity.clamp(0.0, 100.0) as u8,
            wind_speed_kmh: wind_speed.max(0.0) as u32,
            wind_direction_deg: wind_direction.rem_euclid(360.0) as u16,
            pressure_hpa: pressure.max(0.0) as u32,
            visibility_km: realtime.number_or("visibility", 0.0).max(0.0),
            weather_info: weather_info(&skycon),
            skycon,
            air_quality: match realtime.get("air_quality") {
                Some(value) if value.is_object() => value.clone(),
                _ => Value::Object(serde_json::Map::new()),
            },
        }
    }

    fn hourly(&self, hourly: Document<'_>, longitude: f64, now: DateTime<Utc>) -> Vec<HourlyPoint> {
        let temperatures = hourly.array("temperature");
        let count = temperatures.len().min(self.hourly_limit);
        let hours = align_hours(count, longitude, now);

        temperatures
            .iter()
            .zip(hours)
            .enumerate()
            .map(|(index, (temperature, local_hour))| {
                let skycon = hourly.str_or(&format!("skycon.{index}.value"), DEFAULT_SKYCON);
                HourlyPoint {
                    local_hour,
                    temperature: round_i32(Document::new(temperature).number_or("value", 0.0)),
                    weather_info: weather_info(&skycon),
                    skycon,
                }
            })
            .collect()
    }

    fn daily(&self, daily: Document<'_>, longitude: f64, now: DateTime<Utc>) -> Vec<DailyPoint> {
        let today = local_now(longitude, now).date_naive();

        daily
            .array("temperature")
            .iter()
            .take(self.daily_limit)
            .enumerate()
            .map(|(index, temperature)| {
                let date = today
                    .checked_add_days(Days::new(index as u64))
                    .unwrap_or(today);
                let weekday = date.format("%a").to_string();
                let skycon = daily.str_or(&format!("skycon.{index}.value"), DEFAULT_SKYCON);
                let temperature = Document::new(temperature);

                DailyPoint {
                    relative_label: relative_day_label(index, &weekday),
                    weekday,
                    date,
                    min_temp: round_i32(temperature.number_or("min", 0.0)),
                    max_temp: round_i32(temperature.number_or("max", 0.0)),
                    weather_info: weather_info(&skycon),
                    skycon,
                    life_index: life_index(daily.at("life_index"), index),
                }
            })
            .collect()
    }
}

/// Labels a day as "today", "tomorrow", "day after tomorrow", then by weekday name
pub fn relative_day_label(index: usize, weekday: &str) -> String {
    match index {
        0 => "today".to_string(),
        1 => "tomorrow".to_string(),
        2 => "day after tomorrow".to_string(),
        _ => weekday.to_string(),
    }
}

fn life_index(life_index: Document<'_>, day: usize) -> BTreeMap<String, LifeIndexEntry> {
    LIFE_INDEX_CATEGORIES
        .iter()
        .map(|category| {
            let entry = life_index.at(&format!("{category}.{day}"));
            let index = match entry.get("index") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => String::new(),
            };
            let description = entry.str_or("desc", NO_LIFE_INDEX);
            (category.to_string(), LifeIndexEntry { index, description })
        })
        .collect()
}
