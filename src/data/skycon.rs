//! Skycon code lookup
//!
//! Maps the weather provider's skycon codes (e.g. "LIGHT_RAIN") to a display
//! icon and description.

use serde::Serialize;

/// Skycon assumed when the provider omits one
pub const DEFAULT_SKYCON: &str = "CLEAR_DAY";

/// Display data for a skycon code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WeatherInfo {
    pub icon: &'static str,
    pub description: &'static str,
}

/// Entry returned for codes missing from the table
pub const UNKNOWN_WEATHER: WeatherInfo = WeatherInfo {
    icon: "🌤️",
    description: "Unknown",
};

static SKYCONS: [(&str, WeatherInfo); 19] = [
    ("CLEAR_DAY", WeatherInfo { icon: "☀️", description: "Clear" }),
    ("CLEAR_NIGHT", WeatherInfo { icon: "🌙", description: "Clear night" }),
    ("PARTLY_CLOUDY_DAY", WeatherInfo { icon: "⛅", description: "Partly cloudy" }),
    ("PARTLY_CLOUDY_NIGHT", WeatherInfo { icon: "☁️", description: "Partly cloudy night" }),
    ("CLOUDY", WeatherInfo { icon: "☁️", description: "Overcast" }),
    ("LIGHT_HAZE", WeatherInfo { icon: "🌫️", description: "Light haze" }),
    ("MODERATE_HAZE", WeatherInfo { icon: "🌫️", description: "Moderate haze" }),
    ("HEAVY_HAZE", WeatherInfo { icon: "🌫️", description: "Heavy haze" }),
    ("LIGHT_RAIN", WeatherInfo { icon: "🌦️", description: "Light rain" }),
    ("MODERATE_RAIN", WeatherInfo { icon: "🌧️", description: "Moderate rain" }),
    ("HEAVY_RAIN", WeatherInfo { icon: "⛈️", description: "Heavy rain" }),
    ("STORM_RAIN", WeatherInfo { icon: "⛈️", description: "Rainstorm" }),
    ("LIGHT_SNOW", WeatherInfo { icon: "🌨️", description: "Light snow" }),
    ("MODERATE_SNOW", WeatherInfo { icon: "❄️", description: "Moderate snow" }),
    ("HEAVY_SNOW", WeatherInfo { icon: "❄️", description: "Heavy snow" }),
    ("STORM_SNOW", WeatherInfo { icon: "❄️", description: "Snowstorm" }),
    ("DUST", WeatherInfo { icon: "🌪️", description: "Dust" }),
    ("SAND", WeatherInfo { icon: "🌪️", description: "Sandstorm" }),
    ("WIND", WeatherInfo { icon: "💨", description: "Strong wind" }),
];

/// Looks up the icon and description for a skycon code
///
/// Unrecognized codes map to [`UNKNOWN_WEATHER`].
pub fn weather_info(skycon: &str) -> WeatherInfo {
    SKYCONS
        .iter()
        .find(|(code, _)| *code == skycon)
        .map(|(_, info)| *info)
        .unwrap_or(UNKNOWN_WEATHER)
}
