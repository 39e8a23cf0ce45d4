//! Runtime configuration
//!
//! Values come from, in increasing priority: built-in defaults, a TOML file
//! (an explicit path, else `config.toml` in the platform config directory when
//! present), and the `CAIYUN_API_TOKEN` / `AMAP_API_KEY` environment variables.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

use crate::providers::weather::CAIYUN_BASE_URL;

/// Environment variable holding the weather API token
pub const TOKEN_ENV: &str = "CAIYUN_API_TOKEN";

/// Environment variable holding the Amap search key
pub const AMAP_KEY_ENV: &str = "AMAP_API_KEY";

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`Config`]
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of its allowed range
    #[error("invalid config: {0}")]
    Invalid(String),

    /// The HTTP client could not be constructed
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Per-lookup provider timeouts, in seconds
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub geolocation_secs: u64,
    pub search_secs: u64,
    /// Nominatim search is slower than the other search backends
    pub nominatim_search_secs: u64,
    pub reverse_geocode_secs: u64,
    pub weather_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            geolocation_secs: 5,
            search_secs: 3,
            nominatim_search_secs: 5,
            reverse_geocode_secs: 5,
            weather_secs: 10,
        }
    }
}

impl Timeouts {
    pub fn geolocation(&self) -> Duration {
        Duration::from_secs(self.geolocation_secs)
    }

    pub fn search(&self) -> Duration {
        Duration::from_secs(self.search_secs)
    }

    pub fn nominatim_search(&self) -> Duration {
        Duration::from_secs(self.nominatim_search_secs)
    }

    pub fn reverse_geocode(&self) -> Duration {
        Duration::from_secs(self.reverse_geocode_secs)
    }

    pub fn weather(&self) -> Duration {
        Duration::from_secs(self.weather_secs)
    }
}

/// Weather cache sizing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub ttl_secs: u64,
    pub capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: crate::cache::DEFAULT_TTL.as_secs(),
            capacity: crate::cache::DEFAULT_CAPACITY,
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Caiyun API token; without one the offline demo forecast is served
    pub caiyun_api_token: Option<String>,
    /// Amap key; without one the Amap search provider is skipped
    pub amap_api_key: Option<String>,
    pub weather_base_url: String,
    /// Days of forecast to request (1-7)
    pub daily_steps: u8,
    /// Hours of forecast to request (1-24)
    pub hourly_steps: u8,
    pub timeouts: Timeouts,
    pub cache: CacheSettings,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            caiyun_api_token: None,
            amap_api_key: None,
            weather_base_url: CAIYUN_BASE_URL.to_string(),
            daily_steps: 3,
            hourly_steps: 24,
            timeouts: Timeouts::default(),
            cache: CacheSettings::default(),
            user_agent: concat!("skycast/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Config {
    /// Returns the default config file location, if the platform has a config directory
    pub fn default_path() -> Option<PathBuf> {
        let project_dirs = ProjectDirs::from("", "", "skycast")?;
        Some(project_dirs.config_dir().join("config.toml"))
    }

    /// Loads configuration from file and environment
    ///
    /// # Arguments
    /// * `path` - Explicit config file; it must exist. When `None`, the
    ///   default location is used only if a file is there.
    ///
    /// # Returns
    /// * `Ok(Config)` - Validated configuration
    /// * `Err(ConfigError)` - If the file is unreadable, malformed, or has
    ///   out-of-range values
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().filter(|p| p.is_file()),
        };

        let mut config = match file {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading config file");
                Self::from_file(&path)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML config file without validating it
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Applies environment overrides; blank values are ignored
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(token) = non_blank(TOKEN_ENV) {
            self.caiyun_api_token = Some(token);
        }
        if let Some(key) = non_blank(AMAP_KEY_ENV) {
            self.amap_api_key = Some(key);
        }
    }

    /// Checks that every value is in range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=7).contains(&self.daily_steps) {
            return Err(ConfigError::Invalid(format!(
                "daily_steps must be between 1 and 7, got {}",
                self.daily_steps
            )));
        }
        if !(1..=24).contains(&self.hourly_steps) {
            return Err(ConfigError::Invalid(format!(
                "hourly_steps must be between 1 and 24, got {}",
                self.hourly_steps
            )));
        }
        if self.cache.capacity == 0 || self.cache.ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "cache capacity and ttl_secs must be positive".to_string(),
            ));
        }
        let timeouts = [
            ("geolocation_secs", self.timeouts.geolocation_secs),
            ("search_secs", self.timeouts.search_secs),
            ("nominatim_search_secs", self.timeouts.nominatim_search_secs),
            ("reverse_geocode_secs", self.timeouts.reverse_geocode_secs),
            ("weather_secs", self.timeouts.weather_secs),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, secs)| *secs == 0) {
            return Err(ConfigError::Invalid(format!("timeouts.{name} must be positive")));
        }
        if self.weather_base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("weather_base_url is empty".to_string()));
        }
        Ok(())
    }

    /// Returns the token to use for the weather provider, if any
    pub fn weather_token(&self) -> Option<&str> {
        self.caiyun_api_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    pub fn amap_key(&self) -> Option<&str> {
        self.amap_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}
