//! Weather resolution service
//!
//! Composes the provider chains, the normalizer, and the request coalescer
//! into the four caller-facing operations.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::cache::{RequestCoalescer, StatsSnapshot, DEFAULT_CAPACITY, DEFAULT_TTL};
use crate::chain::{Provider, ProviderChain};
use crate::config::{Config, ConfigError, Timeouts};
use crate::data::{
    search_gazetteer, Coordinate, LocationCandidate, MatchMode, NormalizedWeather,
    RawWeatherPayload, UNKNOWN_LOCATION,
};
use crate::error::ResolveError;
use crate::normalize::ResponseNormalizer;
use crate::providers::{
    http_client, AmapSearch, CaiyunWeather, DemoWeather, IpApiLocator, IpInfoLocator,
    MeituanIpLocator, MeituanReverseGeocoder, NominatimReverseGeocoder, NominatimSearch,
    PhotonSearch,
};

type WeatherChain = ProviderChain<Coordinate, RawWeatherPayload>;
type IpChain = ProviderChain<Option<IpAddr>, LocationCandidate>;
type SearchChain = ProviderChain<str, Vec<LocationCandidate>>;
type ReverseChain = ProviderChain<Coordinate, String>;

/// Entry point for weather and location lookups
pub struct WeatherResolutionService {
    weather: Arc<WeatherChain>,
    ip_locators: IpChain,
    search: SearchChain,
    reverse: ReverseChain,
    normalizer: ResponseNormalizer,
    coalescer: RequestCoalescer,
}

impl WeatherResolutionService {
    /// Starts an empty builder; providers are tried in the order added
    pub fn builder() -> ServiceBuilder {
        ServiceBuilder::new()
    }

    /// Builds the service with the production provider roster
    ///
    /// Without a weather token the offline demo forecast is used; without an
    /// Amap key the Amap search provider is left out.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let client = http_client(&config.user_agent)?;
        let mut builder = ServiceBuilder::new()
            .timeouts(&config.timeouts)
            .cache(config.cache.capacity, config.cache.ttl())
            .forecast_steps(config.hourly_steps, config.daily_steps);

        builder = match config.weather_token() {
            Some(token) => builder.weather_provider(
                CaiyunWeather::new(client.clone(), token, config.daily_steps, config.hourly_steps)
                    .with_base_url(config.weather_base_url.clone()),
            ),
            None => {
                info!("no weather API token configured, serving demo forecast");
                builder.weather_provider(DemoWeather::new(config.daily_steps, config.hourly_steps))
            }
        };

        builder = builder
            .ip_locator(MeituanIpLocator::new(client.clone()))
            .ip_locator(IpApiLocator::new(client.clone()))
            .ip_locator(IpInfoLocator::new(client.clone()))
            .reverse_geocoder(MeituanReverseGeocoder::new(client.clone()))
            .reverse_geocoder(NominatimReverseGeocoder::new(client.clone()));

        if let Some(key) = config.amap_key() {
            builder = builder.search_provider(AmapSearch::new(client.clone(), key));
        }
        builder = builder
            .search_provider(PhotonSearch::new(client.clone()))
            .search_provider(
                NominatimSearch::new(client).with_timeout(config.timeouts.nominatim_search()),
            );

        Ok(builder.build())
    }

    /// Resolves the forecast for a coordinate, served from cache when fresh
    ///
    /// Concurrent calls for coordinates sharing a cache key cause a single
    /// upstream fetch.
    ///
    /// # Arguments
    /// * `coordinate` - The viewer's position; its longitude also sets the
    ///   approximate local timezone of the labels
    ///
    /// # Returns
    /// * `Ok(Arc<NormalizedWeather>)` - Fresh or cached forecast
    /// * `Err(ResolveError)` - Every weather provider failed, the payload
    ///   lacked a mandatory block, or the service was shut down
    pub async fn resolve_by_coordinates(
        &self,
        coordinate: Coordinate,
    ) -> Result<Arc<NormalizedWeather>, ResolveError> {
        let key = coordinate.cache_key();
        let chain = Arc::clone(&self.weather);
        let normalizer = self.normalizer.clone();

        self.coalescer
            .get_or_fetch(&key, move || async move {
                let raw = chain.resolve(&coordinate).await?;
                let weather = normalizer.normalize(&raw, coordinate.longitude(), Utc::now())?;
                info!(
                    longitude = coordinate.longitude(),
                    latitude = coordinate.latitude(),
                    "weather resolved"
                );
                Ok::<_, ResolveError>(weather)
            })
            .await
    }

    /// Locates an IP address through the IP-location chain
    ///
    /// # Arguments
    /// * `ip` - Address to locate. `None`, or an address that is not publicly
    ///   routable, locates the address the request comes from.
    ///
    /// # Returns
    /// * `Ok(LocationCandidate)` - The first provider's answer
    /// * `Err(ResolveError::AllProvidersExhausted)` - One reason per provider
    pub async fn resolve_by_ip(&self, ip: Option<IpAddr>) -> Result<LocationCandidate, ResolveError> {
        let found = self.ip_locators.resolve(&ip).await?;
        info!(address = %found.address, "ip located");
        Ok(found)
    }

    /// Returns candidates for a free-text place query, best first
    ///
    /// The built-in gazetteer is consulted first; online providers only run
    /// when it has no match. If every provider fails a case-insensitive
    /// gazetteer pass is tried. Never fails: no match is an empty list.
    pub async fn resolve_by_query(&self, text: &str) -> Vec<LocationCandidate> {
        let query = text.trim();
        if query.is_empty() {
            return Vec::new();
        }

        let local = search_gazetteer(query, MatchMode::Exact);
        if !local.is_empty() {
            info!(query, hits = local.len(), "query answered from gazetteer");
            return local;
        }

        match self.search.resolve(query).await {
            Ok(candidates) => candidates,
            Err(err) => {
                warn!(query, error = %err, "online search failed, trying fuzzy gazetteer match");
                search_gazetteer(query, MatchMode::CaseInsensitive)
            }
        }
    }

    /// Returns a human-readable address for a coordinate, or `"unknown location"`
    pub async fn reverse_geocode(&self, coordinate: Coordinate) -> String {
        match self.reverse.resolve(&coordinate).await {
            Ok(address) => address,
            Err(err) => {
                warn!(error = %err, "reverse geocoding failed");
                UNKNOWN_LOCATION.to_string()
            }
        }
    }

    /// Drops cached forecasts; in-flight fetches still complete
    pub fn clear_cache(&self) {
        self.coalescer.clear();
    }

    /// Stops serving forecasts; later weather calls fail with `ShutDown`
    pub fn shutdown(&self) {
        self.coalescer.shutdown();
    }

    /// Returns the weather cache counters: hits, misses, coalesced waits,
    /// upstream calls, errors and the average recent fetch time.
    pub fn stats(&self) -> StatsSnapshot {
        self.coalescer.stats()
    }

    pub fn coalescer(&self) -> &RequestCoalescer {
        &self.coalescer
    }
}

/// Assembles a [`WeatherResolutionService`] from individual providers
pub struct ServiceBuilder {
    weather: WeatherChain,
    ip_locators: IpChain,
    search: SearchChain,
    reverse: ReverseChain,
    normalizer: ResponseNormalizer,
    capacity: usize,
    ttl: Duration,
}

impl Default for ServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceBuilder {
    pub fn new() -> Self {
        let timeouts = Timeouts::default();
        Self {
            weather: ProviderChain::new("weather", timeouts.weather()),
            ip_locators: ProviderChain::new("ip-location", timeouts.geolocation()),
            search: ProviderChain::new("search", timeouts.search()),
            reverse: ProviderChain::new("reverse-geocode", timeouts.reverse_geocode()),
            normalizer: ResponseNormalizer::new(),
            capacity: DEFAULT_CAPACITY,
            ttl: DEFAULT_TTL,
        }
    }

    /// Replaces the per-chain default timeouts
    pub fn timeouts(mut self, timeouts: &Timeouts) -> Self {
        self.weather.set_default_timeout(timeouts.weather());
        self.ip_locators.set_default_timeout(timeouts.geolocation());
        self.search.set_default_timeout(timeouts.search());
        self.reverse.set_default_timeout(timeouts.reverse_geocode());
        self
    }

    pub fn cache(mut self, capacity: usize, ttl: Duration) -> Self {
        self.capacity = capacity;
        self.ttl = ttl;
        self
    }

    /// Caps the hourly and daily series kept from each payload
    pub fn forecast_steps(mut self, hourly: u8, daily: u8) -> Self {
        self.normalizer = ResponseNormalizer::with_limits(hourly as usize, daily as usize);
        self
    }

    pub fn weather_provider<P>(mut self, provider: P) -> Self
    where
        P: Provider<Coordinate, RawWeatherPayload> + 'static,
    {
        self.weather.push(Box::new(provider));
        self
    }

    pub fn ip_locator<P>(mut self, provider: P) -> Self
    where
        P: Provider<Option<IpAddr>, LocationCandidate> + 'static,
    {
        self.ip_locators.push(Box::new(provider));
        self
    }

    pub fn search_provider<P>(mut self, provider: P) -> Self
    where
        P: Provider<str, Vec<LocationCandidate>> + 'static,
    {
        self.search.push(Box::new(provider));
        self
    }

    pub fn reverse_geocoder<P>(mut self, provider: P) -> Self
    where
        P: Provider<Coordinate, String> + 'static,
    {
        self.reverse.push(Box::new(provider));
        self
    }

    pub fn build(self) -> WeatherResolutionService {
        WeatherResolutionService {
            weather: Arc::new(self.weather),
            ip_locators: self.ip_locators,
            search: self.search,
            reverse: self.reverse,
            normalizer: self.normalizer,
            coalescer: RequestCoalescer::new(self.capacity, self.ttl),
        }
    }
}
