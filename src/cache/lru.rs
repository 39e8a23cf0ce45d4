//! Bounded TTL + LRU cache for normalized forecasts
//!
//! Entries expire `ttl` after insertion. When the cache is full, inserting a
//! new key evicts the least recently used entry; both `get` and `insert` count
//! as a use.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::data::NormalizedWeather;

/// Default time-to-live for cache entries (5 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Default maximum number of cached locations
pub const DEFAULT_CAPACITY: usize = 50;

/// A cached forecast with its bookkeeping
#[derive(Debug)]
struct CacheEntry {
    /// The cached forecast
    value: Arc<NormalizedWeather>,
    /// When the entry was inserted or last refreshed
    inserted_at: Instant,
    /// Use counter value at the most recent access
    last_used: u64,
}

/// Bounded cache of normalized forecasts keyed by rounded coordinates
///
/// Time is read from `tokio::time::Instant`, so a paused test runtime controls
/// expiry.
#[derive(Debug)]
pub struct WeatherCache {
    entries: HashMap<String, CacheEntry>,
    capacity: usize,
    ttl: Duration,
    /// Monotonic use counter; higher means more recently used
    clock: u64,
}

impl Default for WeatherCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl WeatherCache {
    /// Creates an empty cache
    ///
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            ttl,
            clock: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Checks whether a live entry exists, without touching recency
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| !self.is_expired(entry))
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        entry.inserted_at.elapsed() >= self.ttl
    }

    /// Returns the cached forecast for `key` and marks it most recently used
    ///
    /// An expired entry is removed and reported as a miss.
    pub fn get(&mut self, key: &str) -> Option<Arc<NormalizedWeather>> {
        let expired = self.is_expired(self.entries.get(key)?);
        if expired {
            self.entries.remove(key);
            return None;
        }

        let now = self.tick();
        let entry = self.entries.get_mut(key)?;
        entry.last_used = now;
        Some(Arc::clone(&entry.value))
    }

    /// Inserts or refreshes `key`, evicting the least recently used entry
    /// when a new key would exceed capacity
    pub fn insert(&mut self, key: String, value: Arc<NormalizedWeather>) {
        let now = self.tick();

        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_one();
        }

        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
                last_used: now,
            },
        );
    }

    /// Drops an expired entry if there is one, else the least recently used
    fn evict_one(&mut self) {
        let victim = self
            .entries
            .iter()
            .find(|(_, entry)| self.is_expired(entry))
            .or_else(|| self.entries.iter().min_by_key(|(_, entry)| entry.last_used))
            .map(|(key, _)| key.clone());

        if let Some(key) = victim {
            tracing::debug!(key = %key, "evicting cache entry");
            self.entries.remove(&key);
        }
    }

    /// Removes every expired entry
    pub fn purge_expired(&mut self) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, entry| entry.inserted_at.elapsed() < ttl);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{weather_info, CurrentConditions};

    fn forecast(temperature: i32) -> Arc<NormalizedWeather> {
        Arc::new(NormalizedWeather {
            current: CurrentConditions {
                temperature,
                apparent_temperature: temperature,
                humidity: 50,
                wind_speed_kmh: 10,
                wind_direction_deg: 90,
                pressure_hpa: 1013,
                visibility_km: 10.0,
                skycon: "CLEAR_DAY".to_string(),
                weather_info: weather_info("CLEAR_DAY"),
                air_quality: serde_json::json!({}),
            },
            hourly: Vec::new(),
            daily: Vec::new(),
            forecast_keypoint: String::new(),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_returns_inserted_value() {
        let mut cache = WeatherCache::default();
        cache.insert("a".to_string(), forecast(21));

        let hit = cache.get("a").expect("fresh entry");
        assert_eq!(hit.current.temperature, 21);
        assert!(cache.get("b").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_served_before_ttl_and_evicted_after() {
        let mut cache = WeatherCache::new(50, Duration::from_secs(300));
        cache.insert("a".to_string(), forecast(1));

        tokio::time::advance(Duration::from_secs(240)).await;
        assert!(cache.get("a").is_some(), "served at T+4min");

        tokio::time::advance(Duration::from_secs(120)).await;
        assert!(cache.get("a").is_none(), "expired at T+6min");
        assert!(cache.is_empty(), "expired entry removed on get");
    }

    #[tokio::test(start_paused = true)]
    async fn test_access_does_not_extend_ttl() {
        let mut cache = WeatherCache::new(50, Duration::from_secs(300));
        cache.insert("a".to_string(), forecast(1));

        tokio::time::advance(Duration::from_secs(200)).await;
        assert!(cache.get("a").is_some());
        tokio::time::advance(Duration::from_secs(200)).await;
        assert!(cache.get("a").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reinsert_refreshes_ttl() {
        let mut cache = WeatherCache::new(50, Duration::from_secs(300));
        cache.insert("a".to_string(), forecast(1));
        tokio::time::advance(Duration::from_secs(200)).await;
        cache.insert("a".to_string(), forecast(2));
        tokio::time::advance(Duration::from_secs(200)).await;

        assert_eq!(cache.get("a").unwrap().current.temperature, 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lru_evicts_least_recently_accessed() {
        let mut cache = WeatherCache::new(50, DEFAULT_TTL);
        for i in 0..50 {
            cache.insert(format!("k{i}"), forecast(i));
        }
        // k0 is the oldest insert but was just used
        assert!(cache.get("k0").is_some());

        cache.insert("k50".to_string(), forecast(50));

        assert_eq!(cache.len(), 50);
        assert!(cache.contains("k0"));
        assert!(!cache.contains("k1"), "k1 was least recently used");
        assert!(cache.contains("k50"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lru_without_access_evicts_oldest() {
        let mut cache = WeatherCache::new(2, DEFAULT_TTL);
        cache.insert("a".to_string(), forecast(1));
        cache.insert("b".to_string(), forecast(2));
        cache.insert("c".to_string(), forecast(3));

        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
        assert!(cache.contains("c"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_updating_existing_key_at_capacity_does_not_evict() {
        let mut cache = WeatherCache::new(2, DEFAULT_TTL);
        cache.insert("a".to_string(), forecast(1));
        cache.insert("b".to_string(), forecast(2));
        cache.insert("a".to_string(), forecast(3));

        assert_eq!(cache.len(), 2);
        assert!(cache.contains("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_and_clear() {
        let mut cache = WeatherCache::new(10, Duration::from_secs(60));
        cache.insert("old".to_string(), forecast(1));
        tokio::time::advance(Duration::from_secs(90)).await;
        cache.insert("new".to_string(), forecast(2));

        cache.purge_expired();
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("new"));

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let cache = WeatherCache::new(0, DEFAULT_TTL);
        assert_eq!(cache.capacity(), 1);
    }
}
