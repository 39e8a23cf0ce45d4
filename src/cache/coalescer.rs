//! Request coalescing in front of the weather cache
//!
//! Concurrent requests for the same key share one upstream fetch. The fetch
//! runs as a spawned task, so a caller that gives up (drops its future) does not
//! cancel it; the result still lands in the cache for the remaining awaiters.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use super::lru::WeatherCache;
use super::stats::{CacheStats, StatsSnapshot};
use crate::data::NormalizedWeather;
use crate::error::ResolveError;

type FetchResult = Result<Arc<NormalizedWeather>, ResolveError>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

struct State {
    cache: WeatherCache,
    in_flight: HashMap<String, SharedFetch>,
    stats: CacheStats,
    open: bool,
}

/// Owner of the weather cache and the in-flight registry
///
/// Cloning yields another handle to the same cache.
#[derive(Clone)]
pub struct RequestCoalescer {
    state: Arc<Mutex<State>>,
}

impl RequestCoalescer {
    /// Creates an open coalescer with an empty cache
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                cache: WeatherCache::new(capacity, ttl),
                in_flight: HashMap::new(),
                stats: CacheStats::default(),
                open: true,
            })),
        }
    }

    /// Returns the cached value for `key`, joins an in-flight fetch for it, or
    /// starts `fetch`
    ///
    /// The cache check and in-flight registration happen under one lock with no
    /// suspension point in between, so two callers can never both start a fetch
    /// for the same key. `fetch` is only invoked on a full miss and must not
    /// block; the future it returns is driven on a background task.
    ///
    /// Failures are handed to every awaiter but never cached.
    ///
    /// # Arguments
    /// * `key` - Cache key, normally `Coordinate::cache_key`
    /// * `fetch` - Builds the upstream future on a full miss
    ///
    /// # Returns
    /// * `Ok(Arc<NormalizedWeather>)` - Cached or freshly fetched forecast
    /// * `Err(ResolveError)` - The shared fetch failed, or the coalescer is
    ///   shut down
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> FetchResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<NormalizedWeather, ResolveError>> + Send + 'static,
    {
        let pending = {
            let mut state = self.state.lock();
            if !state.open {
                return Err(ResolveError::ShutDown);
            }

            if let Some(hit) = state.cache.get(key) {
                debug!(key, "weather cache hit");
                state.stats.record_hit();
                return Ok(hit);
            }

            if let Some(pending) = state.in_flight.get(key) {
                debug!(key, "joining in-flight weather fetch");
                let pending = pending.clone();
                state.stats.record_coalesced();
                pending
            } else {
                debug!(key, "weather cache miss, starting fetch");
                state.stats.record_miss();
                let pending = self.spawn_fetch(key.to_string(), fetch());
                state.in_flight.insert(key.to_string(), pending.clone());
                pending
            }
        };

        pending.await
    }

    /// Spawns the upstream call and wraps its handle as a shareable future
    ///
    /// Called with the state lock held; the task takes the lock itself when it
    /// settles, which cannot happen before the registration is complete.
    fn spawn_fetch<Fut>(&self, key: String, fetch: Fut) -> SharedFetch
    where
        Fut: Future<Output = Result<NormalizedWeather, ResolveError>> + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        let task_key = key.clone();
        let started = Instant::now();
        let handle = tokio::spawn(async move {
            let result = fetch.await.map(Arc::new);

            let mut state = state.lock();
            state.in_flight.remove(&task_key);
            state.stats.record_settled(started.elapsed(), result.is_err());
            match &result {
                Ok(value) if state.open => {
                    state.cache.purge_expired();
                    state.cache.insert(task_key, Arc::clone(value));
                }
                Ok(_) => {}
                Err(err) => debug!(key = %task_key, error = %err, "weather fetch failed, not cached"),
            }
            result
        });

        let state = Arc::clone(&self.state);
        async move {
            match handle.await {
                Ok(result) => result,
                Err(join_err) => {
                    let mut state = state.lock();
                    state.in_flight.remove(&key);
                    state.stats.record_settled(started.elapsed(), true);
                    Err(ResolveError::Internal(join_err.to_string()))
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Drops every cached entry; in-flight fetches are unaffected
    pub fn clear(&self) {
        self.state.lock().cache.clear();
    }

    /// Closes the coalescer
    ///
    /// Cached entries and in-flight registrations are dropped. Callers already
    /// awaiting a fetch still receive its result; new calls fail with
    /// [`ResolveError::ShutDown`].
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        state.open = false;
        state.cache.clear();
        state.in_flight.clear();
    }

    pub fn is_shut_down(&self) -> bool {
        !self.state.lock().open
    }

    pub fn in_flight_count(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    pub fn cached_len(&self) -> usize {
        self.state.lock().cache.len()
    }

    /// Returns the hit, miss and upstream counters gathered so far
    ///
    /// Counters survive [`clear`](Self::clear) and [`shutdown`](Self::shutdown).
    pub fn stats(&self) -> StatsSnapshot {
        self.state.lock().stats.snapshot()
    }
}
