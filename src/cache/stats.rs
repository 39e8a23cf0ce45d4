//! Cache and upstream fetch statistics
//!
//! Counters are updated by the coalescer while it holds its state lock, so a
//! snapshot is always internally consistent.

use std::collections::VecDeque;
use std::time::Duration;

use serde::Serialize;

/// Number of recent fetch durations kept for the average
pub const LOAD_TIME_WINDOW: usize = 100;

/// Running counters owned by a `RequestCoalescer`
#[derive(Debug, Default)]
pub(crate) struct CacheStats {
    hits: u64,
    misses: u64,
    coalesced: u64,
    upstream_calls: u64,
    errors: u64,
    load_times: VecDeque<Duration>,
}

impl CacheStats {
    pub(crate) fn record_hit(&mut self) {
        self.hits += 1;
    }

    /// Records a miss that started a new upstream fetch
    pub(crate) fn record_miss(&mut self) {
        self.misses += 1;
        self.upstream_calls += 1;
    }

    pub(crate) fn record_coalesced(&mut self) {
        self.coalesced += 1;
    }

    /// Records a settled fetch and how long it took
    ///
    /// Only the most recent [`LOAD_TIME_WINDOW`] durations are kept.
    pub(crate) fn record_settled(&mut self, elapsed: Duration, failed: bool) {
        if failed {
            self.errors += 1;
        }
        if self.load_times.len() == LOAD_TIME_WINDOW {
            self.load_times.pop_front();
        }
        self.load_times.push_back(elapsed);
    }

    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        let lookups = self.hits + self.misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64 * 100.0
        };
        let average_load_ms = if self.load_times.is_empty() {
            0.0
        } else {
            let total: Duration = self.load_times.iter().sum();
            total.as_secs_f64() * 1000.0 / self.load_times.len() as f64
        };

        StatsSnapshot {
            cache_hits: self.hits,
            cache_misses: self.misses,
            coalesced_waits: self.coalesced,
            upstream_calls: self.upstream_calls,
            errors: self.errors,
            hit_rate,
            average_load_ms,
            load_samples: self.load_times.len(),
        }
    }
}

/// Point-in-time view of the weather cache counters
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub cache_hits: u64,
    /// Lookups that found neither a cached value nor an in-flight fetch
    pub cache_misses: u64,
    /// Lookups that joined a fetch already in flight
    pub coalesced_waits: u64,
    pub upstream_calls: u64,
    /// Fetches that settled with an error
    pub errors: u64,
    /// Hits as a percentage of hits plus misses, 0 before any lookup
    pub hit_rate: f64,
    /// Mean duration of the recent fetches, in milliseconds
    pub average_load_ms: f64,
    pub load_samples: usize,
}
