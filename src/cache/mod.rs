//! In-memory weather cache and request coalescing
//!
//! `WeatherCache` stores normalized forecasts keyed by rounded coordinates with
//! a TTL and LRU eviction. `RequestCoalescer` owns the cache together with the
//! registry of in-flight upstream fetches, so concurrent identical requests
//! share one fetch and repeated requests inside the TTL never hit the network.
//! `StatsSnapshot` reports the hit rate, upstream calls and recent fetch times.

mod coalescer;
mod lru;
mod stats;

pub use coalescer::RequestCoalescer;
pub use lru::{WeatherCache, DEFAULT_CAPACITY, DEFAULT_TTL};
pub use stats::{StatsSnapshot, LOAD_TIME_WINDOW};
