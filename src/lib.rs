//! Skycast library
//!
//! Resolves a location hint (coordinates, free text, or an IP address) into a
//! normalized weather forecast. Lookups go through ordered provider chains with
//! per-call timeouts, and forecasts are cached and coalesced by rounded
//! coordinates.

pub mod cache;
pub mod chain;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod normalize;
pub mod providers;
pub mod service;
pub mod temporal;

pub use cache::StatsSnapshot;
pub use config::Config;
pub use data::{Coordinate, LocationCandidate, NormalizedWeather};
pub use error::{ProviderError, ResolveError};
pub use service::WeatherResolutionService;
