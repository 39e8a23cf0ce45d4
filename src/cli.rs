//! Command-line interface parsing for skycast
//!
//! Subcommands map one-to-one onto the service operations, except `weather`,
//! which first resolves a location from coordinates, a place name, or an IP
//! address and then fetches the forecast for it.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;

use crate::data::Coordinate;
use crate::error::ResolveError;

/// Error types for CLI argument validation
#[derive(Debug, Error)]
pub enum CliError {
    /// Latitude or longitude outside the valid range
    #[error("invalid coordinates: {0}")]
    InvalidCoordinate(#[from] ResolveError),

    /// A place query that is empty after trimming
    #[error("search text must not be empty")]
    EmptyQuery,
}

/// Skycast - weather and location lookups from the command line
#[derive(Parser, Debug)]
#[command(name = "skycast")]
#[command(about = "Resolve a location and fetch its weather forecast")]
#[command(version)]
pub struct Cli {
    /// Path to a TOML config file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Forecast for a location
    ///
    /// Examples:
    ///   skycast weather --lat 30.27 --lng 120.15
    ///   skycast weather --query Hangzhou
    ///   skycast weather --ip 36.110.1.2
    ///   skycast weather                    # locate by this machine's address
    Weather(WeatherArgs),

    /// Locate an IP address (this machine's public address when omitted)
    Locate {
        #[arg(value_name = "IP")]
        ip: Option<IpAddr>,
    },

    /// Search places by name
    Search {
        #[arg(value_name = "TEXT", required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Address for a coordinate
    Geocode(CoordinateArgs),
}

/// A latitude/longitude pair given as flags
#[derive(Args, Debug, Clone)]
pub struct CoordinateArgs {
    #[arg(long, allow_negative_numbers = true)]
    pub lat: f64,
    #[arg(long, allow_negative_numbers = true)]
    pub lng: f64,
}

impl CoordinateArgs {
    pub fn coordinate(&self) -> Result<Coordinate, CliError> {
        Ok(Coordinate::new(self.lng, self.lat)?)
    }
}

#[derive(Args, Debug, Clone)]
pub struct WeatherArgs {
    /// Latitude in degrees (-90 to 90)
    #[arg(long, requires = "lng", allow_negative_numbers = true)]
    pub lat: Option<f64>,

    /// Longitude in degrees (-180 to 180)
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    pub lng: Option<f64>,

    /// Place name to search for
    #[arg(long, conflicts_with_all = ["lat", "lng", "ip"])]
    pub query: Option<String>,

    /// Locate by IP address, or by this machine's address when no value is given
    #[arg(long, value_name = "ADDR", num_args = 0..=1, conflicts_with_all = ["lat", "lng"])]
    pub ip: Option<Option<IpAddr>>,
}

/// How the `weather` subcommand finds its location
#[derive(Debug, Clone, PartialEq)]
pub enum LocationRequest {
    Coordinates(Coordinate),
    Query(String),
    /// `None` means the caller's observed address
    Ip(Option<IpAddr>),
}

impl WeatherArgs {
    /// Validates the flags into a single location request
    ///
    /// # Returns
    /// * `Ok(LocationRequest)` - No flags means "locate by observed IP"
    /// * `Err(CliError)` - Out-of-range coordinates or a blank query
    pub fn location_request(&self) -> Result<LocationRequest, CliError> {
        if let (Some(lat), Some(lng)) = (self.lat, self.lng) {
            return Ok(LocationRequest::Coordinates(Coordinate::new(lng, lat)?));
        }
        if let Some(query) = &self.query {
            let query = query.trim();
            if query.is_empty() {
                return Err(CliError::EmptyQuery);
            }
            return Ok(LocationRequest::Query(query.to_string()));
        }
        Ok(LocationRequest::Ip(self.ip.flatten()))
    }
}
