//! Skycast - weather forecasts for a coordinate, place name, or IP address
//!
//! Results are printed to stdout as JSON; logs go to stderr.

use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use skycast::cli::{Cli, CliError, Command, LocationRequest};
use skycast::data::DEFAULT_LOCATION;
use skycast::{Config, LocationCandidate, NormalizedWeather, WeatherResolutionService};

/// Output of the `weather` subcommand
#[derive(Serialize)]
struct WeatherReport<'a> {
    location: &'a LocationCandidate,
    /// Set when resolution failed and the default city was used instead
    fallback: bool,
    weather: &'a NormalizedWeather,
}

#[derive(Serialize)]
struct GeocodeReport<'a> {
    address: &'a str,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("skycast=info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// The city used when a location cannot be resolved
fn default_location() -> Result<LocationCandidate, CliError> {
    let coordinate = skycast::Coordinate::new(DEFAULT_LOCATION.longitude, DEFAULT_LOCATION.latitude)?;
    Ok(LocationCandidate {
        coordinate,
        display_name: DEFAULT_LOCATION.name.to_string(),
        address: DEFAULT_LOCATION.address.to_string(),
    })
}

/// Turns a location request into a concrete place
///
/// Returns the place and whether the default city had to be substituted.
async fn resolve_location(
    service: &WeatherResolutionService,
    request: LocationRequest,
) -> Result<(LocationCandidate, bool), CliError> {
    match request {
        LocationRequest::Coordinates(coordinate) => {
            let address = service.reverse_geocode(coordinate).await;
            Ok((
                LocationCandidate {
                    coordinate,
                    display_name: address.clone(),
                    address,
                },
                false,
            ))
        }
        LocationRequest::Query(text) => match service.resolve_by_query(&text).await.into_iter().next() {
            Some(candidate) => Ok((candidate, false)),
            None => {
                warn!(query = %text, "no place found, using default location");
                Ok((default_location()?, true))
            }
        },
        LocationRequest::Ip(ip) => match service.resolve_by_ip(ip).await {
            Ok(candidate) => Ok((candidate, false)),
            Err(err) => {
                warn!(error = %err, "IP location failed, using default location");
                Ok((default_location()?, true))
            }
        },
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(cli.config.as_deref())?;
    let service = WeatherResolutionService::from_config(&config)?;

    match cli.command {
        Command::Weather(args) => {
            let request = args.location_request()?;
            let (location, fallback) = resolve_location(&service, request).await?;
            let weather = service.resolve_by_coordinates(location.coordinate).await?;
            print_json(&WeatherReport {
                location: &location,
                fallback,
                weather: &weather,
            })?;
        }
        Command::Locate { ip } => {
            let found = service.resolve_by_ip(ip).await?;
            print_json(&found)?;
        }
        Command::Search { text } => {
            let text = text.join(" ");
            if text.trim().is_empty() {
                return Err(CliError::EmptyQuery.into());
            }
            print_json(&service.resolve_by_query(&text).await)?;
        }
        Command::Geocode(args) => {
            let coordinate = args.coordinate()?;
            let address = service.reverse_geocode(coordinate).await;
            print_json(&GeocodeReport { address: &address })?;
        }
    }

    debug!(stats = ?service.stats(), "weather cache statistics");
    service.shutdown();
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
