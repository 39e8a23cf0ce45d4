//! Integration tests for the skycast binary
//!
//! Only offline paths are exercised: argument errors, gazetteer hits, and the
//! demo forecast served when no weather token is configured.

use std::process::{Command, Output};

use tempfile::TempDir;

/// Runs the binary with an empty config file and no API credentials
fn run_cli(args: &[&str]) -> Output {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "").expect("Failed to write config");

    Command::new(env!("CARGO_BIN_EXE_skycast"))
        .args(args)
        .arg("--config")
        .arg(&config)
        .env_remove("CAIYUN_API_TOKEN")
        .env_remove("AMAP_API_KEY")
        .env("RUST_LOG", "skycast=warn")
        .output()
        .expect("Failed to execute skycast")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

#[test]
fn test_help_flag_exits_successfully() {
    let output = Command::new(env!("CARGO_BIN_EXE_skycast"))
        .arg("--help")
        .output()
        .expect("Failed to execute skycast");
    assert!(output.status.success(), "Expected --help to exit successfully");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("skycast"), "Help should mention skycast");
    assert!(stdout.contains("weather"), "Help should list the weather subcommand");
    assert!(stdout.contains("search"), "Help should list the search subcommand");
}

#[test]
fn test_missing_subcommand_fails() {
    let output = Command::new(env!("CARGO_BIN_EXE_skycast"))
        .output()
        .expect("Failed to execute skycast");
    assert!(!output.status.success());
}

#[test]
fn test_out_of_range_coordinates_fail() {
    let output = run_cli(&["weather", "--lat", "123", "--lng", "10"]);
    assert!(!output.status.success(), "Expected invalid latitude to fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("invalid coordinate"),
        "Should explain the coordinate error: {}",
        stderr
    );
}

#[test]
fn test_search_answers_from_gazetteer() {
    let output = run_cli(&["search", "Hangzhou"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let hits = stdout_json(&output);
    let hits = hits.as_array().expect("search output is a list");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["display_name"], "Hangzhou");
    assert_eq!(hits[0]["coordinate"]["latitude"], 30.2741);
}

#[test]
fn test_weather_by_query_uses_demo_forecast() {
    let output = run_cli(&["weather", "--query", "Beijing"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let report = stdout_json(&output);
    assert_eq!(report["fallback"], false);
    assert_eq!(report["location"]["display_name"], "Beijing");
    assert_eq!(report["weather"]["current"]["skycon"], "MODERATE_RAIN");
    assert_eq!(report["weather"]["current"]["pressure_hpa"], 1007);
    assert_eq!(report["weather"]["hourly"].as_array().map(Vec::len), Some(24));
    assert_eq!(report["weather"]["daily"][0]["relative_label"], "today");
}

#[test]
fn test_invalid_config_file_fails() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "daily_steps = 0").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_skycast"))
        .args(["search", "Beijing", "--config"])
        .arg(&config)
        .output()
        .expect("Failed to execute skycast");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("daily_steps"), "stderr: {}", stderr);
}
