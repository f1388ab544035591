//! Daemon configuration loading tests.
//!
//! Covers file -> env -> CLI precedence and the default-path fallback.

use std::io::Write;

use clap::Parser;
use serial_test::serial;

use loginwatch_daemon::cli::DaemonCli;
use loginwatch_daemon::orchestrator::load_config;

fn config_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    file.write_all(contents.as_bytes()).expect("write config");
    file.flush().expect("flush");
    file
}

fn cli(args: &[&str]) -> DaemonCli {
    DaemonCli::parse_from(std::iter::once("loginwatch-daemon").chain(args.iter().copied()))
}

#[tokio::test]
#[serial]
async fn test_file_values_are_loaded() {
    // Given: A config file with custom detector settings
    let file = config_file(
        r#"
[detector]
log_file = "/var/log/secure"
dedup_window_secs = 10

[notify.telegram]
enabled = true
bot_token = "42:XYZ"
chat_id = "-1001"
"#,
    );

    // When: Loading through the CLI path
    let config = load_config(&cli(&["--config", file.path().to_str().unwrap()]))
        .await
        .expect("config should load");

    // Then: File values are applied on top of defaults
    assert_eq!(config.detector.log_file, "/var/log/secure");
    assert_eq!(config.detector.dedup_window_secs, 10);
    assert_eq!(config.notify.enabled_count(), 1);
    assert_eq!(config.server.refresh_interval_secs, 60);
}

#[tokio::test]
#[serial]
async fn test_cli_overrides_env_and_file() {
    // Given: File, environment, and CLI all set the log level
    let file = config_file("[general]\nlog_level = \"warn\"\n");
    // SAFETY: tests touching the environment run serially.
    unsafe { std::env::set_var("LOGINWATCH_GENERAL_LOG_LEVEL", "error") };

    // When: Loading with a CLI override
    let result = load_config(&cli(&[
        "--config",
        file.path().to_str().unwrap(),
        "--log-level",
        "debug",
        "--pid-file",
        "",
    ]))
    .await;
    unsafe { std::env::remove_var("LOGINWATCH_GENERAL_LOG_LEVEL") };

    // Then: The CLI value wins
    let config = result.expect("config should load");
    assert_eq!(config.general.log_level, "debug");
    assert!(config.general.pid_file.is_empty());
}

#[tokio::test]
#[serial]
async fn test_env_overrides_file() {
    let file = config_file("[detector]\ntail_command = \"tail\"\n");
    unsafe { std::env::set_var("LOGINWATCH_DETECTOR_TAIL_COMMAND", "/usr/bin/tail") };

    let result = load_config(&cli(&["--config", file.path().to_str().unwrap()])).await;
    unsafe { std::env::remove_var("LOGINWATCH_DETECTOR_TAIL_COMMAND") };

    assert_eq!(
        result.expect("config should load").detector.tail_command,
        "/usr/bin/tail"
    );
}

#[tokio::test]
#[serial]
async fn test_missing_explicit_config_is_error() {
    // Given: An explicit path that does not exist
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("nope.toml");

    // When/Then: Loading fails
    let err = load_config(&cli(&["--config", missing.to_str().unwrap()]))
        .await
        .expect_err("missing explicit config should fail");
    assert!(err.to_string().contains("failed to load config"));
}

#[tokio::test]
#[serial]
async fn test_invalid_cli_override_fails_validation() {
    // Given: A valid file but an invalid CLI log format
    let file = config_file("");

    // When/Then: Validation rejects the override
    let err = load_config(&cli(&[
        "--config",
        file.path().to_str().unwrap(),
        "--log-format",
        "xml",
    ]))
    .await
    .expect_err("invalid log format should fail");
    assert!(err.to_string().contains("config validation failed"));
}

#[tokio::test]
#[serial]
async fn test_relative_log_file_override_is_rejected() {
    let file = config_file("");

    let err = load_config(&cli(&[
        "--config",
        file.path().to_str().unwrap(),
        "--log-file",
        "auth.log",
    ]))
    .await
    .expect_err("relative log file should fail");
    assert!(err.to_string().contains("detector.log_file"));
}

#[test]
fn test_example_config_parses() {
    // The shipped example must stay a valid configuration.
    let example = include_str!("../../loginwatch.toml.example");
    let config = loginwatch_core::config::LoginwatchConfig::parse(example)
        .expect("example config should parse");
    config.validate().expect("example config should validate");

    let raw: toml::Value = toml::from_str(example).expect("valid toml");
    assert!(raw.get("notify").is_some());
}
