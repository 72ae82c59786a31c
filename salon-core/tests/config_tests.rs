// ABOUTME: Tests for configuration loading from file and environment
// ABOUTME: Verifies search order, env var overrides, and startup validation

use salon_core::config::Config;
use salon_core::SetupError;
use serial_test::serial;

const CONFIG_ENV_VARS: &[&str] = &[
    "SALON_CONFIG_PATH",
    "MATRIX_HOME_SERVER",
    "MATRIX_USER_ID",
    "MATRIX_PASSWORD",
    "MATRIX_ACCESS_TOKEN",
    "MATRIX_DEVICE_NAME",
    "SALON_HOME_CHANNEL",
    "SALON_DATA_DIR",
    "SCHEDULER_TIMEZONE",
    "SCHEDULER_TICK_MILLIS",
    "NEWS_API_KEY",
    "GIPHY_API_KEY",
    "TWITCH_CLIENT_ID",
    "TWITCH_CLIENT_SECRET",
    "WEATHER_API_KEY",
];

/// Helper to clear all config-related env vars
fn clear_config_env_vars() {
    for key in CONFIG_ENV_VARS {
        std::env::remove_var(key);
    }
}

const FULL_CONFIG: &str = r#"
[matrix]
home_server = "https://matrix.example.com"
user_id = "@salon:example.com"
password = "secret123"

[bot]
home_channel = "!general:example.com"
data_dir = "/tmp/salon-test-data"

[scheduler]
timezone = "Europe/Paris"

[scheduler.jobs]
daily-report = "daily at 18:00"

[features.streams]
streamers = ["zerator", "ponce"]

[integrations]
news_api_key = "news"
giphy_api_key = "giphy"
twitch_client_id = "id"
twitch_client_secret = "secret"
weather_api_key = "weather"
"#;

#[test]
#[serial]
fn test_config_loads_from_toml_file() {
    clear_config_env_vars();
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("config.toml");
    std::fs::write(&path, FULL_CONFIG).unwrap();
    std::env::set_var("SALON_CONFIG_PATH", &path);

    let config = Config::load().unwrap();

    assert_eq!(config.matrix.home_server, "https://matrix.example.com");
    assert_eq!(config.bot.home_channel, "!general:example.com");
    assert_eq!(config.scheduler.timezone, "Europe/Paris");
    assert_eq!(config.scheduler.jobs["daily-report"], "daily at 18:00");
    assert_eq!(config.features.streams.streamers, vec!["zerator", "ponce"]);
    clear_config_env_vars();
}

#[test]
#[serial]
fn test_env_vars_override_file() {
    clear_config_env_vars();
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("config.toml");
    std::fs::write(&path, FULL_CONFIG).unwrap();
    std::env::set_var("SALON_CONFIG_PATH", &path);
    std::env::set_var("SALON_HOME_CHANNEL", "!other:example.com");
    std::env::set_var("SCHEDULER_TIMEZONE", "UTC");
    std::env::set_var("GIPHY_API_KEY", "from-env");

    let config = Config::load().unwrap();

    assert_eq!(config.bot.home_channel, "!other:example.com");
    assert_eq!(config.scheduler.timezone, "UTC");
    assert_eq!(config.integrations.giphy_api_key.as_deref(), Some("from-env"));
    clear_config_env_vars();
}

#[test]
#[serial]
fn test_env_only_configuration() {
    clear_config_env_vars();
    let tmp = tempfile::tempdir().unwrap();
    std::env::set_var("SALON_CONFIG_PATH", tmp.path().join("missing.toml"));
    std::env::set_var("SALON_DATA_DIR", tmp.path());
    std::env::set_var("MATRIX_HOME_SERVER", "https://matrix.example.com");
    std::env::set_var("MATRIX_USER_ID", "@salon:example.com");
    std::env::set_var("MATRIX_ACCESS_TOKEN", "syt_token");
    std::env::set_var("SALON_HOME_CHANNEL", "!general:example.com");
    std::env::set_var("SCHEDULER_TIMEZONE", "UTC");
    for key in [
        "NEWS_API_KEY",
        "GIPHY_API_KEY",
        "TWITCH_CLIENT_ID",
        "TWITCH_CLIENT_SECRET",
        "WEATHER_API_KEY",
    ] {
        std::env::set_var(key, "k");
    }

    // Only run this when no ./config.toml shadows the env-only setup
    if !std::path::Path::new("config.toml").exists() {
        let config = Config::load().unwrap();
        assert_eq!(config.matrix.access_token.as_deref(), Some("syt_token"));
        assert_eq!(config.bot.data_path(), tmp.path());
    }
    clear_config_env_vars();
}

#[test]
#[serial]
fn test_missing_secret_for_enabled_feature_aborts() {
    clear_config_env_vars();
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("config.toml");
    std::fs::write(&path, FULL_CONFIG.replace("news_api_key = \"news\"", "")).unwrap();
    std::env::set_var("SALON_CONFIG_PATH", &path);

    let err = Config::load().unwrap_err();
    let setup = err.downcast_ref::<SetupError>().unwrap();
    assert!(matches!(setup, SetupError::MissingCredential("NEWS_API_KEY")));
    clear_config_env_vars();
}

#[test]
#[serial]
fn test_invalid_tick_env_is_rejected() {
    clear_config_env_vars();
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("config.toml");
    std::fs::write(&path, FULL_CONFIG).unwrap();
    std::env::set_var("SALON_CONFIG_PATH", &path);
    std::env::set_var("SCHEDULER_TICK_MILLIS", "soon");

    let err = Config::load().unwrap_err();
    assert!(err.to_string().contains("SCHEDULER_TICK_MILLIS"));
    clear_config_env_vars();
}

#[test]
#[serial]
fn test_malformed_toml_reports_path() {
    clear_config_env_vars();
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("config.toml");
    std::fs::write(&path, "[matrix\nhome_server = ").unwrap();
    std::env::set_var("SALON_CONFIG_PATH", &path);

    let err = Config::load().unwrap_err();
    assert!(err.to_string().contains("Failed to parse"));
    clear_config_env_vars();
}
