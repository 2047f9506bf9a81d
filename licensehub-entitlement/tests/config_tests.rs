use licensehub_entitlement::{ConfigError, LicenseHubConfig};
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use std::time::Duration;

// ── Defaults ─────────────────────────────────────────────────────

#[test]
fn defaults_match_documented_values() {
    let config = LicenseHubConfig::default();
    assert_eq!(config.database_path, PathBuf::from("licensehub.db"));
    assert_eq!(config.secret, None);
    assert_eq!(config.max_devices, 3);
    assert_eq!(config.max_requests_per_hour, 15);
    assert_eq!(config.rate_window_secs, 3600);
    assert_eq!(config.default_credits, 50);
    assert_eq!(config.default_duration_months, 1);
    assert_eq!(config.perform_timeout(), Duration::from_secs(10));
    assert_eq!(config.sweep_interval(), Duration::from_secs(3600));
    config.validate().unwrap();
}

#[test]
fn default_policy_is_hourly() {
    let policy = LicenseHubConfig::default().rate_limit_policy().unwrap();
    assert_eq!(policy.max_requests, 15);
    assert_eq!(policy.window, chrono::Duration::hours(1));
}

// ── Parsing ──────────────────────────────────────────────────────

#[test]
fn partial_file_keeps_other_defaults() {
    let config = LicenseHubConfig::from_toml_str(
        r#"
        database_path = "/var/lib/licensehub/licenses.db"
        max_devices = 5
        "#,
    )
    .unwrap();
    assert_eq!(
        config.database_path,
        PathBuf::from("/var/lib/licensehub/licenses.db")
    );
    assert_eq!(config.max_devices, 5);
    assert_eq!(config.default_credits, 50);
}

#[test]
fn malformed_toml_is_parse_error() {
    let err = LicenseHubConfig::from_toml_str("max_devices = \"many\"").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn zero_values_rejected() {
    for doc in [
        "default_duration_months = 0",
        "rate_window_secs = 0",
        "perform_timeout_secs = 0",
        "sweep_interval_secs = 0",
    ] {
        let err = LicenseHubConfig::from_toml_str(doc).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "{doc}");
    }
}

#[test]
fn secret_is_never_serialized_or_printed() {
    let config = LicenseHubConfig {
        secret: Some("hunter2".to_string()),
        ..LicenseHubConfig::default()
    };
    assert!(!format!("{config:?}").contains("hunter2"));
    assert!(!toml::to_string(&config).unwrap().contains("hunter2"));
}

// ── Loading ──────────────────────────────────────────────────────

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    assert_eq!(LicenseHubConfig::load_from(&path), LicenseHubConfig::default());
    assert_eq!(
        LicenseHubConfig::try_load_from(&path).unwrap(),
        LicenseHubConfig::default()
    );
}

#[test]
fn file_values_are_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("licensehub.toml");
    std::fs::write(&path, "default_credits = 120\nsecret = \"from-file\"\n").unwrap();

    let config = LicenseHubConfig::load_from(&path);
    assert_eq!(config.default_credits, 120);
    assert_eq!(config.secret.as_deref(), Some("from-file"));
    assert!(!config.key_secret().is_development());
}

#[test]
fn broken_file_falls_back_but_strict_load_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("licensehub.toml");
    std::fs::write(&path, "this is not toml = = =").unwrap();

    assert_eq!(LicenseHubConfig::load_from(&path), LicenseHubConfig::default());
    assert!(LicenseHubConfig::try_load_from(&path).is_err());
}

#[test]
fn missing_secret_uses_development_secret() {
    assert!(LicenseHubConfig::default().key_secret().is_development());
    let blank = LicenseHubConfig {
        secret: Some(String::new()),
        ..LicenseHubConfig::default()
    };
    assert!(blank.key_secret().is_development());
}
