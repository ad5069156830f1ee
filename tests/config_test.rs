//! Tests for config module

use std::time::Duration;

use idea_forge::config::{Config, ConfigOptions, DEFAULT_BASE_URL, DEFAULT_MODEL};

fn test_config(api_key: &str, options: ConfigOptions) -> Result<std::sync::Arc<Config>, anyhow::Error> {
    Config::new(api_key.to_string(), 3000, options)
}

#[test]
fn test_config_new_with_valid_inputs() {
    let config = test_config("test-key", ConfigOptions::default()).unwrap();
    assert_eq!(config.api_key, "test-key");
    assert_eq!(config.port, 3000);
}

#[test]
fn test_config_default_values() {
    let config = test_config("test-key", ConfigOptions::default()).unwrap();
    assert_eq!(config.model, DEFAULT_MODEL);
    assert_eq!(config.base_url, DEFAULT_BASE_URL);
    assert_eq!(config.request_timeout, Duration::from_secs(30));
    assert_eq!(config.socket_addr().to_string(), "0.0.0.0:3000");
    assert!(config.http_log_dir.is_none());
}

#[test]
fn test_config_empty_api_key_fails() {
    let config = test_config("", ConfigOptions::default());
    assert!(config.is_err());
    assert!(config.unwrap_err().to_string().contains("GEMINI_API_KEY"));
}

#[test]
fn test_config_whitespace_api_key_fails() {
    assert!(test_config("  \n", ConfigOptions::default()).is_err());
}

#[test]
fn test_config_trims_api_key() {
    let config = test_config("  key-123 \n", ConfigOptions::default()).unwrap();
    assert_eq!(config.api_key, "key-123");
}

#[test]
fn test_config_custom_options() {
    let config = test_config(
        "test-key",
        ConfigOptions {
            host: Some("127.0.0.1".to_string()),
            model: Some(" gemini-1.5-pro ".to_string()),
            base_url: Some("http://127.0.0.1:9999/".to_string()),
            timeout_secs: Some(12),
            http_log_dir: Some("/var/log/idea-forge".into()),
        },
    )
    .unwrap();

    assert_eq!(config.model, "gemini-1.5-pro");
    assert_eq!(config.base_url, "http://127.0.0.1:9999");
    assert_eq!(config.request_timeout, Duration::from_secs(12));
    assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
    assert_eq!(
        config.http_log_dir.as_deref(),
        Some(std::path::Path::new("/var/log/idea-forge"))
    );
}

#[test]
fn test_config_blank_model_uses_default() {
    let config = test_config(
        "test-key",
        ConfigOptions {
            model: Some("   ".to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(config.model, DEFAULT_MODEL);
}

#[test]
fn test_config_adds_https_prefix() {
    let config = test_config(
        "test-key",
        ConfigOptions {
            base_url: Some("proxy.example.com/".to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(config.base_url, "https://proxy.example.com");
}

#[test]
fn test_config_empty_base_url_fails() {
    let config = test_config(
        "test-key",
        ConfigOptions {
            base_url: Some("  ".to_string()),
            ..Default::default()
        },
    );
    assert!(config.unwrap_err().to_string().contains("base_url"));
}

#[test]
fn test_config_zero_timeout_fails() {
    let config = test_config(
        "test-key",
        ConfigOptions {
            timeout_secs: Some(0),
            ..Default::default()
        },
    );
    assert!(config.unwrap_err().to_string().contains("timeout"));
}

#[test]
fn test_config_invalid_host_fails() {
    let config = test_config(
        "test-key",
        ConfigOptions {
            host: Some("not-an-ip".to_string()),
            ..Default::default()
        },
    );
    assert!(config.unwrap_err().to_string().contains("not-an-ip"));
}
