use pretty_assertions::assert_eq;
use restgate_core::{ConfigError, ConfigStore, GatewayConfig};
use serde_json::{json, Value};
use std::time::Duration;
use tempfile::TempDir;
use tests::write_config;

fn load(config: Value) -> Result<GatewayConfig, ConfigError> {
    let dir = TempDir::new().unwrap();
    write_config(dir.path(), &config);
    GatewayConfig::load(dir.path())
}

#[test]
fn test_missing_config_file() {
    let dir = TempDir::new().unwrap();
    let err = GatewayConfig::load(dir.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
    assert!(err.to_string().contains("config.json"));
}

#[test]
fn test_malformed_json() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("config.json"), "{\"backend\": ").unwrap();
    let err = GatewayConfig::load(dir.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn test_full_configuration() {
    let config = load(json!({
        "server": {"host": "0.0.0.0", "port": 8443, "public_url": "https://mcp.example.com/"},
        "backend": {"base_url": "https://api.example.com/v1", "fallback_token": "t", "timeout_secs": 20},
        "tls": {"cert_path": "/etc/restgate/cert.pem", "key_path": "/etc/restgate/key.pem"},
        "cors": {"allowed_origins": ["https://app.example.com"]},
        "rate_limit": {"window_secs": 60, "max_requests": 100},
        "oauth": {
            "authority": "https://login.example.com",
            "client_id": "restgate",
            "token_exchange": {"client_id": "ex", "client_secret": "s", "audience": "api"}
        },
        "sessions": {"idle_timeout_secs": 900},
        "shutdown_grace_secs": 5
    }))
    .unwrap();

    assert!(config.auth_enabled());
    assert!(config.exchange_enabled());
    assert!(config.tls.paths().is_some());
    assert_eq!(config.rate_limit.rule().unwrap().max_requests, 100);
    assert_eq!(config.resource_url(), "https://mcp.example.com/mcp");
    assert_eq!(
        config.resource_metadata_url(),
        "https://mcp.example.com/.well-known/oauth-protected-resource"
    );
    assert_eq!(config.backend_timeout(), Duration::from_secs(20));
    assert_eq!(config.shutdown_grace(), Duration::from_secs(5));
}

#[test]
fn test_half_configured_oauth_rejected() {
    let err = load(json!({
        "backend": {"base_url": "https://api.example.com"},
        "oauth": {"authority": "https://login.example.com"}
    }))
    .unwrap_err();
    assert!(matches!(err, ConfigError::PartialPair { section: "oauth", .. }));
}

#[test]
fn test_half_configured_rate_limit_rejected() {
    let err = load(json!({
        "backend": {"base_url": "https://api.example.com"},
        "rate_limit": {"max_requests": 10}
    }))
    .unwrap_err();
    assert!(matches!(err, ConfigError::PartialPair { section: "rate_limit", .. }));
}

#[test]
fn test_exchange_without_oauth_rejected() {
    let err = load(json!({
        "backend": {"base_url": "https://api.example.com"},
        "oauth": {"token_exchange": {"client_id": "ex", "client_secret": "s"}}
    }))
    .unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { field: "oauth.token_exchange", .. }));
}

#[test]
fn test_backend_url_must_be_http() {
    for base_url in ["not a url", "ftp://files.example.com"] {
        let err = load(json!({"backend": {"base_url": base_url}})).unwrap_err();
        assert!(
            matches!(err, ConfigError::Invalid { field: "backend.base_url", .. }),
            "{base_url}: {err}"
        );
    }
}

#[tokio::test]
async fn test_fallback_token_follows_the_file() {
    let dir = TempDir::new().unwrap();
    let store = ConfigStore::new(dir.path());

    // No file yet
    assert_eq!(store.fallback_token().await, None);

    write_config(
        dir.path(),
        &json!({"backend": {"base_url": "https://api.example.com"}}),
    );
    assert_eq!(store.fallback_token().await, None);

    write_config(
        dir.path(),
        &json!({"backend": {"base_url": "https://api.example.com", "fallback_token": "abc"}}),
    );
    assert_eq!(store.fallback_token().await.as_deref(), Some("abc"));
}
