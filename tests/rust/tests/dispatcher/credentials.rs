use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;
use tests::authority::{self, TOKEN_EXCHANGE_GRANT};
use tests::{base_config, get_record_tool, write_config, TestGateway};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn backend_expecting(bearer: &str, calls: u64) -> MockServer {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/records/r-1"))
        .and(header("authorization", format!("Bearer {}", bearer).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "r-1", "name": "first"})))
        .expect(calls)
        .mount(&backend)
        .await;
    backend
}

async fn call_get_record(gateway: &TestGateway, session_id: &str, token: Option<&str>, id: u64) {
    let response = gateway
        .call(
            session_id,
            token,
            id,
            "tools/call",
            json!({"name": "get_record", "arguments": {"id": "r-1"}}),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let result = &response.json()["result"];
    assert_ne!(result["isError"], json!(true), "{}", response.text());
}

fn config_with_exchange(backend: &MockServer, authority: &MockServer, fallback: Option<&str>) -> serde_json::Value {
    let mut config = base_config(&backend.uri());
    config["backend"]["fallback_token"] = json!(fallback);
    config["oauth"] = authority::oauth_section(authority, true);
    config
}

#[tokio::test]
async fn test_exchanged_credential_reaches_backend_and_is_cached() {
    let authority = authority::start(&["authorization_code", TOKEN_EXCHANGE_GRANT]).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Atoken-exchange"))
        .and(body_string_contains("audience=records-api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "records-token",
            "issued_token_type": "urn:ietf:params:oauth:token-type:access_token",
            "token_type": "Bearer",
            "expires_in": 300
        })))
        .expect(1)
        .mount(&authority)
        .await;
    let backend = backend_expecting("records-token", 2).await;

    let gateway = TestGateway::start(
        config_with_exchange(&backend, &authority, Some("static-token")),
        &[("records.json", get_record_tool())],
    )
    .await;
    let token = authority::mint(&authority, "user-1");
    let session_id = gateway.initialize(Some(&token)).await;

    call_get_record(&gateway, &session_id, Some(&token), 2).await;
    call_get_record(&gateway, &session_id, Some(&token), 3).await;

    assert_eq!(
        gateway
            .server
            .dispatcher()
            .registry()
            .get_downstream_credential(&session_id)
            .as_deref(),
        Some("records-token")
    );
}

#[tokio::test]
async fn test_exchange_failure_falls_back_to_static_token() {
    let authority = authority::start(&[TOKEN_EXCHANGE_GRANT]).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})))
        .expect(1)
        .mount(&authority)
        .await;
    let backend = backend_expecting("static-token", 2).await;

    let gateway = TestGateway::start(
        config_with_exchange(&backend, &authority, Some("static-token")),
        &[("records.json", get_record_tool())],
    )
    .await;
    let token = authority::mint(&authority, "user-1");
    let session_id = gateway.initialize(Some(&token)).await;

    // The fallback is cached too, so the failed exchange is not retried
    call_get_record(&gateway, &session_id, Some(&token), 2).await;
    call_get_record(&gateway, &session_id, Some(&token), 3).await;
}

#[tokio::test]
async fn test_unadvertised_exchange_grant_skips_token_endpoint() {
    let authority = authority::start(&["authorization_code"]).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "nope"})))
        .expect(0)
        .mount(&authority)
        .await;
    let backend = backend_expecting("static-token", 1).await;

    let gateway = TestGateway::start(
        config_with_exchange(&backend, &authority, Some("static-token")),
        &[("records.json", get_record_tool())],
    )
    .await;
    let token = authority::mint(&authority, "user-1");
    let session_id = gateway.initialize(Some(&token)).await;

    call_get_record(&gateway, &session_id, Some(&token), 2).await;
}

#[tokio::test]
async fn test_fallback_token_is_read_from_disk_at_use() {
    let backend = backend_expecting("rotated-token", 1).await;
    let mut config = base_config(&backend.uri());
    config["backend"]["fallback_token"] = json!("original-token");

    let gateway = TestGateway::start(config.clone(), &[("records.json", get_record_tool())]).await;

    // Rotated after startup, before the session's first credential lookup
    config["backend"]["fallback_token"] = json!("rotated-token");
    write_config(gateway.config_dir.path(), &config);

    let session_id = gateway.initialize(None).await;
    call_get_record(&gateway, &session_id, None, 2).await;
}

#[tokio::test]
async fn test_sessions_cache_credentials_separately() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/records/r-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "r-1"})))
        .mount(&backend)
        .await;
    let mut config = base_config(&backend.uri());
    config["backend"]["fallback_token"] = json!("first-token");
    let gateway = TestGateway::start(config.clone(), &[("records.json", get_record_tool())]).await;

    let first = gateway.initialize(None).await;
    call_get_record(&gateway, &first, None, 2).await;

    config["backend"]["fallback_token"] = json!("second-token");
    write_config(gateway.config_dir.path(), &config);

    let second = gateway.initialize(None).await;
    call_get_record(&gateway, &second, None, 2).await;

    let registry = gateway.server.dispatcher().registry();
    assert_eq!(registry.get_downstream_credential(&first).as_deref(), Some("first-token"));
    assert_eq!(registry.get_downstream_credential(&second).as_deref(), Some("second-token"));
}

#[tokio::test]
async fn test_no_credential_calls_backend_without_authorization() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/records/r-1"))
        .respond_with(ResponseTemplate::new(401).set_body_string("missing credentials"))
        .expect(1)
        .mount(&backend)
        .await;
    let gateway =
        TestGateway::start(base_config(&backend.uri()), &[("records.json", get_record_tool())])
            .await;
    let session_id = gateway.initialize(None).await;

    let response = gateway
        .call(
            &session_id,
            None,
            2,
            "tools/call",
            json!({"name": "get_record", "arguments": {"id": "r-1"}}),
        )
        .await;
    assert_eq!(response.json()["result"]["isError"], json!(true));

    let received = backend.received_requests().await.unwrap();
    assert!(received[0].headers.get("authorization").is_none());
    assert!(gateway
        .server
        .dispatcher()
        .registry()
        .get_downstream_credential(&session_id)
        .is_none());
}
