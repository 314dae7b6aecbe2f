use axum::http::{Method, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::json;
use tests::{base_config, mcp_post, mcp_request, TestGateway};

#[tokio::test]
async fn test_initialize_issues_session_and_follow_up_routes_to_it() {
    let gateway = TestGateway::start(base_config("http://127.0.0.1:9"), &[]).await;

    let session_id = gateway.initialize(None).await;
    assert!(!session_id.is_empty());
    assert_eq!(gateway.session_count(), 1);

    let response = gateway.call(&session_id, None, 2, "ping", json!({})).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["id"], json!(2));
    assert_eq!(response.json()["result"], json!({}));
}

#[tokio::test]
async fn test_initialize_result_advertises_tools() {
    let gateway = TestGateway::start(base_config("http://127.0.0.1:9"), &[]).await;

    let response = gateway
        .send(mcp_post(None, None, tests::initialize_body()))
        .await;
    let result = &response.json()["result"];
    assert_eq!(result["protocolVersion"], json!("2025-03-26"));
    assert_eq!(result["serverInfo"]["name"], json!("restgate"));
    assert!(result["capabilities"]["tools"].is_object());
}

#[tokio::test]
async fn test_initialized_notification_is_accepted() {
    let gateway = TestGateway::start(base_config("http://127.0.0.1:9"), &[]).await;
    let response = gateway
        .send(mcp_post(None, None, tests::initialize_body()))
        .await;
    assert_eq!(
        response.header("content-type").as_deref(),
        Some("text/event-stream")
    );
    let session_id = response.session_id().unwrap();

    let response = gateway
        .send(mcp_post(
            Some(&session_id),
            None,
            tests::initialized_notification(),
        ))
        .await;
    assert_eq!(response.status, StatusCode::ACCEPTED);
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn test_sessions_are_independent() {
    let gateway = TestGateway::start(base_config("http://127.0.0.1:9"), &[]).await;

    let first = gateway.initialize(None).await;
    let second = gateway.initialize(None).await;
    assert_ne!(first, second);
    assert_eq!(gateway.session_count(), 2);

    let response = gateway.send(mcp_request(Method::DELETE, Some(&first))).await;
    assert_eq!(response.status, StatusCode::ACCEPTED);
    assert_eq!(gateway.session_count(), 1);

    let response = gateway.call(&second, None, 2, "ping", json!({})).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_deleted_session_is_unknown_afterwards() {
    let gateway = TestGateway::start(base_config("http://127.0.0.1:9"), &[]).await;
    let session_id = gateway.initialize(None).await;

    gateway
        .send(mcp_request(Method::DELETE, Some(&session_id)))
        .await;

    let response = gateway.call(&session_id, None, 3, "ping", json!({})).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"]["code"], json!(-32000));
}

#[tokio::test]
async fn test_sse_stream_requires_event_stream_accept() {
    let gateway = TestGateway::start(base_config("http://127.0.0.1:9"), &[]).await;
    let session_id = gateway.initialize(None).await;

    let mut request = mcp_request(Method::GET, Some(&session_id));
    request
        .headers_mut()
        .insert("accept", "application/json".parse().unwrap());
    let response = gateway.send(request).await;
    assert_eq!(response.status, StatusCode::NOT_ACCEPTABLE);
}

#[tokio::test]
async fn test_health_reports_live_sessions() {
    let gateway = TestGateway::start(base_config("http://127.0.0.1:9"), &[]).await;
    gateway.initialize(None).await;

    let response = gateway
        .send(
            axum::http::Request::get("/health")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.json()["sessions"], json!(1));
}
