use axum::body::Body;
use axum::http::{Request, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::json;
use tests::{authority, base_config, TestGateway};

fn metadata_request(path: &str) -> Request<Body> {
    Request::get(path).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_metadata_names_authority() {
    let authority = authority::start(&[]).await;
    let mut config = base_config("http://127.0.0.1:9");
    config["oauth"] = authority::oauth_section(&authority, false);
    let gateway = TestGateway::start(config, &[]).await;

    for path in [
        "/.well-known/oauth-protected-resource",
        "/.well-known/oauth-protected-resource/mcp",
    ] {
        let response = gateway.send(metadata_request(path)).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(
            response.json(),
            json!({
                "resource": "https://gateway.example.com/mcp",
                "authorization_servers": [authority.uri()],
                "scopes_supported": ["records.read"],
                "bearer_methods_supported": ["header"]
            })
        );
    }
}

#[tokio::test]
async fn test_metadata_absent_without_auth() {
    let gateway = TestGateway::start(base_config("http://127.0.0.1:9"), &[]).await;

    let response = gateway
        .send(metadata_request("/.well-known/oauth-protected-resource"))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}
