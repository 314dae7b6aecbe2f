//! Shared fixtures for Restgate integration tests.

use std::path::Path;

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use restgate_core::{ConfigStore, GatewayConfig, ToolFactories};
use restgate_gateway::{GatewayServer, ToolSource, SESSION_ID_HEADER};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

/// Authorization server fakes
pub mod authority;

/// Client id the gateway expects in the `aud` claim
pub const CLIENT_ID: &str = "restgate";

/// A gateway rooted in temporary config and tools directories
pub struct TestGateway {
    pub config_dir: TempDir,
    pub tools_dir: TempDir,
    pub router: Router,
    pub server: GatewayServer,
}

impl TestGateway {
    /// Build a gateway from a `config.json` document and tool manifest files
    pub async fn start(config: Value, tool_files: &[(&str, Value)]) -> Self {
        let config_dir = TempDir::new().unwrap();
        write_config(config_dir.path(), &config);

        let tools_dir = TempDir::new().unwrap();
        for (name, manifest) in tool_files {
            std::fs::write(tools_dir.path().join(name), manifest.to_string()).unwrap();
        }

        let loaded = GatewayConfig::load(config_dir.path()).unwrap();
        let tools = ToolSource::from_config(
            std::sync::Arc::new(loaded.clone()),
            tools_dir.path().to_path_buf(),
            ToolFactories::default(),
        )
        .await
        .unwrap();
        let server =
            GatewayServer::new(loaded, tools, ConfigStore::new(config_dir.path())).unwrap();
        let router = server.router();

        Self {
            config_dir,
            tools_dir,
            router,
            server,
        }
    }

    pub fn session_count(&self) -> usize {
        self.server.dispatcher().registry().count()
    }

    /// Send one request through the full middleware stack
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        TestResponse {
            status,
            headers,
            body: bytes.to_vec(),
        }
    }

    /// Run the `initialize` handshake and return the issued session id
    pub async fn initialize(&self, token: Option<&str>) -> String {
        let response = self.send(mcp_post(None, token, initialize_body())).await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.text());
        let session_id = response
            .session_id()
            .expect("initialize response carries a session id");

        let response = self
            .send(mcp_post(Some(&session_id), token, initialized_notification()))
            .await;
        assert_eq!(response.status, StatusCode::ACCEPTED, "{}", response.text());
        session_id
    }

    pub async fn call(
        &self,
        session_id: &str,
        token: Option<&str>,
        id: u64,
        method: &str,
        params: Value,
    ) -> TestResponse {
        let body = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
        self.send(mcp_post(Some(session_id), token, body)).await
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    /// JSON body, or the last JSON-RPC message of an event stream
    pub fn json(&self) -> Value {
        let is_stream = self
            .header("content-type")
            .is_some_and(|ct| ct.starts_with("text/event-stream"));
        if !is_stream {
            return serde_json::from_slice(&self.body).unwrap();
        }
        self.text()
            .lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(str::trim)
            .filter(|data| !data.is_empty())
            .last()
            .map(|data| serde_json::from_str(data).unwrap())
            .expect("event stream carries a message")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn session_id(&self) -> Option<String> {
        self.headers
            .get(SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }
}

pub fn write_config(dir: &Path, config: &Value) {
    std::fs::write(dir.join("config.json"), config.to_string()).unwrap();
}

/// Minimal configuration pointing at `backend_url`
pub fn base_config(backend_url: &str) -> Value {
    json!({
        "server": {"host": "127.0.0.1", "port": 0, "public_url": "https://gateway.example.com"},
        "backend": {"base_url": backend_url, "timeout_secs": 5}
    })
}

pub fn initialize_body() -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": "2025-03-26",
            "capabilities": {},
            "clientInfo": {"name": "integration-tests", "version": "1.0.0"}
        }
    })
}

pub fn initialized_notification() -> Value {
    json!({"jsonrpc": "2.0", "method": "notifications/initialized"})
}

pub fn mcp_post(session_id: Option<&str>, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/mcp")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ACCEPT, "application/json, text/event-stream");
    if let Some(id) = session_id {
        builder = builder.header(SESSION_ID_HEADER, id);
    }
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn mcp_request(method: Method, session_id: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri("/mcp")
        .header(header::ACCEPT, "text/event-stream");
    if let Some(id) = session_id {
        builder = builder.header(SESSION_ID_HEADER, id);
    }
    builder.body(Body::empty()).unwrap()
}

/// `rest` tool manifest for a GET with a path parameter
pub fn get_record_tool() -> Value {
    json!({
        "name": "get_record",
        "title": "Get record",
        "description": "Fetch one record by id",
        "inputSchema": {
            "type": "object",
            "properties": {"id": {"type": "string"}},
            "required": ["id"]
        },
        "request": {"method": "GET", "path": "/records/{id}"}
    })
}
