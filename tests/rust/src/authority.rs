use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::CLIENT_ID;

pub const SIGNING_SECRET: &[u8] = b"restgate-test-signing-secret-0123456789";
const SIGNING_SECRET_B64: &str = "cmVzdGdhdGUtdGVzdC1zaWduaW5nLXNlY3JldC0wMTIzNDU2Nzg5";
pub const KEY_ID: &str = "integration-key";

pub const TOKEN_EXCHANGE_GRANT: &str = "urn:ietf:params:oauth:grant-type:token-exchange";

/// Authorization server publishing discovery metadata and one signing key
///
/// The token endpoint is left unmounted so each test decides how exchange
/// behaves.
pub async fn start(grants: &[&str]) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issuer": server.uri(),
            "token_endpoint": format!("{}/token", server.uri()),
            "jwks_uri": format!("{}/jwks", server.uri()),
            "grant_types_supported": grants,
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/jwks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "keys": [{"kty": "oct", "kid": KEY_ID, "alg": "HS256", "k": SIGNING_SECRET_B64}]
        })))
        .mount(&server)
        .await;
    server
}

/// Config section enabling inbound auth against `authority`
pub fn oauth_section(authority: &MockServer, exchange: bool) -> Value {
    let mut oauth = json!({
        "authority": authority.uri(),
        "client_id": CLIENT_ID,
        "scopes": ["records.read"]
    });
    if exchange {
        oauth["token_exchange"] = json!({
            "client_id": "restgate-exchanger",
            "client_secret": "exchanger-secret",
            "audience": "records-api"
        });
    }
    oauth
}

/// Signed access token for `subject`, valid for ten minutes
pub fn mint(authority: &MockServer, subject: &str) -> String {
    mint_with(authority, subject, CLIENT_ID, 600)
}

pub fn mint_with(authority: &MockServer, subject: &str, audience: &str, ttl_secs: i64) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(KEY_ID.to_string());
    let claims = json!({
        "iss": authority.uri(),
        "aud": audience,
        "sub": subject,
        "azp": "integration-client",
        "scope": "records.read",
        "exp": chrono::Utc::now().timestamp() + ttl_secs,
    });
    encode(&header, &claims, &EncodingKey::from_secret(SIGNING_SECRET)).unwrap()
}
