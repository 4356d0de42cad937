//! Shared helpers for the login relay integration tests
//!
//! A wiremock server plays the identity provider: it serves the discovery
//! document and the signing keys, and tests mount their own `/token`
//! responses. Identity tokens are signed with `tests/fixtures/provider_key.pem`,
//! whose public half is `tests/fixtures/provider_jwks.json`.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use jsonwebtoken::{encode, EncodingKey, Header};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use seizmeia::auth::state::EntropySource;
use seizmeia::{Authenticator, AuthenticatorConfig, AuthenticatorOptions};

#[allow(dead_code)]
pub const CLIENT_ID: &str = "seizmeia";
#[allow(dead_code)]
pub const CLIENT_SECRET: &str = "s3cret";
#[allow(dead_code)]
pub const REDIRECT_URI: &str = "https://tap.example.com/auth/callback";
#[allow(dead_code)]
pub const FRONTEND_REDIRECT_URI: &str = "https://tap.example.com/loggedin";
#[allow(dead_code)]
pub const KEY_ID: &str = "test-key";

const PRIVATE_KEY: &[u8] = include_bytes!("../fixtures/provider_key.pem");
const JWKS: &str = include_str!("../fixtures/provider_jwks.json");

/// The fixture key set as JSON.
#[allow(dead_code)]
pub fn jwks() -> serde_json::Value {
    serde_json::from_str(JWKS).expect("fixture jwks")
}

/// Fills every byte with the same value.
#[allow(dead_code)]
pub struct FixedEntropy(pub u8);

impl EntropySource for FixedEntropy {
    fn fill_bytes(&self, dest: &mut [u8]) {
        dest.fill(self.0);
    }
}

/// Discovery document for a provider rooted at `base_url`.
#[allow(dead_code)]
pub fn discovery_body(base_url: &str, scopes_supported: Option<&[&str]>) -> serde_json::Value {
    let mut body = serde_json::json!({
        "issuer": base_url,
        "authorization_endpoint": format!("{}/auth", base_url),
        "token_endpoint": format!("{}/token", base_url),
        "jwks_uri": format!("{}/keys", base_url),
        "userinfo_endpoint": format!("{}/userinfo", base_url),
        "response_types_supported": ["code"],
        "id_token_signing_alg_values_supported": ["RS256"]
    });
    if let Some(scopes) = scopes_supported {
        body["scopes_supported"] = serde_json::json!(scopes);
    }
    body
}

/// Starts a provider serving discovery and keys.
#[allow(dead_code)]
pub async fn start_provider(scopes_supported: Option<&[&str]>) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(discovery_body(&server.uri(), scopes_supported)),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/keys"))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks()))
        .mount(&server)
        .await;

    server
}

/// Authenticator settings pointing at `server`.
#[allow(dead_code)]
pub fn authenticator_config(server: &MockServer) -> AuthenticatorConfig {
    AuthenticatorConfig::from_options([AuthenticatorOptions {
        client_id: CLIENT_ID.to_string(),
        client_secret: CLIENT_SECRET.to_string(),
        issuer_url: server.uri(),
        redirect_uri: REDIRECT_URI.to_string(),
        frontend_redirect_uri: FRONTEND_REDIRECT_URI.to_string(),
    }])
    .expect("valid authenticator config")
}

/// A discovered authenticator with a fixed entropy source.
#[allow(dead_code)]
pub async fn authenticator(server: &MockServer, http_only_cookie: bool) -> Arc<Authenticator> {
    let config = authenticator_config(server).with_http_only_cookie(http_only_cookie);
    let authenticator = Authenticator::new(config, reqwest::Client::new())
        .await
        .expect("discovery against mock provider")
        .with_entropy(Arc::new(FixedEntropy(7)));
    Arc::new(authenticator)
}

/// Signs an identity token for `aud`, expiring `expires_in` seconds from
/// now (negative for an expired token).
#[allow(dead_code)]
pub fn sign_id_token(issuer: &str, aud: &str, expires_in: i64) -> String {
    sign_id_token_with_kid(issuer, aud, expires_in, KEY_ID)
}

/// Like [`sign_id_token`], with an explicit `kid` header.
#[allow(dead_code)]
pub fn sign_id_token_with_kid(issuer: &str, aud: &str, expires_in: i64, kid: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = serde_json::json!({
        "iss": issuer,
        "sub": "user-1",
        "aud": aud,
        "iat": now,
        "exp": now + expires_in,
        "email": "user@example.com",
        "email_verified": true,
        "name": "Tap User"
    });

    let mut header = Header::new(jsonwebtoken::Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let key = EncodingKey::from_rsa_pem(PRIVATE_KEY).expect("fixture private key");
    encode(&header, &claims, &key).expect("sign id token")
}

/// Token endpoint body carrying `id_token`.
#[allow(dead_code)]
pub fn token_body(id_token: Option<&str>, refresh_token: Option<&str>) -> serde_json::Value {
    let mut body = serde_json::json!({
        "access_token": "access-1",
        "token_type": "Bearer",
        "expires_in": 3600
    });
    if let Some(id_token) = id_token {
        body["id_token"] = serde_json::json!(id_token);
    }
    if let Some(refresh_token) = refresh_token {
        body["refresh_token"] = serde_json::json!(refresh_token);
    }
    body
}

/// Sends `request` through `app` and collects the response.
#[allow(dead_code)]
pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, HeaderMap, String) {
    let response = app.oneshot(request).await.expect("infallible router");
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    (
        status,
        headers,
        String::from_utf8(body.to_vec()).expect("utf-8 body"),
    )
}
