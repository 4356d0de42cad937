//! JWKS verifier integration tests
//!
//! Verifies `seizmeia::auth::verifier::JwksVerifier` against a wiremock
//! key endpoint: signature, issuer and audience checks, key caching and the
//! single re-fetch on an unknown key id.

mod common;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use seizmeia::auth::discovery::fetch_provider_metadata;
use seizmeia::auth::verifier::{IdTokenVerifier, JwksVerifier};
use seizmeia::SeizmeiaError;

use common::{discovery_body, jwks, sign_id_token, sign_id_token_with_kid, CLIENT_ID};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A provider whose key endpoint must be hit exactly `key_fetches` times.
async fn provider(key_fetches: u64) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(discovery_body(&server.uri(), None)))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/keys"))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks()))
        .expect(key_fetches)
        .mount(&server)
        .await;

    server
}

async fn verifier(server: &MockServer) -> JwksVerifier {
    let http = reqwest::Client::new();
    let meta = fetch_provider_metadata(&http, &server.uri()).await.unwrap();
    JwksVerifier::new(http, &meta, CLIENT_ID)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_valid_token_yields_claims() {
    let server = provider(1).await;
    let verifier = verifier(&server).await;

    let claims = verifier
        .verify(&sign_id_token(&server.uri(), CLIENT_ID, 600))
        .await
        .unwrap();

    assert_eq!(claims.sub, "user-1");
    assert_eq!(claims.iss, server.uri());
    assert!(claims.aud.contains(CLIENT_ID));
    assert_eq!(claims.email.as_deref(), Some("user@example.com"));
    assert_eq!(claims.email_verified, Some(true));
}

#[tokio::test]
async fn test_keys_are_cached_between_verifications() {
    let server = provider(1).await;
    let verifier = verifier(&server).await;

    for _ in 0..3 {
        let token = sign_id_token(&server.uri(), CLIENT_ID, 600);
        verifier.verify(&token).await.unwrap();
    }
}

#[tokio::test]
async fn test_unknown_key_id_refetches_once() {
    let server = provider(2).await;
    let verifier = verifier(&server).await;

    let token = sign_id_token_with_kid(&server.uri(), CLIENT_ID, 600, "rotated-away");
    let err = verifier.verify(&token).await.unwrap_err();

    assert!(matches!(err, SeizmeiaError::Verification(_)));
    assert!(err.to_string().contains("rotated-away"), "error: {}", err);
}

#[tokio::test]
async fn test_wrong_issuer_is_rejected() {
    let server = provider(1).await;
    let verifier = verifier(&server).await;

    let token = sign_id_token("https://other-issuer.example.com", CLIENT_ID, 600);
    let err = verifier.verify(&token).await.unwrap_err();
    assert!(matches!(err, SeizmeiaError::Verification(_)));
}

#[tokio::test]
async fn test_tampered_token_is_rejected() {
    let server = provider(1).await;
    let verifier = verifier(&server).await;

    let forged = sign_id_token(&server.uri(), "someone-else", 600);
    let token = sign_id_token(&server.uri(), CLIENT_ID, 600);
    let mut parts: Vec<&str> = token.split('.').collect();
    parts[1] = forged.split('.').nth(1).unwrap();

    let err = verifier.verify(&parts.join(".")).await.unwrap_err();
    assert!(matches!(err, SeizmeiaError::Verification(_)));
}

#[tokio::test]
async fn test_key_endpoint_failure_is_verification_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(discovery_body(&server.uri(), None)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/keys"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let verifier = verifier(&server).await;
    let err = verifier
        .verify(&sign_id_token(&server.uri(), CLIENT_ID, 600))
        .await
        .unwrap_err();
    assert!(matches!(err, SeizmeiaError::Verification(_)));
}
