//! OpenID Connect provider discovery
//!
//! Fetches the provider metadata document once at startup. The document
//! tells the relay where the authorization, token and JWKS endpoints live
//! and whether the provider models offline access as a scope.
//!
//! # References
//!
//! - OpenID Connect Discovery 1.0 <https://openid.net/specs/openid-connect-discovery-1_0.html>

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AuthResult, SeizmeiaError};

/// Scope requesting a refresh token from OpenID Connect providers.
pub const SCOPE_OFFLINE_ACCESS: &str = "offline_access";

/// Well-known suffix appended to the issuer to locate the metadata document.
const WELL_KNOWN_PATH: &str = "/.well-known/openid-configuration";

/// Provider metadata document published by an OpenID Connect issuer.
///
/// # Examples
///
/// ```
/// use seizmeia::auth::discovery::ProviderMetadata;
///
/// let json = r#"{
///     "issuer": "https://auth.example.com",
///     "authorization_endpoint": "https://auth.example.com/authorize",
///     "token_endpoint": "https://auth.example.com/token",
///     "jwks_uri": "https://auth.example.com/keys"
/// }"#;
///
/// let meta: ProviderMetadata = serde_json::from_str(json).unwrap();
/// assert!(meta.offline_as_scope());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// The issuer identifier; must match the configured issuer URL.
    pub issuer: String,

    /// The URL of the authorization endpoint.
    pub authorization_endpoint: String,

    /// The URL of the token endpoint.
    pub token_endpoint: String,

    /// The URL of the provider's JSON Web Key Set.
    pub jwks_uri: String,

    /// The URL of the userinfo endpoint, if published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userinfo_endpoint: Option<String>,

    /// Scopes the provider supports. A RECOMMENDED field, often absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,

    /// JWS algorithms the provider signs ID tokens with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token_signing_alg_values_supported: Option<Vec<String>>,

    /// Additional metadata fields not explicitly modelled above.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl ProviderMetadata {
    /// Whether refresh tokens are requested with the `offline_access` scope
    /// rather than with an `access_type=offline` parameter (e.g. Google).
    ///
    /// Providers that do not advertise `scopes_supported` are assumed to
    /// follow OpenID Connect Core and expose `offline_access`.
    pub fn offline_as_scope(&self) -> bool {
        match &self.scopes_supported {
            Some(scopes) if !scopes.is_empty() => {
                scopes.iter().any(|scope| scope == SCOPE_OFFLINE_ACCESS)
            }
            _ => true,
        }
    }

    /// Checks that every endpoint the relay calls is an absolute URL.
    fn check_endpoints(&self) -> AuthResult<()> {
        for (name, value) in [
            ("authorization_endpoint", &self.authorization_endpoint),
            ("token_endpoint", &self.token_endpoint),
            ("jwks_uri", &self.jwks_uri),
        ] {
            Url::parse(value).map_err(|e| {
                SeizmeiaError::Discovery(format!("invalid {name} {value:?}: {e}"))
            })?;
        }
        Ok(())
    }
}

/// Builds the discovery URL for an issuer.
fn discovery_url(issuer: &str) -> String {
    format!("{}{}", issuer.trim_end_matches('/'), WELL_KNOWN_PATH)
}

/// Fetches and validates the provider metadata for `issuer`.
///
/// The `issuer` field of the returned document must match `issuer`
/// (one trailing slash on either side is ignored).
///
/// # Errors
///
/// Returns [`SeizmeiaError::Discovery`] if the request fails, the provider
/// answers with a non-success status, the body is not a metadata document,
/// the advertised issuer differs from the requested one, or an endpoint is
/// not an absolute URL.
///
/// # Examples
///
/// ```no_run
/// use seizmeia::auth::discovery::fetch_provider_metadata;
///
/// # async fn example() -> seizmeia::error::AuthResult<()> {
/// let http = reqwest::Client::new();
/// let meta = fetch_provider_metadata(&http, "https://accounts.google.com").await?;
/// println!("token endpoint: {}", meta.token_endpoint);
/// # Ok(())
/// # }
/// ```
pub async fn fetch_provider_metadata(
    http: &reqwest::Client,
    issuer: &str,
) -> AuthResult<ProviderMetadata> {
    let url = discovery_url(issuer);
    tracing::debug!(%url, "fetching provider metadata");

    let resp = http
        .get(&url)
        .send()
        .await
        .map_err(|e| SeizmeiaError::Discovery(format!("metadata fetch failed: {e}")))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(SeizmeiaError::Discovery(format!(
            "{url} returned {status}: {body}"
        )));
    }

    let meta: ProviderMetadata = resp
        .json()
        .await
        .map_err(|e| SeizmeiaError::Discovery(format!("failed to parse provider metadata: {e}")))?;

    if meta.issuer.trim_end_matches('/') != issuer.trim_end_matches('/') {
        return Err(SeizmeiaError::Discovery(format!(
            "issuer did not match the issuer returned by provider, expected {issuer:?} got {:?}",
            meta.issuer
        )));
    }

    meta.check_endpoints()?;

    tracing::info!(
        issuer = %meta.issuer,
        offline_as_scope = meta.offline_as_scope(),
        "discovered identity provider"
    );

    Ok(meta)
}
