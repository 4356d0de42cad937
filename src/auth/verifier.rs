//! Identity token verification
//!
//! [`IdTokenVerifier`] is the seam the callback handler verifies through.
//! [`JwksVerifier`] is the production implementation: it checks the JWS
//! signature against the provider's published keys and validates the
//! issuer, audience and expiry claims.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::auth::discovery::ProviderMetadata;
use crate::error::{AuthResult, SeizmeiaError};

/// Clock skew tolerated on `nbf`, in seconds. `exp` gets none.
const NOT_BEFORE_SKEW_SECS: u64 = 60;

/// The `aud` claim, which may be a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    pub fn contains(&self, client_id: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == client_id,
            Audience::Multiple(auds) => auds.iter().any(|aud| aud == client_id),
        }
    }
}

/// Claims carried by a verified identity token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// Issuer (provider URL)
    pub iss: String,
    /// Subject (provider's user ID)
    pub sub: String,
    /// Audience (our client ID)
    pub aud: Audience,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at time (Unix timestamp)
    #[serde(default)]
    pub iat: u64,
    /// Not-before time (Unix timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    /// Any other claims
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Verifies a raw identity token and returns its claims.
#[async_trait]
pub trait IdTokenVerifier: Send + Sync {
    async fn verify(&self, raw_id_token: &str) -> AuthResult<IdTokenClaims>;
}

/// Verifies identity tokens against the provider's JSON Web Key Set.
///
/// Keys are fetched on first use and cached. A token signed with a key
/// id missing from the cache triggers one re-fetch, which picks up keys
/// the provider has rotated in since.
pub struct JwksVerifier {
    http: reqwest::Client,
    jwks_uri: String,
    issuer: String,
    client_id: String,
    algorithms: Vec<Algorithm>,
    keys: RwLock<Option<JwkSet>>,
}

impl JwksVerifier {
    /// Creates a verifier for tokens issued to `client_id` by the provider
    /// described by `metadata`.
    ///
    /// Accepted algorithms are the provider's advertised ID token signing
    /// algorithms, or `RS256` when it advertises none. Names this crate
    /// cannot verify (e.g. `none`) are skipped.
    pub fn new(http: reqwest::Client, metadata: &ProviderMetadata, client_id: &str) -> Self {
        let algorithms = metadata
            .id_token_signing_alg_values_supported
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter_map(|name| Algorithm::from_str(name).ok())
            .collect::<Vec<_>>();

        let algorithms = if algorithms.is_empty() {
            vec![Algorithm::RS256]
        } else {
            algorithms
        };

        Self {
            http,
            jwks_uri: metadata.jwks_uri.clone(),
            issuer: metadata.issuer.clone(),
            client_id: client_id.to_string(),
            algorithms,
            keys: RwLock::new(None),
        }
    }

    /// Returns the cached key set, fetching it first when `refresh` is set
    /// or nothing has been cached yet.
    async fn key_set(&self, refresh: bool) -> AuthResult<JwkSet> {
        if !refresh {
            if let Some(keys) = self.keys.read().await.as_ref() {
                return Ok(keys.clone());
            }
        }

        let keys = self.fetch_keys().await?;
        *self.keys.write().await = Some(keys.clone());
        Ok(keys)
    }

    async fn fetch_keys(&self) -> AuthResult<JwkSet> {
        tracing::debug!(jwks_uri = %self.jwks_uri, "fetching signing keys");

        let resp = self
            .http
            .get(&self.jwks_uri)
            .send()
            .await
            .map_err(|e| SeizmeiaError::Verification(format!("failed to fetch keys: {e}")))?;

        if !resp.status().is_success() {
            return Err(SeizmeiaError::Verification(format!(
                "failed to fetch keys: {} returned {}",
                self.jwks_uri,
                resp.status()
            )));
        }

        resp.json::<JwkSet>()
            .await
            .map_err(|e| SeizmeiaError::Verification(format!("failed to decode keys: {e}")))
    }

    fn validation(&self, alg: Algorithm) -> Validation {
        let mut validation = Validation::new(alg);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.client_id.as_str()]);
        validation.leeway = 0;
        validation.validate_nbf = false;
        validation
    }

    /// Checks `raw` against every candidate key, succeeding on the first
    /// key that verifies it.
    fn decode_with(
        &self,
        raw: &str,
        keys: &JwkSet,
        kid: Option<&str>,
        alg: Algorithm,
    ) -> Option<AuthResult<IdTokenClaims>> {
        let candidates: Vec<_> = match kid {
            Some(kid) => keys.find(kid).into_iter().collect(),
            None => keys.keys.iter().collect(),
        };

        let mut last_err = None;
        for jwk in candidates {
            let key = match DecodingKey::from_jwk(jwk) {
                Ok(key) => key,
                Err(e) => {
                    last_err = Some(e);
                    continue;
                }
            };
            match decode::<IdTokenClaims>(raw, &key, &self.validation(alg)) {
                Ok(data) => return Some(check_not_before(data.claims, now_secs())),
                Err(e) => last_err = Some(e),
            }
        }

        last_err.map(|e| Err(SeizmeiaError::Verification(format!("invalid token: {e}"))))
    }
}

fn now_secs() -> u64 {
    jsonwebtoken::get_current_timestamp()
}

/// Rejects a token whose `nbf` is more than [`NOT_BEFORE_SKEW_SECS`]
/// ahead of `now`.
fn check_not_before(claims: IdTokenClaims, now: u64) -> AuthResult<IdTokenClaims> {
    match claims.nbf {
        Some(nbf) if nbf > now + NOT_BEFORE_SKEW_SECS => Err(SeizmeiaError::Verification(
            format!("token not valid yet: nbf {nbf} is after {now}"),
        )),
        _ => Ok(claims),
    }
}

#[async_trait]
impl IdTokenVerifier for JwksVerifier {
    async fn verify(&self, raw_id_token: &str) -> AuthResult<IdTokenClaims> {
        let header = decode_header(raw_id_token)
            .map_err(|e| SeizmeiaError::Verification(format!("malformed jwt: {e}")))?;

        if !self.algorithms.contains(&header.alg) {
            return Err(SeizmeiaError::Verification(format!(
                "id token signed with unsupported algorithm, expected {:?} got {:?}",
                self.algorithms, header.alg
            )));
        }

        let kid = header.kid.as_deref();
        let keys = self.key_set(false).await?;
        if let Some(result) = self.decode_with(raw_id_token, &keys, kid, header.alg) {
            return result;
        }

        // No candidate key in the cache; the provider may have rotated keys.
        let keys = self.key_set(true).await?;
        self.decode_with(raw_id_token, &keys, kid, header.alg)
            .unwrap_or_else(|| {
                Err(SeizmeiaError::Verification(format!(
                    "no signing key matches key id {}",
                    kid.unwrap_or("<none>")
                )))
            })
    }
}
