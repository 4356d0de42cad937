//! OAuth2 client configuration, tokens and the token endpoint
//!
//! [`OAuth2Config`] is a per-call view over the authenticator: it carries
//! the scopes requested for one authorization request, builds the
//! authorization URL, and talks to the token endpoint for the code and
//! refresh grants.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use url::Url;

use crate::error::{AuthResult, SeizmeiaError};

/// Tokens expiring within this window are treated as already expired.
const EXPIRY_DELTA_SECS: i64 = 10;

/// Provider endpoints used by the authorization-code flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Authorization endpoint the browser is redirected to.
    pub auth_url: String,
    /// Token endpoint used for code exchange and refresh.
    pub token_url: String,
}

/// A token set returned by the token endpoint.
#[derive(Debug, Clone, Default)]
pub struct Token {
    /// The access token.
    pub access_token: String,
    /// Token type, usually `Bearer`.
    pub token_type: String,
    /// Refresh token, when the provider granted offline access.
    pub refresh_token: Option<String>,
    /// Absolute expiry of the access token.
    pub expiry: Option<DateTime<Utc>>,
    /// Provider-specific response fields, such as `id_token`.
    pub extra: HashMap<String, serde_json::Value>,
}

impl Token {
    /// A token holding only `refresh_token`, already expired, so that the
    /// next [`TokenSource::token`] call refreshes it.
    pub fn from_refresh_token(refresh_token: impl Into<String>) -> Self {
        Self {
            refresh_token: Some(refresh_token.into()),
            expiry: Some(Utc::now() - Duration::hours(1)),
            ..Self::default()
        }
    }

    /// Returns an extension field of the token response.
    pub fn extra(&self, key: &str) -> Option<&serde_json::Value> {
        self.extra.get(key)
    }

    /// The raw identity token, if the response carried one as a string.
    pub fn id_token(&self) -> Option<&str> {
        self.extra("id_token").and_then(|v| v.as_str())
    }

    /// Whether the access token is present and not about to expire.
    pub fn valid(&self) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        match self.expiry {
            Some(expiry) => expiry - Duration::seconds(EXPIRY_DELTA_SECS) > Utc::now(),
            None => true,
        }
    }
}

/// Raw JSON response from the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(flatten)]
    extra: HashMap<String, serde_json::Value>,
}

impl TokenResponse {
    fn into_token(self) -> Token {
        let expiry = self
            .expires_in
            .filter(|secs| *secs > 0)
            .map(|secs| Utc::now() + Duration::seconds(secs));

        Token {
            access_token: self.access_token,
            token_type: self.token_type,
            refresh_token: self.refresh_token,
            expiry,
            extra: self.extra,
        }
    }
}

/// The two grants the callback handler needs from a token endpoint.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Exchanges an authorization code for a token set.
    async fn exchange(&self, code: &str) -> AuthResult<Token>;

    /// Obtains a new token set with `refresh_token`.
    async fn refresh(&self, refresh_token: &str) -> AuthResult<Token>;
}

/// OAuth2 client settings for one authorization request.
#[derive(Debug, Clone)]
pub struct OAuth2Config {
    pub client_id: String,
    pub client_secret: String,
    pub endpoint: Endpoint,
    pub scopes: Vec<String>,
    pub redirect_url: String,
    http: reqwest::Client,
}

impl OAuth2Config {
    pub fn new(
        http: reqwest::Client,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        endpoint: Endpoint,
        scopes: Vec<String>,
        redirect_url: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            endpoint,
            scopes,
            redirect_url: redirect_url.into(),
            http,
        }
    }

    /// Builds the URL that starts the authorization-code flow.
    ///
    /// `extra_params` are appended after the standard parameters. Any query
    /// already present on the authorization endpoint is preserved.
    ///
    /// # Errors
    ///
    /// Returns [`SeizmeiaError::Config`] if the authorization endpoint
    /// advertised by the provider is not a valid URL.
    pub fn auth_code_url(&self, state: &str, extra_params: &[(&str, &str)]) -> AuthResult<Url> {
        let mut url = Url::parse(&self.endpoint.auth_url).map_err(|e| {
            SeizmeiaError::Config(format!("invalid authorization endpoint URL: {e}"))
        })?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &self.client_id);
            query.append_pair("redirect_uri", &self.redirect_url);
            query.append_pair("response_type", "code");
            if !self.scopes.is_empty() {
                query.append_pair("scope", &self.scopes.join(" "));
            }
            query.append_pair("state", state);
            for (key, value) in extra_params {
                query.append_pair(key, value);
            }
        }

        Ok(url)
    }

    /// Wraps `token` in a source that refreshes it once it has expired.
    pub fn token_source(&self, token: Token) -> TokenSource<'_> {
        TokenSource {
            config: self,
            token,
        }
    }

    /// POSTs a grant to the token endpoint and parses the response.
    async fn retrieve_token(&self, params: &[(&str, &str)]) -> AuthResult<Token> {
        let mut form: Vec<(&str, &str)> = params.to_vec();
        let mut request = self.http.post(&self.endpoint.token_url);

        if self.client_secret.is_empty() {
            form.push(("client_id", self.client_id.as_str()));
        } else {
            request = request.basic_auth(&self.client_id, Some(&self.client_secret));
        }

        let resp = request
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| SeizmeiaError::Exchange(format!("token request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SeizmeiaError::Exchange(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let raw: TokenResponse = resp
            .json()
            .await
            .map_err(|e| SeizmeiaError::Exchange(format!("failed to parse token response: {e}")))?;

        if raw.access_token.is_empty() {
            return Err(SeizmeiaError::Exchange(
                "server response missing access_token".to_string(),
            ));
        }

        Ok(raw.into_token())
    }
}

#[async_trait]
impl TokenExchange for OAuth2Config {
    async fn exchange(&self, code: &str) -> AuthResult<Token> {
        self.retrieve_token(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_url.as_str()),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> AuthResult<Token> {
        let mut token = self
            .retrieve_token(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .await?;

        // Providers may omit the refresh token when it is not rotated.
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }

        Ok(token)
    }
}

/// Hands out a valid token, refreshing the held one when it has expired.
pub struct TokenSource<'a> {
    config: &'a OAuth2Config,
    token: Token,
}

impl TokenSource<'_> {
    /// Returns the held token if still valid, otherwise a refreshed one.
    ///
    /// # Errors
    ///
    /// Returns [`SeizmeiaError::Exchange`] if the token needs refreshing
    /// but holds no refresh token, or if the refresh grant fails.
    pub async fn token(&self) -> AuthResult<Token> {
        if self.token.valid() {
            return Ok(self.token.clone());
        }

        let refresh_token = self.token.refresh_token.as_deref().ok_or_else(|| {
            SeizmeiaError::Exchange("token expired and refresh token is not set".to_string())
        })?;

        self.config.refresh(refresh_token).await
    }
}
