//! The authenticator shared by the login and callback handlers
//!
//! An [`Authenticator`] is built once at startup from one or more
//! [`AuthenticatorOptions`] sets, discovers the identity provider, and is
//! then shared read-only by every request.

use std::sync::Arc;

use url::Url;

use crate::auth::discovery::{fetch_provider_metadata, ProviderMetadata};
use crate::auth::state::{new_state, EntropySource, OsEntropy};
use crate::auth::token::{Endpoint, OAuth2Config};
use crate::auth::verifier::{IdTokenVerifier, JwksVerifier};
use crate::error::{AuthResult, SeizmeiaError};

/// One set of configuration overrides. Empty fields leave the current
/// value untouched.
#[derive(Debug, Clone, Default)]
pub struct AuthenticatorOptions {
    /// OAuth2 client ID of this application.
    pub client_id: String,

    /// OAuth2 client secret of this application.
    pub client_secret: String,

    /// URL of the OpenID Connect issuer.
    pub issuer_url: String,

    /// Callback URL for OAuth2 responses.
    pub redirect_uri: String,

    /// Where the browser lands once the session cookie is set.
    pub frontend_redirect_uri: String,
}

/// Validated, immutable authenticator settings.
#[derive(Debug, Clone)]
pub struct AuthenticatorConfig {
    pub client_id: String,
    pub client_secret: String,
    pub issuer_url: Url,
    pub redirect_uri: Url,
    pub frontend_redirect_uri: Url,
    /// Mark the session cookie `HttpOnly`. Off by default so the frontend
    /// can read the token.
    pub http_only_cookie: bool,
}

/// Parses an absolute `http` or `https` URL option with a host.
fn parse_url(name: &str, value: &str) -> AuthResult<Url> {
    let url = Url::parse(value).map_err(|e| SeizmeiaError::Config(format!("{name}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(SeizmeiaError::Config(format!(
            "{name}: unsupported scheme {:?}, expected http or https",
            url.scheme()
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(SeizmeiaError::Config(format!("{name}: missing host")));
    }
    Ok(url)
}

impl AuthenticatorConfig {
    /// Applies `options` in order and validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`SeizmeiaError::Config`] as soon as a URL option is not an
    /// absolute `http(s)` URL with a host, or if the client ID, issuer URL, redirect
    /// URI or frontend redirect URI is still unset after all options.
    ///
    /// # Examples
    ///
    /// ```
    /// use seizmeia::auth::authenticator::{AuthenticatorConfig, AuthenticatorOptions};
    ///
    /// let base = AuthenticatorOptions {
    ///     client_id: "seizmeia".to_string(),
    ///     issuer_url: "https://dex.example.com".to_string(),
    ///     redirect_uri: "https://tap.example.com/auth/callback".to_string(),
    ///     frontend_redirect_uri: "https://tap.example.com/loggedin".to_string(),
    ///     ..Default::default()
    /// };
    /// let overrides = AuthenticatorOptions {
    ///     client_secret: "s3cret".to_string(),
    ///     ..Default::default()
    /// };
    ///
    /// let config = AuthenticatorConfig::from_options([base, overrides]).unwrap();
    /// assert_eq!(config.client_id, "seizmeia");
    /// assert_eq!(config.client_secret, "s3cret");
    /// ```
    pub fn from_options<I>(options: I) -> AuthResult<Self>
    where
        I: IntoIterator<Item = AuthenticatorOptions>,
    {
        let mut client_id = String::new();
        let mut client_secret = String::new();
        let mut issuer_url = None;
        let mut redirect_uri = None;
        let mut frontend_redirect_uri = None;

        for opts in options {
            if !opts.client_id.is_empty() {
                client_id = opts.client_id;
            }
            if !opts.client_secret.is_empty() {
                client_secret = opts.client_secret;
            }
            if !opts.issuer_url.is_empty() {
                issuer_url = Some(parse_url("issuer url", &opts.issuer_url)?);
            }
            if !opts.redirect_uri.is_empty() {
                redirect_uri = Some(parse_url("redirect uri", &opts.redirect_uri)?);
            }
            if !opts.frontend_redirect_uri.is_empty() {
                frontend_redirect_uri = Some(parse_url(
                    "frontend redirect uri",
                    &opts.frontend_redirect_uri,
                )?);
            }
        }

        if client_id.is_empty() {
            return Err(SeizmeiaError::Config("client id is required".to_string()));
        }
        let missing = |name: &str| SeizmeiaError::Config(format!("{name} is required"));

        Ok(Self {
            client_id,
            client_secret,
            issuer_url: issuer_url.ok_or_else(|| missing("issuer url"))?,
            redirect_uri: redirect_uri.ok_or_else(|| missing("redirect uri"))?,
            frontend_redirect_uri: frontend_redirect_uri
                .ok_or_else(|| missing("frontend redirect uri"))?,
            http_only_cookie: false,
        })
    }

    /// Sets whether the session cookie carries `HttpOnly`.
    pub fn with_http_only_cookie(mut self, http_only: bool) -> Self {
        self.http_only_cookie = http_only;
        self
    }

    /// The issuer as configured, without the trailing slash `Url` adds to
    /// bare origins.
    pub fn issuer(&self) -> &str {
        let issuer = self.issuer_url.as_str();
        if self.issuer_url.path() == "/" && self.issuer_url.query().is_none() {
            issuer.trim_end_matches('/')
        } else {
            issuer
        }
    }
}

/// Relays the browser through an OpenID Connect provider.
///
/// Holds no mutable state; share it behind an `Arc`.
pub struct Authenticator {
    config: AuthenticatorConfig,
    provider: ProviderMetadata,
    offline_as_scope: bool,
    verifier: Arc<dyn IdTokenVerifier>,
    entropy: Arc<dyn EntropySource>,
    http: reqwest::Client,
}

impl Authenticator {
    /// Discovers the provider and builds a JWKS verifier bound to the
    /// client ID.
    ///
    /// # Errors
    ///
    /// Returns [`SeizmeiaError::Discovery`] if provider discovery fails.
    /// Discovery is attempted once.
    pub async fn new(config: AuthenticatorConfig, http: reqwest::Client) -> AuthResult<Self> {
        let provider = fetch_provider_metadata(&http, config.issuer()).await?;
        let verifier = Arc::new(JwksVerifier::new(
            http.clone(),
            &provider,
            &config.client_id,
        ));

        Ok(Self::from_parts(
            config,
            provider,
            verifier,
            Arc::new(OsEntropy),
            http,
        ))
    }

    /// Assembles an authenticator from already-discovered metadata.
    pub fn from_parts(
        config: AuthenticatorConfig,
        provider: ProviderMetadata,
        verifier: Arc<dyn IdTokenVerifier>,
        entropy: Arc<dyn EntropySource>,
        http: reqwest::Client,
    ) -> Self {
        let offline_as_scope = provider.offline_as_scope();
        Self {
            config,
            provider,
            offline_as_scope,
            verifier,
            entropy,
            http,
        }
    }

    /// Replaces the entropy source used for state values.
    pub fn with_entropy(mut self, entropy: Arc<dyn EntropySource>) -> Self {
        self.entropy = entropy;
        self
    }

    pub fn config(&self) -> &AuthenticatorConfig {
        &self.config
    }

    pub fn provider(&self) -> &ProviderMetadata {
        &self.provider
    }

    /// Whether offline access is requested as a scope rather than with
    /// `access_type=offline`.
    pub fn offline_as_scope(&self) -> bool {
        self.offline_as_scope
    }

    pub fn verifier(&self) -> &dyn IdTokenVerifier {
        self.verifier.as_ref()
    }

    /// OAuth2 client settings requesting `scopes`. Computed on every call.
    pub fn oauth2_config(&self, scopes: Vec<String>) -> OAuth2Config {
        OAuth2Config::new(
            self.http.clone(),
            &self.config.client_id,
            &self.config.client_secret,
            Endpoint {
                auth_url: self.provider.authorization_endpoint.clone(),
                token_url: self.provider.token_endpoint.clone(),
            },
            scopes,
            self.config.redirect_uri.as_str(),
        )
    }

    /// A fresh anti-replay state value.
    pub fn new_state(&self) -> String {
        new_state(self.entropy.as_ref())
    }
}
