//! HTTP endpoints of the login relay
//!
//! - `GET /auth/login` redirects the browser to the identity provider.
//! - `GET /auth/callback` receives the authorization code, exchanges it,
//!   verifies the identity token and sets the session cookie.
//! - `POST /auth/callback` does the same with a refresh token posted by
//!   the frontend.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{RawQuery, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{any, get};
use axum::Router;
use url::Url;

use crate::auth::authenticator::Authenticator;
use crate::auth::discovery::SCOPE_OFFLINE_ACCESS;
use crate::auth::token::{Token, TokenExchange};
use crate::error::{AuthResult, SeizmeiaError};

/// Name of the cookie carrying the raw identity token.
pub const SESSION_COOKIE_NAME: &str = "oauth2-token";

/// Scopes requested on every login.
const BASE_SCOPES: [&str; 3] = ["openid", "profile", "email"];

/// Prefix turning a client ID into a cross-client audience scope.
const CROSS_CLIENT_SCOPE_PREFIX: &str = "audience:server:client_id:";

/// Mounts the login and callback endpoints.
pub fn routes(auth: Arc<Authenticator>) -> Router {
    Router::new()
        .route("/auth/login", get(handle_login))
        .route("/auth/callback", any(handle_callback))
        .with_state(auth)
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

/// Query parameters accepted by the login endpoint.
#[derive(Debug, Clone, Default)]
pub struct LoginParams {
    /// Space-separated scopes to request on top of the base scopes.
    pub extra_scopes: String,
    /// Space-separated client IDs the identity token should also be
    /// issued for.
    pub cross_client: String,
    /// Upstream connector to preselect at the provider.
    pub connector_id: String,
    /// `"yes"` to request a refresh token.
    pub offline_access: String,
}

impl LoginParams {
    /// Reads the parameters from a raw query string. Repeated keys keep the
    /// first value; unknown keys are ignored.
    pub fn from_query(query: Option<&str>) -> Self {
        let form = FormValues::from_query(query);
        Self {
            extra_scopes: form.get("extra_scopes").to_string(),
            cross_client: form.get("cross_client").to_string(),
            connector_id: form.get("connector_id").to_string(),
            offline_access: form.get("offline_access").to_string(),
        }
    }

    fn wants_offline_access(&self) -> bool {
        self.offline_access == "yes"
    }
}

fn push_unique(scopes: &mut Vec<String>, scope: &str) {
    if !scope.is_empty() && !scopes.iter().any(|s| s == scope) {
        scopes.push(scope.to_string());
    }
}

/// Extra scopes, then cross-client audience scopes, then the base scopes.
///
/// `offline_access` is only ever added by the offline access request, so it
/// is dropped from the extra scopes.
pub fn requested_scopes(params: &LoginParams) -> Vec<String> {
    let mut scopes = Vec::new();
    for scope in params
        .extra_scopes
        .split(' ')
        .filter(|s| *s != SCOPE_OFFLINE_ACCESS)
    {
        push_unique(&mut scopes, scope);
    }
    for client in params.cross_client.split(' ').filter(|c| !c.is_empty()) {
        push_unique(&mut scopes, &format!("{CROSS_CLIENT_SCOPE_PREFIX}{client}"));
    }
    for scope in BASE_SCOPES {
        push_unique(&mut scopes, scope);
    }
    scopes
}

/// Builds the provider URL a login request is redirected to.
///
/// # Errors
///
/// Returns [`SeizmeiaError::Config`] if the provider's authorization
/// endpoint is not a valid URL.
pub fn authorization_url(auth: &Authenticator, params: &LoginParams) -> AuthResult<Url> {
    let mut scopes = requested_scopes(params);
    let state = auth.new_state();
    let mut extra_params: Vec<(&str, &str)> = Vec::new();

    if params.wants_offline_access() {
        if auth.offline_as_scope() {
            push_unique(&mut scopes, SCOPE_OFFLINE_ACCESS);
        } else {
            extra_params.push(("access_type", "offline"));
        }
    }

    if !params.connector_id.is_empty() {
        extra_params.push(("connector_id", params.connector_id.as_str()));
    }

    // TODO: persist `state` per browser session and compare it in the callback.
    auth.oauth2_config(scopes).auth_code_url(&state, &extra_params)
}

/// `GET /auth/login`
pub async fn handle_login(
    State(auth): State<Arc<Authenticator>>,
    RawQuery(query): RawQuery,
) -> AuthResult<Redirect> {
    let params = LoginParams::from_query(query.as_deref());
    let url = authorization_url(&auth, &params)?;
    tracing::debug!(offline = params.wants_offline_access(), "redirecting to identity provider");
    Ok(Redirect::to(url.as_str()))
}

// ---------------------------------------------------------------------------
// Callback
// ---------------------------------------------------------------------------

/// Request form values: the urlencoded POST body first, then the query.
#[derive(Debug, Default, Clone)]
pub struct FormValues {
    pairs: Vec<(String, String)>,
}

impl FormValues {
    fn parse_into(pairs: &mut Vec<(String, String)>, input: &[u8]) {
        pairs.extend(url::form_urlencoded::parse(input).into_owned());
    }

    pub fn from_query(query: Option<&str>) -> Self {
        let mut pairs = Vec::new();
        if let Some(query) = query {
            Self::parse_into(&mut pairs, query.as_bytes());
        }
        Self { pairs }
    }

    /// Collects form values the way an HTML form submission is read: a
    /// `POST` with an urlencoded body contributes its fields ahead of the
    /// query string.
    pub fn from_request(
        method: &Method,
        headers: &HeaderMap,
        query: Option<&str>,
        body: &[u8],
    ) -> Self {
        let mut pairs = Vec::new();

        let is_form = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("application/x-www-form-urlencoded"))
            .unwrap_or(false);

        if *method == Method::POST && is_form {
            Self::parse_into(&mut pairs, body);
        }
        if let Some(query) = query {
            Self::parse_into(&mut pairs, query.as_bytes());
        }

        Self { pairs }
    }

    /// First value for `key`, or `""` when absent.
    pub fn get(&self, key: &str) -> &str {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .unwrap_or("")
    }
}

impl fmt::Display for FormValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut grouped: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (k, v) in &self.pairs {
            grouped.entry(k).or_default().push(v);
        }
        write!(f, "{grouped:?}")
    }
}

/// The session cookie handed to the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
}

impl SessionCookie {
    /// `oauth2-token=<raw_id_token>` on `/`, `Secure`, `SameSite=Strict`.
    pub fn new(raw_id_token: impl Into<String>) -> Self {
        Self {
            name: SESSION_COOKIE_NAME.to_string(),
            value: raw_id_token.into(),
            path: "/".to_string(),
            secure: true,
            http_only: false,
        }
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }
}

impl fmt::Display for SessionCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}; Path={}; SameSite=Strict",
            self.name, self.value, self.path
        )?;
        if self.secure {
            write!(f, "; Secure")?;
        }
        if self.http_only {
            write!(f, "; HttpOnly")?;
        }
        Ok(())
    }
}

/// Obtains a token set for the callback request.
///
/// `GET` exchanges the authorization code; `POST` refreshes with the posted
/// refresh token. Any other method is rejected.
async fn obtain_token(
    auth: &Authenticator,
    method: &Method,
    form: &FormValues,
) -> AuthResult<Token> {
    let oauth2 = auth.oauth2_config(Vec::new());

    let result = match *method {
        Method::GET => {
            let error = form.get("error");
            if !error.is_empty() {
                return Err(SeizmeiaError::BadRequest(format!(
                    "{}: {}",
                    error,
                    form.get("error_description")
                )));
            }
            let code = form.get("code");
            if code.is_empty() {
                return Err(SeizmeiaError::BadRequest(format!(
                    "no code in request: {form}"
                )));
            }
            oauth2.exchange(code).await
        }
        Method::POST => {
            let refresh_token = form.get("refresh_token");
            if refresh_token.is_empty() {
                return Err(SeizmeiaError::BadRequest(format!(
                    "no refresh_token in request: {form}"
                )));
            }
            oauth2
                .token_source(Token::from_refresh_token(refresh_token))
                .token()
                .await
        }
        _ => {
            return Err(SeizmeiaError::BadRequest(format!(
                "method not implemented: {method}"
            )))
        }
    };

    result.map_err(|e| SeizmeiaError::Exchange(format!("failed to get token: {e}")))
}

/// Runs the callback state machine and builds the success response.
///
/// # Errors
///
/// - [`SeizmeiaError::BadRequest`] for provider-reported errors, missing
///   `code` / `refresh_token`, or an unsupported method.
/// - [`SeizmeiaError::Exchange`] if the token endpoint call fails.
/// - [`SeizmeiaError::Verification`] if the response has no identity token
///   or it fails verification.
pub async fn complete_callback(
    auth: &Authenticator,
    method: &Method,
    form: &FormValues,
) -> AuthResult<Response> {
    let token = obtain_token(auth, method, form).await?;

    let raw_id_token = token.id_token().ok_or_else(|| {
        SeizmeiaError::Verification("no id_token in token response".to_string())
    })?;

    let claims = auth
        .verifier()
        .verify(raw_id_token)
        .await
        .map_err(|e| SeizmeiaError::Verification(format!("failed to verify ID token: {e}")))?;

    tracing::info!(sub = %claims.sub, method = %method, "issued session cookie");

    let cookie = SessionCookie::new(raw_id_token).http_only(auth.config().http_only_cookie);

    Ok((
        StatusCode::FOUND,
        [
            (header::SET_COOKIE, cookie.to_string()),
            (
                header::LOCATION,
                auth.config().frontend_redirect_uri.to_string(),
            ),
        ],
    )
        .into_response())
}

/// `GET|POST /auth/callback`
pub async fn handle_callback(
    State(auth): State<Arc<Authenticator>>,
    method: Method,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    let form = FormValues::from_request(&method, &headers, query.as_deref(), &body);
    match complete_callback(&auth, &method, &form).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(extra: &str, cross: &str) -> LoginParams {
        LoginParams {
            extra_scopes: extra.to_string(),
            cross_client: cross.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_requested_scopes_always_include_base() {
        assert_eq!(
            requested_scopes(&LoginParams::default()),
            vec!["openid", "profile", "email"]
        );
    }

    #[test]
    fn test_requested_scopes_order_and_dedup() {
        let scopes = requested_scopes(&params("groups  email", "web mobile"));
        assert_eq!(
            scopes,
            vec![
                "groups",
                "email",
                "audience:server:client_id:web",
                "audience:server:client_id:mobile",
                "openid",
                "profile",
            ]
        );
    }

    #[test]
    fn test_requested_scopes_drop_offline_access() {
        let scopes = requested_scopes(&params("offline_access groups", ""));
        assert!(!scopes.iter().any(|s| s == "offline_access"));
        assert_eq!(scopes[0], "groups");
    }

    #[test]
    fn test_form_values_prefer_body_then_query() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            "application/x-www-form-urlencoded".parse().unwrap(),
        );
        let form = FormValues::from_request(
            &Method::POST,
            &headers,
            Some("refresh_token=from-query&x=1"),
            b"refresh_token=from-body",
        );
        assert_eq!(form.get("refresh_token"), "from-body");
        assert_eq!(form.get("x"), "1");
        assert_eq!(form.get("missing"), "");
    }

    #[test]
    fn test_form_values_ignore_body_without_form_content_type() {
        let form = FormValues::from_request(
            &Method::POST,
            &HeaderMap::new(),
            None,
            b"refresh_token=abc",
        );
        assert_eq!(form.get("refresh_token"), "");
    }

    #[test]
    fn test_form_values_display_groups_keys() {
        let form = FormValues::from_query(Some("b=2&a=1&a=3"));
        assert_eq!(form.to_string(), r#"{"a": ["1", "3"], "b": ["2"]}"#);
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = SessionCookie::new("h.p.s");
        assert_eq!(
            cookie.to_string(),
            "oauth2-token=h.p.s; Path=/; SameSite=Strict; Secure"
        );
        assert_eq!(
            cookie.http_only(true).to_string(),
            "oauth2-token=h.p.s; Path=/; SameSite=Strict; Secure; HttpOnly"
        );
    }

    #[test]
    fn test_login_params_first_value_wins() {
        let p = LoginParams::from_query(Some(
            "offline_access=yes&offline_access=no&connector_id=ldap",
        ));
        assert!(p.wants_offline_access());
        assert_eq!(p.connector_id, "ldap");
    }
}
