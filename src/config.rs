//! Configuration management for Seizmeia
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::auth::{AuthenticatorConfig, AuthenticatorOptions};
use crate::cli::Cli;
use crate::error::{Result, SeizmeiaError};

/// Main configuration structure for Seizmeia
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// OpenID Connect login configuration
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human-readable text
    Text,
}

impl FromStr for LogFormat {
    type Err = SeizmeiaError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "text" => Ok(LogFormat::Text),
            other => Err(SeizmeiaError::Config(format!(
                "Invalid log format: {}. Must be one of: json, text",
                other
            ))),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Minimum level: debug, info, warn or error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Directory holding the built single-page app
    #[serde(default = "default_spa_dir")]
    pub spa_dir: PathBuf,
}

fn default_listen() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_spa_dir() -> PathBuf {
    PathBuf::from("web/app/dist")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            spa_dir: default_spa_dir(),
        }
    }
}

/// OpenID Connect login configuration
///
/// Login is enabled only when `issuer_url` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    #[serde(default)]
    pub issuer_url: String,

    /// Callback URL registered with the provider
    #[serde(default)]
    pub redirect_uri: String,

    /// Where the browser is sent once logged in
    #[serde(default)]
    pub frontend_redirect_uri: String,

    /// Timeout for calls to the identity provider
    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout_seconds: u64,

    /// Mark the session cookie `HttpOnly`
    #[serde(default)]
    pub http_only_cookie: bool,
}

fn default_http_timeout_seconds() -> u64 {
    10
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            issuer_url: String::new(),
            redirect_uri: String::new(),
            frontend_redirect_uri: String::new(),
            http_timeout_seconds: default_http_timeout_seconds(),
            http_only_cookie: false,
        }
    }
}

impl AuthConfig {
    /// Whether the login endpoints should be mounted.
    pub fn enabled(&self) -> bool {
        !self.issuer_url.is_empty()
    }

    /// These settings as an authenticator option set.
    pub fn options(&self) -> AuthenticatorOptions {
        AuthenticatorOptions {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            issuer_url: self.issuer_url.clone(),
            redirect_uri: self.redirect_uri.clone(),
            frontend_redirect_uri: self.frontend_redirect_uri.clone(),
        }
    }

    /// Validated authenticator settings.
    ///
    /// # Errors
    ///
    /// Returns [`SeizmeiaError::Config`] if a URL is malformed or a
    /// required field is missing.
    pub fn authenticator_config(&self) -> std::result::Result<AuthenticatorConfig, SeizmeiaError> {
        AuthenticatorConfig::from_options([self.options()])
            .map(|config| config.with_http_only_cookie(self.http_only_cookie))
    }
}

/// Files searched, in order, when no path is given.
fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/seizmeia/config.yaml")];
    if let Some(dirs) = directories::BaseDirs::new() {
        paths.push(dirs.home_dir().join(".seizmeia").join("config.yaml"));
    }
    paths.push(PathBuf::from("config.yaml"));
    paths
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// With an explicit `path` the file must exist. Otherwise the first
    /// existing default location is used, and defaults apply when there is
    /// none.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: Option<&str>, cli: &Cli) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                if !Path::new(path).exists() {
                    return Err(SeizmeiaError::Config(format!(
                        "Config file not found: {}",
                        path
                    ))
                    .into());
                }
                Self::from_file(Path::new(path))?
            }
            None => match default_config_paths().into_iter().find(|p| p.exists()) {
                Some(found) => {
                    tracing::debug!("Using config file {}", found.display());
                    Self::from_file(&found)?
                }
                None => {
                    tracing::warn!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SeizmeiaError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| SeizmeiaError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        // Log overrides
        if let Ok(level) = std::env::var("SEIZMEIA_LOG_LEVEL") {
            self.log.level = level;
        }

        if let Ok(format) = std::env::var("SEIZMEIA_LOG_FORMAT") {
            match format.parse() {
                Ok(value) => self.log.format = value,
                Err(_) => tracing::warn!("Invalid SEIZMEIA_LOG_FORMAT: {}", format),
            }
        }

        // Server overrides
        if let Ok(listen) = std::env::var("SEIZMEIA_SERVER_LISTEN") {
            self.server.listen = listen;
        }

        if let Ok(spa_dir) = std::env::var("SEIZMEIA_SERVER_SPA_DIR") {
            self.server.spa_dir = PathBuf::from(spa_dir);
        }

        // Auth overrides
        if let Ok(client_id) = std::env::var("SEIZMEIA_AUTH_CLIENT_ID") {
            self.auth.client_id = client_id;
        }

        if let Ok(client_secret) = std::env::var("SEIZMEIA_AUTH_CLIENT_SECRET") {
            self.auth.client_secret = client_secret;
        }

        if let Ok(issuer_url) = std::env::var("SEIZMEIA_AUTH_ISSUER_URL") {
            self.auth.issuer_url = issuer_url;
        }

        if let Ok(redirect_uri) = std::env::var("SEIZMEIA_AUTH_REDIRECT_URI") {
            self.auth.redirect_uri = redirect_uri;
        }

        if let Ok(uri) = std::env::var("SEIZMEIA_AUTH_FRONTEND_REDIRECT_URI") {
            self.auth.frontend_redirect_uri = uri;
        }

        if let Ok(timeout) = std::env::var("SEIZMEIA_AUTH_HTTP_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.auth.http_timeout_seconds = value;
            } else {
                tracing::warn!("Invalid SEIZMEIA_AUTH_HTTP_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(http_only) = std::env::var("SEIZMEIA_AUTH_HTTP_ONLY_COOKIE") {
            match http_only.to_lowercase().as_str() {
                "true" | "1" | "yes" => self.auth.http_only_cookie = true,
                "false" | "0" | "no" => self.auth.http_only_cookie = false,
                _ => tracing::warn!("Invalid SEIZMEIA_AUTH_HTTP_ONLY_COOKIE: {}", http_only),
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if cli.verbose {
            self.log.level = "debug".to_string();
        }

        if let Some(listen) = &cli.listen {
            self.server.listen = listen.clone();
        }
    }

    /// The parsed listen address.
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.server.listen.parse().map_err(|e| {
            SeizmeiaError::Config(format!(
                "Invalid server.listen {}: {}",
                self.server.listen, e
            ))
            .into()
        })
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log.level.to_lowercase().as_str()) {
            return Err(SeizmeiaError::Config(format!(
                "Invalid log level: {}. Must be one of: {}",
                self.log.level,
                valid_levels.join(", ")
            ))
            .into());
        }

        self.listen_addr()?;

        if self.auth.enabled() {
            if self.auth.http_timeout_seconds == 0 {
                return Err(SeizmeiaError::Config(
                    "auth.http_timeout_seconds must be greater than 0".to_string(),
                )
                .into());
            }
            self.auth.authenticator_config()?;
        }

        Ok(())
    }
}
