//! Seizmeia - credit management for a beer tap
//!
//! This library holds the OpenID Connect login relay and the HTTP shell
//! that serves it next to the single-page app.
//!
//! # Architecture
//!
//! - `auth`: provider discovery, authorization redirect, code exchange,
//!   identity token verification and the session cookie
//! - `server`: router, middleware and graceful shutdown
//! - `buildinfo`: version information
//! - `config`: configuration management and validation
//! - `logging`: tracing subscriber setup
//! - `error`: error types and result aliases
//! - `cli`: command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use seizmeia::{cli::Cli, server, Authenticator, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(Some("config.yaml"), &Cli::default())?;
//!     config.validate()?;
//!
//!     let http = reqwest::Client::new();
//!     let authenticator = Authenticator::new(config.auth.authenticator_config()?, http).await?;
//!
//!     let app = server::router(&config.server, Some(Arc::new(authenticator)));
//!     let listener = tokio::net::TcpListener::bind(config.listen_addr()?).await?;
//!     server::serve(listener, app).await
//! }
//! ```

pub mod auth;
pub mod buildinfo;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod server;

// Re-export commonly used types
pub use auth::{Authenticator, AuthenticatorConfig, AuthenticatorOptions};
pub use config::Config;
pub use error::{AuthResult, Result, SeizmeiaError};
