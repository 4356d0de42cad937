//! Structured logging setup
//!
//! JSON or human-readable output on stdout through `tracing-subscriber`.
//! `RUST_LOG` takes precedence over the configured level.

use anyhow::Result;
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogConfig, LogFormat};

/// Builds the level filter: `RUST_LOG` when set, otherwise the configured
/// level.
pub fn env_filter(config: &LogConfig) -> Result<EnvFilter> {
    Ok(EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?)
}

/// Text subscriber on stderr for the messages emitted before the
/// configuration is loaded. Install it with
/// [`tracing::subscriber::with_default`]; [`init_logging`] takes over after.
pub fn bootstrap_subscriber() -> impl Subscriber + Send + Sync + 'static {
    bootstrap_subscriber_with(std::io::stderr)
}

/// [`bootstrap_subscriber`] writing to `writer`.
pub fn bootstrap_subscriber_with<W>(writer: W) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(true)
        .finish()
}

/// Initialize logging based on configuration.
///
/// # Errors
///
/// Returns an error if the level is not a valid filter directive or a
/// global subscriber is already installed.
///
/// # Examples
///
/// ```no_run
/// use seizmeia::config::{LogConfig, LogFormat};
/// use seizmeia::logging::init_logging;
///
/// let config = LogConfig {
///     level: "info".to_string(),
///     format: LogFormat::Json,
/// };
///
/// init_logging(&config).unwrap();
/// ```
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let registry = tracing_subscriber::registry().with(env_filter(config)?);

    match config.format {
        LogFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true);
            registry.with(layer).try_init()?;
        }
        LogFormat::Text => {
            let layer = fmt::layer().with_target(true).with_level(true);
            registry.with(layer).try_init()?;
        }
    }

    Ok(())
}
