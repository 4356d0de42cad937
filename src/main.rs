//! Seizmeia server entry point

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use seizmeia::buildinfo::{banner, BuildInfo};
use seizmeia::cli::Cli;
use seizmeia::config::Config;
use seizmeia::logging::{bootstrap_subscriber, init_logging};
use seizmeia::{server, Authenticator};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    let info = BuildInfo::current();

    if cli.version {
        println!("{}", Cli::version_string(&info));
        return Ok(());
    }

    print!("{}", banner());

    let config = tracing::subscriber::with_default(bootstrap_subscriber(), || {
        let config = Config::load(cli.config.as_deref(), &cli)?;
        config.validate()?;
        Ok::<_, anyhow::Error>(config)
    })?;

    init_logging(&config.log)?;

    tracing::info!(
        version = %info.version,
        commit = %info.commit_hash,
        build_date = %info.build_date,
        os = %info.os,
        arch = %info.arch,
        rustc = %info.rustc_version,
        "starting seizmeia"
    );

    let authenticator = if config.auth.enabled() {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.auth.http_timeout_seconds))
            .build()
            .context("failed to build HTTP client")?;

        let authenticator =
            Authenticator::new(config.auth.authenticator_config()?, http).await?;
        Some(Arc::new(authenticator))
    } else {
        None
    };

    let app = server::router(&config.server, authenticator);

    let addr = config.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    server::serve(listener, app).await
}
