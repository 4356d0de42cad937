//! HTTP server
//!
//! Mounts the login relay (when configured), the build info endpoint and
//! the single-page app, wrapped in request-id, tracing and panic recovery
//! middleware.

use std::future::{Future, IntoFuture};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::auth::{self, Authenticator};
use crate::buildinfo::handle_buildinfo;
use crate::config::ServerConfig;

/// How long in-flight requests get to finish once shutdown starts.
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Serves files from `dir`; unknown paths get `index.html` so client-side
/// routes survive a reload.
pub fn spa_service(dir: &Path) -> ServeDir<ServeFile> {
    ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html")))
}

/// Builds the application router.
pub fn router(config: &ServerConfig, authenticator: Option<Arc<Authenticator>>) -> Router {
    let mut app = Router::new().route("/api/buildinfo", get(handle_buildinfo));

    match authenticator {
        Some(authenticator) => app = app.merge(auth::routes(authenticator)),
        None => tracing::warn!("auth.issuer_url not set, login endpoints disabled"),
    }

    app.fallback_service(spa_service(&config.spa_dir)).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(CatchPanicLayer::new()),
    )
}

/// Serves `app` on `listener` until Ctrl-C or SIGTERM.
pub async fn serve(listener: TcpListener, app: Router) -> Result<()> {
    serve_until(listener, app, shutdown_signal(), SHUTDOWN_GRACE_PERIOD).await
}

/// Serves `app` until `signal` resolves, then waits up to `grace` for open
/// connections before returning without them.
pub async fn serve_until<S>(
    listener: TcpListener,
    app: Router,
    signal: S,
    grace: Duration,
) -> Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    tracing::info!(addr = %listener.local_addr()?, "listening");

    let (stopping_tx, stopping_rx) = tokio::sync::oneshot::channel();
    let signal = async move {
        signal.await;
        let _ = stopping_tx.send(());
    };

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(signal)
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result?;
            tracing::info!("server stopped");
            return Ok(());
        }
        Ok(()) = stopping_rx => {}
    }

    match tokio::time::timeout(grace, &mut server).await {
        Ok(result) => {
            result?;
            tracing::info!("server stopped");
        }
        Err(_) => tracing::warn!(
            grace_secs = grace.as_secs_f64(),
            "graceful shutdown timed out, abandoning open connections"
        ),
    }
    Ok(())
}

/// Resolves on the first shutdown signal.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
