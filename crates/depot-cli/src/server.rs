use std::{sync::Arc, time::Duration};

use axum::{routing::get, Router};
use depot_core::Indexer;
use depot_events::StatsSink;
use tokio::{net::TcpListener, signal};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    error::{ErrorContext, Result},
    handlers,
};

#[derive(Clone)]
pub struct AppState {
    pub indexer: Arc<Indexer>,
    pub stats: Arc<StatsSink>,
    pub cache_time_index: Duration,
    pub cache_time_artifacts: Duration,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/package/:name/:version/", get(handlers::package_index))
        .route(
            "/package/:name/:version/*resource",
            get(handlers::static_resource),
        )
        .route("/epr/:name/:file", get(handlers::artifact))
        .with_state(state)
}

/// Serves HTTP requests on `address` until `shutdown` is cancelled.
pub async fn serve(address: &str, state: AppState, shutdown: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("binding to {address}"))?;
    serve_listener(listener, state, shutdown).await
}

pub async fn serve_listener(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<()> {
    let local_addr = listener
        .local_addr()
        .with_context(|| "reading the listener address".to_string())?;
    info!("Listening on http://{}", local_addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .with_context(|| "serving HTTP requests".to_string())
}

/// Cancels `shutdown` on Ctrl-C or SIGTERM.
pub async fn watch_signals(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!("Failed to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = shutdown.cancelled() => return,
    }

    info!("Received shutdown signal, stopping...");
    shutdown.cancel();
}
