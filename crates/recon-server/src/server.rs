//! Router assembly and server startup.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use recon_store::Store;

use crate::routes::corrections::{get_resolution, list_resolutions, post_resolution_edit};
use crate::routes::{api_info, not_found};
use crate::state::ServerState;

/// Build the Axum router. Generic over the storage backend so the same
/// router wiring serves a `MemStore` in tests and a `RedbStore` in the
/// running binary.
///
/// There is no auth layer here — the review UI is an internal tool and
/// authentication is out of scope.
pub fn build_router<S: Store + 'static>(state: Arc<ServerState<S>>) -> Router {
    let cors = if state.config.enable_cors {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };

    let timeout = state.config.timeout();

    Router::new()
        .route("/", get(api_info))
        .route("/corrections/", get(list_resolutions))
        .route(
            "/corrections/{id}/edit/",
            get(get_resolution).post(post_resolution_edit),
        )
        .fallback(not_found)
        .layer(TimeoutLayer::new(timeout))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the review server. Initializes `tracing` only if no subscriber is
/// already installed — the root `recon` binary is expected to have done
/// this already, but tests and standalone uses of this crate still want
/// output.
pub async fn start_server<S: Store + 'static>(
    state: Arc<ServerState<S>>,
) -> anyhow::Result<()> {
    let addr: SocketAddr = state.config.socket_addr()?;
    let app = build_router(state);

    tracing::info!("starting recon-server on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("recon-server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
