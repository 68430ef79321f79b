// HTTP + WebSocket routes

mod error;
mod http;
mod ws;

pub use error::ActionError;

use axum::{
    Router,
    routing::{get, post, put},
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Features;
use crate::coordinator::Published;
use crate::fetcher::ResourceControl;
use crate::models::RepairEvent;
use crate::worker::Command;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) published_rx: watch::Receiver<Published>,
    pub(crate) events_tx: broadcast::Sender<RepairEvent>,
    pub(crate) commands_tx: mpsc::Sender<Command>,
    pub(crate) control: Arc<dyn ResourceControl>,
    pub(crate) features: Features,
}

pub fn app(
    published_rx: watch::Receiver<Published>,
    events_tx: broadcast::Sender<RepairEvent>,
    commands_tx: mpsc::Sender<Command>,
    control: Arc<dyn ResourceControl>,
    features: Features,
) -> Router {
    let state = AppState {
        published_rx,
        events_tx,
        commands_tx,
        control,
        features,
    };
    Router::new()
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/state", get(http::state_handler)) // GET /api/state
        .route("/api/snapshot", get(http::snapshot_handler)) // GET /api/snapshot
        .route("/api/issues", get(http::issues_handler)) // GET /api/issues
        .route("/api/selection", put(http::selection_handler)) // PUT /api/selection
        .route("/api/issues/{key}/fix", post(http::fix_issue_handler)) // POST /api/issues/{key}/fix
        .route(
            "/api/containers/{key}/{action}",
            post(http::container_action_handler),
        ) // POST /api/containers/{key}/{action}
        .route("/api/stacks/{key}/{action}", post(http::stack_action_handler)) // POST /api/stacks/{key}/{action}
        .route("/ws/state", get(ws::ws_state)) // WS /ws/state
        .route("/ws/events", get(ws::ws_events)) // WS /ws/events
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}

/// Serves `app` until `signal` resolves or the server fails, then stops the
/// worker and waits for its loop to exit.
pub async fn serve<F>(
    listener: TcpListener,
    app: Router,
    signal: F,
    shutdown_tx: oneshot::Sender<()>,
    worker: JoinHandle<()>,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(signal)
        .await;
    tracing::info!("Server stopped, stopping worker");
    let _ = shutdown_tx.send(());
    if let Err(e) = worker.await {
        tracing::warn!(error = %e, "worker task ended abnormally");
    }
    result
}
