// HTTP handlers: version, published state, selection, repair fixes, lifecycle actions

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tokio::sync::oneshot;

use super::{ActionError, AppState};
use crate::fetcher::{ContainerAction, StackAction};
use crate::models::RepairIssue;
use crate::selection::Selection;
use crate::version::{NAME, VERSION};
use crate::worker::Command;

/// GET /version: returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/state: snapshot, open issues, cycle counter and last cycle error.
pub(super) async fn state_handler(State(state): State<AppState>) -> impl IntoResponse {
    let published = state.published_rx.borrow().clone();
    Json(published)
}

pub(super) async fn snapshot_handler(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.published_rx.borrow().snapshot.clone();
    Json(snapshot)
}

pub(super) async fn issues_handler(State(state): State<AppState>) -> impl IntoResponse {
    let issues = state.published_rx.borrow().issues.clone();
    Json(issues)
}

/// PUT /api/selection: replaces the selection; takes effect from the next cycle.
pub(super) async fn selection_handler(
    State(state): State<AppState>,
    Json(selection): Json<Selection>,
) -> Result<StatusCode, ActionError> {
    state
        .commands_tx
        .send(Command::UpdateSelection(selection))
        .await
        .map_err(|_| ActionError::Unavailable)?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/issues/{key}/fix: `key` is the issue id or the resource key.
pub(super) async fn fix_issue_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<RepairIssue>, ActionError> {
    let (reply, rx) = oneshot::channel();
    state
        .commands_tx
        .send(Command::FixIssue {
            id_or_key: key.clone(),
            reply,
        })
        .await
        .map_err(|_| ActionError::Unavailable)?;
    match rx.await.map_err(|_| ActionError::Unavailable)? {
        Some(issue) => Ok(Json(issue)),
        None => Err(ActionError::NotFound { kind: "issue", key }),
    }
}

pub(super) async fn container_action_handler(
    State(state): State<AppState>,
    Path((key, action)): Path<(String, String)>,
) -> Result<StatusCode, ActionError> {
    if !state.features.action_buttons {
        return Err(ActionError::Disabled);
    }
    let action: ContainerAction = action.parse()?;
    let (endpoint_id, container_id) = {
        let published = state.published_rx.borrow();
        let container = published
            .snapshot
            .find_container(&key)
            .ok_or_else(|| ActionError::NotFound {
                kind: "container",
                key: key.clone(),
            })?;
        (container.endpoint_id, container.id.clone())
    };
    state
        .control
        .container_action(endpoint_id, &container_id, action)
        .await?;
    tracing::info!(container = %key, %action, "container action sent");
    request_refresh(&state).await;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn stack_action_handler(
    State(state): State<AppState>,
    Path((key, action)): Path<(String, String)>,
) -> Result<StatusCode, ActionError> {
    if !state.features.action_buttons {
        return Err(ActionError::Disabled);
    }
    let action: StackAction = action.parse()?;
    let (endpoint_id, stack_id) = {
        let published = state.published_rx.borrow();
        let stack = published
            .snapshot
            .find_stack(&key)
            .ok_or_else(|| ActionError::NotFound {
                kind: "stack",
                key: key.clone(),
            })?;
        (stack.endpoint_id, stack.id)
    };
    state
        .control
        .stack_action(endpoint_id, stack_id, action)
        .await?;
    tracing::info!(stack = %key, %action, "stack action sent");
    request_refresh(&state).await;
    Ok(StatusCode::NO_CONTENT)
}

/// Asks the scheduler for an early cycle after a successful action. A gone
/// scheduler is only logged.
async fn request_refresh(state: &AppState) {
    if state.commands_tx.send(Command::Refresh).await.is_err() {
        tracing::debug!(operation = "refresh", "scheduler gone, refresh skipped");
    }
}
