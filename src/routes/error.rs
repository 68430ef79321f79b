// Failures of the write-side routes, mapped onto HTTP statuses

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::fetcher::{FetchError, UnknownAction};

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("action buttons are disabled")]
    Disabled,
    #[error(transparent)]
    UnknownAction(#[from] UnknownAction),
    #[error("no {kind} with key {key}")]
    NotFound { kind: &'static str, key: String },
    #[error("portainer rejected the request: {0}")]
    Remote(#[from] FetchError),
    #[error("scheduler is not running")]
    Unavailable,
}

impl IntoResponse for ActionError {
    fn into_response(self) -> Response {
        let status = match &self {
            ActionError::Disabled => StatusCode::FORBIDDEN,
            ActionError::UnknownAction(_) => StatusCode::BAD_REQUEST,
            ActionError::NotFound { .. } => StatusCode::NOT_FOUND,
            ActionError::Remote(_) => StatusCode::BAD_GATEWAY,
            ActionError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        };
        if status.is_server_error() {
            tracing::warn!(error = %self, "request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
