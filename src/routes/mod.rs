// HTTP routes: history pages and avatar lookups

mod http;

use axum::{
    Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};

use crate::avatar::{AvatarError, AvatarResolver};
use crate::history::{HistoryError, SnapshotHistory};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) history: Arc<SnapshotHistory>,
    pub(crate) avatars: Arc<AvatarResolver>,
}

pub fn app(history: Arc<SnapshotHistory>, avatars: Arc<AvatarResolver>) -> Router {
    let state = AppState { history, avatars };
    Router::new()
        .route("/", get(|| async { "roomwatch: room history and Mii avatars" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/groups", get(http::groups_handler)) // GET /groups?id=
        .route("/qrcoderc24", post(http::resolve_avatars_handler)) // POST /qrcoderc24
        .route("/miiimg", get(http::avatar_image_handler)) // GET /miiimg?fc=
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}

/// Errors surfaced to HTTP clients; upstream failures never reach here as 5xx.
#[derive(Debug, Error)]
pub(crate) enum ApiError {
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error(transparent)]
    Avatar(#[from] AvatarError),
    #[error("malformed request body: {0}")]
    BadRequest(String),
    #[error("the queried FC was not found or does not have an associated Mii")]
    MissingFriendCode,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::History(HistoryError::EmptyHistory) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::History(HistoryError::MalformedId(_) | HistoryError::OutOfRange(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::History(HistoryError::NotPopulated(_)) => StatusCode::NOT_FOUND,
            ApiError::Avatar(_) | ApiError::MissingFriendCode => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }
        (status, self.to_string()).into_response()
    }
}
