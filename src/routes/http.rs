// GET/POST handlers: version, groups, avatar batch, avatar image

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Query, State},
    http::header,
    response::IntoResponse,
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::Value;

use super::{ApiError, AppState};
use crate::avatar::AvatarImage;
use crate::history::PageRequest;
use crate::models::SnapshotView;

const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// GET /version — returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct GroupsQuery {
    id: Option<String>,
}

/// GET /groups — one history page; `id` may be a poll id or "min"/"oldest", absent means newest.
pub(super) async fn groups_handler(
    State(state): State<AppState>,
    Query(query): Query<GroupsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let request = PageRequest::from_query(query.id.as_deref())?;
    let page = state.history.page(request).await?;
    let body = Json(SnapshotView::new(&page.snapshot, page.minimum_id)).into_response();
    Ok((
        [
            (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
            (header::EXPIRES, "0"),
        ],
        body,
    ))
}

/// POST /qrcoderc24 — `{friendCode: descriptor}` in, `{friendCode: base64Png | null}` out.
/// Only a body that is not a JSON object is rejected; a non-string descriptor answers `null`.
pub(super) async fn resolve_avatars_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<HashMap<String, Option<AvatarImage>>>, ApiError> {
    let entries: HashMap<String, Value> =
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let mut requests = HashMap::with_capacity(entries.len());
    let mut unusable = Vec::new();
    for (friend_code, descriptor) in entries {
        match descriptor {
            Value::String(descriptor) => {
                requests.insert(friend_code, descriptor);
            }
            _ => unusable.push(friend_code),
        }
    }

    let mut resolved = state.avatars.resolve_many(requests).await;
    resolved.extend(unusable.into_iter().map(|friend_code| (friend_code, None)));
    Ok(Json(resolved))
}

#[derive(Debug, Deserialize)]
pub(super) struct AvatarQuery {
    fc: Option<String>,
}

/// GET /miiimg — PNG for a friend code seen in retained history.
pub(super) async fn avatar_image_handler(
    State(state): State<AppState>,
    Query(query): Query<AvatarQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let friend_code = query
        .fc
        .filter(|fc| !fc.is_empty())
        .ok_or(ApiError::MissingFriendCode)?;
    let image = state
        .avatars
        .resolve_known(&friend_code, &state.history)
        .await?;
    Ok(([(header::CONTENT_TYPE, "image/png")], image.png()))
}
