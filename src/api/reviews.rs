use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use ulid::Ulid;

use crate::engine::ReviewFilter;
use crate::limits::DEFAULT_PAGE_LIMIT;
use crate::model::*;

use super::error::ApiError;
use super::extract::{AdminCaller, Caller, IdPath, JsonBody, QueryParams};
use super::{AppState, Envelope, ok};

type Reply<T> = Result<Json<Envelope<T>>, ApiError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub room_id: Ulid,
    pub rating: u8,
    pub comment: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomReviewsQuery {
    pub room_id: Ulid,
    #[serde(default = "first_page")]
    pub page: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn first_page() -> usize {
    1
}

fn default_limit() -> usize {
    DEFAULT_PAGE_LIMIT
}

/// GET /api/reviews
pub async fn list(
    State(state): State<AppState>,
    _admin: AdminCaller,
    QueryParams(filter): QueryParams<ReviewFilter>,
) -> Reply<Page<Review>> {
    let page = state.engine.list_reviews(&filter).await?;
    Ok(ok(page, "Get reviews successfully"))
}

/// GET /api/reviews/client?roomId=...
pub async fn for_room(
    State(state): State<AppState>,
    QueryParams(q): QueryParams<RoomReviewsQuery>,
) -> Reply<Page<Review>> {
    let page = state
        .engine
        .list_room_reviews(q.room_id, q.page, q.limit)
        .await?;
    Ok(ok(page, "Get reviews successfully"))
}

/// POST /api/reviews
pub async fn upsert(
    State(state): State<AppState>,
    caller: Caller,
    JsonBody(req): JsonBody<ReviewRequest>,
) -> Reply<Review> {
    let review = state
        .engine
        .upsert_review(caller.id, req.room_id, req.rating, &req.comment)
        .await?;
    Ok(ok(review, "Review saved successfully"))
}

/// DELETE /api/reviews/{id}
pub async fn delete(
    State(state): State<AppState>,
    _admin: AdminCaller,
    IdPath(id): IdPath,
) -> Reply<()> {
    state.engine.delete_review(id).await?;
    Ok(ok((), "Review deleted successfully"))
}
