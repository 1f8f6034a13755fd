use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::engine::{RoomFilter, RoomTypeFilter};
use crate::model::*;

use super::error::ApiError;
use super::extract::{AdminCaller, IdPath, JsonBody, QueryParams};
use super::{AppState, Envelope, ok};

type Reply<T> = Result<Json<Envelope<T>>, ApiError>;
type Created<T> = Result<(StatusCode, Json<Envelope<T>>), ApiError>;

#[derive(Debug, Deserialize)]
pub struct RoomTypeRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Total {
    pub total: usize,
}

// ── Rooms ───────────────────────────────────────────────

/// GET /api/rooms
pub async fn list_rooms(
    State(state): State<AppState>,
    QueryParams(filter): QueryParams<RoomFilter>,
) -> Reply<Page<Room>> {
    let page = state.engine.list_rooms(&filter).await?;
    Ok(ok(page, "Get rooms successfully"))
}

/// GET /api/rooms/{id}
pub async fn get_room(State(state): State<AppState>, IdPath(id): IdPath) -> Reply<Room> {
    Ok(ok(state.engine.get_room(id).await?, "Get room successfully"))
}

/// GET /api/rooms/total
pub async fn room_total(State(state): State<AppState>, _admin: AdminCaller) -> Reply<Total> {
    let total = state.engine.room_total();
    Ok(ok(Total { total }, "Get total successfully"))
}

/// POST /api/rooms
pub async fn create_room(
    State(state): State<AppState>,
    _admin: AdminCaller,
    JsonBody(spec): JsonBody<RoomSpec>,
) -> Created<Room> {
    let room = state.engine.create_room(spec).await?;
    Ok((StatusCode::CREATED, ok(room, "Room created successfully")))
}

/// PATCH /api/rooms/{id}
pub async fn update_room(
    State(state): State<AppState>,
    _admin: AdminCaller,
    IdPath(id): IdPath,
    JsonBody(spec): JsonBody<RoomSpec>,
) -> Reply<Room> {
    let room = state.engine.update_room(id, spec).await?;
    Ok(ok(room, "Room updated successfully"))
}

/// DELETE /api/rooms/{id}
pub async fn delete_room(
    State(state): State<AppState>,
    _admin: AdminCaller,
    IdPath(id): IdPath,
) -> Reply<()> {
    state.engine.delete_room(id).await?;
    Ok(ok((), "Room deleted successfully"))
}

// ── Room types ──────────────────────────────────────────

/// GET /api/roomtypes
pub async fn list_room_types(
    State(state): State<AppState>,
    QueryParams(filter): QueryParams<RoomTypeFilter>,
) -> Reply<Page<RoomType>> {
    let page = state.engine.list_room_types(&filter)?;
    Ok(ok(page, "Get room types successfully"))
}

/// GET /api/roomtypes/{id}
pub async fn get_room_type(State(state): State<AppState>, IdPath(id): IdPath) -> Reply<RoomType> {
    Ok(ok(state.engine.get_room_type(id)?, "Get room type successfully"))
}

/// POST /api/roomtypes
pub async fn create_room_type(
    State(state): State<AppState>,
    _admin: AdminCaller,
    JsonBody(req): JsonBody<RoomTypeRequest>,
) -> Created<RoomType> {
    let rt = state
        .engine
        .create_room_type(&req.name, req.description)
        .await?;
    Ok((StatusCode::CREATED, ok(rt, "Room type created successfully")))
}

/// PATCH /api/roomtypes/{id}
pub async fn update_room_type(
    State(state): State<AppState>,
    _admin: AdminCaller,
    IdPath(id): IdPath,
    JsonBody(req): JsonBody<RoomTypeRequest>,
) -> Reply<RoomType> {
    let rt = state
        .engine
        .update_room_type(id, &req.name, req.description)
        .await?;
    Ok(ok(rt, "Room type updated successfully"))
}

/// DELETE /api/roomtypes/{id}
pub async fn delete_room_type(
    State(state): State<AppState>,
    _admin: AdminCaller,
    IdPath(id): IdPath,
) -> Reply<()> {
    state.engine.delete_room_type(id).await?;
    Ok(ok((), "Room type deleted successfully"))
}
