use axum::Json;
use axum::extract::State;
use serde::Deserialize;

use crate::engine::UserFilter;
use crate::model::{Page, UserProfile};

use super::catalog::Total;
use super::error::ApiError;
use super::extract::{AdminCaller, Caller, IdPath, JsonBody, QueryParams};
use super::{AppState, Envelope, ok};

type Reply<T> = Result<Json<Envelope<T>>, ApiError>;

/// Contact fields; the id always comes from the path or the token.
#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

impl ProfileRequest {
    fn into_profile(self, id: ulid::Ulid) -> UserProfile {
        UserProfile {
            id,
            username: self.username,
            email: self.email,
            phone: self.phone,
        }
    }
}

/// GET /api/users/me
pub async fn me(State(state): State<AppState>, caller: Caller) -> Reply<UserProfile> {
    Ok(ok(state.engine.get_user(caller.id)?, "Get profile successfully"))
}

/// PUT /api/users/me
pub async fn save_me(
    State(state): State<AppState>,
    caller: Caller,
    JsonBody(req): JsonBody<ProfileRequest>,
) -> Reply<UserProfile> {
    let profile = state.engine.save_user(req.into_profile(caller.id)).await?;
    Ok(ok(profile, "Profile saved successfully"))
}

/// GET /api/users/{id}
pub async fn get(
    State(state): State<AppState>,
    _admin: AdminCaller,
    IdPath(id): IdPath,
) -> Reply<UserProfile> {
    Ok(ok(state.engine.get_user(id)?, "Get user successfully"))
}

/// PUT /api/users/{id}
pub async fn save(
    State(state): State<AppState>,
    _admin: AdminCaller,
    IdPath(id): IdPath,
    JsonBody(req): JsonBody<ProfileRequest>,
) -> Reply<UserProfile> {
    let profile = state.engine.save_user(req.into_profile(id)).await?;
    Ok(ok(profile, "User saved successfully"))
}

/// GET /api/users
pub async fn list(
    State(state): State<AppState>,
    _admin: AdminCaller,
    QueryParams(filter): QueryParams<UserFilter>,
) -> Reply<Page<UserProfile>> {
    Ok(ok(state.engine.list_users(&filter)?, "Users retrieved successfully"))
}

/// GET /api/users/total
pub async fn total(State(state): State<AppState>, _admin: AdminCaller) -> Reply<Total> {
    let total = state.engine.user_total();
    Ok(ok(Total { total }, "Get total successfully"))
}

/// DELETE /api/users/{id}
pub async fn delete(
    State(state): State<AppState>,
    _admin: AdminCaller,
    IdPath(id): IdPath,
) -> Reply<()> {
    state.engine.delete_user(id).await?;
    Ok(ok((), "User deleted successfully"))
}
