use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::auth::AuthError;
use crate::engine::{EngineError, Entity};
use crate::payment::PaymentError;

pub const GENERIC_MESSAGE: &str = "Something went wrong";

/// Error body: `{"message": ...}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    Engine(EngineError),
    Payment(PaymentError),
    Auth(AuthError),
    Forbidden,
    BadRequest(String),
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::Engine(e)
    }
}

impl From<PaymentError> for ApiError {
    fn from(e: PaymentError) -> Self {
        ApiError::Payment(e)
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ApiError::Auth(e)
    }
}

fn entity_label(entity: Entity) -> &'static str {
    match entity {
        Entity::Room => "Room",
        Entity::RoomType => "Room type",
        Entity::Booking => "Booking",
        Entity::User => "User",
        Entity::Review => "Review",
    }
}

fn engine_status(e: &EngineError) -> (StatusCode, String) {
    match e {
        EngineError::NotFound(entity, _) => (
            StatusCode::NOT_FOUND,
            format!("{} does not exist", entity_label(*entity)),
        ),
        EngineError::Conflict(_) => (
            StatusCode::CONFLICT,
            "Room is already booked for the selected dates".into(),
        ),
        EngineError::StatusLocked { .. } => (
            StatusCode::CONFLICT,
            "Booking has confirmed or cancelled".into(),
        ),
        EngineError::AlreadyExists(entity, _) => (
            StatusCode::CONFLICT,
            format!("{} name already exists", entity_label(*entity)),
        ),
        EngineError::InUse(entity, _) => (
            StatusCode::CONFLICT,
            format!("{} is still in use", entity_label(*entity)),
        ),
        EngineError::InvalidTransition(_)
        | EngineError::Invalid(_)
        | EngineError::LimitExceeded(_) => (StatusCode::BAD_REQUEST, e.to_string()),
        EngineError::WalError(_) => (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_MESSAGE.into()),
    }
}

impl ApiError {
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::Engine(e) => engine_status(e),
            ApiError::Payment(_) => (StatusCode::BAD_GATEWAY, GENERIC_MESSAGE.into()),
            ApiError::Auth(_) => (StatusCode::UNAUTHORIZED, "Unauthorized".into()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".into()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        } else if matches!(self, ApiError::Auth(_)) {
            tracing::debug!(error = ?self, "request unauthenticated");
        }
        (status, Json(ErrorBody { message })).into_response()
    }
}
