use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::{Datelike, NaiveDate, Utc};
use serde::Deserialize;
use tracing::{info, warn};
use ulid::Ulid;

use crate::engine::{Actor, BookingFilter, EngineError, Entity, zero_filled};
use crate::model::*;
use crate::payment::{PaymentCallback, PaymentSession};

use super::error::ApiError;
use super::extract::{AdminCaller, Caller, IdPath, JsonBody, QueryParams};
use super::{AppState, Envelope, ok};

type Reply<T> = Result<Json<Envelope<T>>, ApiError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientBookingRequest {
    pub room_id: Ulid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminBookingRequest {
    pub user_id: Ulid,
    pub room_id: Ulid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: BookingStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub booking_id: Ulid,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RevenueQuery {
    pub year: Option<i32>,
    /// Zero-fill the twelve months.
    pub fill: bool,
}

impl RevenueQuery {
    fn year(&self) -> i32 {
        self.year.unwrap_or_else(|| Utc::now().year())
    }
}

/// GET /api/bookings
pub async fn list(
    State(state): State<AppState>,
    _admin: AdminCaller,
    QueryParams(filter): QueryParams<BookingFilter>,
) -> Reply<Page<Booking>> {
    let page = state.engine.list_bookings(&filter)?;
    Ok(ok(page, "Get bookings successfully"))
}

/// GET /api/bookings/{id}
pub async fn get(
    State(state): State<AppState>,
    _admin: AdminCaller,
    IdPath(id): IdPath,
) -> Reply<Booking> {
    Ok(ok(state.engine.get_booking(id)?, "Get booking successfully"))
}

/// GET /api/bookings/client
pub async fn client_list(State(state): State<AppState>, caller: Caller) -> Reply<Vec<Booking>> {
    Ok(ok(
        state.engine.user_bookings(caller.id),
        "Get bookings successfully",
    ))
}

/// POST /api/bookings/client
pub async fn client_create(
    State(state): State<AppState>,
    caller: Caller,
    JsonBody(req): JsonBody<ClientBookingRequest>,
) -> Result<(StatusCode, Json<Envelope<Booking>>), ApiError> {
    let booking = state
        .engine
        .place_booking(caller.id, req.room_id, req.check_in, req.check_out)
        .await?;
    Ok((StatusCode::CREATED, ok(booking, "Booking created successfully")))
}

/// POST /api/bookings/admin
pub async fn admin_create(
    State(state): State<AppState>,
    _admin: AdminCaller,
    JsonBody(req): JsonBody<AdminBookingRequest>,
) -> Result<(StatusCode, Json<Envelope<Booking>>), ApiError> {
    let booking = state
        .engine
        .place_booking(req.user_id, req.room_id, req.check_in, req.check_out)
        .await?;
    Ok((StatusCode::CREATED, ok(booking, "Booking created successfully")))
}

/// PATCH /api/bookings/client/{id}
pub async fn client_update(
    State(state): State<AppState>,
    caller: Caller,
    IdPath(id): IdPath,
    JsonBody(req): JsonBody<StatusRequest>,
) -> Reply<Booking> {
    let booking = state
        .engine
        .transition(id, Actor::Guest(caller.id), req.status)
        .await?;
    Ok(ok(booking, "Booking updated successfully"))
}

/// PATCH /api/bookings/admin/{id}
pub async fn admin_update(
    State(state): State<AppState>,
    _admin: AdminCaller,
    IdPath(id): IdPath,
    JsonBody(req): JsonBody<StatusRequest>,
) -> Reply<Booking> {
    let booking = state.engine.transition(id, Actor::Admin, req.status).await?;
    Ok(ok(booking, "Booking updated successfully"))
}

/// DELETE /api/bookings/{id}
pub async fn delete(
    State(state): State<AppState>,
    _admin: AdminCaller,
    IdPath(id): IdPath,
) -> Reply<()> {
    state.engine.delete_booking(id).await?;
    Ok(ok((), "Booking deleted successfully"))
}

/// POST /api/bookings/payments
///
/// Only the owner or an admin may pay, and only while the booking is Pending.
pub async fn create_payment(
    State(state): State<AppState>,
    caller: Caller,
    JsonBody(req): JsonBody<PaymentRequest>,
) -> Reply<PaymentSession> {
    let booking = state.engine.get_booking(req.booking_id)?;
    if booking.user.id != caller.id && !caller.is_admin() {
        return Err(EngineError::NotFound(Entity::Booking, booking.id).into());
    }
    if booking.status != BookingStatus::Pending {
        return Err(EngineError::StatusLocked {
            id: booking.id,
            status: booking.status,
        }
        .into());
    }
    let session = state.gateway.create_session(&booking).await?;
    Ok(ok(session, "Payment created successfully"))
}

/// POST /api/bookings/momo-webhook
///
/// Always acknowledged once the body parses; the gateway does not act on our
/// verdict, so rejected transitions are only logged. Callbacks without a
/// valid gateway signature change nothing.
pub async fn payment_webhook(
    State(state): State<AppState>,
    JsonBody(callback): JsonBody<PaymentCallback>,
) -> Reply<()> {
    if !state.gateway.verify_callback(&callback) {
        warn!("payment callback for {:?} has a bad signature", callback.order_id);
        return Ok(ok((), "Payment webhook received"));
    }
    let to = callback.target_status();
    match Ulid::from_string(&callback.order_id) {
        Ok(id) => match state.engine.transition(id, Actor::PaymentGateway, to).await {
            Ok(b) => info!("payment callback settled booking {id} as {}", b.status),
            Err(e @ (EngineError::NotFound(..) | EngineError::StatusLocked { .. })) => {
                warn!("payment callback for {id} ignored: {e}");
            }
            Err(e) => return Err(e.into()),
        },
        Err(_) => warn!("payment callback with unknown order id {:?}", callback.order_id),
    }
    Ok(ok((), "Payment webhook received"))
}

/// GET /api/bookings/revenueByMonth
pub async fn revenue_by_month(
    State(state): State<AppState>,
    _admin: AdminCaller,
    QueryParams(q): QueryParams<RevenueQuery>,
) -> Reply<Vec<MonthRevenue>> {
    let year = q.year();
    let raw = state.engine.monthly_revenue(year);
    let data = if q.fill { zero_filled(year, &raw) } else { raw };
    Ok(ok(data, "Get revenue successfully"))
}

/// GET /api/bookings/revenueByRoomType
pub async fn revenue_by_room_type(
    State(state): State<AppState>,
    _admin: AdminCaller,
    QueryParams(q): QueryParams<RevenueQuery>,
) -> Reply<Vec<RoomTypeRevenue>> {
    Ok(ok(
        state.engine.room_type_revenue(q.year()),
        "Get revenue successfully",
    ))
}

/// GET /api/bookings/total
pub async fn total(State(state): State<AppState>, _admin: AdminCaller) -> Reply<Vec<StatusCount>> {
    Ok(ok(state.engine.status_report(), "Get total successfully"))
}
