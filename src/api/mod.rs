//! HTTP surface. Every route lives under `/api` except `GET /health`.

mod bookings;
mod catalog;
pub mod error;
pub mod extract;
mod reviews;
mod users;

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::http::{HeaderValue, Method, header};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::JwtIdentity;
use crate::engine::Engine;
use crate::observability::{HTTP_REQUEST_DURATION_SECONDS, HTTP_REQUESTS_TOTAL, status_class};
use crate::payment::PaymentGateway;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub identity: Arc<JwtIdentity>,
    pub gateway: Arc<dyn PaymentGateway>,
}

/// Success body: `{"data": ..., "message": ...}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub data: T,
    pub message: &'static str,
}

pub(crate) fn ok<T: Serialize>(data: T, message: &'static str) -> Json<Envelope<T>> {
    Json(Envelope { data, message })
}

pub fn build_router(state: AppState, allowed_origin: Option<&str>) -> Router {
    let api = Router::new()
        .merge(room_routes())
        .merge(room_type_routes())
        .merge(booking_routes())
        .merge(review_routes())
        .merge(user_routes());

    Router::new()
        .nest("/api", api)
        .route("/health", get(health))
        .route_layer(middleware::from_fn(track_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(allowed_origin))
        .with_state(state)
}

fn room_routes() -> Router<AppState> {
    Router::new()
        .route("/rooms", get(catalog::list_rooms).post(catalog::create_room))
        .route("/rooms/total", get(catalog::room_total))
        .route(
            "/rooms/{id}",
            get(catalog::get_room)
                .patch(catalog::update_room)
                .delete(catalog::delete_room),
        )
}

fn room_type_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/roomtypes",
            get(catalog::list_room_types).post(catalog::create_room_type),
        )
        .route(
            "/roomtypes/{id}",
            get(catalog::get_room_type)
                .patch(catalog::update_room_type)
                .delete(catalog::delete_room_type),
        )
}

fn booking_routes() -> Router<AppState> {
    Router::new()
        .route("/bookings", get(bookings::list))
        .route(
            "/bookings/client",
            get(bookings::client_list).post(bookings::client_create),
        )
        .route("/bookings/admin", post(bookings::admin_create))
        .route("/bookings/client/{id}", patch(bookings::client_update))
        .route("/bookings/admin/{id}", patch(bookings::admin_update))
        .route("/bookings/payments", post(bookings::create_payment))
        .route("/bookings/momo-webhook", post(bookings::payment_webhook))
        .route("/bookings/revenueByMonth", get(bookings::revenue_by_month))
        .route("/bookings/revenueByRoomType", get(bookings::revenue_by_room_type))
        .route("/bookings/total", get(bookings::total))
        .route("/bookings/{id}", get(bookings::get).delete(bookings::delete))
}

fn review_routes() -> Router<AppState> {
    Router::new()
        .route("/reviews", get(reviews::list).post(reviews::upsert))
        .route("/reviews/client", get(reviews::for_room))
        .route("/reviews/{id}", axum::routing::delete(reviews::delete))
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(users::list))
        .route("/users/total", get(users::total))
        .route("/users/me", get(users::me).put(users::save_me))
        .route(
            "/users/{id}",
            get(users::get).put(users::save).delete(users::delete),
        )
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Count and time every routed request, labelled by route template.
async fn track_metrics(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| req.uri().path().to_string(), |p| p.as_str().to_string());

    let response = next.run(req).await;

    let status = status_class(response.status().as_u16());
    metrics::counter!(
        HTTP_REQUESTS_TOTAL,
        "method" => method.clone(),
        "route" => route.clone(),
        "status" => status,
    )
    .increment(1);
    metrics::histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "method" => method,
        "route" => route,
    )
    .record(start.elapsed().as_secs_f64());
    response
}

fn build_cors_layer(allowed_origin: Option<&str>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);
    match allowed_origin.and_then(|o| o.parse::<HeaderValue>().ok()) {
        Some(origin) => cors.allow_origin(origin),
        None => cors.allow_origin(Any),
    }
}
