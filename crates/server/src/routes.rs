use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::error;

use pizzabot_core::domain::order::Order;
use pizzabot_core::errors::{ErrorClass, IntakeError};
use pizzabot_db::repositories::OrderRepository;
use pizzabot_db::DbPool;
use pizzabot_slack::signature::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use pizzabot_slack::{SignedRequest, SlackMessage};

use crate::health;
use crate::intake::{bounded, IntakePipeline};

const PANIC_MESSAGE: &str = "Internal server error";
const CORRELATION_HEADER: &str = "x-correlation-id";
const ORDER_NUMBER_HEADER: &str = "x-order-number";

#[derive(Clone)]
pub struct IntakeState {
    pub pipeline: Arc<IntakePipeline>,
    pub orders: Arc<dyn OrderRepository>,
    pub store_timeout: Duration,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OrderView {
    pub number: i64,
    pub user_id: String,
    pub item: String,
    pub quantity: u32,
    pub destination: String,
    pub created_at: DateTime<Utc>,
}

impl From<Order> for OrderView {
    fn from(order: Order) -> Self {
        Self {
            number: order.number.0,
            user_id: order.user_id.to_string(),
            item: order.item,
            quantity: order.quantity,
            destination: order.destination,
            created_at: order.created_at,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
struct ApiError {
    error: String,
}

/// `/api/v1/Order` and `/api/v1/listOrders` stay mounted for Slack apps
/// configured against the earlier paths.
pub fn router(state: IntakeState) -> Router {
    Router::new()
        .route("/api/v1/order", post(place_order))
        .route("/api/v1/Order", post(place_order))
        .route("/api/v1/orders", get(list_orders))
        .route("/api/v1/listOrders", get(list_orders))
        .with_state(state)
}

/// The full HTTP surface: intake routes, health, request tracing, and a panic
/// boundary that turns a crashed handler into a 500.
pub fn service(state: IntakeState, db_pool: DbPool) -> Router {
    with_middleware(router(state).merge(health::router(db_pool)))
}

pub fn with_middleware(router: Router) -> Router {
    router.layer(CatchPanicLayer::custom(panic_response)).layer(TraceLayer::new_for_http())
}

async fn place_order(
    State(state): State<IntakeState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = SignedRequest {
        timestamp: header(&headers, TIMESTAMP_HEADER),
        signature: header(&headers, SIGNATURE_HEADER),
        body: &body,
    };

    let outcome = state.pipeline.handle(request, Utc::now()).await;
    let mut response = (status_for(outcome.rejection()), Json(outcome.message())).into_response();

    let response_headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&outcome.correlation_id.to_string()) {
        response_headers.insert(CORRELATION_HEADER, value);
    }
    if let Some(order) = &outcome.order {
        response_headers.insert(ORDER_NUMBER_HEADER, HeaderValue::from(order.number.0));
    }
    response
}

async fn list_orders(
    State(state): State<IntakeState>,
) -> Result<Json<Vec<OrderView>>, (StatusCode, Json<ApiError>)> {
    match bounded(state.store_timeout, state.orders.list()).await {
        Ok(orders) => Ok(Json(orders.into_iter().map(OrderView::from).collect())),
        Err(failure) => {
            let reason = IntakeError::from(failure);
            error!(
                event_name = "orders.list.failed",
                error_kind = reason.kind(),
                error = %reason,
                "order listing failed"
            );
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError { error: reason.user_message().to_string() }),
            ))
        }
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Input errors answer 200 so Slack shows the friendly text in the channel
/// instead of a generic failure.
pub fn status_for(rejection: Option<&IntakeError>) -> StatusCode {
    match rejection.map(IntakeError::class) {
        None | Some(ErrorClass::Input) => StatusCode::OK,
        Some(ErrorClass::Authentication) => StatusCode::UNAUTHORIZED,
        Some(ErrorClass::Infrastructure) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| panic.downcast_ref::<&str>().map(|detail| (*detail).to_string()))
        .unwrap_or_else(|| "non-string panic payload".to_string());

    error!(event_name = "system.http.panic", detail = %detail, "request handler panicked");
    (StatusCode::INTERNAL_SERVER_ERROR, Json(SlackMessage::text(PANIC_MESSAGE))).into_response()
}
