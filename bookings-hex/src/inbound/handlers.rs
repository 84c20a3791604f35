//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use bookings_repo::security;
use bookings_types::{
    AppError, BookingFilter, BookingRepository, CreateBookingRequest, EventEnvelope,
    InitiatePaymentRequest, PaymentDetailRequest, PaymentGateway, SpaceId,
};

use super::auth::AuthUser;
use crate::BookingService;

/// Application state shared across handlers.
pub struct AppState<R: BookingRepository, G: PaymentGateway> {
    pub service: BookingService<R, G>,
    /// Secret the gateway signs webhook deliveries with.
    pub webhook_secret: String,
}

/// Wrapper to implement IntoResponse for AppError (orphan rule workaround).
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Booking conflicts surface as 400 like the other rejected inputs,
        // not 409; clients treat every "try different dates" case alike.
        let (status, message) = match &self.0 {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::InvalidSignature => (StatusCode::BAD_REQUEST, self.0.to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Gateway(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message,
            "code": status.as_u16()
        });

        (status, Json(body)).into_response()
    }
}

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// Book a space for the authenticated renter.
#[tracing::instrument(skip(state, req), fields(renter_id = %auth.0, space_id = %space_id))]
pub async fn create_booking<R: BookingRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(auth): Extension<AuthUser>,
    Path(space_id): Path<String>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let space_id: SpaceId = space_id
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid space ID".into()))?;

    let booking = state.service.create_booking(auth.0, space_id, req).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// Query parameters for listing bookings.
#[derive(Debug, serde::Deserialize)]
pub struct ListBookingsQuery {
    /// `upcoming`, `current` or `past`; anything else means all
    pub filter: Option<String>,
}

/// List the authenticated renter's bookings.
#[tracing::instrument(skip(state), fields(renter_id = %auth.0))]
pub async fn list_bookings<R: BookingRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<ListBookingsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = BookingFilter::parse(query.filter.as_deref());
    let bookings = state.service.list_bookings(auth.0, filter).await?;
    Ok(Json(bookings))
}

/// Start payment for a booking.
#[tracing::instrument(skip(state, req), fields(booking_id = %req.booking_id, amount = req.amount))]
pub async fn initiate_payment<R: BookingRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Json(req): Json<InitiatePaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state.service.initiate_payment(req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Look up a payment intent at the gateway.
///
/// Replies 201 on success; the original API answered intent lookups with
/// the same status as intent creation and clients depend on it.
#[tracing::instrument(skip(state, req))]
pub async fn check_payment_detail<R: BookingRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Json(req): Json<PaymentDetailRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let intent = state.service.payment_intent_details(req).await?;
    Ok((StatusCode::CREATED, Json(intent)))
}

/// List recent charges on the gateway account.
#[tracing::instrument(skip(state))]
pub async fn get_payment_list<R: BookingRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
) -> Result<impl IntoResponse, ApiError> {
    let charges = state.service.list_charges().await?;
    Ok(Json(charges))
}

/// Gateway webhook endpoint.
///
/// Verifies the delivery signature over the raw body, durably queues the
/// event and acknowledges. Answering 200 promises only that the event is
/// stored; every side effect happens later in the worker. Redeliveries
/// collapse on the event id and are acknowledged the same way, so the
/// gateway stops resending.
#[tracing::instrument(skip(state, headers, body))]
pub async fn webhook<R: BookingRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::InvalidSignature)?;

    if !security::verify_signature(signature, &body, &state.webhook_secret) {
        return Err(AppError::InvalidSignature.into());
    }

    let payload: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid event payload: {}", e)))?;
    let envelope: EventEnvelope = serde_json::from_value(payload.clone())
        .map_err(|e| AppError::BadRequest(format!("Invalid event payload: {}", e)))?;

    let newly_queued = state
        .service
        .enqueue_gateway_event(&envelope.id, &envelope.event_type, &payload)
        .await?;

    if !newly_queued {
        tracing::info!(event_id = %envelope.id, "Duplicate gateway event acknowledged");
    }

    Ok(Json(serde_json::json!({ "received": true })))
}
