//! # Request Handlers
//!
//! Axum request handlers for the payment API.
//! Gateway entities are relayed to the storefront as Razorpay returns them.

use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use pay_core::{
    validate_promo, Currency, GatewayOrder, GatewayPayment, GatewayRefund, Money, NewOrder,
    OrderRecord, PaymentCollection, PaymentConfirmation, PaymentError, PaymentIntent,
    RefundRequest,
};
use pay_razorpay::dispatch_webhook_event;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{error, info, instrument, warn};

const SIGNATURE_HEADER: &str = "x-razorpay-signature";
const EVENT_ID_HEADER: &str = "x-razorpay-event-id";

type ApiError = (StatusCode, Json<ErrorResponse>);

// =============================================================================
// Request/Response Types
// =============================================================================

/// Create order request
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    /// Amount in minor units
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub receipt: Option<String>,
    /// Note values may be any JSON scalar; the gateway stores strings
    #[serde(default)]
    pub notes: Map<String, Value>,
}

/// Checkout confirmation fields
#[derive(Debug, Default, Deserialize)]
pub struct VerifyPaymentRequest {
    #[serde(default)]
    pub razorpay_payment_id: Option<String>,
    #[serde(default)]
    pub razorpay_order_id: Option<String>,
    #[serde(default)]
    pub razorpay_signature: Option<String>,
}

impl VerifyPaymentRequest {
    fn confirmation(&self) -> Result<PaymentConfirmation, PaymentError> {
        PaymentConfirmation::from_parts(
            self.razorpay_payment_id.as_deref(),
            self.razorpay_order_id.as_deref(),
            self.razorpay_signature.as_deref(),
        )
    }
}

#[derive(Debug, Serialize)]
pub struct VerifyPaymentResponse {
    #[serde(rename = "isValid")]
    pub is_valid: bool,
    pub payment_id: String,
    pub order_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_details: Option<GatewayPayment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_details: Option<GatewayOrder>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub details_unavailable: bool,
}

/// Capture request
#[derive(Debug, Deserialize)]
pub struct CaptureRequest {
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Public checkout configuration
#[derive(Debug, Serialize)]
pub struct CheckoutConfigResponse {
    pub key_id: String,
    pub currency: Currency,
    pub environment: &'static str,
}

/// Promo validation request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatePromoRequest {
    #[serde(default)]
    pub code: Option<String>,
    /// Order subtotal in major units
    #[serde(default)]
    pub order_amount: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatePromoResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promo_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Discount in major units
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_type: Option<pay_core::DiscountType>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub free_shipping: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Order recording request: the checkout confirmation plus the cart
#[derive(Debug, Deserialize)]
pub struct RecordOrderRequest {
    #[serde(default)]
    pub razorpay_signature: Option<String>,
    #[serde(flatten)]
    pub order: NewOrder,
}

#[derive(Debug, Serialize)]
pub struct RecordOrderResponse {
    pub created: bool,
    pub order: OrderRecord,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Set on verify-payment failures
    #[serde(rename = "isValid", skip_serializing_if = "Option::is_none")]
    pub is_valid: Option<bool>,
    /// Set on promo validation failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid: Option<bool>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: None,
            field: None,
            is_valid: None,
            valid: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl From<&PaymentError> for ErrorResponse {
    fn from(err: &PaymentError) -> Self {
        Self {
            error: err.public_message(),
            code: err.code().map(String::from),
            field: err.field().map(String::from),
            is_valid: None,
            valid: None,
        }
    }
}

fn payment_error_to_response(err: PaymentError) -> ApiError {
    let code = err.status_code();
    if code >= 500 {
        error!("Request failed (retryable={}): {}", err.is_retryable(), err);
    } else {
        warn!("Request rejected: {}", err);
    }
    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(ErrorResponse::from(&err)),
    )
}

fn json_rejection_to_response(rejection: JsonRejection) -> ApiError {
    warn!("Malformed request body: {}", rejection.body_text());
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new(rejection.body_text()).with_code("INVALID_REQUEST")),
    )
}

fn parse_currency(state: &AppState, currency: Option<&str>) -> Result<Currency, PaymentError> {
    match currency.map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => code.parse(),
        None => Ok(state.config.default_currency),
    }
}

fn note_value(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "razor-cart",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339()
    }))
}

/// Public key id and defaults for the hosted checkout
pub async fn checkout_config(State(state): State<AppState>) -> Json<CheckoutConfigResponse> {
    let gateway = state.service.gateway();
    Json(CheckoutConfigResponse {
        key_id: gateway.key_id().to_string(),
        currency: state.config.default_currency,
        environment: if gateway.is_test_mode() { "test" } else { "live" },
    })
}

/// Create a Razorpay order
#[instrument(skip(state, payload))]
pub async fn create_order(
    State(state): State<AppState>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<Json<GatewayOrder>, ApiError> {
    let Json(request) = payload.map_err(json_rejection_to_response)?;

    let amount = request
        .amount
        .ok_or_else(|| payment_error_to_response(PaymentError::MissingFields(vec!["amount".into()])))?;
    let currency =
        parse_currency(&state, request.currency.as_deref()).map_err(payment_error_to_response)?;

    let notes: HashMap<String, String> = request
        .notes
        .into_iter()
        .map(|(k, v)| (k, note_value(v)))
        .collect();

    let mut intent = PaymentIntent::new(amount, currency);
    intent.receipt = request.receipt;
    intent.notes = notes;

    let order = state
        .service
        .create_order(intent)
        .await
        .map_err(payment_error_to_response)?;

    Ok(Json(order))
}

/// Verify the signature returned by the hosted checkout
#[instrument(skip(state, payload))]
pub async fn verify_payment(
    State(state): State<AppState>,
    payload: Result<Json<VerifyPaymentRequest>, JsonRejection>,
) -> Result<Json<VerifyPaymentResponse>, ApiError> {
    let invalid = |(status, Json(mut body)): ApiError| {
        body.is_valid = Some(false);
        (status, Json(body))
    };

    let Json(request) = payload.map_err(json_rejection_to_response).map_err(invalid)?;
    let confirmation = request
        .confirmation()
        .map_err(payment_error_to_response)
        .map_err(invalid)?;

    let verification = state
        .service
        .verify_payment(confirmation)
        .await
        .map_err(payment_error_to_response)
        .map_err(invalid)?;

    let details_unavailable = !verification.details_available();
    Ok(Json(VerifyPaymentResponse {
        is_valid: true,
        payment_id: verification.payment_id,
        order_id: verification.order_id,
        payment_details: verification.payment,
        order_details: verification.order,
        details_unavailable,
    }))
}

#[instrument(skip(state))]
pub async fn get_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> Result<Json<GatewayPayment>, ApiError> {
    state
        .service
        .fetch_payment(&payment_id)
        .await
        .map(Json)
        .map_err(payment_error_to_response)
}

#[instrument(skip(state))]
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<GatewayOrder>, ApiError> {
    state
        .service
        .fetch_order(&order_id)
        .await
        .map(Json)
        .map_err(payment_error_to_response)
}

#[instrument(skip(state))]
pub async fn get_order_payments(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<PaymentCollection>, ApiError> {
    state
        .service
        .fetch_order_payments(&order_id)
        .await
        .map(Json)
        .map_err(payment_error_to_response)
}

/// Capture an authorized payment
#[instrument(skip(state, payload))]
pub async fn capture_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
    payload: Result<Json<CaptureRequest>, JsonRejection>,
) -> Result<Json<GatewayPayment>, ApiError> {
    let Json(request) = payload.map_err(json_rejection_to_response)?;

    let amount = request
        .amount
        .ok_or_else(|| payment_error_to_response(PaymentError::MissingFields(vec!["amount".into()])))?;
    let currency =
        parse_currency(&state, request.currency.as_deref()).map_err(payment_error_to_response)?;

    state
        .service
        .capture_payment(&payment_id, amount, currency)
        .await
        .map(Json)
        .map_err(payment_error_to_response)
}

/// Refund a payment. The body is optional.
#[instrument(skip(state, body))]
pub async fn refund_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
    body: Bytes,
) -> Result<Json<GatewayRefund>, ApiError> {
    let request: RefundRequest = if body.iter().all(u8::is_ascii_whitespace) {
        RefundRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            payment_error_to_response(PaymentError::InvalidRequest(format!(
                "Invalid refund body: {}",
                e
            )))
        })?
    };

    state
        .service
        .refund_payment(&payment_id, request)
        .await
        .map(Json)
        .map_err(payment_error_to_response)
}

/// Handle Razorpay webhooks
///
/// The signature covers the exact request bytes, so the body is taken raw.
#[instrument(skip(state, headers, body))]
pub async fn razorpay_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    let event_id = headers
        .get(EVENT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");

    let event = state
        .service
        .verify_webhook(&body, signature)
        .map_err(payment_error_to_response)?;

    info!("Received webhook: event={}, id={}", event.name(), event_id);

    dispatch_webhook_event(state.webhook_handler.as_ref(), &event)
        .await
        .map_err(|e| {
            error!("Webhook handler failed for {}: {}", event.name(), e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Webhook processing failed").with_code("WEBHOOK_HANDLER_FAILED")),
            )
        })?;

    Ok(Json(serde_json::json!({
        "status": "ok",
        "event": event.name()
    })))
}

/// Check a promo code against an order subtotal
#[instrument(skip(state, payload))]
pub async fn validate_promo_code(
    State(state): State<AppState>,
    payload: Result<Json<ValidatePromoRequest>, JsonRejection>,
) -> Result<Json<ValidatePromoResponse>, ApiError> {
    let not_valid = |(status, Json(mut body)): ApiError| {
        body.valid = Some(false);
        (status, Json(body))
    };

    let Json(request) = payload.map_err(json_rejection_to_response).map_err(not_valid)?;

    let code = request.code.filter(|c| !c.trim().is_empty());
    let (code, order_amount) = match (code, request.order_amount) {
        (Some(code), Some(amount)) => (code, amount),
        (code, amount) => {
            let mut missing = Vec::new();
            if code.is_none() {
                missing.push("code".to_string());
            }
            if amount.is_none() {
                missing.push("orderAmount".to_string());
            }
            return Err(not_valid(payment_error_to_response(
                PaymentError::MissingFields(missing),
            )));
        }
    };

    let currency = parse_currency(&state, request.currency.as_deref())
        .map_err(payment_error_to_response)
        .map_err(not_valid)?;
    let subtotal = Money::from_major(order_amount, currency);

    let outcome = validate_promo(state.promos.as_ref(), &code, subtotal, Utc::now())
        .await
        .map_err(payment_error_to_response)
        .map_err(not_valid)?;

    let response = match outcome {
        Ok(discount) => {
            info!(
                "Promo {} applied: {} off {}",
                discount.code,
                discount.discount.display(),
                subtotal.display()
            );
            ValidatePromoResponse {
                valid: true,
                promo_id: Some(discount.promo_id),
                code: Some(discount.code),
                discount_amount: Some(discount.discount.as_decimal()),
                discount_type: Some(discount.discount_type),
                free_shipping: discount.free_shipping,
                description: discount.description,
                error: None,
            }
        }
        Err(rejection) => {
            info!("Promo {} rejected: {}", code.trim(), rejection);
            ValidatePromoResponse {
                valid: false,
                promo_id: None,
                code: None,
                discount_amount: None,
                discount_type: None,
                free_shipping: false,
                description: None,
                error: Some(rejection.to_string()),
            }
        }
    };

    Ok(Json(response))
}

/// Record the storefront order for a verified payment.
///
/// Repeats for the same payment return the order recorded first.
#[instrument(skip(state, payload))]
pub async fn record_order(
    State(state): State<AppState>,
    payload: Result<Json<RecordOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RecordOrderResponse>), ApiError> {
    let Json(request) = payload.map_err(json_rejection_to_response)?;
    let order = request.order;

    let confirmation = PaymentConfirmation::from_parts(
        Some(order.razorpay_payment_id.as_str()),
        Some(order.razorpay_order_id.as_str()),
        request.razorpay_signature.as_deref(),
    )
    .map_err(payment_error_to_response)?;
    state
        .service
        .check_signature(&confirmation)
        .map_err(payment_error_to_response)?;

    order.validate().map_err(payment_error_to_response)?;

    let outcome = state
        .orders
        .insert_or_get(order)
        .await
        .map_err(payment_error_to_response)?;

    let created = outcome.is_created();
    let record = outcome.into_record();

    if created {
        info!("Recorded order {} for payment {}", record.id, record.razorpay_payment_id);
        if let Some(code) = &record.promo_code {
            redeem_promo(&state, code).await;
        }
    } else {
        info!(
            "Order for payment {} already recorded as {}",
            record.razorpay_payment_id, record.id
        );
    }

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(RecordOrderResponse {
            created,
            order: record,
        }),
    ))
}

/// Count a redemption. The order is already paid, so failures are only logged.
async fn redeem_promo(state: &AppState, code: &str) {
    let promo = match state.promos.find_active(code).await {
        Ok(Some(promo)) => promo,
        Ok(None) => {
            warn!("Order used unknown or inactive promo code {}", code);
            return;
        }
        Err(e) => {
            warn!("Promo lookup for {} failed: {}", code, e);
            return;
        }
    };

    if let Err(e) = state.promos.increment_usage(&promo.id).await {
        warn!("Failed to record usage of promo {}: {}", promo.code, e);
    }
}
