//! # Routes
//!
//! Axum router configuration for the payment API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

/// Create the main application router
///
/// Routes:
/// - Razorpay:
///   - POST /api/razorpay/create-order
///   - POST /api/razorpay/verify-payment
///   - GET  /api/razorpay/config
///   - GET  /api/razorpay/payment/{payment_id}
///   - POST /api/razorpay/payment/{payment_id}/capture
///   - POST /api/razorpay/payment/{payment_id}/refund
///   - GET  /api/razorpay/order/{order_id}
///   - GET  /api/razorpay/order/{order_id}/payments
///
/// - Storefront:
///   - POST /api/promo/validate
///   - POST /api/orders
///
/// - Webhooks:
///   - POST /api/webhooks/razorpay
///
/// - Health: GET /health, GET /api/health
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    let razorpay_routes = Router::new()
        .route("/create-order", post(handlers::create_order))
        .route("/verify-payment", post(handlers::verify_payment))
        .route("/config", get(handlers::checkout_config))
        .route("/payment/{payment_id}", get(handlers::get_payment))
        .route("/payment/{payment_id}/capture", post(handlers::capture_payment))
        .route("/payment/{payment_id}/refund", post(handlers::refund_payment))
        .route("/order/{order_id}", get(handlers::get_order))
        .route("/order/{order_id}/payments", get(handlers::get_order_payments));

    // Webhooks are signed over the raw body
    let webhook_routes = Router::new().route("/razorpay", post(handlers::razorpay_webhook));

    let api_routes = Router::new()
        .nest("/razorpay", razorpay_routes)
        .nest("/webhooks", webhook_routes)
        .route("/promo/validate", post(handlers::validate_promo_code))
        .route("/orders", post(handlers::record_order))
        .route("/health", get(handlers::health));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .nest("/api", api_routes)
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        // State
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}
