//! # pay-api
//!
//! HTTP API layer for razor-cart.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - Razorpay order, verification, capture and refund endpoints
//! - Webhook handling with order bookkeeping
//! - Promo validation and idempotent order recording
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health`, `/api/health` | Health check |
//! | POST | `/api/razorpay/create-order` | Create Razorpay order |
//! | POST | `/api/razorpay/verify-payment` | Verify checkout signature |
//! | GET | `/api/razorpay/config` | Public checkout config |
//! | GET | `/api/razorpay/payment/{id}` | Fetch payment |
//! | POST | `/api/razorpay/payment/{id}/capture` | Capture payment |
//! | POST | `/api/razorpay/payment/{id}/refund` | Refund payment |
//! | GET | `/api/razorpay/order/{id}` | Fetch order |
//! | GET | `/api/razorpay/order/{id}/payments` | Payments for an order |
//! | POST | `/api/webhooks/razorpay` | Razorpay webhook |
//! | POST | `/api/promo/validate` | Validate promo code |
//! | POST | `/api/orders` | Record a paid order |

pub mod backend;
pub mod bookkeeping;
pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::{AppConfig, AppState};
