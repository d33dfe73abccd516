//! # pay-razorpay
//!
//! Razorpay integration for razor-cart.
//!
//! ## Flow
//!
//! 1. The server creates a Razorpay order for the cart total
//! 2. The storefront opens the hosted checkout with the order id and key id
//! 3. The checkout returns `razorpay_order_id`, `razorpay_payment_id` and
//!    `razorpay_signature`; the server verifies the signature
//! 4. Razorpay later posts webhooks (captures, failures, refunds)
//!
//! ## Setup
//!
//! 1. Create API keys in the Razorpay Dashboard (test mode first)
//! 2. Set `RAZORPAY_KEY_ID` and `RAZORPAY_KEY_SECRET`
//! 3. Register the webhook endpoint and set `RAZORPAY_WEBHOOK_SECRET`
//!
//! ## Example
//!
//! ```rust,ignore
//! use pay_razorpay::{PaymentService, RazorpayConfig};
//! use pay_core::{Currency, PaymentIntent};
//!
//! let service = PaymentService::from_config(RazorpayConfig::from_env()?)?;
//! let order = service
//!     .create_order(PaymentIntent::new(49_900, Currency::INR))
//!     .await?;
//! ```

pub mod client;
pub mod config;
pub mod service;
pub mod signature;
pub mod webhook;

pub use client::RazorpayClient;
pub use config::RazorpayConfig;
pub use service::{PaymentService, ORDER_SOURCE};
pub use webhook::{
    dispatch_webhook_event, LoggingWebhookHandler, WebhookEnvelope, WebhookEvent, WebhookHandler,
    REQUIRED_WEBHOOK_EVENTS,
};
