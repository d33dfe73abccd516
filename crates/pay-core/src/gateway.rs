//! # Payment Gateway Trait
//!
//! Seam between the payment service and the gateway's REST API.
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │            PaymentGateway (trait)             │
//! │  ├── create_order() / fetch_order()           │
//! │  ├── fetch_payment() / fetch_order_payments() │
//! │  └── capture_payment() / refund_payment()     │
//! └───────────────────────────────────────────────┘
//!                        ▲
//!          ┌─────────────┴─────────────┐
//!  ┌───────┴───────┐           ┌───────┴───────┐
//!  │RazorpayClient │           │  test doubles │
//!  └───────────────┘           └───────────────┘
//! ```

use crate::error::PaymentResult;
use crate::payment::{
    CaptureParams, GatewayOrder, GatewayPayment, GatewayRefund, OrderParams, PaymentCollection,
    RefundRequest,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Operations the storefront needs from a payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment order that the hosted checkout will collect against.
    async fn create_order(&self, params: &OrderParams) -> PaymentResult<GatewayOrder>;

    /// Fetch an order by gateway id.
    async fn fetch_order(&self, order_id: &str) -> PaymentResult<GatewayOrder>;

    /// List payment attempts made against an order.
    async fn fetch_order_payments(&self, order_id: &str) -> PaymentResult<PaymentCollection>;

    /// Fetch a payment by gateway id.
    async fn fetch_payment(&self, payment_id: &str) -> PaymentResult<GatewayPayment>;

    /// Capture an authorized payment.
    async fn capture_payment(
        &self,
        payment_id: &str,
        params: &CaptureParams,
    ) -> PaymentResult<GatewayPayment>;

    /// Refund a captured payment. `request.amount == None` refunds the
    /// remaining captured balance.
    async fn refund_payment(
        &self,
        payment_id: &str,
        request: &RefundRequest,
    ) -> PaymentResult<GatewayRefund>;

    /// Get the provider name (for logging).
    fn provider_name(&self) -> &'static str;

    /// Public key id handed to the hosted checkout.
    fn key_id(&self) -> &str;

    /// Whether the gateway credentials are test-mode credentials.
    fn is_test_mode(&self) -> bool;
}

/// Type alias for a shared gateway (dynamic dispatch)
pub type BoxedPaymentGateway = Arc<dyn PaymentGateway>;
