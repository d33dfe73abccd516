//! # Razorpay Webhook Handling
//!
//! Webhooks notify the server of payment lifecycle changes (captures,
//! failures, refunds) independently of the browser checkout. The envelope is
//! parsed into a closed `WebhookEvent` enum and routed to a `WebhookHandler`.

use async_trait::async_trait;
use pay_core::{GatewayOrder, GatewayPayment, GatewayRefund, PaymentError, PaymentResult};
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Raw webhook envelope as posted by Razorpay
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(default)]
    pub entity: String,
    #[serde(default)]
    pub account_id: Option<String>,
    pub event: String,
    #[serde(default)]
    pub contains: Vec<String>,
    #[serde(default)]
    pub payload: WebhookPayload,
    #[serde(default)]
    pub created_at: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub payment: Option<EntityWrapper<GatewayPayment>>,
    #[serde(default)]
    pub order: Option<EntityWrapper<GatewayOrder>>,
    #[serde(default)]
    pub refund: Option<EntityWrapper<GatewayRefund>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntityWrapper<T> {
    pub entity: T,
}

/// Webhook events this service understands
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    PaymentCaptured(GatewayPayment),
    PaymentFailed(GatewayPayment),
    OrderPaid {
        order: GatewayOrder,
        payment: Option<GatewayPayment>,
    },
    RefundCreated(GatewayRefund),
    RefundProcessed(GatewayRefund),
    /// Verified but not handled; acknowledged and logged
    Unhandled(String),
}

impl WebhookEvent {
    /// Parse a verified webhook body
    pub fn parse(body: &[u8]) -> PaymentResult<Self> {
        let envelope: WebhookEnvelope = serde_json::from_slice(body).map_err(|e| {
            PaymentError::WebhookParseError(format!("Failed to parse webhook: {}", e))
        })?;
        debug!(
            "Parsed Razorpay webhook: event={}, contains={:?}",
            envelope.event, envelope.contains
        );
        envelope.into_event()
    }

    /// The Razorpay event name
    pub fn name(&self) -> &str {
        match self {
            WebhookEvent::PaymentCaptured(_) => "payment.captured",
            WebhookEvent::PaymentFailed(_) => "payment.failed",
            WebhookEvent::OrderPaid { .. } => "order.paid",
            WebhookEvent::RefundCreated(_) => "refund.created",
            WebhookEvent::RefundProcessed(_) => "refund.processed",
            WebhookEvent::Unhandled(name) => name,
        }
    }
}

impl WebhookEnvelope {
    pub fn into_event(self) -> PaymentResult<WebhookEvent> {
        let WebhookPayload {
            payment,
            order,
            refund,
        } = self.payload;
        let payment = payment.map(|w| w.entity);
        let order = order.map(|w| w.entity);
        let refund = refund.map(|w| w.entity);

        let missing = |entity: &str| {
            PaymentError::WebhookParseError(format!(
                "{} event without a {} entity",
                self.event, entity
            ))
        };

        let event = match self.event.as_str() {
            "payment.captured" => WebhookEvent::PaymentCaptured(payment.ok_or_else(|| missing("payment"))?),
            "payment.failed" => WebhookEvent::PaymentFailed(payment.ok_or_else(|| missing("payment"))?),
            "order.paid" => WebhookEvent::OrderPaid {
                order: order.ok_or_else(|| missing("order"))?,
                payment,
            },
            "refund.created" => WebhookEvent::RefundCreated(refund.ok_or_else(|| missing("refund"))?),
            "refund.processed" => {
                WebhookEvent::RefundProcessed(refund.ok_or_else(|| missing("refund"))?)
            }
            other => WebhookEvent::Unhandled(other.to_string()),
        };
        Ok(event)
    }
}

/// Webhook event handler trait
///
/// Implement this trait to act on webhook events. Every method defaults to
/// logging and succeeding.
#[async_trait]
#[allow(unused_variables)]
pub trait WebhookHandler: Send + Sync {
    /// Called when a payment is captured
    async fn on_payment_captured(&self, payment: &GatewayPayment) -> PaymentResult<()> {
        info!(
            "Payment captured: id={}, order={:?}, amount={} {}",
            payment.id, payment.order_id, payment.amount, payment.currency
        );
        Ok(())
    }

    /// Called when a payment fails
    async fn on_payment_failed(&self, payment: &GatewayPayment) -> PaymentResult<()> {
        warn!(
            "Payment failed: id={}, order={:?}, reason={:?}",
            payment.id, payment.order_id, payment.error_description
        );
        Ok(())
    }

    /// Called when an order is fully paid
    async fn on_order_paid(
        &self,
        order: &GatewayOrder,
        payment: Option<&GatewayPayment>,
    ) -> PaymentResult<()> {
        info!(
            "Order paid: id={}, amount_paid={}",
            order.id, order.amount_paid
        );
        Ok(())
    }

    /// Called when a refund is created
    async fn on_refund_created(&self, refund: &GatewayRefund) -> PaymentResult<()> {
        info!(
            "Refund created: id={}, payment={}, amount={}",
            refund.id, refund.payment_id, refund.amount
        );
        Ok(())
    }

    /// Called when a refund has been processed
    async fn on_refund_processed(&self, refund: &GatewayRefund) -> PaymentResult<()> {
        info!(
            "Refund processed: id={}, payment={}, amount={}",
            refund.id, refund.payment_id, refund.amount
        );
        Ok(())
    }

    /// Called for verified events with no dedicated handler
    async fn on_unhandled_event(&self, event: &str) -> PaymentResult<()> {
        info!("Unhandled webhook event: {}", event);
        Ok(())
    }
}

/// Default webhook handler (just logs events)
pub struct LoggingWebhookHandler;

impl WebhookHandler for LoggingWebhookHandler {}

/// Dispatch a webhook event to the appropriate handler method
pub async fn dispatch_webhook_event(
    handler: &dyn WebhookHandler,
    event: &WebhookEvent,
) -> PaymentResult<()> {
    match event {
        WebhookEvent::PaymentCaptured(payment) => handler.on_payment_captured(payment).await,
        WebhookEvent::PaymentFailed(payment) => handler.on_payment_failed(payment).await,
        WebhookEvent::OrderPaid { order, payment } => {
            handler.on_order_paid(order, payment.as_ref()).await
        }
        WebhookEvent::RefundCreated(refund) => handler.on_refund_created(refund).await,
        WebhookEvent::RefundProcessed(refund) => handler.on_refund_processed(refund).await,
        WebhookEvent::Unhandled(name) => handler.on_unhandled_event(name).await,
    }
}

/// Events that should be enabled in the Razorpay Dashboard
pub const REQUIRED_WEBHOOK_EVENTS: &[&str] = &[
    "payment.captured",
    "payment.failed",
    "order.paid",
    "refund.created",
    "refund.processed",
];

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn payment_entity() -> serde_json::Value {
        json!({
            "id": "pay_1",
            "entity": "payment",
            "amount": 10000,
            "currency": "INR",
            "status": "captured",
            "order_id": "order_1",
            "method": "upi",
            "amount_refunded": 0,
            "captured": true,
            "notes": [],
            "created_at": 1700000000
        })
    }

    fn body(event: &str, payload: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "entity": "event",
            "account_id": "acc_1",
            "event": event,
            "contains": ["payment"],
            "payload": payload,
            "created_at": 1700000000
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_payment_captured() {
        let raw = body("payment.captured", json!({ "payment": { "entity": payment_entity() } }));
        let event = WebhookEvent::parse(&raw).unwrap();

        match &event {
            WebhookEvent::PaymentCaptured(payment) => {
                assert_eq!(payment.id, "pay_1");
                assert_eq!(payment.order_id.as_deref(), Some("order_1"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(event.name(), "payment.captured");
    }

    #[test]
    fn test_parse_order_paid() {
        let raw = body(
            "order.paid",
            json!({
                "payment": { "entity": payment_entity() },
                "order": { "entity": {
                    "id": "order_1",
                    "entity": "order",
                    "amount": 10000,
                    "amount_paid": 10000,
                    "amount_due": 0,
                    "currency": "INR",
                    "status": "paid",
                    "notes": []
                }}
            }),
        );

        match WebhookEvent::parse(&raw).unwrap() {
            WebhookEvent::OrderPaid { order, payment } => {
                assert_eq!(order.status, "paid");
                assert_eq!(payment.map(|p| p.id).as_deref(), Some("pay_1"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_event_is_unhandled() {
        let raw = body("subscription.charged", json!({}));
        assert_eq!(
            WebhookEvent::parse(&raw).unwrap(),
            WebhookEvent::Unhandled("subscription.charged".to_string())
        );
    }

    #[test]
    fn test_missing_entity_is_parse_error() {
        let raw = body("refund.processed", json!({}));
        let err = WebhookEvent::parse(&raw).unwrap_err();
        assert!(matches!(err, PaymentError::WebhookParseError(_)));
        assert_eq!(err.status_code(), 400);

        let err = WebhookEvent::parse(b"not json").unwrap_err();
        assert!(matches!(err, PaymentError::WebhookParseError(_)));
    }

    #[tokio::test]
    async fn test_dispatch_webhook() {
        struct TestHandler {
            called: AtomicBool,
        }

        #[async_trait]
        impl WebhookHandler for TestHandler {
            async fn on_payment_captured(&self, _payment: &GatewayPayment) -> PaymentResult<()> {
                self.called.store(true, Ordering::SeqCst);
                Ok(())
            }
        }

        let handler = TestHandler {
            called: AtomicBool::new(false),
        };

        let raw = body("payment.captured", json!({ "payment": { "entity": payment_entity() } }));
        let event = WebhookEvent::parse(&raw).unwrap();
        dispatch_webhook_event(&handler, &event).await.unwrap();

        assert!(handler.called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_logging_handler_accepts_everything() {
        let event = WebhookEvent::Unhandled("payment.dispute.created".to_string());
        assert!(dispatch_webhook_event(&LoggingWebhookHandler, &event).await.is_ok());
    }
}
