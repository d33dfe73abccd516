//! # Payment Service
//!
//! Storefront-facing payment operations on top of a `PaymentGateway`:
//! order creation, checkout confirmation, capture, refunds and webhook
//! verification. Holds the secrets; the gateway only moves bytes.

use crate::client::RazorpayClient;
use crate::config::RazorpayConfig;
use crate::signature;
use crate::webhook::WebhookEvent;
use chrono::Utc;
use pay_core::{
    generate_receipt, BoxedPaymentGateway, CaptureParams, Currency, GatewayOrder, GatewayPayment,
    GatewayRefund, OrderParams, PaymentCollection, PaymentConfirmation, PaymentError,
    PaymentIntent, PaymentResult, PaymentVerification, RefundRequest, MAX_NOTES, MIN_AMOUNT,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Value of the `source` note on every order this service creates
pub const ORDER_SOURCE: &str = "razor-cart";

pub struct PaymentService {
    gateway: BoxedPaymentGateway,
    key_secret: String,
    webhook_secret: Option<String>,
}

impl PaymentService {
    pub fn new(
        gateway: BoxedPaymentGateway,
        key_secret: impl Into<String>,
        webhook_secret: Option<String>,
    ) -> Self {
        Self {
            gateway,
            key_secret: key_secret.into(),
            webhook_secret: webhook_secret.filter(|s| !s.is_empty()),
        }
    }

    /// Build a service backed by the Razorpay REST API
    pub fn from_config(config: RazorpayConfig) -> PaymentResult<Self> {
        let key_secret = config.key_secret.clone();
        let webhook_secret = config.webhook_secret.clone();
        let client = RazorpayClient::new(config)?;
        Ok(Self::new(Arc::new(client), key_secret, webhook_secret))
    }

    pub fn gateway(&self) -> &BoxedPaymentGateway {
        &self.gateway
    }

    /// Public key id for the hosted checkout
    pub fn key_id(&self) -> &str {
        self.gateway.key_id()
    }

    pub fn webhook_configured(&self) -> bool {
        self.webhook_secret.is_some()
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Open a gateway order for one checkout attempt.
    ///
    /// Invalid intents never reach the gateway.
    #[instrument(skip(self, intent), fields(amount = intent.amount, currency = %intent.currency))]
    pub async fn create_order(&self, intent: PaymentIntent) -> PaymentResult<GatewayOrder> {
        intent.validate()?;

        let money = intent.money();
        let mut notes = intent.notes;
        notes.insert("source".to_string(), ORDER_SOURCE.to_string());
        notes.insert("created_at".to_string(), Utc::now().to_rfc3339());
        if notes.len() > MAX_NOTES {
            return Err(PaymentError::invalid_field(
                "notes",
                format!("at most {} notes are allowed", MAX_NOTES - 2),
            ));
        }

        let params = OrderParams {
            amount: intent.amount,
            currency: intent.currency,
            receipt: intent.receipt.unwrap_or_else(generate_receipt),
            notes,
        };

        info!("Creating payment order: {} receipt={}", money.display(), params.receipt);
        self.gateway.create_order(&params).await
    }

    pub async fn fetch_order(&self, order_id: &str) -> PaymentResult<GatewayOrder> {
        self.gateway.fetch_order(order_id).await
    }

    pub async fn fetch_order_payments(&self, order_id: &str) -> PaymentResult<PaymentCollection> {
        self.gateway.fetch_order_payments(order_id).await
    }

    // =========================================================================
    // Confirmation
    // =========================================================================

    /// Check a checkout confirmation signature without touching the gateway
    pub fn check_signature(&self, confirmation: &PaymentConfirmation) -> PaymentResult<()> {
        if signature::verify_payment(confirmation, &self.key_secret) {
            return Ok(());
        }

        let expected = signature::payment_signature(
            &confirmation.order_id,
            &confirmation.payment_id,
            &self.key_secret,
        )
        .map(|s| signature::redact(&s))
        .unwrap_or_default();

        warn!(
            "Payment signature mismatch: order={}, payment={}, received={}, expected={}",
            confirmation.order_id,
            confirmation.payment_id,
            signature::redact(&confirmation.signature),
            expected
        );
        Err(PaymentError::SignatureMismatch)
    }

    /// Verify a confirmation, then fetch the payment and order in parallel.
    ///
    /// A failed fetch after a valid signature still verifies; the details
    /// are just left out.
    #[instrument(skip(self, confirmation), fields(order_id = %confirmation.order_id, payment_id = %confirmation.payment_id))]
    pub async fn verify_payment(
        &self,
        confirmation: PaymentConfirmation,
    ) -> PaymentResult<PaymentVerification> {
        self.check_signature(&confirmation)?;

        let details = tokio::try_join!(
            self.gateway.fetch_payment(&confirmation.payment_id),
            self.gateway.fetch_order(&confirmation.order_id),
        );

        let (payment, order) = match details {
            Ok((payment, order)) => {
                info!(
                    "Payment verified: status={}, order_status={}",
                    payment.status, order.status
                );
                (Some(payment), Some(order))
            }
            Err(e) => {
                warn!("Payment verified but details unavailable: {}", e);
                (None, None)
            }
        };

        Ok(PaymentVerification {
            payment_id: confirmation.payment_id,
            order_id: confirmation.order_id,
            payment,
            order,
        })
    }

    // =========================================================================
    // Payments
    // =========================================================================

    pub async fn fetch_payment(&self, payment_id: &str) -> PaymentResult<GatewayPayment> {
        self.gateway.fetch_payment(payment_id).await
    }

    #[instrument(skip(self))]
    pub async fn capture_payment(
        &self,
        payment_id: &str,
        amount: i64,
        currency: Currency,
    ) -> PaymentResult<GatewayPayment> {
        if amount < MIN_AMOUNT {
            return Err(PaymentError::InvalidAmount {
                message: format!("capture amount must be at least {}", MIN_AMOUNT),
            });
        }
        self.gateway
            .capture_payment(payment_id, &CaptureParams { amount, currency })
            .await
    }

    /// Refund a payment.
    ///
    /// The amount comes from the gateway's record of what is still refundable;
    /// the client-supplied amount is only used when that lookup fails.
    #[instrument(skip(self, request))]
    pub async fn refund_payment(
        &self,
        payment_id: &str,
        mut request: RefundRequest,
    ) -> PaymentResult<GatewayRefund> {
        request.validate()?;
        request.amount = self.resolve_refund_amount(payment_id, request.amount).await;
        self.gateway.refund_payment(payment_id, &request).await
    }

    async fn resolve_refund_amount(&self, payment_id: &str, requested: Option<i64>) -> Option<i64> {
        let resolved = match self.gateway.fetch_payment(payment_id).await {
            Ok(payment) => match payment.refundable_amount() {
                Some(refundable) => {
                    if let Some(requested) = requested.filter(|r| *r != refundable) {
                        info!(
                            "Refund amount {} replaced by refundable captured amount {}",
                            requested, refundable
                        );
                    }
                    Some(refundable)
                }
                None => {
                    warn!(
                        "Payment {} has no refundable captured amount (status={}), using requested amount",
                        payment.id, payment.status
                    );
                    requested
                }
            },
            Err(e) => {
                warn!("Payment lookup for refund failed, using requested amount: {}", e);
                requested
            }
        };

        if resolved.is_none() {
            warn!("Refund amount unknown for {}; gateway refunds the remaining balance", payment_id);
        }
        resolved
    }

    // =========================================================================
    // Webhooks
    // =========================================================================

    /// Authenticate a webhook against the exact bytes received, then parse it
    pub fn verify_webhook(&self, body: &[u8], signature: Option<&str>) -> PaymentResult<WebhookEvent> {
        let secret = self
            .webhook_secret
            .as_deref()
            .ok_or(PaymentError::WebhookSecretMissing)?;

        let signature = signature
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                PaymentError::InvalidRequest("Missing x-razorpay-signature header".to_string())
            })?;

        if !signature::verify_webhook(body, signature, secret) {
            warn!(
                "Webhook signature mismatch: received={}, body_len={}",
                signature::redact(signature),
                body.len()
            );
            return Err(PaymentError::WebhookVerificationFailed(
                "Signature mismatch".to_string(),
            ));
        }

        WebhookEvent::parse(body)
    }
}
