//! # Order Bookkeeping
//!
//! Webhook handler that mirrors gateway events onto recorded orders.
//! Events for orders this service never recorded are acknowledged.

use async_trait::async_trait;
use pay_core::{
    BoxedOrderStore, GatewayOrder, GatewayPayment, GatewayRefund, OrderLookup, OrderStatus,
    OrderUpdate, PaymentResult, PaymentStatus, RefundEntry, RefundStatus,
};
use pay_razorpay::WebhookHandler;
use tracing::{info, warn};

pub struct OrderBookkeeper {
    orders: BoxedOrderStore,
}

impl OrderBookkeeper {
    pub fn new(orders: BoxedOrderStore) -> Self {
        Self { orders }
    }

    async fn apply(&self, lookup: OrderLookup, update: OrderUpdate, event: &str) -> PaymentResult<()> {
        match self.orders.update(&lookup, update).await? {
            Some(order) => info!(
                "{}: order {} now status={:?}, payment_status={:?}",
                event, order.id, order.status, order.payment_status
            ),
            None => info!("{}: no recorded order for {}, ignoring", event, lookup),
        }
        Ok(())
    }

    async fn apply_refund(&self, refund: &GatewayRefund, status: RefundStatus, event: &str) -> PaymentResult<()> {
        let entry = RefundEntry {
            id: refund.id.clone(),
            amount: refund.amount,
            status,
        };
        match self.orders.record_refund(&refund.payment_id, entry).await? {
            Some(order) => info!(
                "{}: order {} refund {} counted, refunded={:?}, status={:?}",
                event, order.id, refund.id, order.refund_amount, order.status
            ),
            None => info!(
                "{}: no recorded order for razorpay_payment_id={}, ignoring",
                event, refund.payment_id
            ),
        }
        Ok(())
    }
}

#[async_trait]
impl WebhookHandler for OrderBookkeeper {
    async fn on_payment_captured(&self, payment: &GatewayPayment) -> PaymentResult<()> {
        self.apply(
            OrderLookup::PaymentId(payment.id.clone()),
            OrderUpdate {
                status: Some(OrderStatus::Confirmed),
                payment_status: Some(PaymentStatus::Captured),
                ..Default::default()
            },
            "payment.captured",
        )
        .await
    }

    async fn on_payment_failed(&self, payment: &GatewayPayment) -> PaymentResult<()> {
        warn!(
            "Payment {} failed: {:?}",
            payment.id, payment.error_description
        );
        self.apply(
            OrderLookup::PaymentId(payment.id.clone()),
            OrderUpdate {
                status: Some(OrderStatus::Failed),
                payment_status: Some(PaymentStatus::Failed),
                ..Default::default()
            },
            "payment.failed",
        )
        .await
    }

    async fn on_order_paid(
        &self,
        order: &GatewayOrder,
        _payment: Option<&GatewayPayment>,
    ) -> PaymentResult<()> {
        self.apply(
            OrderLookup::GatewayOrderId(order.id.clone()),
            OrderUpdate {
                status: Some(OrderStatus::Confirmed),
                payment_status: Some(PaymentStatus::Captured),
                ..Default::default()
            },
            "order.paid",
        )
        .await
    }

    async fn on_refund_created(&self, refund: &GatewayRefund) -> PaymentResult<()> {
        self.apply_refund(refund, RefundStatus::Pending, "refund.created")
            .await
    }

    async fn on_refund_processed(&self, refund: &GatewayRefund) -> PaymentResult<()> {
        self.apply_refund(refund, RefundStatus::Processed, "refund.processed")
            .await
    }
}
