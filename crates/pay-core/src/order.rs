//! # Storefront Orders
//!
//! Orders recorded after a verified checkout, and the store they live in.
//! The gateway payment id is unique per order: recording is a single
//! insert-or-return-existing operation so retried submissions never
//! produce duplicates.

use crate::error::{PaymentError, PaymentResult};
use crate::money::Currency;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Fulfilment state of an order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Failed,
    PartiallyRefunded,
    Refunded,
    Cancelled,
}

/// Gateway-side payment state mirrored onto the order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Authorized,
    Captured,
    Failed,
    PartiallyRefunded,
    Refunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    Processed,
    Failed,
}

impl RefundStatus {
    pub fn is_final(&self) -> bool {
        !matches!(self, RefundStatus::Pending)
    }
}

/// One gateway refund counted against an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundEntry {
    pub id: String,
    pub amount: i64,
    pub status: RefundStatus,
}

/// A line in a recorded order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub quantity: u32,
    /// Unit price in minor units
    pub unit_price: i64,
}

/// Order data submitted for recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    #[serde(default)]
    pub user_id: Option<String>,
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub items: Vec<OrderItem>,
    /// Amount charged in minor units
    pub total_amount: i64,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default)]
    pub shipping_address: Option<Value>,
    #[serde(default)]
    pub promo_code: Option<String>,
    #[serde(default)]
    pub discount_amount: i64,
}

impl NewOrder {
    pub fn validate(&self) -> PaymentResult<()> {
        if self.items.is_empty() {
            return Err(PaymentError::invalid_field("items", "order has no items"));
        }
        if let Some(item) = self.items.iter().find(|i| i.quantity == 0) {
            return Err(PaymentError::invalid_field(
                "items",
                format!("quantity must be positive for {}", item.product_id),
            ));
        }
        if self.total_amount < 1 {
            return Err(PaymentError::InvalidAmount {
                message: "total_amount must be positive".to_string(),
            });
        }
        if self.discount_amount < 0 {
            return Err(PaymentError::invalid_field(
                "discount_amount",
                "must not be negative",
            ));
        }
        Ok(())
    }

    /// Materialize a record. The signature has already been verified, so the
    /// payment is at least authorized.
    pub fn into_record(self) -> OrderRecord {
        let now = Utc::now();
        OrderRecord {
            id: Uuid::new_v4().to_string(),
            user_id: self.user_id,
            razorpay_order_id: self.razorpay_order_id,
            razorpay_payment_id: self.razorpay_payment_id,
            items: self.items,
            total_amount: self.total_amount,
            currency: self.currency,
            status: OrderStatus::Confirmed,
            payment_status: PaymentStatus::Authorized,
            refund_id: None,
            refund_amount: None,
            refund_status: None,
            refunds: Vec::new(),
            shipping_address: self.shipping_address,
            promo_code: self.promo_code.map(|c| c.trim().to_uppercase()),
            discount_amount: self.discount_amount,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A stored order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    pub total_amount: i64,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub refund_id: Option<String>,
    #[serde(default)]
    pub refund_amount: Option<i64>,
    #[serde(default)]
    pub refund_status: Option<RefundStatus>,
    /// Every refund counted so far, one entry per gateway refund id
    #[serde(default)]
    pub refunds: Vec<RefundEntry>,
    #[serde(default)]
    pub shipping_address: Option<Value>,
    #[serde(default)]
    pub promo_code: Option<String>,
    #[serde(default)]
    pub discount_amount: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderRecord {
    /// Count a refund event against this order.
    ///
    /// Each refund id contributes once, whatever mix of `created` and
    /// `processed` deliveries arrives. A final refund status is never moved
    /// back to pending, and failed refunds do not count toward the total.
    pub fn apply_refund(&mut self, refund: RefundEntry) {
        let status = match self.refunds.iter_mut().find(|r| r.id == refund.id) {
            Some(existing) => {
                if !existing.status.is_final() {
                    existing.status = refund.status;
                }
                existing.amount = refund.amount;
                existing.status
            }
            None => {
                let status = refund.status;
                self.refunds.push(refund.clone());
                status
            }
        };

        let refunded: i64 = self
            .refunds
            .iter()
            .filter(|r| r.status != RefundStatus::Failed)
            .map(|r| r.amount)
            .sum();

        if refunded > 0 {
            let fully_refunded = refunded >= self.total_amount;
            self.status = if fully_refunded {
                OrderStatus::Refunded
            } else {
                OrderStatus::PartiallyRefunded
            };
            self.payment_status = if fully_refunded {
                PaymentStatus::Refunded
            } else {
                PaymentStatus::PartiallyRefunded
            };
        }
        self.refund_id = Some(refund.id);
        self.refund_amount = Some(refunded);
        self.refund_status = Some(status);
        self.updated_at = Utc::now();
    }
}

/// Key used to locate an order from gateway events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderLookup {
    GatewayOrderId(String),
    PaymentId(String),
}

impl OrderLookup {
    pub fn matches(&self, record: &OrderRecord) -> bool {
        match self {
            OrderLookup::GatewayOrderId(id) => &record.razorpay_order_id == id,
            OrderLookup::PaymentId(id) => &record.razorpay_payment_id == id,
        }
    }
}

impl std::fmt::Display for OrderLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderLookup::GatewayOrderId(id) => write!(f, "razorpay_order_id={}", id),
            OrderLookup::PaymentId(id) => write!(f, "razorpay_payment_id={}", id),
        }
    }
}

/// Partial update applied by webhook bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrderUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
}

impl OrderUpdate {
    pub fn is_empty(&self) -> bool {
        *self == OrderUpdate::default()
    }

    pub fn apply(&self, record: &mut OrderRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(payment_status) = self.payment_status {
            record.payment_status = payment_status;
        }
        record.updated_at = Utc::now();
    }
}

/// Result of an insert-or-return-existing call
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Created(OrderRecord),
    Existing(OrderRecord),
}

impl RecordOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, RecordOutcome::Created(_))
    }

    pub fn record(&self) -> &OrderRecord {
        match self {
            RecordOutcome::Created(r) | RecordOutcome::Existing(r) => r,
        }
    }

    pub fn into_record(self) -> OrderRecord {
        match self {
            RecordOutcome::Created(r) | RecordOutcome::Existing(r) => r,
        }
    }
}

/// Persistence for storefront orders
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Store the order unless one already exists for its payment id, in which
    /// case the existing order is returned untouched.
    async fn insert_or_get(&self, order: NewOrder) -> PaymentResult<RecordOutcome>;

    async fn find(&self, lookup: &OrderLookup) -> PaymentResult<Option<OrderRecord>>;

    /// Apply a partial update. Returns `None` when no order matches.
    async fn update(
        &self,
        lookup: &OrderLookup,
        update: OrderUpdate,
    ) -> PaymentResult<Option<OrderRecord>>;

    /// Count a refund against the order paid by `payment_id` as one atomic
    /// read-modify-write (see `OrderRecord::apply_refund`). Returns `None`
    /// when no order matches.
    async fn record_refund(
        &self,
        payment_id: &str,
        refund: RefundEntry,
    ) -> PaymentResult<Option<OrderRecord>>;
}

pub type BoxedOrderStore = Arc<dyn OrderStore>;

/// Process-local order store keyed by payment id
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<String, OrderRecord>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert_or_get(&self, order: NewOrder) -> PaymentResult<RecordOutcome> {
        let mut orders = self.orders.write().await;
        if let Some(existing) = orders.get(&order.razorpay_payment_id) {
            return Ok(RecordOutcome::Existing(existing.clone()));
        }
        let record = order.into_record();
        orders.insert(record.razorpay_payment_id.clone(), record.clone());
        Ok(RecordOutcome::Created(record))
    }

    async fn find(&self, lookup: &OrderLookup) -> PaymentResult<Option<OrderRecord>> {
        let orders = self.orders.read().await;
        let found = match lookup {
            OrderLookup::PaymentId(id) => orders.get(id).cloned(),
            OrderLookup::GatewayOrderId(_) => orders.values().find(|r| lookup.matches(r)).cloned(),
        };
        Ok(found)
    }

    async fn update(
        &self,
        lookup: &OrderLookup,
        update: OrderUpdate,
    ) -> PaymentResult<Option<OrderRecord>> {
        let mut orders = self.orders.write().await;
        let Some(record) = orders.values_mut().find(|r| lookup.matches(r)) else {
            return Ok(None);
        };
        update.apply(record);
        Ok(Some(record.clone()))
    }

    async fn record_refund(
        &self,
        payment_id: &str,
        refund: RefundEntry,
    ) -> PaymentResult<Option<OrderRecord>> {
        let mut orders = self.orders.write().await;
        let Some(record) = orders.get_mut(payment_id) else {
            return Ok(None);
        };
        record.apply_refund(refund);
        Ok(Some(record.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_order(payment_id: &str) -> NewOrder {
        NewOrder {
            user_id: Some("user_1".to_string()),
            razorpay_order_id: "order_O".to_string(),
            razorpay_payment_id: payment_id.to_string(),
            items: vec![OrderItem {
                product_id: "masala-chai-250g".to_string(),
                name: Some("Masala Chai 250g".to_string()),
                quantity: 2,
                unit_price: 5000,
            }],
            total_amount: 10000,
            currency: Currency::INR,
            shipping_address: Some(json!({ "city": "Pune" })),
            promo_code: Some("welcome10".to_string()),
            discount_amount: 0,
        }
    }

    #[tokio::test]
    async fn test_insert_or_get_is_idempotent() {
        let store = InMemoryOrderStore::new();

        let first = store.insert_or_get(new_order("pay_P")).await.unwrap();
        let second = store.insert_or_get(new_order("pay_P")).await.unwrap();

        assert!(first.is_created());
        assert!(!second.is_created());
        assert_eq!(first.record().id, second.record().id);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_yield_one_order() {
        let store = Arc::new(InMemoryOrderStore::new());

        let (a, b) = tokio::join!(
            store.insert_or_get(new_order("pay_P")),
            store.insert_or_get(new_order("pay_P"))
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.record().id, b.record().id);
        assert_ne!(a.is_created(), b.is_created());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_update_by_gateway_order_id() {
        let store = InMemoryOrderStore::new();
        store.insert_or_get(new_order("pay_P")).await.unwrap();

        let updated = store
            .update(
                &OrderLookup::GatewayOrderId("order_O".into()),
                OrderUpdate {
                    payment_status: Some(PaymentStatus::Captured),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.payment_status, PaymentStatus::Captured);
        assert_eq!(updated.status, OrderStatus::Confirmed);

        let missing = store
            .update(
                &OrderLookup::PaymentId("pay_unknown".into()),
                OrderUpdate::default(),
            )
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_into_record_normalizes_promo_code() {
        let record = new_order("pay_P").into_record();
        assert_eq!(record.promo_code.as_deref(), Some("WELCOME10"));
        assert_eq!(record.payment_status, PaymentStatus::Authorized);
    }

    #[test]
    fn test_new_order_validation() {
        let mut order = new_order("pay_P");
        order.items.clear();
        assert_eq!(order.validate().unwrap_err().field(), Some("items"));

        let mut order = new_order("pay_P");
        order.total_amount = 0;
        assert_eq!(order.validate().unwrap_err().status_code(), 400);
    }

    #[test]
    fn test_update_serializes_only_set_fields() {
        let update = OrderUpdate {
            payment_status: Some(PaymentStatus::Captured),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({ "payment_status": "captured" })
        );
        assert!(OrderUpdate::default().is_empty());
    }

    fn refund(id: &str, amount: i64, status: RefundStatus) -> RefundEntry {
        RefundEntry {
            id: id.to_string(),
            amount,
            status,
        }
    }

    #[test]
    fn test_refund_counted_once_per_id() {
        let mut record = new_order("pay_P").into_record();

        record.apply_refund(refund("rfnd_1", 3000, RefundStatus::Pending));
        record.apply_refund(refund("rfnd_2", 3000, RefundStatus::Pending));
        record.apply_refund(refund("rfnd_1", 3000, RefundStatus::Processed));
        record.apply_refund(refund("rfnd_1", 3000, RefundStatus::Processed));

        assert_eq!(record.refund_amount, Some(6000));
        assert_eq!(record.refunds.len(), 2);
        assert_eq!(record.status, OrderStatus::PartiallyRefunded);
        assert_eq!(record.payment_status, PaymentStatus::PartiallyRefunded);
        assert_eq!(record.refund_status, Some(RefundStatus::Processed));
    }

    #[test]
    fn test_late_created_event_keeps_processed_status() {
        let mut record = new_order("pay_P").into_record();

        record.apply_refund(refund("rfnd_1", 10000, RefundStatus::Processed));
        record.apply_refund(refund("rfnd_1", 10000, RefundStatus::Pending));

        assert_eq!(record.refund_amount, Some(10000));
        assert_eq!(record.refund_status, Some(RefundStatus::Processed));
        assert_eq!(record.status, OrderStatus::Refunded);
    }

    #[test]
    fn test_failed_refund_not_counted() {
        let mut record = new_order("pay_P").into_record();

        record.apply_refund(refund("rfnd_1", 4000, RefundStatus::Failed));

        assert_eq!(record.refund_amount, Some(0));
        assert_eq!(record.status, OrderStatus::Confirmed);
        assert_eq!(record.payment_status, PaymentStatus::Authorized);
    }

    #[tokio::test]
    async fn test_concurrent_refunds_both_counted() {
        let store = Arc::new(InMemoryOrderStore::new());
        store.insert_or_get(new_order("pay_P")).await.unwrap();

        let (a, b) = tokio::join!(
            store.record_refund("pay_P", refund("rfnd_1", 3000, RefundStatus::Pending)),
            store.record_refund("pay_P", refund("rfnd_2", 4000, RefundStatus::Pending))
        );
        a.unwrap();
        b.unwrap();

        let order = store
            .find(&OrderLookup::PaymentId("pay_P".into()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(order.refund_amount, Some(7000));
        assert_eq!(order.refunds.len(), 2);

        let missing = store
            .record_refund("pay_unknown", refund("rfnd_3", 100, RefundStatus::Pending))
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
