//! # Payment Types
//!
//! Payment intents, confirmations and the gateway's order / payment / refund
//! entities. Gateway entities keep unknown fields in `extra` so they can be
//! relayed to the storefront unchanged.

use crate::error::{PaymentError, PaymentResult};
use crate::money::{Currency, Money};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

/// Smallest accepted amount in minor units
pub const MIN_AMOUNT: i64 = 1;

/// Gateway limit on receipt length
pub const MAX_RECEIPT_LEN: usize = 40;

/// Gateway limit on the number of note keys
pub const MAX_NOTES: usize = 15;

/// Free-form key/value notes attached to gateway entities
pub type Notes = Map<String, Value>;

/// The gateway serializes empty notes as `[]` and populated notes as an object.
pub fn deserialize_notes<'de, D>(deserializer: D) -> Result<Notes, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(Notes::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(Value::Array(items)) if items.is_empty() => Ok(Notes::new()),
        Some(other) => Err(D::Error::custom(format!(
            "notes must be an object, got {}",
            other
        ))),
    }
}

/// Generate a receipt reference that fits the gateway's length limit
pub fn generate_receipt() -> String {
    format!("rcpt_{}", Uuid::new_v4().simple())
}

// =============================================================================
// Payment Intent
// =============================================================================

/// A request to open a payment order for one checkout attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Amount in minor units
    pub amount: i64,

    /// Currency
    #[serde(default)]
    pub currency: Currency,

    /// Receipt reference (generated when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt: Option<String>,

    /// Free-form notes
    #[serde(default)]
    pub notes: HashMap<String, String>,
}

impl PaymentIntent {
    pub fn new(amount: i64, currency: Currency) -> Self {
        Self {
            amount,
            currency,
            receipt: None,
            notes: HashMap::new(),
        }
    }

    /// Set receipt reference
    pub fn with_receipt(mut self, receipt: impl Into<String>) -> Self {
        self.receipt = Some(receipt.into());
        self
    }

    /// Add a note
    pub fn with_note(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.notes.insert(key.into(), value.into());
        self
    }

    pub fn money(&self) -> Money {
        Money::from_minor(self.amount, self.currency)
    }

    /// Check the intent before anything is sent to the gateway
    pub fn validate(&self) -> PaymentResult<()> {
        if self.amount < MIN_AMOUNT {
            return Err(PaymentError::InvalidAmount {
                message: format!(
                    "amount must be at least {} (minor currency units), got {}",
                    MIN_AMOUNT, self.amount
                ),
            });
        }

        if let Some(receipt) = &self.receipt {
            if receipt.trim().is_empty() {
                return Err(PaymentError::invalid_field("receipt", "must not be empty"));
            }
            if receipt.chars().count() > MAX_RECEIPT_LEN {
                return Err(PaymentError::invalid_field(
                    "receipt",
                    format!("must be at most {} characters", MAX_RECEIPT_LEN),
                ));
            }
        }

        Ok(())
    }
}

/// Order creation parameters as sent to the gateway
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderParams {
    pub amount: i64,
    pub currency: Currency,
    pub receipt: String,
    pub notes: HashMap<String, String>,
}

// =============================================================================
// Payment Confirmation
// =============================================================================

/// Triple returned by the hosted checkout after a successful payment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentConfirmation {
    pub payment_id: String,
    pub order_id: String,
    pub signature: String,
}

impl PaymentConfirmation {
    /// Build from optional request fields, naming every missing one
    pub fn from_parts(
        payment_id: Option<&str>,
        order_id: Option<&str>,
        signature: Option<&str>,
    ) -> PaymentResult<Self> {
        // Values are kept byte-for-byte since they feed the signed payload
        fn present(v: Option<&str>) -> Option<&str> {
            v.filter(|s| !s.trim().is_empty())
        }

        let mut missing = Vec::new();
        let payment_id = present(payment_id);
        let order_id = present(order_id);
        let signature = present(signature);

        if payment_id.is_none() {
            missing.push("razorpay_payment_id".to_string());
        }
        if order_id.is_none() {
            missing.push("razorpay_order_id".to_string());
        }
        if signature.is_none() {
            missing.push("razorpay_signature".to_string());
        }

        match (payment_id, order_id, signature) {
            (Some(payment_id), Some(order_id), Some(signature)) => Ok(Self {
                payment_id: payment_id.to_string(),
                order_id: order_id.to_string(),
                signature: signature.to_string(),
            }),
            _ => Err(PaymentError::MissingFields(missing)),
        }
    }

    /// The message the gateway signs: `order_id|payment_id`
    pub fn signed_payload(&self) -> String {
        format!("{}|{}", self.order_id, self.payment_id)
    }
}

/// Outcome of a successful confirmation check
#[derive(Debug, Clone)]
pub struct PaymentVerification {
    pub payment_id: String,
    pub order_id: String,
    pub payment: Option<GatewayPayment>,
    pub order: Option<GatewayOrder>,
}

impl PaymentVerification {
    /// False when the signature held but the follow-up fetch failed
    pub fn details_available(&self) -> bool {
        self.payment.is_some() && self.order.is_some()
    }
}

// =============================================================================
// Capture / Refund
// =============================================================================

/// Capture parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureParams {
    pub amount: i64,
    pub currency: Currency,
}

/// Refund processing speed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefundSpeed {
    #[default]
    Normal,
    Optimum,
}

/// Refund parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefundRequest {
    /// Amount in minor units; absent means the remaining captured balance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,

    #[serde(default)]
    pub speed: RefundSpeed,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub notes: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt: Option<String>,
}

impl RefundRequest {
    pub fn validate(&self) -> PaymentResult<()> {
        if let Some(amount) = self.amount {
            if amount < MIN_AMOUNT {
                return Err(PaymentError::InvalidAmount {
                    message: format!("refund amount must be at least {}", MIN_AMOUNT),
                });
            }
        }
        if let Some(receipt) = &self.receipt {
            if receipt.chars().count() > MAX_RECEIPT_LEN {
                return Err(PaymentError::invalid_field(
                    "receipt",
                    format!("must be at most {} characters", MAX_RECEIPT_LEN),
                ));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Gateway Entities
// =============================================================================

/// Gateway order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    #[serde(default)]
    pub entity: String,
    pub amount: i64,
    #[serde(default)]
    pub amount_paid: i64,
    #[serde(default)]
    pub amount_due: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    pub status: String,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, deserialize_with = "deserialize_notes")]
    pub notes: Notes,
    #[serde(default)]
    pub created_at: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Gateway payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayPayment {
    pub id: String,
    #[serde(default)]
    pub entity: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub amount_refunded: i64,
    #[serde(default)]
    pub refund_status: Option<String>,
    #[serde(default)]
    pub captured: bool,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_notes")]
    pub notes: Notes,
    #[serde(default)]
    pub created_at: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GatewayPayment {
    pub fn is_captured(&self) -> bool {
        self.captured || self.status == "captured"
    }

    /// Captured amount still available for refund, if the payment was captured
    pub fn refundable_amount(&self) -> Option<i64> {
        if !self.is_captured() {
            return None;
        }
        let remaining = self.amount - self.amount_refunded;
        (remaining > 0).then_some(remaining)
    }
}

/// Gateway refund
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayRefund {
    pub id: String,
    #[serde(default)]
    pub entity: String,
    pub amount: i64,
    pub currency: String,
    pub payment_id: String,
    #[serde(default)]
    pub receipt: Option<String>,
    pub status: String,
    #[serde(default)]
    pub speed_requested: Option<String>,
    #[serde(default)]
    pub speed_processed: Option<String>,
    #[serde(default, deserialize_with = "deserialize_notes")]
    pub notes: Notes,
    #[serde(default)]
    pub created_at: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Collection wrapper used by list endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentCollection {
    #[serde(default)]
    pub entity: String,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub items: Vec<GatewayPayment>,
}
