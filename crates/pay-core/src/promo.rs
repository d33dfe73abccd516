//! # Promo Codes
//!
//! Promo rows as stored on the backend platform (amounts in major units)
//! and the checks applied before a discount is granted.

use crate::error::{PaymentError, PaymentResult};
use crate::money::Money;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    #[serde(alias = "fixed_amount")]
    Fixed,
    FreeShipping,
}

/// A promo code row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromoCode {
    pub id: String,
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
    pub discount_type: DiscountType,
    /// Percent for `percentage`, major units for `fixed`
    #[serde(default)]
    pub discount_value: f64,
    #[serde(default)]
    pub min_order_amount: Option<f64>,
    #[serde(default)]
    pub max_discount_amount: Option<f64>,
    #[serde(default)]
    pub usage_limit: Option<u32>,
    #[serde(default)]
    pub usage_count: u32,
    #[serde(default)]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// Why a promo code was not applied
#[derive(Debug, Clone, PartialEq)]
pub enum PromoRejection {
    NotFound,
    NotYetActive,
    Expired,
    UsageLimitReached,
    MinimumNotMet { minimum: Money },
}

impl std::fmt::Display for PromoRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PromoRejection::NotFound => f.write_str("Invalid promo code"),
            PromoRejection::NotYetActive => f.write_str("Promo code is not active yet"),
            PromoRejection::Expired => f.write_str("Promo code has expired"),
            PromoRejection::UsageLimitReached => {
                f.write_str("Promo code usage limit has been reached")
            }
            PromoRejection::MinimumNotMet { minimum } => write!(
                f,
                "Minimum order amount of {} required for this promo code",
                minimum.display()
            ),
        }
    }
}

/// A granted discount
#[derive(Debug, Clone, PartialEq)]
pub struct PromoDiscount {
    pub promo_id: String,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount: Money,
    pub free_shipping: bool,
    pub description: Option<String>,
}

impl PromoCode {
    /// Check the validity window, usage ceiling and minimum order amount,
    /// then compute the discount. The discount never exceeds the order amount.
    pub fn evaluate(
        &self,
        order_amount: Money,
        now: DateTime<Utc>,
    ) -> Result<PromoDiscount, PromoRejection> {
        if !self.is_active {
            return Err(PromoRejection::NotFound);
        }
        if self.valid_from.is_some_and(|from| now < from) {
            return Err(PromoRejection::NotYetActive);
        }
        if self.valid_until.is_some_and(|until| now > until) {
            return Err(PromoRejection::Expired);
        }
        if let Some(limit) = self.usage_limit {
            if self.usage_count >= limit {
                return Err(PromoRejection::UsageLimitReached);
            }
        }

        let currency = order_amount.currency;
        let subtotal = order_amount.amount;

        if let Some(min) = self.min_order_amount {
            let minimum = Money::from_major(min, currency);
            if subtotal < minimum.amount {
                debug!(
                    "Order amount {} is below promo minimum {}",
                    order_amount.display(),
                    minimum.display()
                );
                return Err(PromoRejection::MinimumNotMet { minimum });
            }
        }

        let raw = match self.discount_type {
            DiscountType::Percentage => {
                (subtotal as f64 * self.discount_value / 100.0).round() as i64
            }
            DiscountType::Fixed => currency.to_smallest_unit(self.discount_value),
            DiscountType::FreeShipping => 0,
        };

        let capped = match self.max_discount_amount {
            Some(max) if self.discount_type == DiscountType::Percentage => {
                raw.min(currency.to_smallest_unit(max))
            }
            _ => raw,
        };

        Ok(PromoDiscount {
            promo_id: self.id.clone(),
            code: self.code.clone(),
            discount_type: self.discount_type,
            discount: Money::from_minor(capped.clamp(0, subtotal.max(0)), currency),
            free_shipping: self.discount_type == DiscountType::FreeShipping,
            description: self.description.clone(),
        })
    }
}

/// Normalize user input to the stored form of a code
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Lookup of promo rows on the backend platform
#[async_trait]
pub trait PromoStore: Send + Sync {
    /// Find an active promo by its normalized (uppercase) code
    async fn find_active(&self, code: &str) -> PaymentResult<Option<PromoCode>>;

    /// Record one more redemption
    async fn increment_usage(&self, promo_id: &str) -> PaymentResult<()>;
}

pub type BoxedPromoStore = Arc<dyn PromoStore>;

/// Look up `code` and evaluate it against `order_amount`.
pub async fn validate_promo(
    store: &dyn PromoStore,
    code: &str,
    order_amount: Money,
    now: DateTime<Utc>,
) -> PaymentResult<Result<PromoDiscount, PromoRejection>> {
    let code = normalize_code(code);
    if code.is_empty() {
        return Err(PaymentError::MissingFields(vec!["code".to_string()]));
    }
    if order_amount.amount < 0 {
        return Err(PaymentError::invalid_field(
            "orderAmount",
            "must not be negative",
        ));
    }

    Ok(match store.find_active(&code).await? {
        Some(promo) => promo.evaluate(order_amount, now),
        None => Err(PromoRejection::NotFound),
    })
}

/// Promo codes loaded from a TOML seed file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromoCatalog {
    #[serde(default)]
    pub promo_codes: Vec<PromoCode>,
}

impl PromoCatalog {
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }
}

/// Process-local promo store
#[derive(Debug, Default)]
pub struct InMemoryPromoStore {
    promos: RwLock<Vec<PromoCode>>,
}

impl InMemoryPromoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_catalog(catalog: PromoCatalog) -> Self {
        let promos = catalog
            .promo_codes
            .into_iter()
            .map(|mut p| {
                p.code = normalize_code(&p.code);
                p
            })
            .collect();
        Self {
            promos: RwLock::new(promos),
        }
    }

    pub async fn insert(&self, mut promo: PromoCode) {
        promo.code = normalize_code(&promo.code);
        self.promos.write().await.push(promo);
    }

    pub async fn get(&self, promo_id: &str) -> Option<PromoCode> {
        self.promos
            .read()
            .await
            .iter()
            .find(|p| p.id == promo_id)
            .cloned()
    }
}

#[async_trait]
impl PromoStore for InMemoryPromoStore {
    async fn find_active(&self, code: &str) -> PaymentResult<Option<PromoCode>> {
        Ok(self
            .promos
            .read()
            .await
            .iter()
            .find(|p| p.is_active && p.code == code)
            .cloned())
    }

    async fn increment_usage(&self, promo_id: &str) -> PaymentResult<()> {
        let mut promos = self.promos.write().await;
        let promo = promos
            .iter_mut()
            .find(|p| p.id == promo_id)
            .ok_or_else(|| PaymentError::NotFound {
                resource: "Promo code".to_string(),
                id: promo_id.to_string(),
            })?;
        promo.usage_count += 1;
        Ok(())
    }
}
