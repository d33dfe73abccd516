//! # Backend Platform Store
//!
//! `OrderStore` and `PromoStore` backed by the Supabase REST interface
//! (PostgREST). Uses the service key, so it must only run server-side.
//!
//! Tables:
//! - `orders` with a unique constraint on `razorpay_payment_id` and a
//!   `refunds` jsonb column, plus a `record_order_refund(payment_id, refund)`
//!   function that counts a refund in one locked read-modify-write and
//!   returns the updated row
//! - `promo_codes`, plus an `increment_promo_usage(promo_id)` function

use async_trait::async_trait;
use pay_core::{
    NewOrder, OrderLookup, OrderRecord, OrderStore, OrderUpdate, PaymentError, PaymentResult,
    PromoCode, PromoStore, RecordOutcome, RefundEntry,
};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

const ORDERS_TABLE: &str = "orders";
const PROMO_TABLE: &str = "promo_codes";
const PROMO_USAGE_RPC: &str = "increment_promo_usage";
const ORDER_REFUND_RPC: &str = "record_order_refund";

/// Backend platform connection settings
#[derive(Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub service_key: String,
}

impl SupabaseConfig {
    pub fn new(url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            service_key: service_key.into(),
        }
    }

    /// `None` when neither `SUPABASE_URL` nor `SUPABASE_SERVICE_KEY` is set
    pub fn from_lookup<F>(lookup: F) -> PaymentResult<Option<Self>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        match (non_empty("SUPABASE_URL"), non_empty("SUPABASE_SERVICE_KEY")) {
            (Some(url), Some(key)) => Ok(Some(Self::new(url, key))),
            (None, None) => Ok(None),
            (Some(_), None) => Err(PaymentError::Configuration(
                "SUPABASE_SERVICE_KEY not set".to_string(),
            )),
            (None, Some(_)) => Err(PaymentError::Configuration(
                "SUPABASE_URL not set".to_string(),
            )),
        }
    }
}

impl std::fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("service_key", &"<redacted>")
            .finish()
    }
}

pub struct SupabaseStore {
    config: SupabaseConfig,
    client: Client,
}

impl SupabaseStore {
    pub fn new(config: SupabaseConfig) -> PaymentResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PaymentError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.config.url.trim_end_matches('/'), path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> PaymentResult<T> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| PaymentError::NetworkError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PaymentError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            error!("Backend error ({}): status={}, body={}", what, status, body);
            return Err(PaymentError::Storage(format!("{} failed with HTTP {}", what, status)));
        }

        if body.trim().is_empty() {
            return serde_json::from_str("null").map_err(|e| {
                PaymentError::Serialization(format!("Empty {} response: {}", what, e))
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            PaymentError::Serialization(format!("Failed to parse {} response: {}", what, e))
        })
    }

    async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, String)],
        what: &str,
    ) -> PaymentResult<Option<T>> {
        let mut query: Vec<(&str, String)> = filters
            .iter()
            .map(|(column, value)| (*column, format!("eq.{}", value)))
            .collect();
        query.push(("limit", "1".to_string()));

        let rows: Vec<T> = self
            .send(self.client.get(self.url(table)).query(&query), what)
            .await?;
        Ok(rows.into_iter().next())
    }
}

fn lookup_filter(lookup: &OrderLookup) -> (&'static str, String) {
    match lookup {
        OrderLookup::GatewayOrderId(id) => ("razorpay_order_id", id.clone()),
        OrderLookup::PaymentId(id) => ("razorpay_payment_id", id.clone()),
    }
}

#[derive(Serialize)]
struct TimestampedUpdate<'a> {
    #[serde(flatten)]
    update: &'a OrderUpdate,
    updated_at: chrono::DateTime<chrono::Utc>,
}

#[async_trait]
impl OrderStore for SupabaseStore {
    #[instrument(skip(self, order), fields(payment_id = %order.razorpay_payment_id))]
    async fn insert_or_get(&self, order: NewOrder) -> PaymentResult<RecordOutcome> {
        let payment_id = order.razorpay_payment_id.clone();
        let record = order.into_record();

        // Conflicting rows are skipped and come back as an empty array
        let inserted: Vec<OrderRecord> = self
            .send(
                self.client
                    .post(self.url(ORDERS_TABLE))
                    .query(&[("on_conflict", "razorpay_payment_id")])
                    .header("Prefer", "resolution=ignore-duplicates,return=representation")
                    .json(&record),
                "insert order",
            )
            .await?;

        if let Some(created) = inserted.into_iter().next() {
            info!("Recorded order {} for payment {}", created.id, payment_id);
            return Ok(RecordOutcome::Created(created));
        }

        debug!("Order for payment {} already exists", payment_id);
        self.select_one(
            ORDERS_TABLE,
            &[("razorpay_payment_id", payment_id.clone())],
            "fetch order",
        )
        .await?
        .map(RecordOutcome::Existing)
        .ok_or_else(|| {
            PaymentError::Storage(format!(
                "order for payment {} was neither inserted nor found",
                payment_id
            ))
        })
    }

    async fn find(&self, lookup: &OrderLookup) -> PaymentResult<Option<OrderRecord>> {
        self.select_one(ORDERS_TABLE, &[lookup_filter(lookup)], "fetch order")
            .await
    }

    #[instrument(skip(self, lookup, update), fields(lookup = %lookup))]
    async fn update(
        &self,
        lookup: &OrderLookup,
        update: OrderUpdate,
    ) -> PaymentResult<Option<OrderRecord>> {
        let (column, value) = lookup_filter(lookup);
        let body = TimestampedUpdate {
            update: &update,
            updated_at: chrono::Utc::now(),
        };

        let rows: Vec<OrderRecord> = self
            .send(
                self.client
                    .patch(self.url(ORDERS_TABLE))
                    .query(&[(column, format!("eq.{}", value))])
                    .header("Prefer", "return=representation")
                    .json(&body),
                "update order",
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    #[instrument(skip(self, refund), fields(refund_id = %refund.id))]
    async fn record_refund(
        &self,
        payment_id: &str,
        refund: RefundEntry,
    ) -> PaymentResult<Option<OrderRecord>> {
        // The function locks the row, so concurrent deliveries serialize
        let rows: Vec<OrderRecord> = self
            .send(
                self.client
                    .post(self.url(&format!("rpc/{}", ORDER_REFUND_RPC)))
                    .json(&serde_json::json!({
                        "payment_id": payment_id,
                        "refund": refund,
                    })),
                "record refund",
            )
            .await?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl PromoStore for SupabaseStore {
    async fn find_active(&self, code: &str) -> PaymentResult<Option<PromoCode>> {
        self.select_one(
            PROMO_TABLE,
            &[("code", code.to_string()), ("is_active", "true".to_string())],
            "fetch promo code",
        )
        .await
    }

    async fn increment_usage(&self, promo_id: &str) -> PaymentResult<()> {
        let _: serde_json::Value = self
            .send(
                self.client
                    .post(self.url(&format!("rpc/{}", PROMO_USAGE_RPC)))
                    .json(&serde_json::json!({ "promo_id": promo_id })),
                "increment promo usage",
            )
            .await?;
        Ok(())
    }
}
