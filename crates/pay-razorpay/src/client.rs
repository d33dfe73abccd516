//! # Razorpay REST Client
//!
//! Implementation of `PaymentGateway` over the Razorpay Orders, Payments and
//! Refunds APIs. Requests use HTTP Basic auth with the key id and key secret.

use crate::config::RazorpayConfig;
use async_trait::async_trait;
use pay_core::{
    CaptureParams, GatewayOrder, GatewayPayment, GatewayRefund, OrderParams, PaymentCollection,
    PaymentError, PaymentGateway, PaymentResult, RefundRequest,
};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

/// Razorpay API client
pub struct RazorpayClient {
    config: RazorpayConfig,
    client: Client,
}

impl RazorpayClient {
    /// Create a new Razorpay client
    pub fn new(config: RazorpayConfig) -> PaymentResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PaymentError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &RazorpayConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.api_base_url.trim_end_matches('/'), path)
    }

    /// Send an authenticated request and decode the JSON response
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> PaymentResult<T> {
        let response = request
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .send()
            .await
            .map_err(|e| PaymentError::NetworkError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PaymentError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            error!("Razorpay API error ({}): status={}, body={}", what, status, body);
            return Err(parse_error_response(status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            PaymentError::Serialization(format!("Failed to parse Razorpay {} response: {}", what, e))
        })
    }
}

/// Ids are interpolated into URL paths, so only the gateway's id alphabet is allowed
fn check_id(field: &str, id: &str) -> PaymentResult<()> {
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(PaymentError::invalid_field(field, "malformed identifier"));
    }
    Ok(())
}

/// Map a non-2xx response to a `PaymentError::Gateway`
fn parse_error_response(status: u16, body: &str) -> PaymentError {
    match serde_json::from_str::<RazorpayErrorResponse>(body) {
        Ok(parsed) => PaymentError::Gateway {
            status,
            code: parsed.error.code,
            description: parsed
                .error
                .description
                .unwrap_or_else(|| format!("Razorpay returned HTTP {}", status)),
            field: parsed.error.field,
        },
        Err(_) => PaymentError::Gateway {
            status,
            code: None,
            description: format!("Razorpay returned HTTP {}", status),
            field: None,
        },
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    #[instrument(skip(self, params), fields(amount = params.amount, receipt = %params.receipt))]
    async fn create_order(&self, params: &OrderParams) -> PaymentResult<GatewayOrder> {
        debug!("Creating Razorpay order: {} {}", params.amount, params.currency);

        let order: GatewayOrder = self
            .send(self.client.post(self.url("orders")).json(params), "create order")
            .await?;

        info!("Created Razorpay order: id={}, status={}", order.id, order.status);
        Ok(order)
    }

    #[instrument(skip(self))]
    async fn fetch_order(&self, order_id: &str) -> PaymentResult<GatewayOrder> {
        check_id("order_id", order_id)?;
        self.send(
            self.client.get(self.url(&format!("orders/{}", order_id))),
            "fetch order",
        )
        .await
    }

    #[instrument(skip(self))]
    async fn fetch_order_payments(&self, order_id: &str) -> PaymentResult<PaymentCollection> {
        check_id("order_id", order_id)?;
        self.send(
            self.client
                .get(self.url(&format!("orders/{}/payments", order_id))),
            "fetch order payments",
        )
        .await
    }

    #[instrument(skip(self))]
    async fn fetch_payment(&self, payment_id: &str) -> PaymentResult<GatewayPayment> {
        check_id("payment_id", payment_id)?;
        self.send(
            self.client.get(self.url(&format!("payments/{}", payment_id))),
            "fetch payment",
        )
        .await
    }

    #[instrument(skip(self, params), fields(amount = params.amount))]
    async fn capture_payment(
        &self,
        payment_id: &str,
        params: &CaptureParams,
    ) -> PaymentResult<GatewayPayment> {
        check_id("payment_id", payment_id)?;

        let payment: GatewayPayment = self
            .send(
                self.client
                    .post(self.url(&format!("payments/{}/capture", payment_id)))
                    .json(params),
                "capture payment",
            )
            .await?;

        info!("Captured payment: id={}, status={}", payment.id, payment.status);
        Ok(payment)
    }

    #[instrument(skip(self, request), fields(amount = ?request.amount))]
    async fn refund_payment(
        &self,
        payment_id: &str,
        request: &RefundRequest,
    ) -> PaymentResult<GatewayRefund> {
        check_id("payment_id", payment_id)?;

        let refund: GatewayRefund = self
            .send(
                self.client
                    .post(self.url(&format!("payments/{}/refund", payment_id)))
                    .json(request),
                "refund payment",
            )
            .await?;

        info!(
            "Created refund: id={}, payment={}, amount={}, status={}",
            refund.id, refund.payment_id, refund.amount, refund.status
        );
        Ok(refund)
    }

    fn provider_name(&self) -> &'static str {
        "razorpay"
    }

    fn key_id(&self) -> &str {
        &self.config.key_id
    }

    fn is_test_mode(&self) -> bool {
        self.config.is_test_mode()
    }
}

// =============================================================================
// Razorpay API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct RazorpayErrorResponse {
    error: RazorpayError,
}

#[derive(Debug, Deserialize)]
struct RazorpayError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    field: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pay_core::{Currency, RefundSpeed};
    use serde_json::json;
    use std::collections::HashMap;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // base64("rzp_test_key:key_secret")
    const BASIC_AUTH: &str = "Basic cnpwX3Rlc3Rfa2V5OmtleV9zZWNyZXQ=";

    fn client_for(server: &MockServer) -> RazorpayClient {
        let config = RazorpayConfig::new("rzp_test_key", "key_secret").with_api_base_url(server.uri());
        RazorpayClient::new(config).unwrap()
    }

    fn order_json(id: &str, amount: i64) -> serde_json::Value {
        json!({
            "id": id,
            "entity": "order",
            "amount": amount,
            "amount_paid": 0,
            "amount_due": amount,
            "currency": "INR",
            "receipt": "rcpt_1",
            "status": "created",
            "attempts": 0,
            "notes": [],
            "created_at": 1700000000
        })
    }

    #[test]
    fn test_check_id() {
        assert!(check_id("payment_id", "pay_29QQoUBi66xm2f").is_ok());
        assert!(check_id("payment_id", "").is_err());
        assert!(check_id("payment_id", "../orders").is_err());
        assert!(check_id("payment_id", "pay_1?expand=card").is_err());
    }

    #[test]
    fn test_parse_error_response() {
        let err = parse_error_response(
            400,
            r#"{"error":{"code":"BAD_REQUEST_ERROR","description":"The amount must be atleast INR 1.00","source":"business","field":"amount"}}"#,
        );
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.code(), Some("BAD_REQUEST_ERROR"));
        assert_eq!(err.field(), Some("amount"));
        assert_eq!(err.public_message(), "The amount must be atleast INR 1.00");

        let err = parse_error_response(502, "<html>Bad Gateway</html>");
        assert_eq!(err.status_code(), 502);
        assert_eq!(err.code(), None);
    }

    #[tokio::test]
    async fn test_create_order() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .and(header("authorization", BASIC_AUTH))
            .and(body_json(json!({
                "amount": 10000,
                "currency": "INR",
                "receipt": "rcpt_1",
                "notes": { "source": "test" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(order_json("order_1", 10000)))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let params = OrderParams {
            amount: 10000,
            currency: Currency::INR,
            receipt: "rcpt_1".to_string(),
            notes: HashMap::from([("source".to_string(), "test".to_string())]),
        };

        let order = client.create_order(&params).await.unwrap();
        assert_eq!(order.id, "order_1");
        assert_eq!(order.status, "created");
        assert_eq!(order.amount, 10000);
    }

    #[tokio::test]
    async fn test_gateway_error_is_relayed() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/payments/pay_missing"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "code": "BAD_REQUEST_ERROR",
                    "description": "The id provided does not exist",
                    "source": "business",
                    "reason": "input_validation_failed",
                    "metadata": {}
                }
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch_payment("pay_missing").await.unwrap_err();
        match err {
            PaymentError::Gateway {
                status,
                code,
                description,
                ..
            } => {
                assert_eq!(status, 400);
                assert_eq!(code.as_deref(), Some("BAD_REQUEST_ERROR"));
                assert_eq!(description, "The id provided does not exist");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_id_never_reaches_gateway() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = client_for(&server).fetch_order("order/../x").await.unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_refund_and_capture() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/payments/pay_1/refund"))
            .and(body_json(json!({ "amount": 5000, "speed": "optimum" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "rfnd_1",
                "entity": "refund",
                "amount": 5000,
                "currency": "INR",
                "payment_id": "pay_1",
                "notes": [],
                "receipt": null,
                "status": "processed",
                "speed_requested": "optimum",
                "created_at": 1700000100
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1/payments/pay_1/capture"))
            .and(body_json(json!({ "amount": 5000, "currency": "INR" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "pay_1",
                "entity": "payment",
                "amount": 5000,
                "currency": "INR",
                "status": "captured",
                "captured": true,
                "notes": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);

        let refund = client
            .refund_payment(
                "pay_1",
                &RefundRequest {
                    amount: Some(5000),
                    speed: RefundSpeed::Optimum,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(refund.id, "rfnd_1");
        assert_eq!(refund.status, "processed");

        let payment = client
            .capture_payment(
                "pay_1",
                &CaptureParams {
                    amount: 5000,
                    currency: Currency::INR,
                },
            )
            .await
            .unwrap();
        assert!(payment.is_captured());
    }

    #[tokio::test]
    async fn test_network_error() {
        // Nothing listens on the discard port
        let config = RazorpayConfig::new("rzp_test_key", "key_secret")
            .with_api_base_url("http://127.0.0.1:9");
        let client = RazorpayClient::new(config).unwrap();

        let err = client.fetch_payment("pay_1").await.unwrap_err();
        assert!(matches!(err, PaymentError::NetworkError(_)));
        assert_eq!(err.status_code(), 503);
    }
}
