//! # Payment Error Types
//!
//! Typed error handling for the razor-cart payment adapter.
//! All payment operations return `Result<T, PaymentError>`.

use thiserror::Error;

/// Core error type for all payment operations
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A specific request field failed validation
    #[error("Invalid {field}: {message}")]
    InvalidField { field: String, message: String },

    /// Required request fields were absent or empty
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    /// Amount below the minimum or otherwise unusable
    #[error("Invalid amount: {message}")]
    InvalidAmount { message: String },

    /// Currency not supported
    #[error("Unsupported currency: {currency}")]
    UnsupportedCurrency { currency: String },

    /// Client-submitted payment signature did not match
    #[error("Payment signature verification failed")]
    SignatureMismatch,

    /// Webhook secret is not configured on this server
    #[error("Webhook secret not configured")]
    WebhookSecretMissing,

    /// Webhook signature verification failed
    #[error("Webhook verification failed: {0}")]
    WebhookVerificationFailed(String),

    /// Webhook payload parsing error
    #[error("Webhook parse error: {0}")]
    WebhookParseError(String),

    /// Error response relayed from the payment gateway
    #[error("Gateway error ({status}): {description}")]
    Gateway {
        status: u16,
        code: Option<String>,
        description: String,
        field: Option<String>,
    },

    /// Network/HTTP error communicating with an upstream service
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Record not found
    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: String },

    /// Backend platform storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PaymentError {
    /// Shorthand for a field validation error
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        PaymentError::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns true if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::NetworkError(_) | PaymentError::Storage(_) => true,
            PaymentError::Gateway { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            PaymentError::Configuration(_) => 500,
            PaymentError::InvalidRequest(_) => 400,
            PaymentError::InvalidField { .. } => 400,
            PaymentError::MissingFields(_) => 400,
            PaymentError::InvalidAmount { .. } => 400,
            PaymentError::UnsupportedCurrency { .. } => 400,
            PaymentError::SignatureMismatch => 400,
            PaymentError::WebhookSecretMissing => 400,
            PaymentError::WebhookVerificationFailed(_) => 401,
            PaymentError::WebhookParseError(_) => 400,
            PaymentError::Gateway { status, .. } if (400..=599).contains(status) => *status,
            PaymentError::Gateway { .. } => 500,
            PaymentError::NetworkError(_) => 503,
            PaymentError::NotFound { .. } => 404,
            PaymentError::Storage(_) => 500,
            PaymentError::Internal(_) => 500,
            PaymentError::Serialization(_) => 500,
        }
    }

    /// Machine-readable error code (gateway codes are relayed as-is)
    pub fn code(&self) -> Option<&str> {
        match self {
            PaymentError::Gateway { code, .. } => code.as_deref(),
            PaymentError::Configuration(_) => Some("CONFIGURATION_ERROR"),
            PaymentError::InvalidRequest(_) | PaymentError::InvalidField { .. } => {
                Some("INVALID_REQUEST")
            }
            PaymentError::MissingFields(_) => Some("MISSING_FIELDS"),
            PaymentError::InvalidAmount { .. } => Some("INVALID_AMOUNT"),
            PaymentError::UnsupportedCurrency { .. } => Some("UNSUPPORTED_CURRENCY"),
            PaymentError::SignatureMismatch => Some("SIGNATURE_MISMATCH"),
            PaymentError::WebhookSecretMissing => Some("WEBHOOK_SECRET_MISSING"),
            PaymentError::WebhookVerificationFailed(_) => Some("INVALID_SIGNATURE"),
            PaymentError::WebhookParseError(_) => Some("INVALID_PAYLOAD"),
            PaymentError::NotFound { .. } => Some("NOT_FOUND"),
            PaymentError::NetworkError(_) => Some("UPSTREAM_UNAVAILABLE"),
            PaymentError::Storage(_)
            | PaymentError::Internal(_)
            | PaymentError::Serialization(_) => None,
        }
    }

    /// The offending request field, when known
    pub fn field(&self) -> Option<&str> {
        match self {
            PaymentError::InvalidField { field, .. } => Some(field),
            PaymentError::InvalidAmount { .. } => Some("amount"),
            PaymentError::UnsupportedCurrency { .. } => Some("currency"),
            PaymentError::Gateway { field, .. } => field.as_deref(),
            _ => None,
        }
    }

    /// Client-facing message. Gateway errors surface the gateway's description.
    pub fn public_message(&self) -> String {
        match self {
            PaymentError::Gateway { description, .. } => description.clone(),
            PaymentError::Storage(_) | PaymentError::Internal(_) | PaymentError::Serialization(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Result type alias for payment operations
pub type PaymentResult<T> = Result<T, PaymentError>;
