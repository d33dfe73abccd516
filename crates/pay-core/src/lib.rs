//! # pay-core
//!
//! Core types and traits for the razor-cart payment adapter.
//!
//! This crate provides:
//! - `PaymentGateway` trait for the payment provider's REST API
//! - `PaymentIntent`, `PaymentConfirmation` and the gateway's order / payment /
//!   refund entities
//! - `OrderStore` and `PromoStore` traits with in-memory implementations
//! - Promo code evaluation
//! - `PaymentError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use pay_core::{Currency, PaymentIntent};
//!
//! // ₹100.00 expressed in paise
//! let intent = PaymentIntent::new(10_000, Currency::INR).with_note("cart_id", "c_42");
//! intent.validate()?;
//!
//! let order = service.create_order(intent).await?;
//! // Hand order.id and the public key id to the hosted checkout
//! ```

pub mod error;
pub mod gateway;
pub mod money;
pub mod order;
pub mod payment;
pub mod promo;

// Re-exports for convenience
pub use error::{PaymentError, PaymentResult};
pub use gateway::{BoxedPaymentGateway, PaymentGateway};
pub use money::{Currency, Money};
pub use order::{
    BoxedOrderStore, InMemoryOrderStore, NewOrder, OrderItem, OrderLookup, OrderRecord,
    OrderStatus, OrderStore, OrderUpdate, PaymentStatus, RecordOutcome, RefundEntry,
    RefundStatus,
};
pub use payment::{
    generate_receipt, CaptureParams, GatewayOrder, GatewayPayment, GatewayRefund, Notes,
    OrderParams, PaymentCollection, PaymentConfirmation, PaymentIntent, PaymentVerification,
    RefundRequest, RefundSpeed, MAX_NOTES, MAX_RECEIPT_LEN, MIN_AMOUNT,
};
pub use promo::{
    normalize_code, validate_promo, BoxedPromoStore, DiscountType, InMemoryPromoStore,
    PromoCatalog, PromoCode, PromoDiscount, PromoRejection, PromoStore,
};
