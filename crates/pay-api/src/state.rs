//! # Application State
//!
//! Shared state for the Axum application.
//! Contains the payment service, order and promo stores, and configuration.

use crate::backend::{SupabaseConfig, SupabaseStore};
use crate::bookkeeping::OrderBookkeeper;
use pay_core::{
    BoxedOrderStore, BoxedPromoStore, Currency, InMemoryOrderStore, InMemoryPromoStore,
    PaymentError, PaymentResult, PromoCatalog,
};
use pay_razorpay::{PaymentService, RazorpayConfig, WebhookHandler};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Environment (development, staging, production)
    pub environment: String,
    /// CORS origins; `*` allows any
    pub allowed_origins: Vec<String>,
    /// Currency used when a request does not name one
    pub default_currency: Currency,
    /// Backend platform, when configured
    pub supabase: Option<SupabaseConfig>,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> PaymentResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> PaymentResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default_currency = match lookup("DEFAULT_CURRENCY") {
            Some(code) => code.parse().map_err(|_| {
                PaymentError::Configuration(format!("Unsupported DEFAULT_CURRENCY: {}", code))
            })?,
            None => Currency::INR,
        };

        let allowed_origins = lookup("ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string())
            .split(',')
            .map(|o| o.trim().trim_end_matches('/').to_string())
            .filter(|o| !o.is_empty())
            .collect();

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            environment: lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            allowed_origins,
            default_currency,
            supabase: SupabaseConfig::from_lookup(&lookup)?,
        })
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid socket address {}:{}: {}", self.host, self.port, e))
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Gateway operations and signature checks
    pub service: Arc<PaymentService>,
    /// Recorded storefront orders
    pub orders: BoxedOrderStore,
    /// Promo code rows
    pub promos: BoxedPromoStore,
    /// Receives verified webhook events
    pub webhook_handler: Arc<dyn WebhookHandler>,
    /// Application config
    pub config: AppConfig,
}

impl AppState {
    /// Build the state from environment variables
    pub fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let razorpay = RazorpayConfig::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize Razorpay: {}", e))?;
        info!(
            "Razorpay key {} ({} mode)",
            razorpay.key_id,
            razorpay.environment()
        );
        let service = PaymentService::from_config(razorpay)?;

        let (orders, promos) = match &config.supabase {
            Some(supabase) => {
                info!("Using backend platform at {}", supabase.url);
                let store = Arc::new(SupabaseStore::new(supabase.clone())?);
                let orders: BoxedOrderStore = store.clone();
                let promos: BoxedPromoStore = store;
                (orders, promos)
            }
            None => {
                warn!("SUPABASE_URL not set, orders and promo codes are kept in memory");
                let catalog = load_promo_catalog()?;
                let orders: BoxedOrderStore = Arc::new(InMemoryOrderStore::new());
                let promos: BoxedPromoStore = Arc::new(InMemoryPromoStore::from_catalog(catalog));
                (orders, promos)
            }
        };

        Ok(Self::with_parts(config, service, orders, promos))
    }

    /// Assemble state from explicit parts; webhook events update `orders`
    pub fn with_parts(
        config: AppConfig,
        service: PaymentService,
        orders: BoxedOrderStore,
        promos: BoxedPromoStore,
    ) -> Self {
        let webhook_handler = Arc::new(OrderBookkeeper::new(orders.clone()));
        Self {
            service: Arc::new(service),
            orders,
            promos,
            webhook_handler,
            config,
        }
    }
}

/// Load promo codes from config file
fn load_promo_catalog() -> anyhow::Result<PromoCatalog> {
    let config_paths = [
        "config/promo_codes.toml",
        "../config/promo_codes.toml",
        "../../config/promo_codes.toml",
    ];

    for path in config_paths {
        if let Ok(content) = std::fs::read_to_string(path) {
            let catalog = PromoCatalog::from_toml(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path, e))?;
            info!("Loaded {} promo codes from {}", catalog.promo_codes.len(), path);
            return Ok(catalog);
        }
    }

    warn!("No promo code file found, promo validation will reject every code");
    Ok(PromoCatalog::default())
}
