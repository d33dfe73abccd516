//! # razor-cart
//!
//! Razorpay payment adapter for the storefront.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export RAZORPAY_KEY_ID=rzp_test_...
//! export RAZORPAY_KEY_SECRET=...
//! export RAZORPAY_WEBHOOK_SECRET=...
//!
//! # Run the server
//! razor-cart
//! ```

use pay_api::{routes, state::AppState};
use pay_razorpay::REQUIRED_WEBHOOK_EVENTS;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    tracing_subscriber::registry()
        .with(json_logs.then(|| fmt::layer().json()))
        .with((!json_logs).then(fmt::layer))
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    // Print banner
    if !json_logs {
        print_banner();
    }

    // Initialize application state
    let state = AppState::new()?;

    let addr = state.config.socket_addr()?;
    let is_prod = state.config.is_production();

    info!("Environment: {}", state.config.environment);
    info!(
        "Payment gateway: {} ({} mode)",
        state.service.gateway().provider_name(),
        if state.service.gateway().is_test_mode() { "test" } else { "live" }
    );
    info!("Allowed origins: {:?}", state.config.allowed_origins);

    if !state.service.webhook_configured() {
        warn!(
            "RAZORPAY_WEBHOOK_SECRET not set; webhooks will be rejected. Enable these events: {}",
            REQUIRED_WEBHOOK_EVENTS.join(", ")
        );
    }

    // Create router
    let app = routes::create_router(state);

    // Start server
    info!("razor-cart starting on http://{}", addr);

    if !is_prod {
        info!("Health: http://{}/health", addr);
        info!("Create order: POST http://{}/api/razorpay/create-order", addr);
        info!("Webhook: POST http://{}/api/webhooks/razorpay", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("razor-cart stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}

fn print_banner() {
    println!(
        r#"
  razor-cart
  ━━━━━━━━━━━━━━━━━━━━━━━
  Razorpay payment adapter
  Version: {}

"#,
        env!("CARGO_PKG_VERSION")
    );
}
