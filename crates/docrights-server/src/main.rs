//! Docrights Server
//!
//! # Usage
//!
//! ```bash
//! # Start on default port 8080, configuration from DOCRIGHTS_* variables
//! docrights-server
//!
//! # Custom port, require production credentials
//! docrights-server --port 9000 --production
//! ```

use clap::Parser;
use docrights_server::{build_router, service_from_config, AppState};
use docrights_service::ServiceConfig;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Document protection service
#[derive(Parser, Debug)]
#[command(name = "docrights-server")]
#[command(about = "Document labeling and protection service")]
#[command(version)]
struct Args {
    /// HTTP server port
    #[arg(short, long, default_value = "8080", env = "DOCRIGHTS_PORT")]
    port: u16,

    /// Bind address
    #[arg(short, long, default_value = "0.0.0.0", env = "DOCRIGHTS_BIND")]
    bind: String,

    /// Log level when RUST_LOG is not set (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Require complete app registration credentials
    #[arg(long)]
    production: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = ServiceConfig::from_env()?;
    if args.production {
        config.validate_for_production()?;
    } else {
        config.validate()?;
    }

    info!("Docrights Server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        input = %config.staging.input_dir.display(),
        protected = %config.staging.protected_dir.display(),
        unprotected = %config.staging.unprotected_dir.display(),
        label = %config.engine.label_to_apply,
        notifications = config.notification.enabled,
        "Configuration loaded"
    );

    let state = Arc::new(AppState::new(service_from_config(config)?));
    let app = build_router(state);

    let addr = format!("{}:{}", args.bind, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("HTTP server: http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
