//! Bucket Service - Subscription-Gated Shopping Cart Backend
//!
//! Serves the cart operations over HTTP/JSON, backed by PostgreSQL and the
//! subscription and catalog services.

use std::sync::Arc;

use clap::Parser;

use bucket_service::clients::{build_http, HttpCatalogClient, HttpSubscriptionClient};
use bucket_service::storage::PostgresBucketStorage;
use bucket_service::{transport, Buckets, Config};

/// Application version
const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter().into()),
        )
        .init();

    config.validate()?;

    tracing::info!("Bucket service v{}", APP_VERSION);

    let storage = Arc::new(PostgresBucketStorage::connect(&config.storage()).await?);
    tracing::info!("Storage ready");

    let clients = config.clients();
    let http = build_http(&clients)?;
    let subscriptions = Arc::new(HttpSubscriptionClient::new(
        clients.subscription_url.clone(),
        http.clone(),
    ));
    let catalog = Arc::new(HttpCatalogClient::new(clients.catalog_url.clone(), http));

    let buckets = Arc::new(Buckets::new(storage.clone(), subscriptions, catalog));
    let app = transport::router(buckets);

    tracing::info!("Starting HTTP server on {}", config.bind);
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    storage.close().await;
    tracing::info!("Storage closed");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
