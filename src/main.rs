use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;
use user_api_rust::auth::{OidcVerifier, TokenVerifier};
use user_api_rust::config::{self, AppConfig};
use user_api_rust::store::UserStore;
use user_api_rust::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up OIDC_ISSUER_URL, USER_API_PORT, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("user_api_rust=info,tower_http=info")),
        )
        .init();

    let config = config::config().clone();
    tracing::info!("Starting User API in {:?} mode", config.environment);

    let verifier = build_verifier(&config).await?;
    let port = config.server.port;
    let state = AppState::new(config, UserStore::seeded(), verifier);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {}: {}", bind_addr, e))?;

    tracing::info!("User API listening on http://{}", bind_addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Discover the identity provider; failing discovery aborts startup
async fn build_verifier(config: &AppConfig) -> anyhow::Result<Option<Arc<dyn TokenVerifier>>> {
    if !config.oidc.enabled {
        tracing::warn!("OIDC disabled; /private, /admin and /user will answer 503");
        return Ok(None);
    }

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.oidc.http_timeout_secs))
        .build()?;

    let verifier = OidcVerifier::discover(
        http,
        &config.oidc.issuer_url,
        &config.oidc.client_id,
        &config.oidc.algorithms,
    )
    .await
    .map_err(|e| anyhow::anyhow!("failed to get provider: {}", e))?;

    let verifier: Arc<dyn TokenVerifier> = Arc::new(verifier);
    Ok(Some(verifier))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
