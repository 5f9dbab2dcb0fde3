use axum::extract::State;
use serde::Serialize;

use crate::api::AppState;
use crate::middleware::{ApiResponse, ApiResult};

#[derive(Debug, Serialize)]
pub struct Greeting {
    pub message: &'static str,
    pub name: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub users: usize,
    pub oidc: OidcStatus,
}

#[derive(Debug, Serialize)]
pub struct OidcStatus {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

/// GET / - greeting
pub async fn root() -> ApiResult<Greeting> {
    Ok(ApiResponse::success(Greeting {
        message: "Hello, World!",
        name: "User API (Rust)",
        version: env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /health - liveness plus a summary of what is wired up
pub async fn health(State(state): State<AppState>) -> ApiResult<Health> {
    let oidc = OidcStatus {
        enabled: state.verifier.is_some(),
        issuer: state.verifier.as_ref().map(|v| v.issuer().to_string()),
    };

    Ok(ApiResponse::success(Health {
        status: "ok",
        timestamp: chrono::Utc::now(),
        users: state.users.len().await,
        oidc,
    }))
}
