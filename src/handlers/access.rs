use axum::Extension;
use serde::Serialize;

use crate::auth::VerifiedToken;
use crate::middleware::{ApiResponse, ApiResult, AuthorizedCaller};

#[derive(Debug, Serialize)]
pub struct AccessGranted {
    pub message: &'static str,
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// GET /private - any verified token
pub async fn private(Extension(token): Extension<VerifiedToken>) -> ApiResult<AccessGranted> {
    Ok(ApiResponse::success(AccessGranted {
        message: "access allow",
        subject: token.subject().map(str::to_string),
        username: token
            .payload()
            .get("preferred_username")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        role: None,
    }))
}

/// GET /admin - realm role `admin`
pub async fn admin(Extension(caller): Extension<AuthorizedCaller>) -> ApiResult<AccessGranted> {
    Ok(granted("access allow admin", caller))
}

/// GET /user - realm role `user`
pub async fn user(Extension(caller): Extension<AuthorizedCaller>) -> ApiResult<AccessGranted> {
    Ok(granted("access allow user", caller))
}

fn granted(message: &'static str, caller: AuthorizedCaller) -> ApiResponse<AccessGranted> {
    ApiResponse::success(AccessGranted {
        message,
        subject: caller.subject,
        username: caller.username,
        role: Some(caller.role),
    })
}
