use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::api::AppState;
use crate::auth::basic::BasicCredentials;
use crate::auth::{authorize_role, VerifiedToken};
use crate::config::BasicAuthConfig;
use crate::error::ApiError;

/// Raw bearer token taken from the Authorization header
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BearerCredential(pub String);

/// Role a route group requires; the state of the role stage
#[derive(Clone, Debug)]
pub struct RequiredRole(pub String);

/// Caller that passed the role stage
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizedCaller {
    pub subject: Option<String>,
    pub username: Option<String>,
    /// Role that was checked
    pub role: String,
    pub roles: Vec<String>,
}

/// Bearer stage: requires `Authorization: Bearer <token>` and stores the token
pub async fn bearer_token_middleware(mut request: Request, next: Next) -> Result<Response, Response> {
    let token = extract_bearer_token(request.headers())
        .map_err(|msg| challenge(ApiError::unauthorized(msg), "Bearer"))?;

    request.extensions_mut().insert(BearerCredential(token));
    Ok(next.run(request).await)
}

/// Verification stage: turns the bearer credential into a [`VerifiedToken`]
pub async fn verify_token_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let verifier = state.verifier.clone().ok_or_else(|| {
        tracing::error!("Token verification requested but no OIDC verifier is configured");
        ApiError::service_unavailable("token verification is not configured").into_response()
    })?;

    let BearerCredential(token) = request
        .extensions()
        .get::<BearerCredential>()
        .cloned()
        .ok_or_else(|| challenge(ApiError::unauthorized("missing authorization header"), "Bearer"))?;

    let verified = verifier
        .verify(&token)
        .await
        .map_err(|e| challenge(ApiError::from(e), "Bearer"))?;

    tracing::debug!(
        "Token verified for subject {:?} (issuer {})",
        verified.subject(),
        verifier.issuer()
    );

    request.extensions_mut().insert(verified);
    Ok(next.run(request).await)
}

/// Role stage: lets the request through only if the verified claims carry the role
pub async fn require_role_middleware(
    State(RequiredRole(role)): State<RequiredRole>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .extensions()
        .get::<VerifiedToken>()
        .ok_or_else(|| ApiError::unauthorized("invalid token claims"))?;

    let subject = token.subject().map(str::to_string);
    let claims = authorize_role(token, &role).map_err(|e| {
        tracing::warn!("Role check '{}' failed for subject {:?}: {}", role, subject, e);
        ApiError::from(e)
    })?;

    let caller = AuthorizedCaller {
        subject: claims.sub.clone(),
        username: claims.preferred_username.clone(),
        roles: claims.realm_roles().map(<[String]>::to_vec).unwrap_or_default(),
        role,
    };

    tracing::debug!("Role '{}' granted to {:?}", caller.role, caller.subject);
    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

/// Basic auth stage for the demo credentials
pub async fn basic_auth_middleware(
    State(expected): State<BasicAuthConfig>,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    let credentials = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(BasicCredentials::parse);

    match credentials {
        Some(creds) if creds.matches(&expected) => Ok(next.run(request).await),
        Some(creds) => {
            tracing::warn!("Basic auth rejected for user '{}'", creds.username);
            Err(challenge(ApiError::unauthorized("invalid credentials"), "Basic realm=\"Restricted\""))
        }
        None => Err(challenge(
            ApiError::unauthorized("missing basic credentials"),
            "Basic realm=\"Restricted\"",
        )),
    }
}

/// Extract the token from `Authorization: Bearer <token>`
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| "missing authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "invalid authorization header".to_string())?;

    let (scheme, token) = auth_str
        .split_once(' ')
        .ok_or_else(|| "authorization header must use the Bearer scheme".to_string())?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err("authorization header must use the Bearer scheme".to_string());
    }

    let token = token.trim();
    if token.is_empty() {
        return Err("empty bearer token".to_string());
    }
    Ok(token.to_string())
}

fn challenge(error: ApiError, scheme: &'static str) -> Response {
    let mut response = error.into_response();
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(scheme));
    response
}
