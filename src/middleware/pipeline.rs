//! Ordered request stages, composed per route group at startup.
//!
//! Stages communicate through request extensions:
//!
//! | stage            | needs              | adds               |
//! |------------------|--------------------|--------------------|
//! | `basic-auth`     | Basic header       | -                  |
//! | `bearer-token`   | Bearer header      | `BearerCredential` |
//! | `verify-token`   | `BearerCredential` | `VerifiedToken`    |
//! | `require-role:R` | `VerifiedToken`    | `AuthorizedCaller` |
//!
//! The first stage in a [`Pipeline`] is the first to see the request.

use std::fmt;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    Router,
};

use crate::api::AppState;
use crate::config::BasicAuthConfig;

use super::auth::{
    basic_auth_middleware, bearer_token_middleware, require_role_middleware, verify_token_middleware,
    RequiredRole,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    BasicAuth(BasicAuthConfig),
    BearerToken,
    VerifyToken,
    RequireRole(String),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::BasicAuth(_) => write!(f, "basic-auth"),
            Stage::BearerToken => write!(f, "bearer-token"),
            Stage::VerifyToken => write!(f, "verify-token"),
            Stage::RequireRole(role) => write!(f, "require-role:{}", role),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// bearer-token → verify-token
    pub fn authenticated() -> Self {
        Self::new().then(Stage::BearerToken).then(Stage::VerifyToken)
    }

    /// basic-auth when credentials are configured, otherwise no stages
    pub fn basic_auth(credentials: Option<BasicAuthConfig>) -> Self {
        match credentials {
            Some(credentials) => Self::new().then(Stage::BasicAuth(credentials)),
            None => Self::new(),
        }
    }

    pub fn then(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn require_role(self, role: impl Into<String>) -> Self {
        self.then(Stage::RequireRole(role.into()))
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn names(&self) -> Vec<String> {
        self.stages.iter().map(Stage::to_string).collect()
    }

    /// Wrap every route of `router` in the stages. The router must already hold its routes.
    pub fn apply(&self, router: Router<AppState>, state: &AppState) -> Router<AppState> {
        if self.stages.is_empty() {
            return router;
        }
        tracing::debug!("Route group pipeline: {}", self.names().join(" -> "));

        // Each route_layer wraps the ones added before it, so the first stage goes on last
        self.stages.iter().rev().fold(router, |router, stage| match stage {
            Stage::BasicAuth(credentials) => {
                router.route_layer(from_fn_with_state(credentials.clone(), basic_auth_middleware))
            }
            Stage::BearerToken => router.route_layer(from_fn(bearer_token_middleware)),
            Stage::VerifyToken => {
                router.route_layer(from_fn_with_state(state.clone(), verify_token_middleware))
            }
            Stage::RequireRole(role) => router.route_layer(from_fn_with_state(
                RequiredRole(role.clone()),
                require_role_middleware,
            )),
        })
    }
}
