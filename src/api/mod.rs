//! Route table and shared application state.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue},
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::auth::TokenVerifier;
use crate::config::AppConfig;
use crate::handlers;
use crate::middleware::Pipeline;
use crate::store::UserStore;
use crate::uploads::AvatarStorage;

const SERVER_HEADER: &str = concat!("user-api-rust/", env!("CARGO_PKG_VERSION"));

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: UserStore,
    pub avatars: AvatarStorage,
    /// `None` when OIDC is disabled; protected routes then answer 503
    pub verifier: Option<Arc<dyn TokenVerifier>>,
}

impl AppState {
    pub fn new(config: AppConfig, users: UserStore, verifier: Option<Arc<dyn TokenVerifier>>) -> Self {
        let avatars = AvatarStorage::new(&config.server.upload_dir);
        Self {
            config: Arc::new(config),
            users,
            avatars,
            verifier,
        }
    }
}

pub fn app(state: AppState) -> Router {
    let config = state.config.clone();

    let router = Router::new()
        // Public
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health))
        .merge(user_routes(&state))
        .merge(access_routes(&state))
        .layer(DefaultBodyLimit::max(config.server.max_upload_bytes))
        .with_state(state);

    let router = match cors_layer(&config) {
        Some(cors) => router.layer(cors),
        None => router,
    };

    let router = router.layer(SetResponseHeaderLayer::overriding(
        header::SERVER,
        HeaderValue::from_static(SERVER_HEADER),
    ));

    let router = if config.api.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    };

    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(PropagateRequestIdLayer::x_request_id()),
    )
}

fn user_routes(state: &AppState) -> Router<AppState> {
    use handlers::users;

    let router = Router::new()
        .route("/users", get(users::list).post(users::create))
        .route("/users/filter", get(users::filter))
        .route("/users/:id", get(users::get).put(users::update_with_avatar));

    Pipeline::basic_auth(state.config.security.basic_auth.clone()).apply(router, state)
}

fn access_routes(state: &AppState) -> Router<AppState> {
    use handlers::access;

    let private = Pipeline::authenticated().apply(
        Router::new().route("/private", get(access::private)),
        state,
    );
    let admin = Pipeline::authenticated().require_role("admin").apply(
        Router::new().route("/admin", get(access::admin)),
        state,
    );
    let user = Pipeline::authenticated().require_role("user").apply(
        Router::new().route("/user", get(access::user)),
        state,
    );

    private.merge(admin).merge(user)
}

fn cors_layer(config: &AppConfig) -> Option<CorsLayer> {
    if !config.security.enable_cors {
        return None;
    }
    if config.security.cors_origins.is_empty() {
        return Some(CorsLayer::permissive());
    }

    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any),
    )
}
