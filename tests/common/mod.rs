#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::{routing::get, Json, Router};
use jsonwebtoken::{encode, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;

use user_api_rust::auth::{OidcVerifier, TokenVerifier};
use user_api_rust::config::AppConfig;
use user_api_rust::store::UserStore;
use user_api_rust::{app, AppState};

pub const CLIENT_ID: &str = "api-secure";
pub const KEY_ID: &str = "test-key";
const SECRET: &[u8] = b"secret";

/// Server running in-process on an ephemeral port
pub struct TestApp {
    pub base_url: String,
    pub client: reqwest::Client,
    pub idp: Option<MockIdp>,
    uploads: TempDir,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn upload_dir(&self) -> &Path {
        self.uploads.path()
    }

    /// Mint a token the mock identity provider would have issued
    pub fn token(&self, claims: Value) -> String {
        let idp = self.idp.as_ref().expect("app was started without an identity provider");
        idp.mint(claims)
    }
}

/// Identity provider serving discovery metadata and an HS256 key set
pub struct MockIdp {
    pub issuer: String,
    keys: Arc<RwLock<Value>>,
}

impl MockIdp {
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let issuer = format!("http://{}/realms/test", addr);

        let metadata = json!({
            "issuer": issuer,
            "jwks_uri": format!("{}/protocol/openid-connect/certs", issuer),
        });
        let keys = Arc::new(RwLock::new(json!({ "keys": [oct_key(KEY_ID)] })));
        let served = keys.clone();

        let router = Router::new()
            .route(
                "/realms/test/.well-known/openid-configuration",
                get(move || async move { Json(metadata) }),
            )
            .route(
                "/realms/test/protocol/openid-connect/certs",
                get(move || {
                    let set = served.read().map(|set| set.clone()).unwrap_or(Value::Null);
                    async move { Json(set) }
                }),
            );

        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Ok(Self { issuer, keys })
    }

    /// Publish an additional signing key, as a provider does when rotating
    pub fn publish_key(&self, kid: &str) {
        let mut keys = self.keys.write().expect("key set lock poisoned");
        if let Some(list) = keys["keys"].as_array_mut() {
            list.push(oct_key(kid));
        }
    }

    /// Sign `claims` after filling in iss, aud and exp when absent
    pub fn mint(&self, claims: Value) -> String {
        self.mint_with_kid(KEY_ID, claims)
    }

    pub fn mint_with_kid(&self, kid: &str, mut claims: Value) -> String {
        let now = chrono::Utc::now().timestamp();
        let object = claims.as_object_mut().expect("claims must be a JSON object");
        object.entry("iss").or_insert_with(|| json!(self.issuer));
        object.entry("aud").or_insert_with(|| json!(CLIENT_ID));
        object.entry("iat").or_insert_with(|| json!(now));
        object.entry("exp").or_insert_with(|| json!(now + 300));

        let mut header = Header::new(jsonwebtoken::Algorithm::HS256);
        header.kid = Some(kid.to_string());
        encode(&header, &claims, &EncodingKey::from_secret(SECRET)).expect("failed to sign test token")
    }
}

fn oct_key(kid: &str) -> Value {
    json!({ "kty": "oct", "kid": kid, "alg": "HS256", "k": "c2VjcmV0" })
}

pub fn test_config(upload_dir: &Path) -> AppConfig {
    let mut config = AppConfig::development();
    config.server.port = 0;
    config.server.upload_dir = upload_dir.to_string_lossy().into_owned();
    config.server.max_upload_bytes = 1024 * 1024;
    config.oidc.client_id = CLIENT_ID.to_string();
    config.oidc.algorithms = vec!["HS256".to_string()];
    config.api.enable_request_logging = false;
    config.security.basic_auth = None;
    config
}

/// Seeded store, mock IdP, default test config
pub async fn spawn_app() -> Result<TestApp> {
    spawn_app_with(|_| {}, true).await
}

pub async fn spawn_app_with(configure: impl FnOnce(&mut AppConfig), with_idp: bool) -> Result<TestApp> {
    let uploads = tempfile::tempdir()?;
    let mut config = test_config(uploads.path());
    configure(&mut config);

    let http = reqwest::Client::builder().no_proxy().build()?;

    let (idp, verifier) = if with_idp {
        let idp = MockIdp::start().await?;
        let verifier = OidcVerifier::discover(http.clone(), &idp.issuer, CLIENT_ID, &config.oidc.algorithms)
            .await
            .context("discovery against mock IdP failed")?;
        let verifier: Arc<dyn TokenVerifier> = Arc::new(verifier);
        (Some(idp), Some(verifier))
    } else {
        (None, None)
    };

    let state = AppState::new(config, UserStore::seeded(), verifier);

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app(state)).await;
    });

    Ok(TestApp {
        base_url: format!("http://{}", addr),
        client: http,
        idp,
        uploads,
    })
}

/// The compiled server binary, started with OIDC disabled
pub struct SpawnedServer {
    pub base_url: String,
    child: Child,
    _uploads: TempDir,
}

impl SpawnedServer {
    pub fn start() -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let uploads = tempfile::tempdir()?;

        let child = Command::new(env!("CARGO_BIN_EXE_user-api-rust"))
            .env("USER_API_PORT", port.to_string())
            .env("OIDC_ENABLED", "false")
            .env("SERVER_UPLOAD_DIR", uploads.path())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .context("failed to spawn server binary")?;

        Ok(Self {
            base_url: format!("http://127.0.0.1:{}", port),
            child,
            _uploads: uploads,
        })
    }

    pub async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::builder().no_proxy().build()?;
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

impl Drop for SpawnedServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub fn files_in(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
        .unwrap_or_default()
}
