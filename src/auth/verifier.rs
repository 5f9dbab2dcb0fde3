//! Bearer token verification against an OpenID Connect provider.
//!
//! [`TokenVerifier`] is the seam the request pipeline depends on. [`OidcVerifier`]
//! implements it by discovering the provider's metadata, loading its published
//! JWKS and checking signature, issuer, audience and expiry with `jsonwebtoken`.
//! Verified tokens are never cached.

use std::str::FromStr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::RwLock;
use url::Url;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("OIDC discovery failed: {0}")]
    Discovery(String),

    #[error("failed to load JWKS: {0}")]
    KeySet(String),

    #[error("no signing key matches kid '{0}'")]
    UnknownKey(String),

    #[error("invalid token: {0}")]
    InvalidToken(String),
}

/// A token whose signature and standard claims have been checked.
/// Lives for a single request.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedToken {
    payload: Map<String, Value>,
}

impl VerifiedToken {
    pub fn new(payload: Map<String, Value>) -> Self {
        Self { payload }
    }

    pub fn subject(&self) -> Option<&str> {
        self.payload.get("sub").and_then(Value::as_str)
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedToken, VerifyError>;

    fn issuer(&self) -> &str;
}

/// Subset of the OpenID provider metadata document
#[derive(Debug, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub jwks_uri: String,
}

pub struct OidcVerifier {
    http: reqwest::Client,
    issuer: String,
    client_id: String,
    jwks_uri: Url,
    algorithms: Vec<Algorithm>,
    keys: RwLock<KeyCache>,
}

/// Minimum spacing between refetches triggered by an unknown `kid`
const REFETCH_COOLDOWN: Duration = Duration::from_secs(10);

struct KeyCache {
    set: JwkSet,
    refetched_at: Option<Instant>,
}

impl KeyCache {
    fn new(set: JwkSet) -> Self {
        Self {
            set,
            refetched_at: None,
        }
    }

    fn cooling_down(&self) -> bool {
        self.refetched_at
            .is_some_and(|at| at.elapsed() < REFETCH_COOLDOWN)
    }
}

impl OidcVerifier {
    /// Fetch `{issuer}/.well-known/openid-configuration` and the key set it points to
    pub async fn discover(
        http: reqwest::Client,
        issuer_url: &str,
        client_id: &str,
        algorithms: &[String],
    ) -> Result<Self, VerifyError> {
        let algorithms = parse_algorithms(algorithms)?;
        let configured = issuer_url.trim_end_matches('/');
        let discovery_url = Url::parse(&format!("{}/.well-known/openid-configuration", configured))
            .map_err(|e| VerifyError::Discovery(format!("invalid issuer URL '{}': {}", issuer_url, e)))?;

        tracing::info!("Discovering OIDC provider at {}", discovery_url);

        let metadata: ProviderMetadata = http
            .get(discovery_url.clone())
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(|e| VerifyError::Discovery(e.to_string()))?
            .json()
            .await
            .map_err(|e| VerifyError::Discovery(format!("malformed provider metadata: {}", e)))?;

        if metadata.issuer.trim_end_matches('/') != configured {
            return Err(VerifyError::Discovery(format!(
                "issuer mismatch: expected '{}', provider reports '{}'",
                configured, metadata.issuer
            )));
        }

        let jwks_uri = Url::parse(&metadata.jwks_uri)
            .map_err(|e| VerifyError::Discovery(format!("invalid jwks_uri '{}': {}", metadata.jwks_uri, e)))?;

        let keys = fetch_key_set(&http, &jwks_uri).await?;
        tracing::info!(
            "Loaded {} signing key(s) for issuer {}",
            keys.keys.len(),
            metadata.issuer
        );

        Ok(Self {
            http,
            issuer: metadata.issuer,
            client_id: client_id.to_string(),
            jwks_uri,
            algorithms,
            keys: RwLock::new(KeyCache::new(keys)),
        })
    }

    /// Build a verifier from an already known key set
    pub fn from_key_set(
        http: reqwest::Client,
        issuer: &str,
        client_id: &str,
        jwks_uri: Url,
        algorithms: &[String],
        keys: JwkSet,
    ) -> Result<Self, VerifyError> {
        Ok(Self {
            http,
            issuer: issuer.to_string(),
            client_id: client_id.to_string(),
            jwks_uri,
            algorithms: parse_algorithms(algorithms)?,
            keys: RwLock::new(KeyCache::new(keys)),
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    async fn decoding_key(&self, kid: Option<&str>) -> Result<DecodingKey, VerifyError> {
        let Some(kid) = kid else {
            let keys = self.keys.read().await;
            return match keys.set.keys.as_slice() {
                [only] => key_from_jwk(only),
                _ => Err(VerifyError::InvalidToken(
                    "token has no kid and the key set is ambiguous".to_string(),
                )),
            };
        };

        if let Some(jwk) = self.keys.read().await.set.find(kid) {
            return key_from_jwk(jwk);
        }

        // Misses queue on the write lock, so concurrent ones share a single fetch
        let mut keys = self.keys.write().await;
        if let Some(jwk) = keys.set.find(kid) {
            return key_from_jwk(jwk);
        }
        if keys.cooling_down() {
            tracing::debug!("kid '{}' unknown, JWKS refetched recently; not refetching", kid);
            return Err(VerifyError::UnknownKey(kid.to_string()));
        }

        // Unknown kid: the provider may have rotated keys since startup
        tracing::debug!("kid '{}' not in key set, refetching {}", kid, self.jwks_uri);
        keys.refetched_at = Some(Instant::now());
        keys.set = fetch_key_set(&self.http, &self.jwks_uri).await?;

        keys.set
            .find(kid)
            .map(key_from_jwk)
            .unwrap_or_else(|| Err(VerifyError::UnknownKey(kid.to_string())))
    }
}

#[async_trait]
impl TokenVerifier for OidcVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedToken, VerifyError> {
        let header = decode_header(token).map_err(|e| VerifyError::InvalidToken(e.to_string()))?;

        if !self.algorithms.contains(&header.alg) {
            return Err(VerifyError::InvalidToken(format!(
                "unsupported signing algorithm {:?}",
                header.alg
            )));
        }

        let key = self.decoding_key(header.kid.as_deref()).await?;

        let mut validation = Validation::new(header.alg);
        validation.algorithms = self.algorithms.clone();
        validation.set_audience(&[&self.client_id]);
        validation.set_issuer(&[&self.issuer]);

        let data = decode::<Map<String, Value>>(token, &key, &validation)
            .map_err(|e| VerifyError::InvalidToken(e.to_string()))?;

        Ok(VerifiedToken::new(data.claims))
    }

    fn issuer(&self) -> &str {
        &self.issuer
    }
}

async fn fetch_key_set(http: &reqwest::Client, jwks_uri: &Url) -> Result<JwkSet, VerifyError> {
    http.get(jwks_uri.clone())
        .send()
        .await
        .and_then(|res| res.error_for_status())
        .map_err(|e| VerifyError::KeySet(e.to_string()))?
        .json::<JwkSet>()
        .await
        .map_err(|e| VerifyError::KeySet(format!("malformed key set: {}", e)))
}

fn key_from_jwk(jwk: &Jwk) -> Result<DecodingKey, VerifyError> {
    DecodingKey::from_jwk(jwk).map_err(|e| VerifyError::KeySet(format!("unusable key: {}", e)))
}

fn parse_algorithms(names: &[String]) -> Result<Vec<Algorithm>, VerifyError> {
    let algorithms = names
        .iter()
        .map(|name| {
            Algorithm::from_str(name.trim())
                .map_err(|_| VerifyError::Discovery(format!("unknown signing algorithm '{}'", name)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if algorithms.is_empty() {
        return Err(VerifyError::Discovery("no signing algorithms configured".to_string()));
    }
    Ok(algorithms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use serde_json::json;

    const ISSUER: &str = "http://idp.test/realms/develop";
    // base64url("secret")
    const SECRET_B64: &str = "c2VjcmV0";

    fn key_set() -> JwkSet {
        serde_json::from_value(json!({
            "keys": [{ "kty": "oct", "kid": "k1", "alg": "HS256", "k": SECRET_B64 }]
        }))
        .unwrap()
    }

    fn verifier() -> OidcVerifier {
        OidcVerifier::from_key_set(
            reqwest::Client::new(),
            ISSUER,
            "api-secure",
            Url::parse("http://127.0.0.1:9/certs").unwrap(),
            &["HS256".to_string()],
            key_set(),
        )
        .unwrap()
    }

    fn mint(kid: Option<&str>, claims: Value, secret: &[u8]) -> String {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = kid.map(str::to_string);
        encode(&header, &claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    fn valid_claims() -> Value {
        json!({
            "sub": "user-1",
            "iss": ISSUER,
            "aud": "api-secure",
            "exp": chrono::Utc::now().timestamp() + 300,
            "realm_access": { "roles": ["user"] }
        })
    }

    #[tokio::test]
    async fn accepts_well_formed_token() {
        let token = mint(Some("k1"), valid_claims(), b"secret");
        let verified = verifier().verify(&token).await.unwrap();

        assert_eq!(verified.subject(), Some("user-1"));
        let claims = crate::auth::Claims::from_payload(verified.payload()).unwrap();
        assert!(claims.has_realm_role("user"));
    }

    #[tokio::test]
    async fn token_without_kid_uses_single_key() {
        let token = mint(None, valid_claims(), b"secret");
        assert!(verifier().verify(&token).await.is_ok());
    }

    #[tokio::test]
    async fn rejects_wrong_signature_issuer_audience_and_expiry() {
        let v = verifier();

        let bad_sig = mint(Some("k1"), valid_claims(), b"other");
        assert!(matches!(v.verify(&bad_sig).await, Err(VerifyError::InvalidToken(_))));

        let mut claims = valid_claims();
        claims["iss"] = json!("http://elsewhere/realms/develop");
        assert!(v.verify(&mint(Some("k1"), claims, b"secret")).await.is_err());

        let mut claims = valid_claims();
        claims["aud"] = json!("another-client");
        assert!(v.verify(&mint(Some("k1"), claims, b"secret")).await.is_err());

        let mut claims = valid_claims();
        claims["exp"] = json!(chrono::Utc::now().timestamp() - 3600);
        assert!(v.verify(&mint(Some("k1"), claims, b"secret")).await.is_err());
    }

    #[tokio::test]
    async fn rejects_garbage_and_disallowed_algorithms() {
        let v = verifier();
        assert!(matches!(v.verify("not.a.jwt").await, Err(VerifyError::InvalidToken(_))));

        let mut header = Header::new(Algorithm::HS512);
        header.kid = Some("k1".to_string());
        let token = encode(&header, &valid_claims(), &EncodingKey::from_secret(b"secret")).unwrap();
        assert!(matches!(v.verify(&token).await, Err(VerifyError::InvalidToken(_))));
    }

    #[tokio::test]
    async fn unknown_kid_fails_after_refetch() {
        let token = mint(Some("rotated"), valid_claims(), b"secret");
        // Refetch goes to a closed port, so this surfaces as a key set error
        assert!(verifier().verify(&token).await.is_err());
    }

    /// JWKS endpoint serving `set` and counting how often it is fetched
    async fn counting_jwks(set: Value) -> (Url, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = axum::Router::new().route(
            "/certs",
            axum::routing::get(move || {
                let counter = counter.clone();
                let set = set.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    axum::Json(set)
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        (Url::parse(&format!("http://{}/certs", addr)).unwrap(), hits)
    }

    fn verifier_at(jwks_uri: Url) -> OidcVerifier {
        OidcVerifier::from_key_set(
            reqwest::Client::builder().no_proxy().build().unwrap(),
            ISSUER,
            "api-secure",
            jwks_uri,
            &["HS256".to_string()],
            key_set(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn rotated_key_is_picked_up_by_refetch() {
        let (uri, hits) = counting_jwks(json!({
            "keys": [
                { "kty": "oct", "kid": "k1", "alg": "HS256", "k": SECRET_B64 },
                { "kty": "oct", "kid": "k2", "alg": "HS256", "k": "b3RoZXI" }
            ]
        }))
        .await;
        let v = verifier_at(uri);

        let token = mint(Some("k2"), valid_claims(), b"other");
        let verified = v.verify(&token).await.unwrap();
        assert_eq!(verified.subject(), Some("user-1"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // Now cached
        assert!(v.verify(&token).await.is_ok());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_kids_share_one_refetch_per_cooldown() {
        let (uri, hits) = counting_jwks(json!({ "keys": [] })).await;
        let v = Arc::new(verifier_at(uri));

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let v = v.clone();
                let token = mint(Some(format!("forged-{}", i).as_str()), valid_claims(), b"secret");
                tokio::spawn(async move { v.verify(&token).await })
            })
            .collect();

        for task in tasks {
            assert!(matches!(task.await.unwrap(), Err(VerifyError::UnknownKey(_))));
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn parse_algorithms_rejects_unknown_and_empty() {
        assert!(parse_algorithms(&["RS256".to_string(), "ES256".to_string()]).is_ok());
        assert!(parse_algorithms(&["NOPE".to_string()]).is_err());
        assert!(parse_algorithms(&[]).is_err());
    }
}
