//! Bearer-token verification against the identity provider.
//!
//! ID tokens are RS256-signed JWTs. The provider publishes its current
//! signing keys as a JWK set; keys are fetched over HTTPS and cached for the
//! lifetime advertised by the response's `Cache-Control: max-age`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;

const JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

const DEFAULT_KEY_TTL: Duration = Duration::from_secs(3600);

/// The verified, decoded representation of the caller's identity token.
#[derive(Debug, Clone)]
pub struct IdentityClaims {
    pub uid: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("token rejected: {0}")]
    Rejected(String),

    #[error("signing key fetch failed: {0}")]
    KeyFetch(String),
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<IdentityClaims, VerifyError>;
}

/// Identity-provider service-account credential. Only the project id is
/// consumed; the env value may be raw JSON or base64-encoded JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccount {
    pub project_id: String,
    #[serde(default)]
    pub client_email: Option<String>,
}

impl ServiceAccount {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let trimmed = raw.trim();
        let json = if trimmed.starts_with('{') {
            trimmed.to_string()
        } else {
            String::from_utf8(BASE64.decode(trimmed)?)?
        };
        Ok(serde_json::from_str(&json)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kid: String,
    n: String,
    e: String,
}

#[derive(Debug, Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct TokenClaims {
    sub: String,
    email: Option<String>,
    name: Option<String>,
}

struct KeyCache {
    keys: HashMap<String, Jwk>,
    fetched_at: Option<Instant>,
    ttl: Duration,
}

/// Production verifier for Firebase-style ID tokens.
///
/// Constructed once at startup and shared read-only between requests; the
/// key cache is the only interior state. No request timeout is applied to
/// the key-fetch call.
pub struct FirebaseVerifier {
    project_id: String,
    issuer: String,
    http: reqwest::Client,
    cache: RwLock<KeyCache>,
}

impl FirebaseVerifier {
    pub fn new(project_id: String) -> Self {
        let issuer = format!("https://securetoken.google.com/{}", project_id);
        Self {
            project_id,
            issuer,
            http: reqwest::Client::new(),
            cache: RwLock::new(KeyCache {
                keys: HashMap::new(),
                fetched_at: None,
                ttl: DEFAULT_KEY_TTL,
            }),
        }
    }

    /// Prefetches the signing keys so the first request does not pay the
    /// fetch latency. Failure here is not fatal; the keys are fetched again
    /// on first use.
    pub async fn warm_up(&self) -> Result<(), VerifyError> {
        let (keys, ttl) = self.fetch_keys().await?;
        let mut cache = self.cache.write().await;
        cache.keys = keys;
        cache.ttl = ttl;
        cache.fetched_at = Some(Instant::now());
        Ok(())
    }

    async fn signing_key(&self, kid: &str) -> Result<Jwk, VerifyError> {
        {
            let cache = self.cache.read().await;
            if let (Some(fetched_at), Some(key)) = (cache.fetched_at, cache.keys.get(kid)) {
                if fetched_at.elapsed() < cache.ttl {
                    return Ok(key.clone());
                }
            }
        }

        let mut cache = self.cache.write().await;
        // Another request may have refreshed while we waited for the lock.
        let stale = cache
            .fetched_at
            .is_none_or(|fetched_at| fetched_at.elapsed() >= cache.ttl);
        if stale || !cache.keys.contains_key(kid) {
            let (keys, ttl) = self.fetch_keys().await?;
            cache.keys = keys;
            cache.ttl = ttl;
            cache.fetched_at = Some(Instant::now());
        }

        cache
            .keys
            .get(kid)
            .cloned()
            .ok_or_else(|| VerifyError::Rejected("unknown signing key id".to_string()))
    }

    async fn fetch_keys(&self) -> Result<(HashMap<String, Jwk>, Duration), VerifyError> {
        let response = self
            .http
            .get(JWKS_URL)
            .send()
            .await
            .map_err(|e| VerifyError::KeyFetch(e.to_string()))?;

        let ttl = response
            .headers()
            .get(reqwest::header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_max_age)
            .unwrap_or(DEFAULT_KEY_TTL);

        let set: JwkSet = response
            .json()
            .await
            .map_err(|e| VerifyError::KeyFetch(e.to_string()))?;

        tracing::debug!("Fetched {} signing keys (ttl {:?})", set.keys.len(), ttl);

        Ok((
            set.keys.into_iter().map(|k| (k.kid.clone(), k)).collect(),
            ttl,
        ))
    }
}

#[async_trait]
impl IdentityVerifier for FirebaseVerifier {
    async fn verify(&self, token: &str) -> Result<IdentityClaims, VerifyError> {
        let header =
            decode_header(token).map_err(|e| VerifyError::Rejected(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| VerifyError::Rejected("token header missing kid".to_string()))?;

        let key = self.signing_key(&kid).await?;
        let decoding_key = DecodingKey::from_rsa_components(&key.n, &key.e)
            .map_err(|e| VerifyError::Rejected(e.to_string()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.project_id.as_str()]);
        validation.set_issuer(&[self.issuer.as_str()]);

        let data = decode::<TokenClaims>(token, &decoding_key, &validation)
            .map_err(|e| VerifyError::Rejected(e.to_string()))?;

        Ok(IdentityClaims {
            uid: data.claims.sub,
            email: data.claims.email,
            name: data.claims.name,
        })
    }
}

fn parse_max_age(value: &str) -> Option<Duration> {
    value
        .split(',')
        .find_map(|directive| {
            directive
                .trim()
                .strip_prefix("max-age=")
                .and_then(|secs| secs.parse::<u64>().ok())
        })
        .map(Duration::from_secs)
}
