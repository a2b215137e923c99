//! Firebase ID token authentication.
//!
//! Verification is only enforced when a Firebase project is configured.
//! Without one the server runs open and [`AuthUser`] resolves to an
//! anonymous identity.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// Google JWKS URL for Firebase Auth.
const GOOGLE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Firebase token issuer prefix.
const FIREBASE_ISSUER_PREFIX: &str = "https://securetoken.google.com/";

/// JWKS cache TTL.
const JWKS_CACHE_TTL: Duration = Duration::from_secs(3600); // 1 hour

/// Decoded Firebase ID token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirebaseClaims {
    /// User ID
    pub sub: String,
    pub email: Option<String>,
    pub iss: String,
    /// Firebase project ID
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// Caller identity attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
}

impl AuthUser {
    /// Identity used when token verification is disabled.
    pub fn anonymous() -> Self {
        Self {
            uid: "anonymous".to_string(),
            email: None,
        }
    }
}

impl From<FirebaseClaims> for AuthUser {
    fn from(claims: FirebaseClaims) -> Self {
        Self {
            uid: claims.sub,
            email: claims.email,
        }
    }
}

#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<JwkKey>,
}

#[derive(Debug, Clone, Deserialize)]
struct JwkKey {
    kid: String,
    n: String,
    e: String,
}

/// Public keys used to verify Firebase ID tokens, refreshed hourly.
pub struct JwksCache {
    http: Client,
    keys: RwLock<HashMap<String, DecodingKey>>,
    last_refresh: RwLock<Option<Instant>>,
    project_id: String,
}

impl JwksCache {
    /// Create a cache for a project. Keys are fetched on first use.
    pub fn new(project_id: impl Into<String>) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            http,
            keys: RwLock::new(HashMap::new()),
            last_refresh: RwLock::new(None),
            project_id: project_id.into(),
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Refresh JWKS keys from Google.
    pub async fn refresh_keys(&self) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
        debug!("Refreshing JWKS keys");

        let response = self.http.get(GOOGLE_JWKS_URL).send().await?.error_for_status()?;
        let jwks: JwksResponse = response.json().await?;

        let mut keys = HashMap::new();
        for jwk in jwks.keys {
            let key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e)?;
            keys.insert(jwk.kid, key);
        }

        let key_count = keys.len();
        *self.keys.write().await = keys;
        *self.last_refresh.write().await = Some(Instant::now());

        debug!("Refreshed {} JWKS keys", key_count);
        Ok(key_count)
    }

    async fn get_key(&self, kid: &str) -> Option<DecodingKey> {
        let needs_refresh = match *self.last_refresh.read().await {
            Some(last) => last.elapsed() > JWKS_CACHE_TTL,
            None => true,
        };

        if needs_refresh {
            if let Err(e) = self.refresh_keys().await {
                warn!("Failed to refresh JWKS keys: {}", e);
            }
        }

        self.keys.read().await.get(kid).cloned()
    }

    /// Verify a Firebase ID token.
    pub async fn verify_token(&self, token: &str) -> Result<FirebaseClaims, ApiError> {
        let header = decode_header(token)
            .map_err(|e| ApiError::unauthorized(format!("Invalid token header: {}", e)))?;

        let kid = header
            .kid
            .ok_or_else(|| ApiError::unauthorized("Token missing key ID"))?;

        let key = self
            .get_key(&kid)
            .await
            .ok_or_else(|| ApiError::unauthorized("Unknown key ID"))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[format!("{}{}", FIREBASE_ISSUER_PREFIX, self.project_id)]);
        validation.set_audience(&[&self.project_id]);

        let token_data = decode::<FirebaseClaims>(token, &key, &validation)
            .map_err(|e| ApiError::unauthorized(format!("Token validation failed: {}", e)))?;

        Ok(token_data.claims)
    }
}

/// Pull the bearer token out of an `Authorization` header value.
fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let auth_header = parts
        .headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Invalid Authorization header format"))
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(jwks) = state.jwks.as_ref() else {
            return Ok(AuthUser::anonymous());
        };

        let token = bearer_token(parts)?;
        let claims = jwks.verify_token(token).await?;
        Ok(AuthUser::from(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/generate");
        if let Some(value) = header {
            builder = builder.header("Authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&parts(Some("Bearer abc.def"))).unwrap(), "abc.def");
        assert!(bearer_token(&parts(Some("Basic abc"))).is_err());
        assert!(bearer_token(&parts(Some("Bearer  "))).is_err());
        assert!(bearer_token(&parts(None)).is_err());
    }

    #[tokio::test]
    async fn test_malformed_token_is_rejected_without_network() {
        let cache = JwksCache::new("demo-project").unwrap();
        let err = cache.verify_token("not-a-jwt").await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }
}
