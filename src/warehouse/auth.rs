//! OAuth2 access tokens for the BigQuery API.
//!
//! A service-account key signs a short-lived RS256 assertion which Google's
//! token endpoint exchanges for a bearer token. Tokens are cached behind an
//! `RwLock` and re-minted shortly before they expire.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::config::{
    ASSERTION_VALIDITY, BIGQUERY_SCOPE, JWT_BEARER_GRANT, REQUEST_TIMEOUT, TOKEN_REFRESH_MARGIN,
};
use crate::credentials::ServiceAccountKey;

/// Anything that can hand out a bearer token for BigQuery calls
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self, now: Instant) -> bool {
        now + TOKEN_REFRESH_MARGIN < self.expires_at
    }
}

/// Token source backed by a service-account key
pub struct ServiceAccountTokenSource {
    client_email: String,
    token_uri: String,
    signing_key: EncodingKey,
    http: reqwest::Client,
    cached: RwLock<Option<CachedToken>>,
}

impl ServiceAccountTokenSource {
    pub fn new(key: &ServiceAccountKey) -> Result<Self> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .context("Service account private_key is not a valid RSA PEM key")?;

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client_email: key.client_email.clone(),
            token_uri: key.token_uri.clone(),
            signing_key,
            http,
            cached: RwLock::new(None),
        })
    }

    fn sign_assertion(&self) -> Result<String> {
        let iat = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: BIGQUERY_SCOPE,
            aud: &self.token_uri,
            iat,
            exp: iat + ASSERTION_VALIDITY.as_secs() as i64,
        };

        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
            .context("Failed to sign token assertion")
    }

    async fn fetch_token(&self) -> Result<CachedToken> {
        let assertion = self.sign_assertion()?;
        let requested_at = Instant::now();

        let response = self
            .http
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", &assertion)])
            .send()
            .await
            .with_context(|| format!("Token request to {} failed", self.token_uri))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Token endpoint returned {status}: {body}"));
        }

        let token: TokenResponse = response
            .json()
            .await
            .context("Failed to parse token response")?;

        tracing::debug!(expires_in = token.expires_in, "minted BigQuery access token");

        Ok(CachedToken {
            value: token.access_token,
            expires_at: requested_at + Duration::from_secs(token.expires_in),
        })
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokenSource {
    async fn access_token(&self) -> Result<String> {
        {
            let guard = self.cached.read().await;
            if let Some(token) = guard.as_ref().filter(|t| t.is_fresh(Instant::now())) {
                return Ok(token.value.clone());
            }
        }

        let mut guard = self.cached.write().await;
        // Another request may have refreshed while we waited for the lock
        if let Some(token) = guard.as_ref().filter(|t| t.is_fresh(Instant::now())) {
            return Ok(token.value.clone());
        }

        let token = self.fetch_token().await?;
        let value = token.value.clone();
        *guard = Some(token);
        Ok(value)
    }
}
