//! Service-to-service credentials for the directory CRUD wrapper.
//!
//! The directory API wants a bearer token from the token issuer
//! (client-credentials grant). Tokens are cached and refreshed 60 seconds
//! before expiry; an acquisition failure aborts the caller's current pass,
//! never the process.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token issuer unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("token issuer returned {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Cached client-credentials token source.
pub struct TokenSource {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    pub fn new(
        http: reqwest::Client,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            cached: Mutex::new(None),
        }
    }

    /// Current bearer token, fetching a fresh one when the cache is empty or
    /// within the expiry skew.
    pub async fn bearer(&self) -> Result<String, AuthError> {
        let mut cached = self.cached.lock().await;
        if let Some(c) = cached.as_ref() {
            if c.expires_at - Duration::seconds(EXPIRY_SKEW_SECS) > Utc::now() {
                return Ok(c.token.clone());
            }
        }

        let resp = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = resp.json().await?;
        debug!(expires_in = token.expires_in, "service token refreshed");
        let fresh = CachedToken {
            token: token.access_token.clone(),
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        };
        *cached = Some(fresh);
        Ok(token.access_token)
    }
}
