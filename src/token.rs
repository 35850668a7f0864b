//! Bearer token cache backed by the OAuth2 refresh-token grant.
//!
//! The cache is a single slot shared by every request. Refreshes are not
//! de-duplicated: two requests that both see an expired slot will both call
//! the token endpoint and the later response wins. Each stored token is valid
//! until its own expiry, so a race only costs an extra round trip.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;

use crate::config::Credentials;
use crate::error::{AppError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expires_at_millis: i64,
}

impl AccessToken {
    pub fn is_valid_at(&self, now_millis: i64) -> bool {
        now_millis < self.expires_at_millis
    }
}

fn expiry_millis(now_millis: i64, expires_in_secs: i64) -> i64 {
    now_millis.saturating_add(expires_in_secs.saturating_mul(1000))
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Default)]
pub struct TokenCache {
    slot: Mutex<Option<AccessToken>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached token if it is still valid at `now_millis`.
    pub fn current(&self, now_millis: i64) -> Option<String> {
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        slot.as_ref()
            .filter(|cached| cached.is_valid_at(now_millis))
            .map(|cached| cached.token.clone())
    }

    pub fn store(&self, token: AccessToken) {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(token);
    }
}

/// Hands out bearer tokens for one request, refreshing the shared cache on demand.
#[derive(Clone)]
pub struct TokenProvider {
    http: Client,
    cache: Arc<TokenCache>,
    credentials: Credentials,
    endpoint: String,
}

impl TokenProvider {
    pub fn new(http: Client, cache: Arc<TokenCache>, credentials: Credentials, endpoint: String) -> Self {
        Self {
            http,
            cache,
            credentials,
            endpoint,
        }
    }

    pub async fn get_access_token(&self) -> Result<String> {
        if let Some(token) = self.cache.current(Utc::now().timestamp_millis()) {
            return Ok(token);
        }
        let fresh = self.refresh().await?;
        let token = fresh.token.clone();
        self.cache.store(fresh);
        Ok(token)
    }

    async fn refresh(&self) -> Result<AccessToken> {
        tracing::info!("refreshing access token");
        let form = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", self.credentials.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];
        let res = self
            .http
            .post(&self.endpoint)
            .form(&form)
            .send()
            .await
            .map_err(AppError::transport("token refresh"))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(AppError::Auth { status, body });
        }

        let data: TokenResponse = res.json().await.map_err(AppError::decode("token refresh"))?;
        Ok(AccessToken {
            token: data.access_token,
            expires_at_millis: expiry_millis(Utc::now().timestamp_millis(), data.expires_in),
        })
    }
}
