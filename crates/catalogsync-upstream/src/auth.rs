//! Tenant access token acquisition for the upstream table API.
//!
//! The upstream service authenticates via a static app id/secret pair
//! (spec §6.5 `CATALOGSYNC_UPSTREAM_APP_ID`/`APP_SECRET`), not a
//! user-facing OAuth flow: there is no browser, no redirect callback,
//! no keyring. [`TokenCache`] exchanges the credential once, caches
//! the resulting tenant access token, and transparently re-exchanges
//! it once it is within [`REFRESH_SKEW`] of expiring.

use std::sync::Mutex as StdMutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};

use crate::UpstreamError;

/// Refresh this far ahead of actual expiry so a request never races a
/// token that dies mid-flight.
const REFRESH_SKEW: chrono::Duration = chrono::Duration::seconds(60);

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    code: i32,
    msg: Option<String>,
    tenant_access_token: Option<String>,
    expire: Option<i64>,
}

/// Credential-based token acquisition for a single app id/secret pair.
///
/// Mirrors the teacher's `GraphAuthAdapter`/`PKCEFlow` split (config +
/// exchange + cached result) but with no interactive step: `ensure_token`
/// is the only entry point callers need.
pub struct TokenCache {
    http: Client,
    base_url: String,
    app_id: String,
    app_secret: String,
    cached: StdMutex<Option<CachedToken>>,
}

impl TokenCache {
    #[must_use]
    pub fn new(http: Client, base_url: impl Into<String>, app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            cached: StdMutex::new(None),
        }
    }

    /// Returns a valid tenant access token, exchanging credentials if
    /// the cache is empty or the held token is near expiry.
    ///
    /// # Errors
    /// Returns `UpstreamError::Unauthorized` if credentials are
    /// rejected, or `UpstreamError::NetworkError`/`ServerError` on
    /// transport or upstream failure.
    pub async fn ensure_token(&self) -> Result<String, UpstreamError> {
        if let Some(token) = self.cached_if_fresh() {
            return Ok(token);
        }
        self.refresh().await
    }

    /// Forces a re-exchange regardless of the cached token's freshness,
    /// used when a request comes back 401 despite a cached token that
    /// looked valid (clock skew, early revocation).
    ///
    /// # Errors
    /// Same as [`ensure_token`](Self::ensure_token).
    pub async fn refresh(&self) -> Result<String, UpstreamError> {
        debug!("exchanging app credentials for a tenant access token");

        let response = self
            .http
            .post(format!("{}/auth/v3/tenant_access_token/internal", self.base_url))
            .json(&serde_json::json!({
                "app_id": self.app_id,
                "app_secret": self.app_secret,
            }))
            .send()
            .await?;

        let status = response.status();
        let body: TokenResponse = response
            .json()
            .await
            .map_err(|err| UpstreamError::InvalidResponse(err.to_string()))?;

        if status == StatusCode::UNAUTHORIZED || body.code != 0 {
            return Err(UpstreamError::Unauthorized(
                body.msg.unwrap_or_else(|| format!("token exchange rejected with code {}", body.code)),
            ));
        }

        let token = body
            .tenant_access_token
            .ok_or_else(|| UpstreamError::InvalidResponse("missing tenant_access_token".to_string()))?;
        let ttl = body.expire.unwrap_or(7200).max(0);
        let expires_at = Utc::now() + chrono::Duration::seconds(ttl);

        *self.cached.lock().unwrap() = Some(CachedToken { token: token.clone(), expires_at });
        info!(expires_at = %expires_at, "refreshed upstream tenant access token");
        Ok(token)
    }

    fn cached_if_fresh(&self) -> Option<String> {
        let guard = self.cached.lock().unwrap();
        let cached = guard.as_ref()?;
        if Utc::now() + REFRESH_SKEW < cached.expires_at {
            Some(cached.token.clone())
        } else {
            None
        }
    }
}

/// Default request timeout applied to every call this adapter makes
/// (spec §6.5 `REQUEST_TIMEOUT_MS`, default mirrored here for standalone use).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
