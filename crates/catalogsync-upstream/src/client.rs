//! Bitable-style REST client implementing `UpstreamTableClient`.
//!
//! Wraps `reqwest` with base-URL/app-token construction and bearer
//! auth, retried transparently on `AuthExpired` by the caller's
//! `catalogsync-retry::with_retry` (this adapter only classifies;
//! it doesn't retry itself). Paging uses an opaque `page_token`
//! cursor, matching the `listRecords(cursor?, pageSize)` contract of
//! spec §6.2.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use catalogsync_upstream::client::UpstreamTableRestClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = UpstreamTableRestClient::new(
//!     "https://upstream.example.com",
//!     "app-id",
//!     "app-secret",
//!     "app-token",
//!     "tbl-products",
//! );
//! let page = client.list_records_raw(None, 50).await?;
//! println!("fetched {} records", page.records.len());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use catalogsync_core::ports::{Cursor, RawRecord, RecordPage, ResolvedAttachment, UpstreamTableClient};
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::auth::TokenCache;
use crate::UpstreamError;

/// Records are resolved in batches of this size per `resolveAttachments`
/// call, matching the image pipeline's `RESOLVE_BATCH_SIZE` convention.
const RESOLVE_BATCH_SIZE: usize = 20;

#[derive(Debug, Deserialize)]
struct ListRecordsResponse {
    code: i32,
    msg: Option<String>,
    data: Option<ListRecordsData>,
}

#[derive(Debug, Deserialize)]
struct ListRecordsData {
    #[serde(default)]
    items: Vec<RecordItem>,
    #[serde(default)]
    has_more: bool,
    page_token: Option<String>,
    total: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RecordItem {
    fields: RawRecord,
}

#[derive(Debug, Deserialize)]
struct ResolveAttachmentsResponse {
    code: i32,
    msg: Option<String>,
    data: Option<ResolveAttachmentsData>,
}

#[derive(Debug, Deserialize)]
struct ResolveAttachmentsData {
    #[serde(default)]
    urls: HashMap<String, ResolvedUrl>,
}

#[derive(Debug, Deserialize)]
struct ResolvedUrl {
    url: String,
    /// Seconds until the signed URL expires, relative to the response.
    expire_in: i64,
}

#[derive(Debug, Deserialize)]
struct RevisionResponse {
    code: i32,
    msg: Option<String>,
    data: Option<RevisionData>,
}

#[derive(Debug, Deserialize)]
struct RevisionData {
    revision: i64,
}

/// Reference `UpstreamTableClient` implementation for a Bitable-style
/// multi-dimensional table API, authenticated via [`TokenCache`].
pub struct UpstreamTableRestClient {
    http: Client,
    base_url: String,
    app_token: String,
    table_id: String,
    tokens: Arc<TokenCache>,
}

impl UpstreamTableRestClient {
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        app_id: impl Into<String>,
        app_secret: impl Into<String>,
        app_token: impl Into<String>,
        table_id: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into();
        let http = Client::builder()
            .timeout(crate::auth::DEFAULT_REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client with a fixed timeout always builds");
        let tokens = Arc::new(TokenCache::new(http.clone(), base_url.clone(), app_id, app_secret));
        Self { http, base_url, app_token: app_token.into(), table_id: table_id.into(), tokens }
    }

    async fn authed_request(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder, UpstreamError> {
        let token = self.tokens.ensure_token().await?;
        let url = format!("{}{}", self.base_url, path);
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    /// Fetches one raw page of records, retrying once on a 401 by
    /// forcing a token refresh (the upstream may have revoked the
    /// cached token early).
    ///
    /// # Errors
    /// Returns a classified [`UpstreamError`] on any transport,
    /// authentication, or malformed-response failure.
    pub async fn list_records_raw(&self, cursor: Option<&Cursor>, page_size: u32) -> Result<RecordPage, UpstreamError> {
        let path = format!("/bitable/v1/apps/{}/tables/{}/records/search", self.app_token, self.table_id);

        let mut body = serde_json::json!({ "page_size": page_size.clamp(1, 500) });
        if let Some(cursor) = cursor {
            body["page_token"] = serde_json::Value::String(cursor.0.clone());
        }

        let response = self.authed_request(Method::POST, &path).await?.json(&body).send().await?;
        let response = self.retry_once_on_unauthorized(response, Method::POST, &path, Some(&body)).await?;

        let parsed: ListRecordsResponse = parse_json(response).await?;
        if parsed.code != 0 {
            return Err(classify_api_error(parsed.code, parsed.msg));
        }
        let data = parsed.data.ok_or_else(|| UpstreamError::InvalidResponse("missing data".to_string()))?;

        Ok(RecordPage {
            records: data.items.into_iter().map(|item| item.fields).collect(),
            next_cursor: if data.has_more { data.page_token.map(Cursor) } else { None },
            total_hint: data.total,
        })
    }

    async fn retry_once_on_unauthorized(
        &self,
        response: reqwest::Response,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response, UpstreamError> {
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        warn!(path, "upstream rejected cached token, forcing refresh");
        self.tokens.refresh().await?;
        let token = self.tokens.ensure_token().await?;
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method, url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }
}

async fn parse_json<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T, UpstreamError> {
    let status = response.status();
    if status.is_server_error() {
        return Err(UpstreamError::ServerError(format!("HTTP {status}")));
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(std::time::Duration::from_secs)
            .unwrap_or(std::time::Duration::from_secs(30));
        return Err(UpstreamError::TooManyRequests { retry_after });
    }
    response.json().await.map_err(|err| UpstreamError::InvalidResponse(err.to_string()))
}

/// Classifies a Bitable-style API error body by its numeric `code`,
/// mirroring the teacher's status-code classification but against a
/// typed result instead of string-matching an HTTP reason phrase.
fn classify_api_error(code: i32, msg: Option<String>) -> UpstreamError {
    let msg = msg.unwrap_or_else(|| format!("upstream error code {code}"));
    match code {
        99991663 | 99991664 | 99991665 => UpstreamError::Unauthorized(msg),
        1254040 | 1254043 => UpstreamError::NotFound(msg),
        99991400 => UpstreamError::TooManyRequests { retry_after: std::time::Duration::from_secs(30) },
        _ if code >= 50000 => UpstreamError::ServerError(msg),
        _ => UpstreamError::InvalidResponse(msg),
    }
}

#[async_trait::async_trait]
impl UpstreamTableClient for UpstreamTableRestClient {
    async fn list_records(&self, cursor: Option<&Cursor>, page_size: u32) -> anyhow::Result<RecordPage> {
        self.list_records_raw(cursor, page_size).await.map_err(Into::into)
    }

    async fn resolve_attachments(&self, tokens: &[String]) -> anyhow::Result<HashMap<String, ResolvedAttachment>> {
        let mut resolved = HashMap::with_capacity(tokens.len());
        for chunk in tokens.chunks(RESOLVE_BATCH_SIZE) {
            let revision = self.table_revision().await?;
            let path = format!(
                "/bitable/v1/apps/{}/tables/{}/fields/attachments/batch_get",
                self.app_token, self.table_id
            );
            let body = serde_json::json!({ "file_tokens": chunk, "revision": revision });

            let response = self.authed_request(Method::POST, &path).await?.json(&body).send().await?;
            let response = self.retry_once_on_unauthorized(response, Method::POST, &path, Some(&body)).await?;
            let parsed: ResolveAttachmentsResponse = parse_json(response).await?;
            if parsed.code != 0 {
                return Err(classify_api_error(parsed.code, parsed.msg).into());
            }
            let data = parsed.data.ok_or_else(|| UpstreamError::InvalidResponse("missing data".to_string()))?;

            let now = Utc::now();
            for (token, resolved_url) in data.urls {
                let expires_at: DateTime<Utc> = now + chrono::Duration::seconds(resolved_url.expire_in.max(0));
                resolved.insert(token, ResolvedAttachment { url: resolved_url.url, expires_at });
            }
        }
        debug!(requested = tokens.len(), resolved = resolved.len(), "resolved attachment tokens");
        Ok(resolved)
    }

    async fn table_revision(&self) -> anyhow::Result<i64> {
        let path = format!("/bitable/v1/apps/{}/tables/{}", self.app_token, self.table_id);
        let response = self.authed_request(Method::GET, &path).await?.send().await?;
        let response = self.retry_once_on_unauthorized(response, Method::GET, &path, None).await?;
        let parsed: RevisionResponse = parse_json(response).await?;
        if parsed.code != 0 {
            return Err(classify_api_error(parsed.code, parsed.msg).into());
        }
        let data = parsed.data.ok_or_else(|| UpstreamError::InvalidResponse("missing data".to_string()))?;
        Ok(data.revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/auth/v3/tenant_access_token/internal"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 0,
                "tenant_access_token": "t-123",
                "expire": 7200,
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn list_records_paginates_via_page_token() {
        let server = MockServer::start().await;
        mock_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/bitable/v1/apps/app-token/tables/tbl-1/records/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 0,
                "data": {
                    "items": [{"fields": {"productId": "p1"}}],
                    "has_more": true,
                    "page_token": "cursor-2",
                    "total": 42,
                }
            })))
            .mount(&server)
            .await;

        let client = UpstreamTableRestClient::new(server.uri(), "app", "secret", "app-token", "tbl-1");
        let page = client.list_records(None, 50).await.unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.next_cursor, Some(Cursor("cursor-2".to_string())));
        assert_eq!(page.total_hint, Some(42));
    }

    #[tokio::test]
    async fn list_records_last_page_has_no_cursor() {
        let server = MockServer::start().await;
        mock_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/bitable/v1/apps/app-token/tables/tbl-1/records/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 0,
                "data": { "items": [], "has_more": false, "total": 0 }
            })))
            .mount(&server)
            .await;

        let client = UpstreamTableRestClient::new(server.uri(), "app", "secret", "app-token", "tbl-1");
        let page = client.list_records(None, 50).await.unwrap();
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn table_revision_parses_response() {
        let server = MockServer::start().await;
        mock_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/bitable/v1/apps/app-token/tables/tbl-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 0,
                "data": { "revision": 7 }
            })))
            .mount(&server)
            .await;

        let client = UpstreamTableRestClient::new(server.uri(), "app", "secret", "app-token", "tbl-1");
        assert_eq!(client.table_revision().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn resolve_attachments_batches_at_twenty_tokens() {
        let server = MockServer::start().await;
        mock_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/bitable/v1/apps/app-token/tables/tbl-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 0, "data": { "revision": 1 }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bitable/v1/apps/app-token/tables/tbl-1/fields/attachments/batch_get"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 0,
                "data": { "urls": { "tok-1": { "url": "https://cdn.example.com/a.jpg", "expire_in": 600 } } }
            })))
            .mount(&server)
            .await;

        let client = UpstreamTableRestClient::new(server.uri(), "app", "secret", "app-token", "tbl-1");
        let tokens: Vec<String> = (0..25).map(|i| format!("tok-{i}")).collect();
        let resolved = client.resolve_attachments(&tokens).await.unwrap();
        assert!(resolved.contains_key("tok-1"));
    }

    #[tokio::test]
    async fn unauthorized_error_code_classifies_as_auth_expired() {
        let err = classify_api_error(99991663, Some("invalid access token".to_string()));
        assert!(matches!(err.classify(), catalogsync_retry::ErrorClass::AuthExpired));
    }

    #[tokio::test]
    async fn server_error_code_classifies_as_retryable() {
        let err = classify_api_error(50001, Some("internal error".to_string()));
        assert!(matches!(err.classify(), catalogsync_retry::ErrorClass::Retryable));
    }
}
