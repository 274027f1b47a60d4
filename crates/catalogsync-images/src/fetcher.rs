//! `ImageFetcher` — attachment resolution, download, verification, and
//! object-store upload (spec §4.2).
//!
//! Hash verification after transfer and dedup against stored state
//! mirror a transfer use case's upload/download pairing; the shared
//! rate limiter reuses the token-bucket limiter from `catalogsync-retry`.

use std::collections::HashMap;
use std::sync::Arc;

use catalogsync_core::domain::{Image, ImageId, ImageRole, ProductId};
use catalogsync_core::ports::{ObjectStore, ProductRepository, UpstreamTableClient};
use catalogsync_retry::{with_retry, ErrorClass, RetryBudget, RetryError, TokenBucket};
use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::sniff::sniff_format;

/// Upstream attachments are resolved in batches of at most this many
/// tokens per request (spec §4.2 step 1).
const RESOLVE_BATCH_SIZE: usize = 20;

/// One item the engine wants fetched: which product/role it belongs to
/// and the upstream attachment token to resolve.
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub product_id: ProductId,
    pub role: ImageRole,
    pub token: String,
}

/// Per-item outcome, always returned in the same order as the input
/// (spec §4.2 "Concurrency discipline").
#[derive(Debug, Clone)]
pub enum ImageFetchOutcome {
    Fetched(Image),
    Failed { product_id: ProductId, role: ImageRole, reason: String },
}

/// Tunables separate from `SyncOptions` because they're fetcher-specific
/// rather than whole-run options (spec §4.2).
#[derive(Debug, Clone, Copy)]
pub struct FetcherConfig {
    pub concurrent_images: u32,
    pub retry_attempts: u32,
}

pub struct ImageFetcher {
    upstream: Arc<dyn UpstreamTableClient>,
    object_store: Arc<dyn ObjectStore>,
    repo: Arc<dyn ProductRepository>,
    rate_limiter: Arc<TokenBucket>,
    http: reqwest::Client,
}

impl ImageFetcher {
    #[must_use]
    pub fn new(
        upstream: Arc<dyn UpstreamTableClient>,
        object_store: Arc<dyn ObjectStore>,
        repo: Arc<dyn ProductRepository>,
        rate_limiter: Arc<TokenBucket>,
    ) -> Self {
        Self { upstream, object_store, repo, rate_limiter, http: reqwest::Client::new() }
    }

    /// Resolves, downloads, verifies, and uploads every requested image,
    /// returning outcomes in the same order as `requests` (spec §4.2).
    pub async fn fetch(
        &self,
        requests: Vec<ImageRequest>,
        config: FetcherConfig,
        cancel: &CancellationToken,
    ) -> Vec<ImageFetchOutcome> {
        if requests.is_empty() {
            return Vec::new();
        }

        let resolved = self.resolve_all(&requests).await;

        let pool_size = config.concurrent_images.max(1) as usize;
        let items: Vec<(usize, ImageRequest)> = requests.into_iter().enumerate().collect();
        let mut slots: Vec<Option<ImageFetchOutcome>> = (0..items.len()).map(|_| None).collect();

        let mut joinset: JoinSet<(usize, ImageFetchOutcome)> = JoinSet::new();
        let mut next_index = 0usize;

        while next_index < items.len().min(pool_size) {
            self.spawn_one(&mut joinset, &items[next_index], &resolved, config, cancel);
            next_index += 1;
        }

        while let Some(joined) = joinset.join_next().await {
            match joined {
                Ok((idx, outcome)) => slots[idx] = Some(outcome),
                Err(join_err) => warn!(error = %join_err, "image fetch worker panicked"),
            }
            if next_index < items.len() {
                self.spawn_one(&mut joinset, &items[next_index], &resolved, config, cancel);
                next_index += 1;
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(idx, slot)| {
                slot.unwrap_or_else(|| {
                    let (_, req) = &items[idx];
                    ImageFetchOutcome::Failed {
                        product_id: req.product_id.clone(),
                        role: req.role,
                        reason: "worker did not complete".to_string(),
                    }
                })
            })
            .collect()
    }

    fn spawn_one(
        &self,
        joinset: &mut JoinSet<(usize, ImageFetchOutcome)>,
        item: &(usize, ImageRequest),
        resolved: &HashMap<String, String>,
        config: FetcherConfig,
        cancel: &CancellationToken,
    ) {
        let (idx, req) = item.clone();
        let url = resolved.get(&req.token).cloned();
        let upstream = Arc::clone(&self.upstream);
        let object_store = Arc::clone(&self.object_store);
        let repo = Arc::clone(&self.repo);
        let rate_limiter = Arc::clone(&self.rate_limiter);
        let http = self.http.clone();
        let cancel = cancel.clone();
        joinset.spawn(async move {
            let outcome = fetch_one(
                &upstream,
                &object_store,
                &repo,
                &rate_limiter,
                &http,
                &req,
                url,
                config,
                &cancel,
            )
            .await;
            (idx, outcome)
        });
    }

    /// Batch-resolves every distinct token across all requests, at most
    /// `RESOLVE_BATCH_SIZE` per upstream call (spec §4.2 step 1).
    async fn resolve_all(&self, requests: &[ImageRequest]) -> HashMap<String, String> {
        let mut tokens: Vec<String> = requests.iter().map(|r| r.token.clone()).collect();
        tokens.sort();
        tokens.dedup();

        let mut resolved = HashMap::new();
        for chunk in tokens.chunks(RESOLVE_BATCH_SIZE) {
            match self.upstream.resolve_attachments(chunk).await {
                Ok(map) => {
                    for (token, attachment) in map {
                        resolved.insert(token, attachment.url);
                    }
                }
                Err(err) => {
                    warn!(error = %err, "attachment resolution batch failed");
                }
            }
        }
        resolved
    }
}

#[derive(Debug, thiserror::Error)]
enum FetchError {
    #[error("no signed url resolved for token")]
    NotResolved,
    #[error("download failed: {0}")]
    Download(#[from] reqwest::Error),
    #[error("signed url expired")]
    Expired,
    #[error("unrecognized image format")]
    UnknownFormat,
    #[error("object store error: {0}")]
    Store(anyhow::Error),
}

fn classify(err: &FetchError) -> ErrorClass {
    match err {
        FetchError::NotResolved => ErrorClass::Fatal,
        FetchError::Expired => ErrorClass::AuthExpired,
        FetchError::UnknownFormat => ErrorClass::Fatal,
        FetchError::Download(_) | FetchError::Store(_) => ErrorClass::Retryable,
    }
}

#[allow(clippy::too_many_arguments)]
async fn fetch_one(
    upstream: &Arc<dyn UpstreamTableClient>,
    object_store: &Arc<dyn ObjectStore>,
    repo: &Arc<dyn ProductRepository>,
    rate_limiter: &Arc<TokenBucket>,
    http: &reqwest::Client,
    req: &ImageRequest,
    mut url: Option<String>,
    config: FetcherConfig,
    cancel: &CancellationToken,
) -> ImageFetchOutcome {
    let product_id = req.product_id.clone();
    let role = req.role;
    let token = req.token.clone();

    let budget = RetryBudget::new(config.retry_attempts);
    let result = with_retry(
        "image_fetch",
        budget,
        cancel,
        classify,
        || async {},
        || {
            let url = url.clone();
            let token = token.clone();
            async {
                rate_limiter.acquire().await;
                let current_url = match &url {
                    Some(u) => u.clone(),
                    None => return Err(FetchError::NotResolved),
                };
                match download_and_verify(http, &current_url).await {
                    Ok(bytes) => {
                        rate_limiter.on_success();
                        Ok(bytes)
                    }
                    Err(FetchError::Expired) => {
                        rate_limiter.on_throttle();
                        match upstream.resolve_attachments(&[token.clone()]).await {
                            Ok(map) => {
                                if let Some(attachment) = map.get(&token) {
                                    url = Some(attachment.url.clone());
                                }
                            }
                            Err(e) => warn!(error = %e, "re-resolve after expiry failed"),
                        }
                        Err(FetchError::Expired)
                    }
                    Err(other) => Err(other),
                }
            }
        },
    )
    .await;

    let bytes = match result {
        Ok(bytes) => bytes,
        Err(RetryError::Cancelled) => {
            return ImageFetchOutcome::Failed {
                product_id,
                role,
                reason: "cancelled".to_string(),
            }
        }
        Err(other) => {
            return ImageFetchOutcome::Failed { product_id, role, reason: other.to_string() }
        }
    };

    let format = match sniff_format(&bytes) {
        Some(f) => f,
        None => {
            return ImageFetchOutcome::Failed {
                product_id,
                role,
                reason: "unrecognized image format".to_string(),
            }
        }
    };

    let content_hash = hex::encode(Sha256::digest(&bytes));

    if let Ok(Some(existing)) = repo.get_image(&product_id, role).await {
        if existing.content_hash == content_hash {
            debug!(product_id = %product_id.as_str(), role = role.as_str(), "image unchanged, skipping upload");
            return ImageFetchOutcome::Fetched(existing);
        }
    }

    let object_key = format!(
        "products/{}_{}_{}.{}",
        product_id.as_str(),
        role.as_str(),
        Utc::now().timestamp_millis(),
        format.extension()
    );
    let content_type = match format {
        catalogsync_core::domain::ImageFormat::Jpeg => "image/jpeg",
        catalogsync_core::domain::ImageFormat::Png => "image/png",
        catalogsync_core::domain::ImageFormat::Webp => "image/webp",
    };
    if let Err(err) = object_store.put(&object_key, &bytes, content_type).await {
        return ImageFetchOutcome::Failed { product_id, role, reason: err.to_string() };
    }

    let image = Image {
        image_id: ImageId::from_uuid(uuid::Uuid::new_v4()),
        product_id: product_id.clone(),
        role,
        object_key: object_key.clone(),
        public_url: object_store.public_url(&object_key),
        content_hash,
        byte_size: bytes.len() as u64,
        format,
        uploaded_at: Utc::now(),
    };

    if let Err(err) = repo.put_image(&image).await {
        return ImageFetchOutcome::Failed { product_id, role, reason: err.to_string() };
    }

    ImageFetchOutcome::Fetched(image)
}

async fn download_and_verify(http: &reqwest::Client, url: &str) -> Result<Vec<u8>, FetchError> {
    let response = http.get(url).send().await?;
    let status = response.status();
    if status.as_u16() == 401 || status.as_u16() == 403 {
        return Err(FetchError::Expired);
    }
    let bytes = response.error_for_status()?.bytes().await?;
    Ok(bytes.to_vec())
}
