//! Object store port (driven/secondary port, spec §3.3, §4.2, §6.4)
//!
//! Binary attachment storage. Treated as a capability interface per the
//! spec's explicit non-goal that the object store engine itself is out
//! of scope; `catalogsync-images` reference implementation provides a
//! filesystem-backed adapter for local runs and tests.

#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Uploads `bytes` under `key`, overwriting any existing object there.
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> anyhow::Result<()>;

    /// Returns true if an object exists at `key`.
    async fn exists(&self, key: &str) -> anyhow::Result<bool>;

    /// Builds the canonical public URL for `key` (spec §6.4), using this
    /// store's configured scheme/host/port/bucket.
    fn public_url(&self, key: &str) -> String;
}
