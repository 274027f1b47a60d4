//! Filesystem-backed `ObjectStore` reference adapter (spec §4.10).
//!
//! Not the object-store engine itself (explicitly out of scope) — a
//! small adapter good enough for local runs and integration tests,
//! writing files under a configured root directory and serving public
//! URLs from a configured base.

use std::path::PathBuf;

use catalogsync_core::domain::normalize_object_key;
use catalogsync_core::ports::ObjectStore;
use tokio::fs;

pub struct LocalObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStore {
    /// `public_base_url` should not have a trailing slash, e.g.
    /// `http://localhost:8080/objects`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self { root: root.into(), public_base_url: public_base_url.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(normalize_object_key(key))
    }
}

#[async_trait::async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, key: &str, bytes: &[u8], _content_type: &str) -> anyhow::Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, bytes).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        Ok(fs::metadata(self.path_for(key)).await.is_ok())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, normalize_object_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_exists_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "http://localhost/objects");
        store.put("products/p1_front_1.jpg", b"hello", "image/jpeg").await.unwrap();
        assert!(store.exists("products/p1_front_1.jpg").await.unwrap());
        assert!(!store.exists("products/missing.jpg").await.unwrap());
    }

    #[tokio::test]
    async fn legacy_prefixed_keys_normalize_on_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "http://localhost/objects");
        store.put("originals/p1_front_1.jpg", b"hello", "image/jpeg").await.unwrap();
        assert!(store.exists("products/p1_front_1.jpg").await.unwrap());
    }

    #[test]
    fn public_url_uses_canonical_prefix() {
        let store = LocalObjectStore::new("/tmp/objects", "http://localhost/objects");
        assert_eq!(
            store.public_url("originals/p1_front_1.jpg"),
            "http://localhost/objects/products/p1_front_1.jpg"
        );
    }
}
