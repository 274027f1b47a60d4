//! SQLite-backed `ProductRepository` (spec §4.3).
//!
//! Grounded in the teacher's `SqliteStateRepository`: same row-from-query
//! shape, same dynamic `WHERE`-clause builder for filtered listings
//! (`query_items`), same "everything normalized is carried as a JSON
//! blob column plus indexed scalar columns for querying" layout as the
//! teacher's `sync_items.metadata` column.

use chrono::{DateTime, Utc};
use sqlx::Row;
use std::collections::HashSet;

use catalogsync_core::domain::{
    ContentDigest, Image, ImageFormat, ImageRole, Page, Product, ProductId, ProductStatus, SyncLog,
    SyncLogFilter, SyncLogPage, SyncRunId,
};
use catalogsync_core::ports::{ProductRepository, UpsertOutcome};
use catalogsync_core::usecases::content_digest;

use crate::pool::DatabasePool;

pub struct SqliteProductRepository {
    pool: DatabasePool,
}

impl SqliteProductRepository {
    #[must_use]
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn image_format_from_str(s: &str) -> anyhow::Result<ImageFormat> {
    match s {
        "jpeg" => Ok(ImageFormat::Jpeg),
        "png" => Ok(ImageFormat::Png),
        "webp" => Ok(ImageFormat::Webp),
        other => Err(anyhow::anyhow!("unknown image format '{other}' in stored row")),
    }
}

fn image_format_to_str(f: ImageFormat) -> &'static str {
    match f {
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::Png => "png",
        ImageFormat::Webp => "webp",
    }
}

fn image_from_row(row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<Image> {
    let image_id_str: String = row.try_get("image_id")?;
    let product_id_str: String = row.try_get("product_id")?;
    let role_str: String = row.try_get("role")?;
    let uploaded_at_str: String = row.try_get("uploaded_at")?;
    let format_str: String = row.try_get("format")?;

    Ok(Image {
        image_id: image_id_str.parse().map_err(|e| anyhow::anyhow!("invalid image_id: {e:?}"))?,
        product_id: ProductId::new(product_id_str)?,
        role: ImageRole::parse(&role_str).ok_or_else(|| anyhow::anyhow!("unknown role '{role_str}'"))?,
        object_key: row.try_get("object_key")?,
        public_url: row.try_get("public_url")?,
        content_hash: row.try_get("content_hash")?,
        byte_size: row.try_get::<i64, _>("byte_size")? as u64,
        format: image_format_from_str(&format_str)?,
        uploaded_at: uploaded_at_str.parse::<DateTime<Utc>>()?,
    })
}

fn sync_log_from_row(row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<SyncLog> {
    let id_str: String = row.try_get("id")?;
    let mode_json: String = row.try_get("mode")?;
    let status_json: String = row.try_get("status")?;
    let start_time_str: String = row.try_get("start_time")?;
    let end_time_str: Option<String> = row.try_get("end_time")?;
    let options_json: String = row.try_get("options")?;
    let progress_json: String = row.try_get("progress")?;
    let errors_json: String = row.try_get("errors")?;
    let logs_json: String = row.try_get("logs")?;

    Ok(SyncLog {
        id: SyncRunId::new(id_str)?,
        mode: serde_json::from_str(&mode_json)?,
        status: serde_json::from_str(&status_json)?,
        start_time: start_time_str.parse::<DateTime<Utc>>()?,
        end_time: end_time_str.map(|s| s.parse::<DateTime<Utc>>()).transpose()?,
        options: serde_json::from_str(&options_json)?,
        progress: serde_json::from_str(&progress_json)?,
        errors: serde_json::from_str(&errors_json)?,
        logs: serde_json::from_str(&logs_json)?,
    })
}

fn status_to_str(status: ProductStatus) -> &'static str {
    match status {
        ProductStatus::Active => "active",
        ProductStatus::Inactive => "inactive",
        ProductStatus::Deleted => "deleted",
    }
}

#[async_trait::async_trait]
impl ProductRepository for SqliteProductRepository {
    async fn upsert_batch(&self, products: &[Product]) -> anyhow::Result<UpsertOutcome> {
        let mut outcome = UpsertOutcome::default();

        for product in products {
            let digest = content_digest(product);

            let existing = sqlx::query_as::<_, (String, i64)>(
                "SELECT content_digest, version FROM products WHERE product_id = ?",
            )
            .bind(product.product_id.as_str())
            .fetch_optional(self.pool.pool())
            .await?;

            if existing.as_ref().map(|(d, _)| d.as_str()) == Some(digest.as_str()) {
                outcome.skipped += 1;
                continue;
            }

            // `sync_time` is set here, at upsert, never by the mapper
            // (spec §3.1); `version` only increases, computed from the
            // stored row rather than trusted from the incoming product
            // (spec §3.1/§8 "version only increases").
            let mut product = product.clone();
            product.sync_time = Utc::now();
            product.version = existing.as_ref().map_or(1, |(_, stored_version)| stored_version + 1);
            let product = &product;

            let data = serde_json::to_string(product)?;
            sqlx::query(
                "INSERT INTO products (
                    product_id, content_digest, version, status, is_visible,
                    collect_time, sync_time, category_primary, category_secondary,
                    platform_display, manufacturer_display, name_display, data
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(product_id) DO UPDATE SET
                    content_digest = excluded.content_digest,
                    version = excluded.version,
                    status = excluded.status,
                    is_visible = excluded.is_visible,
                    collect_time = excluded.collect_time,
                    sync_time = excluded.sync_time,
                    category_primary = excluded.category_primary,
                    category_secondary = excluded.category_secondary,
                    platform_display = excluded.platform_display,
                    manufacturer_display = excluded.manufacturer_display,
                    name_display = excluded.name_display,
                    data = excluded.data",
            )
            .bind(product.product_id.as_str())
            .bind(digest.as_str())
            .bind(product.version)
            .bind(status_to_str(product.status))
            .bind(product.is_visible)
            .bind(product.collect_time.to_rfc3339())
            .bind(product.sync_time.to_rfc3339())
            .bind(&product.category.primary.display)
            .bind(&product.category.secondary.display)
            .bind(&product.platform.display)
            .bind(&product.manufacturer.display)
            .bind(&product.name.display)
            .bind(data)
            .execute(self.pool.pool())
            .await?;

            // FTS5 has no upsert; re-indexing is delete-then-insert. Best
            // effort — text search is not a core sync path.
            let _ = sqlx::query("DELETE FROM products_fts WHERE product_id = ?")
                .bind(product.product_id.as_str())
                .execute(self.pool.pool())
                .await;
            let _ = sqlx::query(
                "INSERT INTO products_fts(product_id, name_display, manufacturer_display) VALUES (?, ?, ?)",
            )
            .bind(product.product_id.as_str())
            .bind(&product.name.display)
            .bind(&product.manufacturer.display)
            .execute(self.pool.pool())
            .await;

            if existing.is_some() {
                outcome.updated += 1;
            } else {
                outcome.created += 1;
            }
        }

        Ok(outcome)
    }

    async fn find_ids(&self, since: Option<DateTime<Utc>>) -> anyhow::Result<HashSet<ProductId>> {
        let rows = match since {
            Some(since) => {
                sqlx::query("SELECT product_id FROM products WHERE sync_time > ?")
                    .bind(since.to_rfc3339())
                    .fetch_all(self.pool.pool())
                    .await?
            }
            None => {
                sqlx::query("SELECT product_id FROM products")
                    .fetch_all(self.pool.pool())
                    .await?
            }
        };

        rows.iter()
            .map(|row| {
                let id: String = row.try_get("product_id")?;
                Ok(ProductId::new(id)?)
            })
            .collect()
    }

    async fn content_digest(&self, id: &ProductId) -> anyhow::Result<Option<ContentDigest>> {
        let digest: Option<String> =
            sqlx::query_scalar("SELECT content_digest FROM products WHERE product_id = ?")
                .bind(id.as_str())
                .fetch_optional(self.pool.pool())
                .await?;
        Ok(digest.map(ContentDigest::from_hex))
    }

    async fn soft_delete(&self, product_ids: &[ProductId]) -> anyhow::Result<()> {
        for id in product_ids {
            sqlx::query(
                "UPDATE products SET status = 'deleted', is_visible = 0, version = version + 1 WHERE product_id = ?",
            )
            .bind(id.as_str())
            .execute(self.pool.pool())
            .await?;
        }
        Ok(())
    }

    async fn get_image(&self, product_id: &ProductId, role: ImageRole) -> anyhow::Result<Option<Image>> {
        let row = sqlx::query("SELECT * FROM images WHERE product_id = ? AND role = ?")
            .bind(product_id.as_str())
            .bind(role.as_str())
            .fetch_optional(self.pool.pool())
            .await?;
        row.as_ref().map(image_from_row).transpose()
    }

    async fn put_image(&self, image: &Image) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO images (
                image_id, product_id, role, object_key, public_url,
                content_hash, byte_size, format, uploaded_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(product_id, role) DO UPDATE SET
                image_id = excluded.image_id,
                object_key = excluded.object_key,
                public_url = excluded.public_url,
                content_hash = excluded.content_hash,
                byte_size = excluded.byte_size,
                format = excluded.format,
                uploaded_at = excluded.uploaded_at",
        )
        .bind(image.image_id.to_string())
        .bind(image.product_id.as_str())
        .bind(image.role.as_str())
        .bind(&image.object_key)
        .bind(&image.public_url)
        .bind(&image.content_hash)
        .bind(image.byte_size as i64)
        .bind(image_format_to_str(image.format))
        .bind(image.uploaded_at.to_rfc3339())
        .execute(self.pool.pool())
        .await?;
        Ok(())
    }

    async fn put_sync_log(&self, log: &SyncLog) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO sync_logs (id, mode, status, start_time, end_time, options, progress, errors, logs)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                end_time = excluded.end_time,
                progress = excluded.progress,
                errors = excluded.errors,
                logs = excluded.logs",
        )
        .bind(log.id.as_str())
        .bind(serde_json::to_string(&log.mode)?)
        .bind(serde_json::to_string(&log.status)?)
        .bind(log.start_time.to_rfc3339())
        .bind(log.end_time.map(|t| t.to_rfc3339()))
        .bind(serde_json::to_string(&log.options)?)
        .bind(serde_json::to_string(&log.progress)?)
        .bind(serde_json::to_string(&log.errors)?)
        .bind(serde_json::to_string(&log.logs)?)
        .execute(self.pool.pool())
        .await?;
        Ok(())
    }

    async fn list_sync_logs(&self, filter: &SyncLogFilter, page: Page) -> anyhow::Result<SyncLogPage> {
        let mut sql = String::from("SELECT * FROM sync_logs WHERE 1=1");
        let mut binds: Vec<String> = Vec::new();

        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            binds.push(serde_json::to_string(&status)?);
        }
        if let Some(mode) = filter.mode {
            sql.push_str(" AND mode = ?");
            binds.push(serde_json::to_string(&mode)?);
        }
        if let Some(from) = filter.date_from {
            sql.push_str(" AND start_time >= ?");
            binds.push(from.to_rfc3339());
        }
        if let Some(to) = filter.date_to {
            sql.push_str(" AND start_time <= ?");
            binds.push(to.to_rfc3339());
        }

        let count_sql = format!("SELECT COUNT(*) FROM ({sql})");
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        for bind in &binds {
            count_query = count_query.bind(bind);
        }
        let total = count_query.fetch_one(self.pool.pool()).await? as u64;

        sql.push_str(" ORDER BY start_time DESC LIMIT ? OFFSET ?");
        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = query.bind(bind);
        }
        query = query.bind(page.limit).bind(page.offset);

        let rows = query.fetch_all(self.pool.pool()).await?;
        let items = rows.iter().map(sync_log_from_row).collect::<anyhow::Result<Vec<_>>>()?;

        Ok(SyncLogPage { items, total })
    }

    async fn get_sync_log(&self, id: &SyncRunId) -> anyhow::Result<Option<SyncLog>> {
        let row = sqlx::query("SELECT * FROM sync_logs WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(self.pool.pool())
            .await?;
        row.as_ref().map(sync_log_from_row).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalogsync_core::domain::{Category, LocalizedText, Origin, Price, SyncMode, SyncOptions, SyncRun, SyncStatus};
    use catalogsync_core::domain::product::ImageRef;
    use std::collections::BTreeMap;

    async fn repo() -> SqliteProductRepository {
        SqliteProductRepository::new(DatabasePool::in_memory().await.unwrap())
    }

    fn sample_product(id: &str, version: i64) -> Product {
        let now = Utc::now();
        Product {
            product_id: ProductId::new(id).unwrap(),
            internal_id: None,
            sequence: None,
            name: LocalizedText::new("苹果", "Apple", "Apple"),
            category: Category::default(),
            price: Price::default(),
            images: BTreeMap::new(),
            origin: Origin::default(),
            platform: LocalizedText::default(),
            specification: LocalizedText::default(),
            flavor: LocalizedText::default(),
            manufacturer: LocalizedText::default(),
            barcode: None,
            link: None,
            collect_time: now,
            sync_time: now,
            version,
            status: ProductStatus::Active,
            is_visible: true,
        }
    }

    #[tokio::test]
    async fn upsert_creates_then_skips_identical_then_updates() {
        let repo = repo().await;
        let p = sample_product("rec1", 1);

        let outcome = repo.upsert_batch(&[p.clone()]).await.unwrap();
        assert_eq!(outcome.created, 1);
        assert_eq!(outcome.updated, 0);
        assert_eq!(outcome.skipped, 0);

        let outcome = repo.upsert_batch(&[p.clone()]).await.unwrap();
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.created, 0);

        let mut changed = p.clone();
        changed.name.display = "Banana".to_string();
        changed.version = 2;
        let outcome = repo.upsert_batch(&[changed]).await.unwrap();
        assert_eq!(outcome.updated, 1);
    }

    /// spec §3.1/§8: "version only increases". The repository must
    /// compute the next version from the stored row, not trust whatever
    /// version the caller attached to the incoming product (the mapper
    /// always attaches a placeholder `1`, spec §4.1/§8 purity).
    #[tokio::test]
    async fn version_increments_from_stored_row_regardless_of_incoming_version() {
        let repo = repo().await;
        let p = sample_product("rec1", 1);

        repo.upsert_batch(&[p.clone()]).await.unwrap();
        let stored: i64 = sqlx::query_scalar("SELECT version FROM products WHERE product_id = ?")
            .bind("rec1")
            .fetch_one(repo_pool(&repo))
            .await
            .unwrap();
        assert_eq!(stored, 1);

        let mut changed = p.clone();
        changed.name.display = "Banana".to_string();
        changed.version = 1; // incoming version is still the mapper's placeholder
        repo.upsert_batch(&[changed]).await.unwrap();
        let stored: i64 = sqlx::query_scalar("SELECT version FROM products WHERE product_id = ?")
            .bind("rec1")
            .fetch_one(repo_pool(&repo))
            .await
            .unwrap();
        assert_eq!(stored, 2);

        let mut changed_again = p.clone();
        changed_again.name.display = "Cherry".to_string();
        changed_again.version = 1;
        repo.upsert_batch(&[changed_again]).await.unwrap();
        let stored: i64 = sqlx::query_scalar("SELECT version FROM products WHERE product_id = ?")
            .bind("rec1")
            .fetch_one(repo_pool(&repo))
            .await
            .unwrap();
        assert_eq!(stored, 3);
    }

    #[tokio::test]
    async fn find_ids_filters_by_sync_time() {
        let repo = repo().await;
        let p1 = sample_product("rec1", 1);
        repo.upsert_batch(&[p1]).await.unwrap();

        let cutoff = Utc::now() + chrono::Duration::seconds(5);
        let ids = repo.find_ids(Some(cutoff)).await.unwrap();
        assert!(ids.is_empty());

        let ids = repo.find_ids(None).await.unwrap();
        assert_eq!(ids.len(), 1);
    }

    #[tokio::test]
    async fn soft_delete_flips_status_and_visibility() {
        let repo = repo().await;
        let p = sample_product("rec1", 1);
        repo.upsert_batch(&[p.clone()]).await.unwrap();

        repo.soft_delete(&[p.product_id.clone()]).await.unwrap();

        let row = sqlx::query("SELECT status, is_visible FROM products WHERE product_id = ?")
            .bind(p.product_id.as_str())
            .fetch_one(repo_pool(&repo))
            .await
            .unwrap();
        let status: String = row.try_get("status").unwrap();
        let visible: i64 = row.try_get("is_visible").unwrap();
        assert_eq!(status, "deleted");
        assert_eq!(visible, 0);
    }

    #[tokio::test]
    async fn image_roundtrips_and_dedups_by_role() {
        let repo = repo().await;
        let p = sample_product("rec1", 1);
        repo.upsert_batch(&[p.clone()]).await.unwrap();

        let image = Image {
            image_id: "00000000-0000-0000-0000-000000000001".parse().unwrap(),
            product_id: p.product_id.clone(),
            role: ImageRole::Front,
            object_key: "products/rec1_front_1.jpg".to_string(),
            public_url: "http://localhost/products/rec1_front_1.jpg".to_string(),
            content_hash: "abc".to_string(),
            byte_size: 10,
            format: ImageFormat::Jpeg,
            uploaded_at: Utc::now(),
        };
        repo.put_image(&image).await.unwrap();

        let fetched = repo.get_image(&p.product_id, ImageRole::Front).await.unwrap().unwrap();
        assert_eq!(fetched.content_hash, "abc");

        let mut updated = image.clone();
        updated.content_hash = "def".to_string();
        repo.put_image(&updated).await.unwrap();
        let fetched = repo.get_image(&p.product_id, ImageRole::Front).await.unwrap().unwrap();
        assert_eq!(fetched.content_hash, "def");
    }

    #[tokio::test]
    async fn sync_log_roundtrips_and_filters_by_status() {
        let repo = repo().await;
        let mut run = SyncRun::new(SyncRunId::generate(1), SyncMode::Full, SyncOptions::default(), Utc::now());
        run.start().unwrap();
        let log = SyncLog::from(&run);
        repo.put_sync_log(&log).await.unwrap();

        let fetched = repo.get_sync_log(&run.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, run.id);

        let filter = SyncLogFilter { status: Some(SyncStatus::Running), ..Default::default() };
        let page = repo.list_sync_logs(&filter, Page::default()).await.unwrap();
        assert_eq!(page.total, 1);

        let filter = SyncLogFilter { status: Some(SyncStatus::Completed), ..Default::default() };
        let page = repo.list_sync_logs(&filter, Page::default()).await.unwrap();
        assert_eq!(page.total, 0);
    }

    fn repo_pool(repo: &SqliteProductRepository) -> &sqlx::SqlitePool {
        repo.pool.pool()
    }
}
