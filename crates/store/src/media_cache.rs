use {async_trait::async_trait, reelay_common::time::now_secs, sqlx::SqlitePool};

use crate::error::Result;

/// A previously relayed video, keyed by its normalized source URL.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct CacheEntry {
    pub url: String,
    /// Durable Telegram `file_id` returned when the video was first sent.
    pub file_id: String,
    pub created_at: i64,
}

/// URL to durable media reference cache.
///
/// Entries are never overwritten: the first successful insert for a URL is
/// authoritative and later inserts for the same URL are ignored.
#[async_trait]
pub trait MediaCache: Send + Sync {
    async fn get(&self, url: &str) -> Result<Option<CacheEntry>>;

    /// Insert unless an entry already exists. Returns `true` when this call
    /// created the entry.
    async fn insert_if_absent(&self, url: &str, file_id: &str) -> Result<bool>;

    /// Most recent entries first.
    async fn list(&self, limit: u32) -> Result<Vec<CacheEntry>>;

    /// Drop one entry. Returns `true` if it existed.
    async fn remove(&self, url: &str) -> Result<bool>;
}

/// SQLite-backed media cache.
pub struct SqliteMediaCache {
    pool: SqlitePool,
}

impl SqliteMediaCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MediaCache for SqliteMediaCache {
    async fn get(&self, url: &str) -> Result<Option<CacheEntry>> {
        let row = sqlx::query_as::<_, CacheEntry>(
            "SELECT url, file_id, created_at FROM video_cache WHERE url = ?",
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn insert_if_absent(&self, url: &str, file_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO video_cache (url, file_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(url)
        .bind(file_id)
        .bind(now_secs())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, limit: u32) -> Result<Vec<CacheEntry>> {
        let rows = sqlx::query_as::<_, CacheEntry>(
            "SELECT url, file_id, created_at FROM video_cache
             ORDER BY created_at DESC, url
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn remove(&self, url: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM video_cache WHERE url = ?")
            .bind(url)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
