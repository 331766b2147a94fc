//! SQLite persistence for the bot.
//!
//! Two tables: `users` (upsert by Telegram user ID) and `video_cache`
//! (normalized source URL to Telegram `file_id`, insert-if-absent).

pub mod error;
pub mod media_cache;
pub mod users;

use std::{path::Path, str::FromStr};

use {
    sqlx::{
        SqlitePool,
        sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    },
    tracing::debug,
};

pub use {
    error::{Error, Result},
    media_cache::{CacheEntry, MediaCache, SqliteMediaCache},
    users::{SqliteUserRegistry, UserRecord, UserRegistry, UserSighting},
};

/// Open (creating if needed) the database file at `path`.
///
/// Parent directories are created. Does not run migrations.
pub async fn connect(path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    debug!(path = %path.display(), "opening database");
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    Ok(pool)
}

/// Run database migrations for the `users` and `video_cache` tables.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Single-connection in-memory pool with migrations applied, for tests.
#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    #[allow(clippy::expect_used)]
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("open in-memory sqlite");
    #[allow(clippy::expect_used)]
    run_migrations(&pool).await.expect("run migrations");
    pool
}
