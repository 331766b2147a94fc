//! `reelay cache` and `reelay users`: read-mostly views of the database.

use {
    anyhow::Result,
    clap::Subcommand,
    reelay_config::ReelayConfig,
    reelay_media::normalize_url,
    reelay_store::{MediaCache, SqliteMediaCache, SqliteUserRegistry, UserRegistry},
};

#[derive(Subcommand)]
pub enum CacheAction {
    /// Show the cached reference for a link (any spelling of it).
    Get { url: String },
    /// List the most recent entries.
    List {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Drop the entry for a link so the next request downloads again.
    Remove { url: String },
}

#[derive(Subcommand)]
pub enum UsersAction {
    /// List users, most recently seen first.
    List,
}

async fn open(config: &ReelayConfig) -> Result<sqlx::SqlitePool> {
    let pool = reelay_store::connect(&config.database.path).await?;
    reelay_store::run_migrations(&pool).await?;
    Ok(pool)
}

pub async fn handle_cache(action: CacheAction, config: &ReelayConfig) -> Result<()> {
    let pool = open(config).await?;
    let cache = SqliteMediaCache::new(pool.clone());

    match action {
        CacheAction::Get { url } => {
            let key = normalize_url(&url);
            match cache.get(&key).await? {
                Some(entry) => {
                    println!("url:        {}", entry.url);
                    println!("file_id:    {}", entry.file_id);
                    println!("created_at: {}", entry.created_at);
                },
                None => println!("Not cached: {key}"),
            }
        },
        CacheAction::List { limit } => {
            let entries = cache.list(limit).await?;
            if entries.is_empty() {
                println!("Cache is empty.");
            }
            for entry in entries {
                println!("{}  {}  {}", entry.created_at, entry.url, entry.file_id);
            }
        },
        CacheAction::Remove { url } => {
            let key = normalize_url(&url);
            if cache.remove(&key).await? {
                println!("Removed: {key}");
            } else {
                println!("Not cached: {key}");
            }
        },
    }

    pool.close().await;
    Ok(())
}

pub async fn handle_users(action: UsersAction, config: &ReelayConfig) -> Result<()> {
    let pool = open(config).await?;
    let users = SqliteUserRegistry::new(pool.clone());

    match action {
        UsersAction::List => {
            let records = users.list().await?;
            if records.is_empty() {
                println!("No users yet.");
            }
            for user in &records {
                let username = user
                    .username
                    .as_deref()
                    .map(|u| format!("@{u}"))
                    .unwrap_or_else(|| "-".into());
                println!(
                    "{:>12}  {:<20}  {:<24}  joined {}  seen {}",
                    user.user_id, username, user.full_name, user.joined_at, user.last_seen
                );
            }
            println!("{} user(s)", records.len());
        },
    }

    pool.close().await;
    Ok(())
}
