use {async_trait::async_trait, sqlx::SqlitePool};

use crate::error::Result;

/// Identity of a user as observed on an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSighting {
    pub user_id: i64,
    pub username: Option<String>,
    pub full_name: String,
}

/// Stored user registry row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct UserRecord {
    pub user_id: i64,
    pub username: Option<String>,
    pub full_name: String,
    pub joined_at: i64,
    pub last_seen: i64,
}

/// Registry of users who have interacted with the bot.
#[async_trait]
pub trait UserRegistry: Send + Sync {
    /// Insert the user, or refresh name fields and `last_seen` if known.
    /// `joined_at` is only written on first sight.
    async fn upsert(&self, user: &UserSighting, seen_at: i64) -> Result<()>;
    async fn get(&self, user_id: i64) -> Result<Option<UserRecord>>;
    /// Most recently seen first.
    async fn list(&self) -> Result<Vec<UserRecord>>;
}

/// SQLite-backed user registry.
pub struct SqliteUserRegistry {
    pool: SqlitePool,
}

impl SqliteUserRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRegistry for SqliteUserRegistry {
    async fn upsert(&self, user: &UserSighting, seen_at: i64) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO users (user_id, username, full_name, joined_at, last_seen)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT(user_id) DO UPDATE SET
                 username = excluded.username,
                 full_name = excluded.full_name,
                 last_seen = excluded.last_seen"#,
        )
        .bind(user.user_id)
        .bind(&user.username)
        .bind(&user.full_name)
        .bind(seen_at)
        .bind(seen_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, user_id: i64) -> Result<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRecord>(
            "SELECT user_id, username, full_name, joined_at, last_seen FROM users WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list(&self) -> Result<Vec<UserRecord>> {
        let rows = sqlx::query_as::<_, UserRecord>(
            "SELECT user_id, username, full_name, joined_at, last_seen FROM users
             ORDER BY last_seen DESC, user_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> UserSighting {
        UserSighting {
            user_id: 1001,
            username: Some("alice".into()),
            full_name: "Alice Liddell".into(),
        }
    }

    #[tokio::test]
    async fn upsert_inserts_new_user() {
        let registry = SqliteUserRegistry::new(crate::test_pool().await);
        registry.upsert(&alice(), 100).await.unwrap();

        let got = registry.get(1001).await.unwrap().unwrap();
        assert_eq!(got.username.as_deref(), Some("alice"));
        assert_eq!(got.joined_at, 100);
        assert_eq!(got.last_seen, 100);
    }

    #[tokio::test]
    async fn upsert_refreshes_profile_but_keeps_joined_at() {
        let registry = SqliteUserRegistry::new(crate::test_pool().await);
        registry.upsert(&alice(), 100).await.unwrap();

        let renamed = UserSighting {
            username: None,
            full_name: "Alice".into(),
            ..alice()
        };
        registry.upsert(&renamed, 250).await.unwrap();

        let got = registry.get(1001).await.unwrap().unwrap();
        assert_eq!(got.username, None);
        assert_eq!(got.full_name, "Alice");
        assert_eq!(got.joined_at, 100);
        assert_eq!(got.last_seen, 250);
        assert_eq!(registry.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_orders_by_last_seen() {
        let registry = SqliteUserRegistry::new(crate::test_pool().await);
        registry.upsert(&alice(), 100).await.unwrap();
        registry
            .upsert(
                &UserSighting {
                    user_id: 2002,
                    username: None,
                    full_name: "Bob".into(),
                },
                200,
            )
            .await
            .unwrap();

        let users = registry.list().await.unwrap();
        assert_eq!(users[0].user_id, 2002);
        assert_eq!(users[1].user_id, 1001);
    }

    #[tokio::test]
    async fn get_unknown_user() {
        let registry = SqliteUserRegistry::new(crate::test_pool().await);
        assert!(registry.get(42).await.unwrap().is_none());
    }
}
