use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use super::{StateStore, StoreError};

/// Breaker states kept in a SQLite table, shared by every process that opens
/// the same database file.
#[derive(Debug, Clone)]
pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if needed) the database at `database_url` and applies
    /// the bundled migrations.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_millis(500));
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now_str = format_utc(Utc::now());

        let state: Option<String> = sqlx::query_scalar(
            r#"
            SELECT state
            FROM breaker_states
            WHERE name = ?
              AND (expires_at IS NULL OR expires_at > ?)
            "#,
        )
        .bind(key)
        .bind(&now_str)
        .fetch_optional(&self.pool)
        .await?;

        Ok(state)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let now = Utc::now();
        let expires_at = if ttl.is_zero() {
            None
        } else {
            let ttl = chrono::Duration::from_std(ttl)
                .map_err(|err| StoreError::Parse(format!("invalid ttl: {err}")))?;
            Some(format_utc(now + ttl))
        };

        sqlx::query(
            r#"
            INSERT INTO breaker_states (
                name,
                state,
                expires_at,
                updated_at
            )
            VALUES (?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                state = excluded.state,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(expires_at.as_deref())
        .bind(format_utc(now))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn format_utc(dt: chrono::DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}
