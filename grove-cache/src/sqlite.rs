//! SQLite cache backend.
//!
//! Each conditional write is a single SQL statement whose affected-row count
//! tells whether the precondition held, so concurrent processes sharing the
//! database file see atomic compare-and-swap per key.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use crate::{check_arguments, Cache, CacheError};

/// SQLite-based cache.
///
/// Uses WAL mode for concurrent reads/writes.
#[derive(Clone)]
pub struct SqliteCache {
    pool: SqlitePool,
}

impl SqliteCache {
    /// Open (or create) a cache database at `path`.
    pub async fn new(path: &Path) -> Result<Self, CacheError> {
        let path_str = path.to_str().ok_or_else(|| CacheError::InvalidPath {
            path: path.to_path_buf(),
        })?;

        let options = SqliteConnectOptions::from_str(path_str)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let cache = Self { pool };
        cache.run_migrations().await?;
        tracing::debug!("Opened sqlite cache at {}", path.display());
        Ok(cache)
    }

    /// Create an in-memory SQLite cache (for testing).
    pub async fn in_memory() -> Result<Self, CacheError> {
        let options = SqliteConnectOptions::from_str(":memory:")?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let cache = Self { pool };
        cache.run_migrations().await?;
        Ok(cache)
    }

    async fn run_migrations(&self) -> Result<(), CacheError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cache (
                pk TEXT NOT NULL,
                sk TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (pk, sk)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl Cache for SqliteCache {
    async fn get(&self, pk: &str, sk: &str) -> Result<Option<String>, CacheError> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM cache WHERE pk = ?1 AND sk = ?2")
                .bind(pk)
                .bind(sk)
                .fetch_optional(&self.pool)
                .await?;

        Ok(value)
    }

    async fn set(
        &self,
        pk: &str,
        sk: &str,
        value: &str,
        not_set: bool,
        constraint: Option<&str>,
    ) -> Result<(), CacheError> {
        check_arguments(not_set, constraint)?;

        let result = if not_set {
            sqlx::query(
                r#"
                INSERT INTO cache (pk, sk, value) VALUES (?1, ?2, ?3)
                ON CONFLICT(pk, sk) DO NOTHING
                "#,
            )
            .bind(pk)
            .bind(sk)
            .bind(value)
            .execute(&self.pool)
            .await?
        } else if let Some(expected) = constraint {
            sqlx::query("UPDATE cache SET value = ?3 WHERE pk = ?1 AND sk = ?2 AND value = ?4")
                .bind(pk)
                .bind(sk)
                .bind(value)
                .bind(expected)
                .execute(&self.pool)
                .await?
        } else {
            sqlx::query(
                r#"
                INSERT INTO cache (pk, sk, value) VALUES (?1, ?2, ?3)
                ON CONFLICT(pk, sk) DO UPDATE SET value = excluded.value
                "#,
            )
            .bind(pk)
            .bind(sk)
            .bind(value)
            .execute(&self.pool)
            .await?
        };

        if (not_set || constraint.is_some()) && result.rows_affected() == 0 {
            return Err(CacheError::constraint(pk, sk));
        }
        Ok(())
    }

    async fn delete(
        &self,
        pk: &str,
        sk: &str,
        constraint: Option<&str>,
    ) -> Result<(), CacheError> {
        match constraint {
            Some(expected) => {
                let result =
                    sqlx::query("DELETE FROM cache WHERE pk = ?1 AND sk = ?2 AND value = ?3")
                        .bind(pk)
                        .bind(sk)
                        .bind(expected)
                        .execute(&self.pool)
                        .await?;
                if result.rows_affected() == 0 {
                    return Err(CacheError::constraint(pk, sk));
                }
            }
            None => {
                sqlx::query("DELETE FROM cache WHERE pk = ?1 AND sk = ?2")
                    .bind(pk)
                    .bind(sk)
                    .execute(&self.pool)
                    .await?;
            }
        }
        Ok(())
    }
}
