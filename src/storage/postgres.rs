//! PostgresBucketStorage - Production Storage
//!
//! TigerStyle: Real database storage, one transaction per mutating call.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  PostgresBucketStorage                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Pool: sqlx::PgPool (connection pooling)                     │
//! │  Table: bucket (id, user_id)                                 │
//! │  Table: bucket_item (id, bucket_id, toy_id, quantity)        │
//! │  Unique: bucket(user_id), bucket_item(bucket_id, toy_id)     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS bucket (
//!     id BIGSERIAL PRIMARY KEY,
//!     user_id BIGINT NOT NULL UNIQUE
//! );
//! CREATE TABLE IF NOT EXISTS bucket_item (
//!     id BIGSERIAL PRIMARY KEY,
//!     bucket_id BIGINT NOT NULL REFERENCES bucket(id) ON DELETE CASCADE,
//!     toy_id BIGINT NOT NULL,
//!     quantity INTEGER NOT NULL CHECK (quantity > 0),
//!     UNIQUE (bucket_id, toy_id)
//! );
//! ```
//!
//! The `(bucket_id, toy_id)` constraint is what keeps concurrent adds for the
//! same toy from producing duplicate rows.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use super::error::{StorageError, StorageResult};
use super::{bounded, BucketStorage};
use crate::config::StorageConfig;
use crate::domain::{BucketContents, BucketId, BucketItem, Deadline, ToyId, UserId};

// =============================================================================
// Queries
// =============================================================================

const SCHEMA: [&str; 2] = [
    r"
    CREATE TABLE IF NOT EXISTS bucket (
        id BIGSERIAL PRIMARY KEY,
        user_id BIGINT NOT NULL UNIQUE
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS bucket_item (
        id BIGSERIAL PRIMARY KEY,
        bucket_id BIGINT NOT NULL REFERENCES bucket(id) ON DELETE CASCADE,
        toy_id BIGINT NOT NULL,
        quantity INTEGER NOT NULL CHECK (quantity > 0),
        UNIQUE (bucket_id, toy_id)
    )
    ",
];

const SELECT_BUCKET_ID: &str = "SELECT id FROM bucket WHERE user_id = $1";

const INSERT_BUCKET: &str = "INSERT INTO bucket (user_id) VALUES ($1) RETURNING id";

const UPSERT_ITEM: &str = r"
    INSERT INTO bucket_item (bucket_id, toy_id, quantity)
    VALUES ($1, $2, $3)
    ON CONFLICT (bucket_id, toy_id)
    DO UPDATE SET quantity = bucket_item.quantity + EXCLUDED.quantity
    RETURNING id
";

const DELETE_ITEM: &str = "DELETE FROM bucket_item WHERE bucket_id = $1 AND toy_id = $2";

const SELECT_ITEMS: &str =
    "SELECT toy_id, quantity FROM bucket_item WHERE bucket_id = $1 ORDER BY id";

// =============================================================================
// PostgresBucketStorage
// =============================================================================

/// PostgreSQL bucket storage for production use.
///
/// TigerStyle: Connection pooling, explicit schema, bounded calls.
#[derive(Debug, Clone)]
pub struct PostgresBucketStorage {
    pool: PgPool,
    window: Duration,
}

impl PostgresBucketStorage {
    /// Connect, retrying, then create the schema.
    ///
    /// # Errors
    /// Returns `Connection` once every attempt has failed, or if the schema
    /// cannot be created.
    ///
    /// # Example
    /// ```ignore
    /// let storage = PostgresBucketStorage::connect(&config.storage()).await?;
    /// ```
    pub async fn connect(config: &StorageConfig) -> StorageResult<Self> {
        if !(config.dsn.starts_with("postgres://") || config.dsn.starts_with("postgresql://")) {
            return Err(StorageError::connection("connection string must be a postgres URL"));
        }

        let options = || {
            PgPoolOptions::new()
                .max_connections(config.max_open_conns)
                .min_connections(config.max_idle_conns.min(config.max_open_conns))
                .idle_timeout(config.max_idle_time)
                .acquire_timeout(config.window)
        };

        let mut attempt = 1;
        let pool = loop {
            match options().connect(&config.dsn).await {
                Ok(pool) => break pool,
                Err(e) if attempt < config.connect_attempts => {
                    tracing::warn!(
                        attempt,
                        attempts = config.connect_attempts,
                        error = %e,
                        "retrying DB connection"
                    );
                    tokio::time::sleep(config.connect_retry_delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(StorageError::connection(format!(
                        "failed to connect after {attempt} attempts: {e}"
                    )));
                }
            }
        };

        Self::from_pool(pool, config.window).await
    }

    /// Create from an existing pool.
    ///
    /// # Errors
    /// Returns error if the ping or schema creation fails.
    pub async fn from_pool(pool: PgPool, window: Duration) -> StorageResult<Self> {
        let storage = Self { pool, window };
        storage.ping().await?;
        storage.init_schema().await?;
        Ok(storage)
    }

    async fn ping(&self) -> StorageResult<()> {
        bounded("ping", self.window, Deadline::none(), async {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::connection(format!("ping failed: {e}")))?;
            Ok(())
        })
        .await
    }

    /// Initialize database schema.
    async fn init_schema(&self) -> StorageResult<()> {
        bounded("init_schema", self.window, Deadline::none(), async {
            for statement in SCHEMA {
                sqlx::query(statement)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| StorageError::internal(format!("failed to create schema: {e}")))?;
            }
            Ok(())
        })
        .await
    }

    /// Get the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close all connections in the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn bucket_id(&self, user_id: UserId) -> StorageResult<Option<BucketId>> {
        sqlx::query_scalar::<_, i64>(SELECT_BUCKET_ID)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::read(format!("failed to find bucket: {e}")))
    }

    async fn require_bucket(&self, user_id: UserId) -> StorageResult<BucketId> {
        self.bucket_id(user_id)
            .await?
            .ok_or(StorageError::BucketNotFound { user_id })
    }
}

// =============================================================================
// Row Mapping
// =============================================================================

/// Parse a `bucket_item` row into a BucketItem.
fn row_to_item(row: &PgRow) -> StorageResult<BucketItem> {
    let toy_id: i64 = row
        .try_get("toy_id")
        .map_err(|e| StorageError::internal(e.to_string()))?;

    let quantity: i32 = row
        .try_get("quantity")
        .map_err(|e| StorageError::internal(e.to_string()))?;

    Ok(BucketItem { toy_id, quantity })
}

// =============================================================================
// BucketStorage Implementation
// =============================================================================

#[async_trait]
impl BucketStorage for PostgresBucketStorage {
    async fn create_bucket(&self, user_id: UserId, deadline: Deadline) -> StorageResult<BucketId> {
        bounded("create_bucket", self.window, deadline, async {
            let bucket_id = sqlx::query_scalar::<_, i64>(INSERT_BUCKET)
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| match e {
                    sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                        StorageError::BucketExists { user_id }
                    }
                    e => StorageError::write(format!("failed to create bucket: {e}")),
                })?;

            tracing::debug!(user_id, bucket_id, "bucket created");
            Ok(bucket_id)
        })
        .await
    }

    async fn add_to_bucket(
        &self,
        user_id: UserId,
        items: &[BucketItem],
        deadline: Deadline,
    ) -> StorageResult<()> {
        bounded("add_to_bucket", self.window, deadline, async {
            let bucket_id = self.require_bucket(user_id).await?;

            // Rolls back on drop unless committed below.
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| StorageError::write(format!("cannot start SQL transaction: {e}")))?;

            for item in items {
                sqlx::query_scalar::<_, i64>(UPSERT_ITEM)
                    .bind(bucket_id)
                    .bind(item.toy_id)
                    .bind(item.quantity)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(|e| {
                        StorageError::write(format!("failed to add toy {}: {e}", item.toy_id))
                    })?;
            }

            tx.commit()
                .await
                .map_err(|e| StorageError::write(format!("could not commit transaction: {e}")))?;

            tracing::debug!(user_id, bucket_id, item_count = items.len(), "items upserted");
            Ok(())
        })
        .await
    }

    async fn del_from_bucket(
        &self,
        user_id: UserId,
        toy_ids: &[ToyId],
        deadline: Deadline,
    ) -> StorageResult<()> {
        bounded("del_from_bucket", self.window, deadline, async {
            let bucket_id = self.require_bucket(user_id).await?;

            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| StorageError::write(format!("cannot start SQL transaction: {e}")))?;

            for &toy_id in toy_ids {
                let result = sqlx::query(DELETE_ITEM)
                    .bind(bucket_id)
                    .bind(toy_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| StorageError::write(format!("failed to delete toy {toy_id}: {e}")))?;

                if result.rows_affected() != 1 {
                    return Err(StorageError::ItemNotFound { toy_id });
                }
            }

            tx.commit()
                .await
                .map_err(|e| StorageError::write(format!("could not commit transaction: {e}")))?;

            tracing::debug!(user_id, bucket_id, item_count = toy_ids.len(), "items deleted");
            Ok(())
        })
        .await
    }

    async fn get_bucket(
        &self,
        user_id: UserId,
        deadline: Deadline,
    ) -> StorageResult<BucketContents> {
        bounded("get_bucket", self.window, deadline, async {
            let Some(bucket_id) = self.bucket_id(user_id).await? else {
                return Ok(BucketContents::default());
            };

            let rows = sqlx::query(SELECT_ITEMS)
                .bind(bucket_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| StorageError::read(format!("failed to read bucket items: {e}")))?;

            let mut items = Vec::with_capacity(rows.len());
            for row in &rows {
                items.push(row_to_item(row)?);
            }

            Ok(BucketContents::from_items(items))
        })
        .await
    }
}

// =============================================================================
// Tests (require running Postgres)
// =============================================================================
