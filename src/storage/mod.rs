//! Storage - Bucket Backend Trait and Implementations
//!
//! TigerStyle: Abstract storage with simulation-first testing.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    BucketStorage Trait                       │
//! └─────────────────────────────────────────────────────────────┘
//!          ↑                              ↑
//!          │                              │
//! ┌────────┴────────┐           ┌────────┴──────────────┐
//! │SimBucketStorage │           │ PostgresBucketStorage │
//! │   (testing)     │           │     (production)      │
//! └─────────────────┘           └───────────────────────┘
//! ```
//!
//! # Contract
//!
//! - `add_to_bucket` and `del_from_bucket` are all-or-nothing over the batch.
//! - A second add for the same toy sums quantities.
//! - A delete for a toy not in the bucket fails the whole batch.
//! - Every call runs inside its own bounded execution window.

mod error;
mod postgres;
mod sim;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{BucketContents, BucketId, BucketItem, Deadline, ToyId, UserId};

pub use error::{StorageError, StorageResult};
pub use postgres::PostgresBucketStorage;
pub use sim::{FaultType, SimBucketStorage};

// =============================================================================
// TigerStyle Constants
// =============================================================================

/// Default execution window of a single storage call
pub const STORAGE_WINDOW_MS_DEFAULT: u64 = 3_000;

/// Maximum configurable execution window
pub const STORAGE_WINDOW_MS_MAX: u64 = 60_000;

// =============================================================================
// BucketStorage
// =============================================================================

/// Cart-scoped persistence.
///
/// Owns the `bucket` and `bucket_item` rows and their transaction boundaries.
#[async_trait]
pub trait BucketStorage: Send + Sync {
    /// Create the bucket for a user.
    ///
    /// # Errors
    /// `BucketExists` if the user already has one.
    async fn create_bucket(&self, user_id: UserId, deadline: Deadline) -> StorageResult<BucketId>;

    /// Upsert every item into the user's bucket in one transaction.
    ///
    /// # Errors
    /// `BucketNotFound` if the user has no bucket; any item failure rolls back
    /// the whole batch.
    async fn add_to_bucket(
        &self,
        user_id: UserId,
        items: &[BucketItem],
        deadline: Deadline,
    ) -> StorageResult<()>;

    /// Delete every listed toy from the user's bucket in one transaction.
    ///
    /// # Errors
    /// `BucketNotFound` if the user has no bucket, `ItemNotFound` if any toy
    /// is absent; either way nothing is deleted.
    async fn del_from_bucket(
        &self,
        user_id: UserId,
        toy_ids: &[ToyId],
        deadline: Deadline,
    ) -> StorageResult<()>;

    /// Read the user's bucket. A user without a bucket reads as empty.
    async fn get_bucket(&self, user_id: UserId, deadline: Deadline)
        -> StorageResult<BucketContents>;
}

/// Run `fut` inside the storage execution window.
///
/// The window is `cap` shortened to whatever the caller deadline leaves.
/// Dropping `fut` on expiry drops any open transaction, which rolls it back.
pub(crate) async fn bounded<T, F>(
    op: &'static str,
    cap: Duration,
    deadline: Deadline,
    fut: F,
) -> StorageResult<T>
where
    F: Future<Output = StorageResult<T>>,
{
    let window = deadline.window(cap);
    match tokio::time::timeout(window, fut).await {
        Ok(result) => result,
        Err(_) => {
            let window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
            tracing::warn!(op, window_ms, "storage call timed out");
            Err(StorageError::Timeout { op, window_ms })
        }
    }
}
