//! SimBucketStorage - In-Memory Storage with Fault Injection
//!
//! TigerStyle: Same contract as Postgres, deterministic, no network.
//!
//! Mutations stage a copy of the item rows and swap it in on "commit", so a
//! failure anywhere in a batch leaves the visible state untouched.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::error::{StorageError, StorageResult};
use super::{bounded, BucketStorage, STORAGE_WINDOW_MS_DEFAULT};
use crate::domain::{BucketContents, BucketId, BucketItem, Deadline, ToyId, UserId};

// =============================================================================
// Faults
// =============================================================================

/// Fault injected into the simulated backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultType {
    /// Fail the item write at this (0-based) position of every batch
    ItemWriteFail {
        /// Position within the batch
        index: usize,
    },
    /// Fail every commit
    CommitFail,
    /// Delay every call before it touches state
    Stall(Duration),
}

// =============================================================================
// State
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct SimRow {
    bucket_id: BucketId,
    toy_id: ToyId,
    quantity: i32,
}

#[derive(Debug, Default)]
struct SimState {
    next_bucket_id: BucketId,
    buckets: HashMap<UserId, BucketId>,
    /// Rows in insertion order
    rows: Vec<SimRow>,
    faults: Vec<FaultType>,
    calls: Vec<&'static str>,
}

impl SimState {
    fn require_bucket(&self, user_id: UserId) -> StorageResult<BucketId> {
        self.buckets
            .get(&user_id)
            .copied()
            .ok_or(StorageError::BucketNotFound { user_id })
    }

    fn item_write_fails(&self, index: usize) -> bool {
        self.faults
            .iter()
            .any(|f| matches!(f, FaultType::ItemWriteFail { index: i } if *i == index))
    }

    fn commit_fails(&self) -> bool {
        self.faults.contains(&FaultType::CommitFail)
    }

    fn stall(&self) -> Option<Duration> {
        self.faults.iter().find_map(|f| match f {
            FaultType::Stall(d) => Some(*d),
            _ => None,
        })
    }

    fn commit(&mut self, staged: Vec<SimRow>) -> StorageResult<()> {
        if self.commit_fails() {
            return Err(StorageError::write("could not commit transaction: injected fault"));
        }
        self.rows = staged;
        Ok(())
    }
}

// =============================================================================
// SimBucketStorage
// =============================================================================

/// In-memory bucket storage for tests and local runs.
#[derive(Debug)]
pub struct SimBucketStorage {
    state: Mutex<SimState>,
    window: Duration,
}

impl SimBucketStorage {
    /// Create an empty backend with the default execution window.
    #[must_use]
    pub fn new() -> Self {
        Self::with_window(Duration::from_millis(STORAGE_WINDOW_MS_DEFAULT))
    }

    /// Create an empty backend with a custom execution window.
    #[must_use]
    pub fn with_window(window: Duration) -> Self {
        Self {
            state: Mutex::new(SimState {
                next_bucket_id: 1,
                ..SimState::default()
            }),
            window,
        }
    }

    /// Add a fault at construction time.
    #[must_use]
    pub fn with_fault(mut self, fault: FaultType) -> Self {
        self.state.get_mut().faults.push(fault);
        self
    }

    /// Add a fault to a running backend.
    pub async fn inject(&self, fault: FaultType) {
        self.state.lock().await.faults.push(fault);
    }

    /// Remove every injected fault.
    pub async fn clear_faults(&self) {
        self.state.lock().await.faults.clear();
    }

    /// Names of the storage operations invoked so far, in order.
    pub async fn calls(&self) -> Vec<&'static str> {
        self.state.lock().await.calls.clone()
    }

    /// Number of item rows across all buckets.
    pub async fn row_count(&self) -> usize {
        self.state.lock().await.rows.len()
    }

    async fn enter(&self, op: &'static str) {
        let stall = {
            let mut state = self.state.lock().await;
            state.calls.push(op);
            state.stall()
        };
        if let Some(delay) = stall {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for SimBucketStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BucketStorage for SimBucketStorage {
    async fn create_bucket(&self, user_id: UserId, deadline: Deadline) -> StorageResult<BucketId> {
        bounded("create_bucket", self.window, deadline, async {
            self.enter("create_bucket").await;
            let mut state = self.state.lock().await;

            if state.buckets.contains_key(&user_id) {
                return Err(StorageError::BucketExists { user_id });
            }

            let bucket_id = state.next_bucket_id;
            state.next_bucket_id += 1;
            state.buckets.insert(user_id, bucket_id);
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
            self.enter("add_to_bucket").await;
            let mut state = self.state.lock().await;
            let bucket_id = state.require_bucket(user_id)?;

            let mut staged = state.rows.clone();
            for (index, item) in items.iter().enumerate() {
                let failed = || StorageError::write(format!("failed to add toy {}", item.toy_id));

                if state.item_write_fails(index) {
                    return Err(failed());
                }

                let existing = staged
                    .iter_mut()
                    .find(|row| row.bucket_id == bucket_id && row.toy_id == item.toy_id);

                // Mirrors the quantity > 0 check constraint.
                match existing {
                    Some(row) => {
                        let quantity = row
                            .quantity
                            .checked_add(item.quantity)
                            .filter(|q| *q > 0)
                            .ok_or_else(failed)?;
                        row.quantity = quantity;
                    }
                    None if item.quantity > 0 => staged.push(SimRow {
                        bucket_id,
                        toy_id: item.toy_id,
                        quantity: item.quantity,
                    }),
                    None => return Err(failed()),
                }
            }

            state.commit(staged)
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
            self.enter("del_from_bucket").await;
            let mut state = self.state.lock().await;
            let bucket_id = state.require_bucket(user_id)?;

            let mut staged = state.rows.clone();
            for (index, &toy_id) in toy_ids.iter().enumerate() {
                if state.item_write_fails(index) {
                    return Err(StorageError::write(format!("failed to delete toy {toy_id}")));
                }

                let before = staged.len();
                staged.retain(|row| !(row.bucket_id == bucket_id && row.toy_id == toy_id));
                if before - staged.len() != 1 {
                    return Err(StorageError::ItemNotFound { toy_id });
                }
            }

            state.commit(staged)
        })
        .await
    }

    async fn get_bucket(
        &self,
        user_id: UserId,
        deadline: Deadline,
    ) -> StorageResult<BucketContents> {
        bounded("get_bucket", self.window, deadline, async {
            self.enter("get_bucket").await;
            let state = self.state.lock().await;

            let Some(&bucket_id) = state.buckets.get(&user_id) else {
                return Ok(BucketContents::default());
            };

            let items = state
                .rows
                .iter()
                .filter(|row| row.bucket_id == bucket_id)
                .map(|row| BucketItem::new(row.toy_id, row.quantity))
                .collect();

            Ok(BucketContents::from_items(items))
        })
        .await
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    async fn with_bucket(user_id: UserId) -> SimBucketStorage {
        let storage = SimBucketStorage::new();
        storage.create_bucket(user_id, Deadline::none()).await.unwrap();
        storage
    }

    #[tokio::test]
    async fn test_create_assigns_ids() {
        let storage = SimBucketStorage::new();
        let a = storage.create_bucket(1, Deadline::none()).await.unwrap();
        let b = storage.create_bucket(2, Deadline::none()).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_create_twice_fails() {
        let storage = with_bucket(7).await;
        let again = storage.create_bucket(7, Deadline::none()).await;
        assert!(matches!(again, Err(StorageError::BucketExists { user_id: 7 })));
    }

    #[tokio::test]
    async fn test_add_accumulates() {
        let storage = with_bucket(7).await;

        storage
            .add_to_bucket(7, &[BucketItem::new(3, 2)], Deadline::none())
            .await
            .unwrap();
        storage
            .add_to_bucket(7, &[BucketItem::new(3, 1), BucketItem::new(4, 5)], Deadline::none())
            .await
            .unwrap();

        let contents = storage.get_bucket(7, Deadline::none()).await.unwrap();
        assert_eq!(
            contents.items,
            vec![BucketItem::new(3, 3), BucketItem::new(4, 5)]
        );
        assert_eq!(contents.quantity, 8);
    }

    #[tokio::test]
    async fn test_same_toy_twice_in_one_batch() {
        let storage = with_bucket(7).await;
        storage
            .add_to_bucket(7, &[BucketItem::new(3, 2), BucketItem::new(3, 2)], Deadline::none())
            .await
            .unwrap();

        let contents = storage.get_bucket(7, Deadline::none()).await.unwrap();
        assert_eq!(contents.items, vec![BucketItem::new(3, 4)]);
    }

    #[tokio::test]
    async fn test_add_without_bucket_writes_nothing() {
        let storage = SimBucketStorage::new();
        let result = storage
            .add_to_bucket(7, &[BucketItem::new(3, 2)], Deadline::none())
            .await;

        assert!(matches!(result, Err(StorageError::BucketNotFound { user_id: 7 })));
        assert_eq!(storage.row_count().await, 0);
    }

    #[tokio::test]
    async fn test_item_fault_rolls_back_batch() {
        let storage = with_bucket(7).await.with_fault(FaultType::ItemWriteFail { index: 2 });

        let batch = [
            BucketItem::new(1, 1),
            BucketItem::new(2, 1),
            BucketItem::new(3, 1),
        ];
        let result = storage.add_to_bucket(7, &batch, Deadline::none()).await;

        assert!(matches!(result, Err(StorageError::Write(_))));
        assert_eq!(storage.row_count().await, 0);
    }

    #[tokio::test]
    async fn test_commit_fault_rolls_back_batch() {
        let storage = with_bucket(7).await;
        storage
            .add_to_bucket(7, &[BucketItem::new(1, 1)], Deadline::none())
            .await
            .unwrap();

        storage.inject(FaultType::CommitFail).await;
        let result = storage
            .add_to_bucket(7, &[BucketItem::new(1, 4), BucketItem::new(2, 1)], Deadline::none())
            .await;
        assert!(result.is_err());

        storage.clear_faults().await;
        let contents = storage.get_bucket(7, Deadline::none()).await.unwrap();
        assert_eq!(contents.items, vec![BucketItem::new(1, 1)]);
    }

    #[tokio::test]
    async fn test_non_positive_quantity_rejected() {
        let storage = with_bucket(7).await;
        let result = storage
            .add_to_bucket(7, &[BucketItem::new(1, 2), BucketItem::new(2, 0)], Deadline::none())
            .await;
        assert!(result.is_err());
        assert_eq!(storage.row_count().await, 0);
    }

    #[tokio::test]
    async fn test_quantity_overflow_rejected() {
        let storage = with_bucket(7).await;
        storage
            .add_to_bucket(7, &[BucketItem::new(1, i32::MAX)], Deadline::none())
            .await
            .unwrap();

        let result = storage
            .add_to_bucket(7, &[BucketItem::new(1, 1)], Deadline::none())
            .await;
        assert!(result.is_err());

        let contents = storage.get_bucket(7, Deadline::none()).await.unwrap();
        assert_eq!(contents.quantity, i32::MAX);
    }

    #[tokio::test]
    async fn test_delete_removes_rows() {
        let storage = with_bucket(7).await;
        storage
            .add_to_bucket(7, &[BucketItem::new(1, 1), BucketItem::new(2, 2)], Deadline::none())
            .await
            .unwrap();

        storage.del_from_bucket(7, &[1], Deadline::none()).await.unwrap();

        let contents = storage.get_bucket(7, Deadline::none()).await.unwrap();
        assert_eq!(contents.items, vec![BucketItem::new(2, 2)]);
        assert_eq!(contents.quantity, 2);
    }

    #[tokio::test]
    async fn test_delete_missing_toy_keeps_everything() {
        let storage = with_bucket(7).await;
        storage
            .add_to_bucket(7, &[BucketItem::new(1, 1), BucketItem::new(2, 2)], Deadline::none())
            .await
            .unwrap();

        let result = storage.del_from_bucket(7, &[1, 2, 9], Deadline::none()).await;
        assert!(matches!(result, Err(StorageError::ItemNotFound { toy_id: 9 })));

        let contents = storage.get_bucket(7, Deadline::none()).await.unwrap();
        assert_eq!(contents.items.len(), 2);
        assert_eq!(contents.quantity, 3);
    }

    #[tokio::test]
    async fn test_delete_does_not_touch_other_buckets() {
        let storage = with_bucket(7).await;
        storage.create_bucket(8, Deadline::none()).await.unwrap();
        storage
            .add_to_bucket(8, &[BucketItem::new(1, 1)], Deadline::none())
            .await
            .unwrap();

        let result = storage.del_from_bucket(7, &[1], Deadline::none()).await;
        assert!(matches!(result, Err(StorageError::ItemNotFound { toy_id: 1 })));
        assert_eq!(storage.row_count().await, 1);
    }

    #[tokio::test]
    async fn test_delete_without_bucket() {
        let storage = SimBucketStorage::new();
        let result = storage.del_from_bucket(7, &[1], Deadline::none()).await;
        assert!(matches!(result, Err(StorageError::BucketNotFound { .. })));
    }

    #[tokio::test]
    async fn test_get_without_bucket_is_empty() {
        let storage = SimBucketStorage::new();
        let contents = storage.get_bucket(7, Deadline::none()).await.unwrap();
        assert!(contents.is_empty());
        assert_eq!(contents.quantity, 0);
    }

    #[tokio::test]
    async fn test_stall_exceeds_window() {
        let storage = SimBucketStorage::with_window(Duration::from_millis(20))
            .with_fault(FaultType::Stall(Duration::from_millis(500)));

        let result = storage.create_bucket(7, Deadline::none()).await;
        assert!(result.as_ref().is_err_and(StorageError::is_timeout));

        storage.clear_faults().await;
        assert!(storage.get_bucket(7, Deadline::none()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_caller_deadline_shortens_window() {
        let storage = SimBucketStorage::new().with_fault(FaultType::Stall(Duration::from_millis(500)));

        let result = storage
            .get_bucket(7, Deadline::after(Duration::from_millis(20)))
            .await;
        assert!(matches!(result, Err(StorageError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_calls_are_recorded() {
        let storage = with_bucket(7).await;
        let _ = storage.get_bucket(7, Deadline::none()).await;
        assert_eq!(storage.calls().await, vec!["create_bucket", "get_bucket"]);
    }
}
