//! Buckets - The Bucket Orchestrator
//!
//! TigerStyle: Every operation runs the same gate in the same order.
//!
//! ```text
//! identity ──► subscription check ──► storage ──► (reads) catalog enrichment
//!    │                 │                  │
//!    └── UNAUTHORIZED ─┴── UNAUTHORIZED   └── INTERNAL_ERROR
//! ```
//!
//! The orchestrator holds no state between calls and performs no retries.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::clients::{CatalogClient, CatalogToy, SubscriptionClient};
use crate::domain::{
    BucketContents, BucketItem, BucketView, CallContext, OperationOutcome, OperationStatus, Toy,
    ToyId, UserId,
};
use crate::error::BucketError;
use crate::storage::BucketStorage;

/// Orchestrates identity, subscription gate, storage and catalog enrichment.
#[derive(Clone)]
pub struct Buckets {
    storage: Arc<dyn BucketStorage>,
    subscriptions: Arc<dyn SubscriptionClient>,
    catalog: Arc<dyn CatalogClient>,
}

impl std::fmt::Debug for Buckets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buckets").finish_non_exhaustive()
    }
}

impl Buckets {
    /// Wire the orchestrator to its collaborators.
    pub fn new(
        storage: Arc<dyn BucketStorage>,
        subscriptions: Arc<dyn SubscriptionClient>,
        catalog: Arc<dyn CatalogClient>,
    ) -> Self {
        Self {
            storage,
            subscriptions,
            catalog,
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Create the caller's bucket.
    pub async fn create_bucket(&self, ctx: &CallContext) -> OperationOutcome {
        let result = async {
            let user_id = self.authorize(ctx).await?;
            self.storage.create_bucket(user_id, ctx.deadline()).await?;
            Ok::<_, BucketError>(user_id)
        }
        .await;

        match result {
            Ok(user_id) => {
                tracing::info!(user_id, "bucket created");
                OperationOutcome::ok("bucket creation successful")
            }
            Err(err) => reject("create_bucket", ctx, err),
        }
    }

    /// Add items to the caller's bucket, all or nothing.
    ///
    /// Item shape is validated by the transport before this is called.
    pub async fn add_to_bucket(&self, ctx: &CallContext, items: &[BucketItem]) -> OperationOutcome {
        let result = async {
            let user_id = self.authorize(ctx).await?;
            self.storage
                .add_to_bucket(user_id, items, ctx.deadline())
                .await?;
            Ok::<_, BucketError>(user_id)
        }
        .await;

        match result {
            Ok(user_id) => {
                tracing::info!(user_id, item_count = items.len(), "added to bucket");
                OperationOutcome::ok("added to bucket")
            }
            Err(err) => reject("add_to_bucket", ctx, err),
        }
    }

    /// Remove toys from the caller's bucket, all or nothing.
    pub async fn del_from_bucket(&self, ctx: &CallContext, toy_ids: &[ToyId]) -> OperationOutcome {
        let result = async {
            let user_id = self.authorize(ctx).await?;
            self.storage
                .del_from_bucket(user_id, toy_ids, ctx.deadline())
                .await?;
            Ok::<_, BucketError>(user_id)
        }
        .await;

        match result {
            Ok(user_id) => {
                tracing::info!(user_id, item_count = toy_ids.len(), "deleted from bucket");
                OperationOutcome::ok("toys successfully deleted from bucket")
            }
            Err(err) => reject("del_from_bucket", ctx, err),
        }
    }

    /// Read the caller's bucket enriched with catalog data.
    ///
    /// Never fails: any gate, storage or catalog failure reads as the empty
    /// bucket. Use [`Buckets::try_get_bucket`] to see why.
    pub async fn get_bucket(&self, ctx: &CallContext) -> BucketView {
        match self.try_get_bucket(ctx).await {
            Ok(view) => view,
            Err(err) => {
                tracing::warn!(
                    user_id = ?ctx.identity(),
                    status = %err.status(),
                    error = %err,
                    "get_bucket degraded to empty"
                );
                BucketView::empty()
            }
        }
    }

    /// Read the caller's bucket, surfacing why a read came back empty.
    ///
    /// # Errors
    /// Gate failures, storage failures, catalog failures, and
    /// `CatalogEmpty` when the catalog matched none of the bucket's toys.
    pub async fn try_get_bucket(&self, ctx: &CallContext) -> Result<BucketView, BucketError> {
        let user_id = self.authorize(ctx).await?;
        let contents = self.storage.get_bucket(user_id, ctx.deadline()).await?;

        if contents.is_empty() {
            return Ok(BucketView::empty());
        }

        let ids = distinct_toy_ids(&contents.items);
        let found = self
            .catalog
            .get_by_ids(&ids)
            .await
            .map_err(BucketError::Catalog)?;

        if found.is_empty() {
            return Err(BucketError::CatalogEmpty);
        }

        Ok(enrich(contents, found))
    }

    // =========================================================================
    // Gate
    // =========================================================================

    /// Identity, then subscription. Nothing downstream runs unless both pass.
    async fn authorize(&self, ctx: &CallContext) -> Result<UserId, BucketError> {
        let user_id = ctx.user_id()?;

        let status = self
            .subscriptions
            .check_subscription(user_id)
            .await
            .map_err(BucketError::Subscription)?;

        if !status.is_subscribed() {
            return Err(BucketError::NotSubscribed { user_id });
        }

        Ok(user_id)
    }
}

/// Log a failed mutating call and turn it into its outcome.
fn reject(op: &'static str, ctx: &CallContext, err: BucketError) -> OperationOutcome {
    match err.status() {
        OperationStatus::Unauthorized => {
            tracing::info!(op, user_id = ?ctx.identity(), reason = %err, "request rejected");
        }
        _ => {
            tracing::warn!(op, user_id = ?ctx.identity(), error = %err, "request failed");
        }
    }
    err.into()
}

/// Toy ids of `items`, first occurrence order, no repeats.
fn distinct_toy_ids(items: &[BucketItem]) -> Vec<ToyId> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .iter()
        .map(|item| item.toy_id)
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Merge catalog attributes into the raw rows by toy id.
///
/// Merging by position is the special case of a catalog that answers every
/// id in request order. Keying by id gives the same result there and stays
/// correct when the catalog answers out of order or omits toys.
fn enrich(contents: BucketContents, catalog: Vec<CatalogToy>) -> BucketView {
    let mut by_id: HashMap<ToyId, CatalogToy> =
        catalog.into_iter().map(|toy| (toy.id, toy)).collect();

    let toys: Vec<Toy> = contents
        .items
        .iter()
        .map(|&item| {
            let mut toy = Toy::bare(item);
            if let Some(entry) = by_id.remove(&item.toy_id) {
                toy.title = Some(entry.title);
                toy.image_url = Some(entry.image_url);
                toy.value = Some(entry.value);
            }
            toy
        })
        .collect();

    // Postcondition
    assert_eq!(toys.len(), contents.items.len(), "enrichment must keep every row");

    BucketView {
        toys,
        quantity: contents.quantity,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog_toy(id: ToyId, title: &str) -> CatalogToy {
        CatalogToy {
            id,
            title: title.to_string(),
            image_url: format!("{title}.png"),
            value: id * 100,
        }
    }

    #[test]
    fn test_distinct_toy_ids_keeps_order() {
        let items = [
            BucketItem::new(5, 1),
            BucketItem::new(2, 1),
            BucketItem::new(5, 3),
        ];
        assert_eq!(distinct_toy_ids(&items), vec![5, 2]);
    }

    #[test]
    fn test_enrich_merges_by_id() {
        let contents =
            BucketContents::from_items(vec![BucketItem::new(1, 2), BucketItem::new(2, 1)]);
        // Catalog answers out of request order.
        let view = enrich(contents, vec![catalog_toy(2, "kite"), catalog_toy(1, "ball")]);

        assert_eq!(view.quantity, 3);
        assert_eq!(view.toys[0].id, 1);
        assert_eq!(view.toys[0].title.as_deref(), Some("ball"));
        assert_eq!(view.toys[0].value, Some(100));
        assert_eq!(view.toys[1].title.as_deref(), Some("kite"));
        assert_eq!(view.toys[1].image_url.as_deref(), Some("kite.png"));
    }

    #[test]
    fn test_enrich_leaves_unmatched_bare() {
        let contents =
            BucketContents::from_items(vec![BucketItem::new(1, 2), BucketItem::new(9, 4)]);
        let view = enrich(contents, vec![catalog_toy(1, "ball")]);

        assert_eq!(view.toys.len(), 2);
        assert_eq!(view.toys[1], Toy::bare(BucketItem::new(9, 4)));
        assert_eq!(view.quantity, 6);
    }
}
