//! Domain - Cart Types and Call Context
//!
//! TigerStyle: Explicit types, identity as a typed result, no implicit lookup.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::BucketError;

// =============================================================================
// Identifiers
// =============================================================================

/// Opaque user identifier, pre-validated upstream.
pub type UserId = i64;

/// Catalog identifier of a toy.
pub type ToyId = i64;

/// Row identifier of a bucket.
pub type BucketId = i64;

// =============================================================================
// Cart Types
// =============================================================================

/// A (toy, quantity) line: the unit of `AddToBucket` and a raw storage row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketItem {
    /// Toy identifier
    pub toy_id: ToyId,
    /// Quantity (positive)
    pub quantity: i32,
}

impl BucketItem {
    /// Create a new line.
    #[must_use]
    pub fn new(toy_id: ToyId, quantity: i32) -> Self {
        Self { toy_id, quantity }
    }
}

/// Raw cart contents as held by storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketContents {
    /// Item rows, in insertion order
    pub items: Vec<BucketItem>,
    /// Sum of item quantities
    pub quantity: i32,
}

impl BucketContents {
    /// Build contents from rows, summing quantities while scanning.
    #[must_use]
    pub fn from_items(items: Vec<BucketItem>) -> Self {
        let quantity = items
            .iter()
            .fold(0i32, |total, item| total.saturating_add(item.quantity));
        Self { items, quantity }
    }

    /// True when the bucket holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A cart line enriched with catalog attributes.
///
/// Catalog fields are `None` when the catalog has no entry for the toy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toy {
    /// Toy identifier
    pub id: ToyId,
    /// Quantity held in the cart
    pub quantity: i32,
    /// Display title
    pub title: Option<String>,
    /// Image URL
    pub image_url: Option<String>,
    /// Catalog value
    pub value: Option<i64>,
}

impl Toy {
    /// A toy with only the cart-side attributes filled in.
    #[must_use]
    pub fn bare(item: BucketItem) -> Self {
        Self {
            id: item.toy_id,
            quantity: item.quantity,
            title: None,
            image_url: None,
            value: None,
        }
    }
}

/// Result of `GetBucket`: enriched toys plus total quantity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketView {
    /// Enriched toys
    pub toys: Vec<Toy>,
    /// Total quantity across the bucket
    pub quantity: i32,
}

impl BucketView {
    /// The empty cart: no toys, zero quantity.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

// =============================================================================
// Operation Status
// =============================================================================

/// Closed status taxonomy surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationStatus {
    /// Operation succeeded
    #[serde(rename = "STATUS_OK")]
    Ok,
    /// Missing identity or no active subscription
    #[serde(rename = "STATUS_UNAUTHORIZED")]
    Unauthorized,
    /// Storage failure, bad downstream response, missing bucket
    #[serde(rename = "STATUS_INTERNAL_ERROR")]
    InternalError,
}

impl OperationStatus {
    /// Wire name of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "STATUS_OK",
            Self::Unauthorized => "STATUS_UNAUTHORIZED",
            Self::InternalError => "STATUS_INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status plus human-readable message of a mutating operation.
///
/// The message is not a stable contract; the status is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    /// Status code
    pub status: OperationStatus,
    /// Human-readable message
    #[serde(rename = "msg")]
    pub message: String,
}

impl OperationOutcome {
    /// Successful outcome with a message.
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: OperationStatus::Ok,
            message: message.into(),
        }
    }

    /// True if the status is `Ok`.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == OperationStatus::Ok
    }
}

impl From<BucketError> for OperationOutcome {
    fn from(err: BucketError) -> Self {
        Self {
            status: err.status(),
            message: err.to_string(),
        }
    }
}

// =============================================================================
// Call Context
// =============================================================================

/// Point in time by which the caller needs an answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// No caller deadline.
    #[must_use]
    pub fn none() -> Self {
        Self(None)
    }

    /// Deadline at `timeout` from now.
    #[must_use]
    pub fn after(timeout: Duration) -> Self {
        Self(Some(Instant::now() + timeout))
    }

    /// Deadline at an absolute instant.
    #[must_use]
    pub fn at(instant: Instant) -> Self {
        Self(Some(instant))
    }

    /// Time left before the deadline, `None` if there is no deadline.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.0
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Execution window for a call capped at `cap`.
    ///
    /// The smaller of `cap` and the remaining caller time.
    #[must_use]
    pub fn window(&self, cap: Duration) -> Duration {
        match self.remaining() {
            Some(left) => left.min(cap),
            None => cap,
        }
    }
}

/// Per-call execution context, threaded explicitly through every core call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallContext {
    user_id: Option<UserId>,
    deadline: Deadline,
}

impl CallContext {
    /// Context with no identity attached.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Context carrying a pre-validated user identity.
    #[must_use]
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            deadline: Deadline::none(),
        }
    }

    /// Context from an optional identity.
    #[must_use]
    pub fn from_identity(user_id: Option<UserId>) -> Self {
        Self {
            user_id,
            deadline: Deadline::none(),
        }
    }

    /// Attach a caller deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    /// The caller's identity.
    ///
    /// # Errors
    /// Returns `BucketError::MissingIdentity` if none is attached.
    pub fn user_id(&self) -> Result<UserId, BucketError> {
        self.user_id.ok_or(BucketError::MissingIdentity)
    }

    /// The attached identity, if any.
    #[must_use]
    pub fn identity(&self) -> Option<UserId> {
        self.user_id
    }

    /// The caller's deadline.
    #[must_use]
    pub fn deadline(&self) -> Deadline {
        self.deadline
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contents_sums_quantities() {
        let contents =
            BucketContents::from_items(vec![BucketItem::new(1, 2), BucketItem::new(5, 7)]);
        assert_eq!(contents.quantity, 9);
        assert!(!contents.is_empty());
        assert_eq!(BucketContents::default().quantity, 0);
    }

    #[test]
    fn test_contents_sum_saturates() {
        let contents = BucketContents::from_items(vec![
            BucketItem::new(1, i32::MAX),
            BucketItem::new(2, 1),
        ]);
        assert_eq!(contents.quantity, i32::MAX);
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&OperationStatus::Ok).unwrap(),
            "\"STATUS_OK\""
        );
        assert_eq!(
            serde_json::to_string(&OperationStatus::Unauthorized).unwrap(),
            "\"STATUS_UNAUTHORIZED\""
        );
        assert_eq!(OperationStatus::InternalError.to_string(), "STATUS_INTERNAL_ERROR");
    }

    #[test]
    fn test_outcome_serializes_msg() {
        let outcome = OperationOutcome::ok("added to bucket");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "STATUS_OK");
        assert_eq!(json["msg"], "added to bucket");
    }

    #[test]
    fn test_missing_identity() {
        let ctx = CallContext::anonymous();
        assert!(matches!(ctx.user_id(), Err(BucketError::MissingIdentity)));
        assert_eq!(CallContext::for_user(7).user_id().unwrap(), 7);
    }

    #[tokio::test]
    async fn test_deadline_window() {
        let cap = Duration::from_secs(3);

        assert_eq!(Deadline::none().window(cap), cap);
        assert!(Deadline::after(Duration::from_millis(100)).window(cap) <= Duration::from_millis(100));
        assert_eq!(Deadline::after(Duration::from_secs(60)).window(cap), cap);

        let past = Deadline::at(Instant::now() - Duration::from_millis(5));
        assert_eq!(past.window(cap), Duration::ZERO);
    }
}
