//! Orchestrator errors and their mapping onto the status taxonomy.

use crate::clients::ClientError;
use crate::domain::{OperationStatus, UserId};
use crate::storage::StorageError;

/// Failure of a bucket operation.
///
/// The `Display` text is the message returned to callers.
#[derive(Debug, thiserror::Error)]
pub enum BucketError {
    /// No caller identity attached to the context
    #[error("invalid user!")]
    MissingIdentity,

    /// Caller has no active subscription
    #[error("user {user_id} is not subscribed")]
    NotSubscribed {
        /// Caller identity
        user_id: UserId,
    },

    /// Subscription service could not answer
    #[error("subscription check failed: {0}")]
    Subscription(#[source] ClientError),

    /// Catalog service could not answer
    #[error("catalog lookup failed: {0}")]
    Catalog(#[source] ClientError),

    /// Catalog knew none of the bucket's toys
    #[error("catalog returned no toys")]
    CatalogEmpty,

    /// Storage engine failure
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl BucketError {
    /// Status code for this error.
    #[must_use]
    pub fn status(&self) -> OperationStatus {
        match self {
            Self::MissingIdentity | Self::NotSubscribed { .. } => OperationStatus::Unauthorized,
            Self::Subscription(_) | Self::Catalog(_) | Self::CatalogEmpty | Self::Storage(_) => {
                OperationStatus::InternalError
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_errors_are_unauthorized() {
        assert_eq!(BucketError::MissingIdentity.status(), OperationStatus::Unauthorized);
        assert_eq!(
            BucketError::NotSubscribed { user_id: 7 }.status(),
            OperationStatus::Unauthorized
        );
    }

    #[test]
    fn test_downstream_errors_are_internal() {
        let err = BucketError::from(StorageError::BucketNotFound { user_id: 7 });
        assert_eq!(err.status(), OperationStatus::InternalError);
        assert_eq!(err.to_string(), "bucket not found");

        let err = BucketError::Subscription(ClientError::UnexpectedResponse("503".to_string()));
        assert_eq!(err.status(), OperationStatus::InternalError);
        assert_eq!(BucketError::CatalogEmpty.status(), OperationStatus::InternalError);
    }
}
