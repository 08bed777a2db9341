//! StorageError - Failures of the Bucket Storage Engine

use crate::domain::{ToyId, UserId};

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage failure.
///
/// Every variant surfaces as `INTERNAL_ERROR` at the boundary; the variants
/// exist so logs and tests can tell them apart.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database unreachable or misconfigured
    #[error("cannot connect to database: {0}")]
    Connection(String),

    /// User has no bucket
    #[error("bucket not found")]
    BucketNotFound {
        /// Owner looked up
        user_id: UserId,
    },

    /// User already has a bucket
    #[error("bucket already exists")]
    BucketExists {
        /// Owner of the existing bucket
        user_id: UserId,
    },

    /// Toy to delete is not in the bucket
    #[error("toy {toy_id} not found in bucket")]
    ItemNotFound {
        /// Missing toy
        toy_id: ToyId,
    },

    /// Query failed
    #[error("read failed: {0}")]
    Read(String),

    /// Insert, delete, or commit failed
    #[error("write failed: {0}")]
    Write(String),

    /// Call ran past its execution window
    #[error("{op} exceeded its {window_ms}ms window")]
    Timeout {
        /// Operation name
        op: &'static str,
        /// Window that expired
        window_ms: u64,
    },

    /// Anything else
    #[error("internal storage error: {0}")]
    Internal(String),
}

impl StorageError {
    /// Connection failure.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Read failure.
    pub fn read(msg: impl Into<String>) -> Self {
        Self::Read(msg.into())
    }

    /// Write failure.
    pub fn write(msg: impl Into<String>) -> Self {
        Self::Write(msg.into())
    }

    /// Anything else.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True if the call ran out of time rather than failing outright.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
