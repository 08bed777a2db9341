//! Bucket Service - Subscription-Gated Shopping Cart
//!
//! TigerStyle: every cart operation passes the same gate before it touches
//! storage, and every multi-row mutation is one transaction.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Transport (axum, JSON/HTTP)                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Buckets (orchestrator)                      │
//! │  identity → subscription gate → storage → catalog enrich     │
//! └─────────────────────────────────────────────────────────────┘
//!          │                    │                    │
//! ┌────────┴─────────┐ ┌────────┴─────────┐ ┌────────┴─────────┐
//! │SubscriptionClient│ │  BucketStorage   │ │  CatalogClient   │
//! │  (http / sim)    │ │ (postgres / sim) │ │  (http / sim)    │
//! └──────────────────┘ └──────────────────┘ └──────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use bucket_service::clients::{SimCatalogClient, SimSubscriptionClient};
//! use bucket_service::domain::{BucketItem, CallContext, OperationStatus};
//! use bucket_service::service::Buckets;
//! use bucket_service::storage::SimBucketStorage;
//!
//! # tokio_test::block_on(async {
//! let buckets = Buckets::new(
//!     Arc::new(SimBucketStorage::new()),
//!     Arc::new(SimSubscriptionClient::subscribed(&[7])),
//!     Arc::new(SimCatalogClient::new().with_toy(3, "Robot", "robot.png", 1999)),
//! );
//!
//! let ctx = CallContext::for_user(7);
//! assert_eq!(buckets.create_bucket(&ctx).await.status, OperationStatus::Ok);
//! let items = [BucketItem::new(3, 2)];
//! assert_eq!(buckets.add_to_bucket(&ctx, &items).await.status, OperationStatus::Ok);
//!
//! let view = buckets.get_bucket(&ctx).await;
//! assert_eq!(view.quantity, 2);
//! # });
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod clients;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod storage;
pub mod transport;

// Re-export common types
pub use config::{ClientConfig, Config, StorageConfig};
pub use domain::{
    BucketContents, BucketId, BucketItem, BucketView, CallContext, Deadline, OperationOutcome,
    OperationStatus, Toy, ToyId, UserId,
};
pub use error::BucketError;
pub use service::Buckets;
pub use storage::{BucketStorage, StorageError, StorageResult};
