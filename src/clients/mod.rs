//! Clients - Subscription and Catalog Collaborators
//!
//! TigerStyle: Both downstream services are consulted through a trait, so the
//! orchestrator never depends on the network directly.
//!
//! ```text
//! ┌────────────────────┐        ┌────────────────────┐
//! │ SubscriptionClient │        │   CatalogClient    │
//! └────────────────────┘        └────────────────────┘
//!     ↑            ↑                ↑            ↑
//! ┌───┴──────┐ ┌───┴──────┐    ┌────┴─────┐ ┌────┴─────┐
//! │   Http   │ │   Sim    │    │   Http   │ │   Sim    │
//! └──────────┘ └──────────┘    └──────────┘ └──────────┘
//! ```
//!
//! Timeouts and retries belong to the implementations, not the callers.

mod http;
mod sim;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{ToyId, UserId};

pub use http::{build_http, HttpCatalogClient, HttpSubscriptionClient};
pub use sim::{SimCatalogClient, SimSubscriptionClient};

// =============================================================================
// Types
// =============================================================================

/// Subscription status reported by the subscription service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubscriptionStatus {
    /// Active subscription
    #[serde(rename = "STATUS_SUBSCRIBED")]
    Subscribed,
    /// No active subscription
    #[serde(rename = "STATUS_NOT_SUBSCRIBED")]
    NotSubscribed,
    /// Anything the service reports that we do not recognise
    #[serde(other, rename = "STATUS_UNSPECIFIED")]
    Unspecified,
}

impl SubscriptionStatus {
    /// Only an explicit `Subscribed` opens the gate.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        matches!(self, Self::Subscribed)
    }
}

/// Display attributes of a toy as returned by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogToy {
    /// Toy identifier
    pub id: ToyId,
    /// Display title
    pub title: String,
    /// Image URL
    pub image_url: String,
    /// Catalog value
    pub value: i64,
}

// =============================================================================
// Traits
// =============================================================================

/// Subscription service capability.
#[async_trait]
pub trait SubscriptionClient: Send + Sync {
    /// Current subscription status of a user.
    async fn check_subscription(&self, user_id: UserId) -> Result<SubscriptionStatus, ClientError>;
}

/// Catalog service capability.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Display attributes for the given toys. Unknown ids are simply absent.
    async fn get_by_ids(&self, ids: &[ToyId]) -> Result<Vec<CatalogToy>, ClientError>;
}

// =============================================================================
// Errors
// =============================================================================

/// Collaborator call failure.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Connection, timeout, or body decoding failure
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success status or malformed payload
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_status_wire_names() {
        let status: SubscriptionStatus = serde_json::from_str("\"STATUS_SUBSCRIBED\"").unwrap();
        assert!(status.is_subscribed());

        let status: SubscriptionStatus =
            serde_json::from_str("\"STATUS_NOT_SUBSCRIBED\"").unwrap();
        assert!(!status.is_subscribed());
    }

    #[test]
    fn test_unknown_status_is_not_subscribed() {
        let status: SubscriptionStatus = serde_json::from_str("\"STATUS_EXPIRED\"").unwrap();
        assert_eq!(status, SubscriptionStatus::Unspecified);
        assert!(!status.is_subscribed());
    }
}
