//! In-memory stand-ins for the subscription and catalog services.
//!
//! Both record every call so tests can assert what was consulted and when.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{CatalogClient, CatalogToy, ClientError, SubscriptionClient, SubscriptionStatus};
use crate::domain::{ToyId, UserId};

// =============================================================================
// SimSubscriptionClient
// =============================================================================

/// Subscription service backed by a fixed set of subscribed users.
#[derive(Debug, Default)]
pub struct SimSubscriptionClient {
    subscribed: HashSet<UserId>,
    unavailable: AtomicBool,
    checks: Mutex<Vec<UserId>>,
}

impl SimSubscriptionClient {
    /// Every listed user is subscribed; everyone else is not.
    #[must_use]
    pub fn subscribed(users: &[UserId]) -> Self {
        Self {
            subscribed: users.iter().copied().collect(),
            ..Self::default()
        }
    }

    /// Make every subsequent check fail as if the service were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Users checked so far, in order.
    #[must_use]
    pub fn checks(&self) -> Vec<UserId> {
        self.checks.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SubscriptionClient for SimSubscriptionClient {
    async fn check_subscription(&self, user_id: UserId) -> Result<SubscriptionStatus, ClientError> {
        if let Ok(mut checks) = self.checks.lock() {
            checks.push(user_id);
        }

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ClientError::UnexpectedResponse(
                "subscription service unavailable".to_string(),
            ));
        }

        Ok(if self.subscribed.contains(&user_id) {
            SubscriptionStatus::Subscribed
        } else {
            SubscriptionStatus::NotSubscribed
        })
    }
}

// =============================================================================
// SimCatalogClient
// =============================================================================

/// Catalog backed by an in-memory map.
#[derive(Debug, Default)]
pub struct SimCatalogClient {
    toys: HashMap<ToyId, CatalogToy>,
    unavailable: AtomicBool,
    lookups: Mutex<Vec<Vec<ToyId>>>,
}

impl SimCatalogClient {
    /// Empty catalog: every lookup returns nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a toy to the catalog.
    #[must_use]
    pub fn with_toy(mut self, id: ToyId, title: &str, image_url: &str, value: i64) -> Self {
        self.toys.insert(
            id,
            CatalogToy {
                id,
                title: title.to_string(),
                image_url: image_url.to_string(),
                value,
            },
        );
        self
    }

    /// Make every subsequent lookup fail as if the service were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Id lists requested so far, one entry per call.
    #[must_use]
    pub fn lookups(&self) -> Vec<Vec<ToyId>> {
        self.lookups.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CatalogClient for SimCatalogClient {
    async fn get_by_ids(&self, ids: &[ToyId]) -> Result<Vec<CatalogToy>, ClientError> {
        if let Ok(mut lookups) = self.lookups.lock() {
            lookups.push(ids.to_vec());
        }

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ClientError::UnexpectedResponse(
                "catalog service unavailable".to_string(),
            ));
        }

        Ok(ids.iter().filter_map(|id| self.toys.get(id).cloned()).collect())
    }
}
