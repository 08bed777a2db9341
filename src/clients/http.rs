//! HTTP clients for the subscription and catalog services.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

use super::{CatalogClient, CatalogToy, ClientError, SubscriptionClient, SubscriptionStatus};
use crate::config::ClientConfig;
use crate::domain::{ToyId, UserId};

/// Build the shared HTTP client with the configured timeout.
///
/// # Errors
/// Returns an error if the TLS backend cannot be initialised.
pub fn build_http(config: &ClientConfig) -> Result<Client, ClientError> {
    Ok(Client::builder().timeout(config.timeout).build()?)
}

async fn ensure_success(response: Response, what: &str) -> Result<Response, ClientError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    Err(ClientError::UnexpectedResponse(format!(
        "{what} request failed with status {status}: {text}"
    )))
}

// =============================================================================
// Subscription
// =============================================================================

/// HTTP client for the subscription service.
#[derive(Debug, Clone)]
pub struct HttpSubscriptionClient {
    base_url: String,
    http: Client,
}

impl HttpSubscriptionClient {
    /// Create a client against `base_url`, e.g. `"http://localhost:8081"`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, http: Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubscriptionResponse {
    status: SubscriptionStatus,
}

#[async_trait]
impl SubscriptionClient for HttpSubscriptionClient {
    async fn check_subscription(&self, user_id: UserId) -> Result<SubscriptionStatus, ClientError> {
        let url = format!("{}/v1/subscriptions/{user_id}", self.base_url);

        let response = self.http.get(&url).send().await?;
        let parsed: SubscriptionResponse =
            ensure_success(response, "subscription").await?.json().await?;

        tracing::debug!(user_id, status = ?parsed.status, "subscription checked");
        Ok(parsed.status)
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// HTTP client for the toy catalog.
#[derive(Debug, Clone)]
pub struct HttpCatalogClient {
    base_url: String,
    http: Client,
}

impl HttpCatalogClient {
    /// Create a client against `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, http: Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }
}

#[derive(Debug, Serialize)]
struct ByIdsRequest<'a> {
    ids: &'a [ToyId],
}

#[derive(Debug, Deserialize)]
struct ByIdsResponse {
    #[serde(default)]
    toys: Vec<CatalogToy>,
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn get_by_ids(&self, ids: &[ToyId]) -> Result<Vec<CatalogToy>, ClientError> {
        let url = format!("{}/v1/toys/by-ids", self.base_url);

        let response = self
            .http
            .post(&url)
            .json(&ByIdsRequest { ids })
            .send()
            .await?;
        let parsed: ByIdsResponse = ensure_success(response, "catalog").await?.json().await?;

        tracing::debug!(requested = ids.len(), returned = parsed.toys.len(), "catalog lookup");
        Ok(parsed.toys)
    }
}
