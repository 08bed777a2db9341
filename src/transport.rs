//! Transport - HTTP/JSON adapter over axum
//!
//! Extracts identity and deadline from headers, validates request shape,
//! and maps operation status onto HTTP status codes. All cart semantics
//! live in [`Buckets`].
//!
//! ```text
//! POST   /v1/bucket        → create_bucket
//! POST   /v1/bucket/items  → add_to_bucket
//! DELETE /v1/bucket/items  → del_from_bucket
//! GET    /v1/bucket        → get_bucket
//! GET    /healthz          → "ok"
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::domain::{
    BucketItem, BucketView, CallContext, Deadline, OperationOutcome, OperationStatus, ToyId,
    UserId,
};
use crate::service::Buckets;

// =============================================================================
// TigerStyle Constants
// =============================================================================

/// Header carrying the authenticated caller's id
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the caller's remaining time budget in milliseconds
pub const TIMEOUT_HEADER: &str = "x-request-timeout-ms";

// =============================================================================
// Wire Types
// =============================================================================

/// Body of `POST /v1/bucket/items`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddToBucketRequest {
    /// Lines to add
    pub toys: Vec<BucketItem>,
}

/// Body of `DELETE /v1/bucket/items`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelFromBucketRequest {
    /// Toys to remove
    pub toy_ids: Vec<ToyId>,
}

/// One line of `GET /v1/bucket`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToyResponse {
    /// Toy identifier
    pub toy_id: ToyId,
    /// Catalog title, empty when the catalog had no entry
    pub name: String,
    /// Catalog value, zero when the catalog had no entry
    pub value: i64,
    /// Image URL, empty when the catalog had no entry
    pub image_url: String,
    /// Quantity in the cart
    pub quantity: i32,
}

/// Body of `GET /v1/bucket`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetBucketResponse {
    /// Enriched lines
    pub toys: Vec<ToyResponse>,
    /// Total quantity
    pub quantity: i32,
}

impl From<BucketView> for GetBucketResponse {
    fn from(view: BucketView) -> Self {
        Self {
            toys: view
                .toys
                .into_iter()
                .map(|toy| ToyResponse {
                    toy_id: toy.id,
                    name: toy.title.unwrap_or_default(),
                    value: toy.value.unwrap_or_default(),
                    image_url: toy.image_url.unwrap_or_default(),
                    quantity: toy.quantity,
                })
                .collect(),
            quantity: view.quantity,
        }
    }
}

/// Body of a 400 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// What was wrong with the request
    pub error: String,
}

type Reply<T> = (StatusCode, Json<T>);

// =============================================================================
// Router
// =============================================================================

/// Build the HTTP router around an orchestrator.
pub fn router(buckets: Arc<Buckets>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/bucket", post(create_bucket).get(get_bucket))
        .route(
            "/v1/bucket/items",
            post(add_to_bucket).delete(del_from_bucket),
        )
        .with_state(buckets)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn create_bucket(
    State(buckets): State<Arc<Buckets>>,
    headers: HeaderMap,
) -> Reply<OperationOutcome> {
    let ctx = call_context(&headers);
    outcome_reply(buckets.create_bucket(&ctx).await)
}

async fn add_to_bucket(
    State(buckets): State<Arc<Buckets>>,
    headers: HeaderMap,
    body: Result<Json<AddToBucketRequest>, JsonRejection>,
) -> Result<Reply<OperationOutcome>, Reply<ErrorResponse>> {
    let Json(request) = body.map_err(malformed)?;
    validate_items(&request.toys).map_err(bad_request)?;

    let ctx = call_context(&headers);
    Ok(outcome_reply(buckets.add_to_bucket(&ctx, &request.toys).await))
}

async fn del_from_bucket(
    State(buckets): State<Arc<Buckets>>,
    headers: HeaderMap,
    body: Result<Json<DelFromBucketRequest>, JsonRejection>,
) -> Result<Reply<OperationOutcome>, Reply<ErrorResponse>> {
    let Json(request) = body.map_err(malformed)?;
    validate_toy_ids(&request.toy_ids).map_err(bad_request)?;

    let ctx = call_context(&headers);
    Ok(outcome_reply(
        buckets.del_from_bucket(&ctx, &request.toy_ids).await,
    ))
}

async fn get_bucket(
    State(buckets): State<Arc<Buckets>>,
    headers: HeaderMap,
) -> Reply<GetBucketResponse> {
    let ctx = call_context(&headers);
    let view = buckets.get_bucket(&ctx).await;
    (StatusCode::OK, Json(view.into()))
}

// =============================================================================
// Helpers
// =============================================================================

/// Build the call context from request headers.
///
/// A missing or malformed identity yields an anonymous context; the core
/// decides what that means.
#[must_use]
pub fn call_context(headers: &HeaderMap) -> CallContext {
    let user_id = header_value::<UserId>(headers, USER_ID_HEADER);
    let deadline = header_value::<u64>(headers, TIMEOUT_HEADER)
        .map_or_else(Deadline::none, |ms| Deadline::after(Duration::from_millis(ms)));

    CallContext::from_identity(user_id).with_deadline(deadline)
}

fn header_value<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

/// HTTP status for an operation status.
#[must_use]
pub fn http_status(status: OperationStatus) -> StatusCode {
    match status {
        OperationStatus::Ok => StatusCode::OK,
        OperationStatus::Unauthorized => StatusCode::UNAUTHORIZED,
        OperationStatus::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn outcome_reply(outcome: OperationOutcome) -> Reply<OperationOutcome> {
    (http_status(outcome.status), Json(outcome))
}

fn bad_request(reason: impl Into<String>) -> Reply<ErrorResponse> {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: reason.into(),
        }),
    )
}

/// Undecodable bodies get the same 400 shape as failed validation.
fn malformed(rejection: JsonRejection) -> Reply<ErrorResponse> {
    tracing::debug!(error = %rejection, "rejected request body");
    bad_request(rejection.body_text())
}

fn validate_items(items: &[BucketItem]) -> Result<(), &'static str> {
    for item in items {
        if item.toy_id == 0 {
            return Err("missing toy ids");
        }
        if item.quantity <= 0 {
            return Err("missing toy qty");
        }
    }
    Ok(())
}

fn validate_toy_ids(toy_ids: &[ToyId]) -> Result<(), &'static str> {
    if toy_ids.is_empty() {
        return Err("missing toys ids");
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Toy;
    use axum::http::HeaderValue;

    #[test]
    fn test_call_context_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("7"));
        let ctx = call_context(&headers);
        assert_eq!(ctx.identity(), Some(7));
        assert_eq!(ctx.deadline(), Deadline::none());

        headers.insert(TIMEOUT_HEADER, HeaderValue::from_static("250"));
        let ctx = call_context(&headers);
        assert!(ctx.deadline().remaining().unwrap() <= Duration::from_millis(250));
    }

    #[test]
    fn test_malformed_identity_is_anonymous() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("seven"));
        assert_eq!(call_context(&headers).identity(), None);
        assert_eq!(call_context(&HeaderMap::new()).identity(), None);
    }

    #[test]
    fn test_validate_items() {
        assert!(validate_items(&[BucketItem::new(1, 2)]).is_ok());
        assert!(validate_items(&[]).is_ok());
        assert_eq!(
            validate_items(&[BucketItem::new(1, 2), BucketItem::new(0, 1)]),
            Err("missing toy ids")
        );
        assert_eq!(validate_items(&[BucketItem::new(3, 0)]), Err("missing toy qty"));
        assert_eq!(validate_items(&[BucketItem::new(3, -1)]), Err("missing toy qty"));
    }

    #[test]
    fn test_validate_toy_ids() {
        assert_eq!(validate_toy_ids(&[]), Err("missing toys ids"));
        assert!(validate_toy_ids(&[4]).is_ok());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(http_status(OperationStatus::Ok), StatusCode::OK);
        assert_eq!(http_status(OperationStatus::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(
            http_status(OperationStatus::InternalError),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_get_bucket_response_fills_defaults() {
        let view = BucketView {
            toys: vec![
                Toy {
                    id: 3,
                    quantity: 2,
                    title: Some("Robot".to_string()),
                    image_url: Some("robot.png".to_string()),
                    value: Some(1999),
                },
                Toy::bare(BucketItem::new(9, 1)),
            ],
            quantity: 3,
        };

        let response = GetBucketResponse::from(view);
        assert_eq!(response.quantity, 3);
        assert_eq!(response.toys[0].name, "Robot");
        assert_eq!(response.toys[0].value, 1999);
        assert_eq!(response.toys[1].name, "");
        assert_eq!(response.toys[1].value, 0);
    }
}
