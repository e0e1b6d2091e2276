//! Admin subscription routes
//!
//! Listing (structured or multi-term search), single fetch, creation and
//! update/stage/cancel-stage. Write payloads arrive under a `subscription`
//! key and are split by trust level in the core.

use axum::{
    extract::{Extension, Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use storefront_core::{
    parse_terms, query, ResourceStore, Subscription, SubscriptionQuery, SubscriptionStatus,
    SubscriptionWrite, UpdateOutcome, SUBSCRIPTION_INCLUDES,
};

use crate::{
    auth::{authorize, Action, AuthUser},
    error::{ApiError, ApiResult},
    state::AppState,
};

const X_TOTAL_COUNT: HeaderName = HeaderName::from_static("x-total-count");

const DEFAULT_PAGE_SIZE: u32 = 50;
const MAX_PAGE_SIZE: u32 = 100;

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// JSON array of flat key/value term sets; switches to search mode
    pub terms: Option<String>,
    /// Status scope; defaults to `visible`, cart/staging clients pass `staged`
    pub status: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ShowQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WriteBody {
    pub subscription: SubscriptionWrite,
}

fn status_scope(raw: Option<&str>) -> ApiResult<SubscriptionStatus> {
    match raw {
        None => Ok(SubscriptionStatus::Visible),
        Some(s) => SubscriptionStatus::parse(s)
            .ok_or_else(|| ApiError::BadRequest(format!("unknown status scope: {s}"))),
    }
}

fn total_count_headers(total: u64) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(X_TOTAL_COUNT, HeaderValue::from(total));
    headers
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /api/v1/organizations/{org_id}/subscriptions
///
/// Structured mode reports the store's query-level record count; search mode
/// (`terms=`) reports the size of the de-duplicated union instead.
pub async fn index(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(org_id): Path<String>,
    Query(params): Query<ListQuery>,
) -> ApiResult<(HeaderMap, Json<Vec<Subscription>>)> {
    let actor = auth_user.actor();
    authorize(&actor, Action::List, &org_id)?;

    let scope = actor.scope_metadata();
    let store = state.manager.store();

    store
        .find_organization(&org_id, &scope)
        .await?
        .ok_or(ApiError::NotFound("Organization"))?;

    let base = SubscriptionQuery::new()
        .status(status_scope(params.status.as_deref())?)
        .organization(&org_id)
        .includes(SUBSCRIPTION_INCLUDES)
        .metadata(scope);

    if let Some(raw_terms) = params.terms {
        let term_sets = parse_terms(&raw_terms)?;
        let records = query::search(store, base, term_sets).await?;
        let total = records.len() as u64;
        Ok((total_count_headers(total), Json(records)))
    } else {
        let page_number = params.page.unwrap_or(1).max(1);
        let page_size = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
        let page = store
            .list_subscriptions(base.page(page_number, page_size))
            .await?;
        Ok((total_count_headers(page.total), Json(page.records)))
    }
}

/// GET /api/v1/organizations/{org_id}/subscriptions/{id}
pub async fn show(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path((org_id, id)): Path<(String, String)>,
    Query(params): Query<ShowQuery>,
) -> ApiResult<Json<Subscription>> {
    let actor = auth_user.actor();
    authorize(&actor, Action::Show, &org_id)?;

    let query = SubscriptionQuery::new()
        .organization(&org_id)
        .id(&id)
        .status(status_scope(params.status.as_deref())?)
        .includes(SUBSCRIPTION_INCLUDES)
        .metadata(actor.scope_metadata().with_organization(&org_id));

    let subscription = state
        .manager
        .store()
        .find_subscription(query)
        .await?
        .ok_or(ApiError::NotFound("Subscription"))?;
    Ok(Json(subscription))
}

/// POST /api/v1/organizations/{org_id}/subscriptions
pub async fn create(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(org_id): Path<String>,
    Json(body): Json<WriteBody>,
) -> ApiResult<(StatusCode, Json<Subscription>)> {
    let actor = auth_user.actor();
    authorize(&actor, Action::Create, &org_id)?;

    let subscription = state
        .manager
        .create(&org_id, body.subscription, &actor)
        .await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

/// PUT /api/v1/organizations/{org_id}/subscriptions/{id}
///
/// 200 with the subscription for direct edits and staged-request
/// submissions; 204 when a pending staged request is withdrawn.
pub async fn update(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path((org_id, id)): Path<(String, String)>,
    Json(body): Json<WriteBody>,
) -> ApiResult<Response> {
    let actor = auth_user.actor();
    authorize(&actor, Action::Update, &org_id)?;

    match state
        .manager
        .update(&org_id, &id, body.subscription, &actor)
        .await?
    {
        UpdateOutcome::Updated(subscription)
        | UpdateOutcome::StagedRequestSubmitted(subscription) => {
            Ok(Json(subscription).into_response())
        }
        UpdateOutcome::StagedRequestWithdrawn => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}
