//! Remote resource store client
//!
//! The store is the external system of record for subscriptions,
//! organizations and products. [`ResourceStore`] is the seam the lifecycle
//! manager and query layer talk through; [`HttpResourceStore`] is the wire
//! implementation. No retry or backoff anywhere: transient failures surface
//! to the caller as-is.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{CoreError, CoreResult, FieldErrors};
use crate::model::{Organization, Subscription};
use crate::query::{SubscriptionPage, SubscriptionQuery};
use crate::scope::ScopeMetadata;

/// Port to the remote resource store.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn find_organization(
        &self,
        id: &str,
        scope: &ScopeMetadata,
    ) -> CoreResult<Option<Organization>>;

    async fn list_subscriptions(&self, query: SubscriptionQuery) -> CoreResult<SubscriptionPage>;

    async fn find_subscription(
        &self,
        query: SubscriptionQuery,
    ) -> CoreResult<Option<Subscription>>;

    async fn create_subscription(
        &self,
        document: Value,
        scope: &ScopeMetadata,
    ) -> CoreResult<Subscription>;

    async fn update_subscription(
        &self,
        id: &str,
        document: Value,
        scope: &ScopeMetadata,
    ) -> CoreResult<Subscription>;

    /// Registers a proposed change for downstream approval. Does not alter
    /// the subscription's canonical state.
    async fn submit_staged_request(
        &self,
        id: &str,
        document: Value,
        edit_action: &str,
        scope: &ScopeMetadata,
    ) -> CoreResult<()>;

    /// Withdraws the pending staged request. Request-level action; no
    /// subscription attribute is touched.
    async fn withdraw_staged_request(&self, id: &str, scope: &ScopeMetadata) -> CoreResult<()>;
}

#[derive(Debug, Deserialize)]
struct ListEnvelope {
    data: Vec<Subscription>,
    #[serde(default)]
    meta: Meta,
}

#[derive(Debug, Default, Deserialize)]
struct Meta {
    #[serde(default)]
    record_count: u64,
}

#[derive(Debug, Deserialize)]
struct RecordEnvelope<T> {
    data: T,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    errors: BTreeMap<String, Vec<String>>,
}

/// HTTP implementation of [`ResourceStore`].
///
/// Encodes filters as `filter[...]`, includes as a comma-joined `include`
/// param, scope metadata as `_metadata[...]` and pagination as
/// `page[number]`/`page[size]`. Responses arrive in a
/// `{ data, meta: { record_count } }` envelope.
#[derive(Clone)]
pub struct HttpResourceStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpResourceStore {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn metadata_params(scope: &ScopeMetadata) -> Vec<(String, String)> {
        scope
            .iter()
            .map(|(k, v)| (format!("_metadata[{k}]"), v.to_string()))
            .collect()
    }

    /// Maps non-success responses to the error taxonomy. 422 bodies carry
    /// field-level detail from the store.
    async fn ensure_success(response: Response) -> CoreResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            let envelope: ErrorEnvelope = response.json().await.unwrap_or_default();
            return Err(CoreError::Validation(FieldErrors(envelope.errors)));
        }
        Err(CoreError::Store(format!("store returned {status}")))
    }
}

#[async_trait]
impl ResourceStore for HttpResourceStore {
    async fn find_organization(
        &self,
        id: &str,
        scope: &ScopeMetadata,
    ) -> CoreResult<Option<Organization>> {
        let response = self
            .client
            .get(self.url(&format!("/organizations/{id}")))
            .query(&Self::metadata_params(scope))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::ensure_success(response).await?;
        let envelope: RecordEnvelope<Organization> = response.json().await?;
        Ok(Some(envelope.data))
    }

    async fn list_subscriptions(&self, query: SubscriptionQuery) -> CoreResult<SubscriptionPage> {
        let response = self
            .client
            .get(self.url("/subscriptions"))
            .query(&query.to_query_params())
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;
        let envelope: ListEnvelope = response.json().await?;
        Ok(SubscriptionPage {
            records: envelope.data,
            total: envelope.meta.record_count,
        })
    }

    async fn find_subscription(
        &self,
        query: SubscriptionQuery,
    ) -> CoreResult<Option<Subscription>> {
        let page = self.list_subscriptions(query).await?;
        Ok(page.records.into_iter().next())
    }

    async fn create_subscription(
        &self,
        document: Value,
        scope: &ScopeMetadata,
    ) -> CoreResult<Subscription> {
        let response = self
            .client
            .post(self.url("/subscriptions"))
            .query(&Self::metadata_params(scope))
            .json(&json!({ "subscription": document }))
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;
        let envelope: RecordEnvelope<Subscription> = response.json().await?;
        Ok(envelope.data)
    }

    async fn update_subscription(
        &self,
        id: &str,
        document: Value,
        scope: &ScopeMetadata,
    ) -> CoreResult<Subscription> {
        let response = self
            .client
            .put(self.url(&format!("/subscriptions/{id}")))
            .query(&Self::metadata_params(scope))
            .json(&json!({ "subscription": document }))
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;
        let envelope: RecordEnvelope<Subscription> = response.json().await?;
        Ok(envelope.data)
    }

    async fn submit_staged_request(
        &self,
        id: &str,
        document: Value,
        edit_action: &str,
        scope: &ScopeMetadata,
    ) -> CoreResult<()> {
        let response = self
            .client
            .post(self.url(&format!("/subscriptions/{id}/staged_request")))
            .query(&Self::metadata_params(scope))
            .json(&json!({ "data": document, "edit_action": edit_action }))
            .send()
            .await?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    async fn withdraw_staged_request(&self, id: &str, scope: &ScopeMetadata) -> CoreResult<()> {
        let response = self
            .client
            .delete(self.url(&format!("/subscriptions/{id}/staged_request")))
            .query(&Self::metadata_params(scope))
            .send()
            .await?;
        Self::ensure_success(response).await?;
        Ok(())
    }
}
