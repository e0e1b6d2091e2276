//! Lifecycle workflow tests
//!
//! Exercises the full state table against an in-memory recording store:
//! creation paths, direct edits, staged-request submission and withdrawal,
//! scoping and the audit emission matrix.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::audit::{AuditEmitter, AuditEventKind};
use crate::error::{CoreError, CoreResult};
use crate::lifecycle::{SubscriptionLifecycleManager, UpdateOutcome};
use crate::model::{Organization, Subscription, SubscriptionStatus};
use crate::query::{self, SubscriptionPage, SubscriptionQuery};
use crate::scope::{Actor, ActorRole, ScopeMetadata};
use crate::staged::SubscriptionWrite;
use crate::store::ResourceStore;

#[derive(Debug, Clone, PartialEq)]
enum StoreCall {
    Create,
    Update(String),
    SubmitStaged {
        id: String,
        edit_action: String,
    },
    Withdraw(String),
}

/// In-memory store that records every write-side call.
#[derive(Clone, Default)]
struct MemoryStore {
    orgs: Arc<Mutex<BTreeMap<String, Organization>>>,
    subs: Arc<Mutex<BTreeMap<String, Subscription>>>,
    calls: Arc<Mutex<Vec<StoreCall>>>,
    staged_documents: Arc<Mutex<Vec<Value>>>,
    next_id: Arc<AtomicUsize>,
}

impl MemoryStore {
    fn with_org(org_id: &str) -> Self {
        let store = Self::default();
        store.orgs.lock().unwrap().insert(
            org_id.to_string(),
            Organization {
                id: org_id.to_string(),
                name: Some(format!("{org_id} name")),
            },
        );
        store
    }

    fn seed(&self, value: Value) -> Subscription {
        let sub: Subscription = serde_json::from_value(value).unwrap();
        self.subs
            .lock()
            .unwrap()
            .insert(sub.id.clone(), sub.clone());
        sub
    }

    fn record(&self, id: &str) -> Subscription {
        self.subs.lock().unwrap()[id].clone()
    }

    fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    fn matches(record: &Subscription, filters: &BTreeMap<String, String>) -> bool {
        let value = serde_json::to_value(record).unwrap();
        filters.iter().all(|(key, expected)| match value.get(key) {
            Some(Value::String(s)) => s == expected,
            Some(Value::Null) | None => false,
            Some(other) => other.to_string() == *expected,
        })
    }

    fn from_document(&self, document: &Value) -> Subscription {
        let mut record = document.clone();
        let relationships = record["relationships"].take();
        record["id"] = json!(format!(
            "sub-{}",
            self.next_id.fetch_add(1, Ordering::SeqCst) + 1
        ));
        record["organization_id"] = relationships["organization"]["id"].clone();
        if let Some(id) = relationships["user"]["id"].as_str() {
            record["user_id"] = json!(id);
        }
        if let Some(id) = relationships["product"]["id"].as_str() {
            record["product_id"] = json!(id);
        }
        if let Some(id) = relationships["product_pricing"]["id"].as_str() {
            record["product_pricing_id"] = json!(id);
        }
        if let Some(id) = relationships["product_contract"]["id"].as_str() {
            record["product_contract_id"] = json!(id);
        }
        serde_json::from_value(record).unwrap()
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn find_organization(
        &self,
        id: &str,
        _scope: &ScopeMetadata,
    ) -> CoreResult<Option<Organization>> {
        Ok(self.orgs.lock().unwrap().get(id).cloned())
    }

    async fn list_subscriptions(&self, query: SubscriptionQuery) -> CoreResult<SubscriptionPage> {
        let records: Vec<Subscription> = self
            .subs
            .lock()
            .unwrap()
            .values()
            .filter(|record| Self::matches(record, query.filters()))
            .cloned()
            .collect();
        let total = records.len() as u64;
        let records = match query.pagination() {
            Some((number, size)) => records
                .into_iter()
                .skip(((number.max(1) - 1) * size) as usize)
                .take(size as usize)
                .collect(),
            None => records,
        };
        Ok(SubscriptionPage { records, total })
    }

    async fn find_subscription(
        &self,
        query: SubscriptionQuery,
    ) -> CoreResult<Option<Subscription>> {
        Ok(self
            .list_subscriptions(query)
            .await?
            .records
            .into_iter()
            .next())
    }

    async fn create_subscription(
        &self,
        document: Value,
        _scope: &ScopeMetadata,
    ) -> CoreResult<Subscription> {
        self.calls.lock().unwrap().push(StoreCall::Create);
        let record = self.from_document(&document);
        self.subs
            .lock()
            .unwrap()
            .insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn update_subscription(
        &self,
        id: &str,
        document: Value,
        _scope: &ScopeMetadata,
    ) -> CoreResult<Subscription> {
        self.calls
            .lock()
            .unwrap()
            .push(StoreCall::Update(id.to_string()));
        let mut subs = self.subs.lock().unwrap();
        let existing = subs
            .get(id)
            .cloned()
            .ok_or(CoreError::NotFound("Subscription"))?;
        let mut merged = serde_json::to_value(&existing)?;
        if let (Some(target), Some(changes)) = (merged.as_object_mut(), document.as_object()) {
            for (key, value) in changes {
                target.insert(key.clone(), value.clone());
            }
        }
        let updated: Subscription = serde_json::from_value(merged)?;
        subs.insert(id.to_string(), updated.clone());
        Ok(updated)
    }

    async fn submit_staged_request(
        &self,
        id: &str,
        document: Value,
        edit_action: &str,
        _scope: &ScopeMetadata,
    ) -> CoreResult<()> {
        self.calls.lock().unwrap().push(StoreCall::SubmitStaged {
            id: id.to_string(),
            edit_action: edit_action.to_string(),
        });
        self.staged_documents.lock().unwrap().push(document);
        Ok(())
    }

    async fn withdraw_staged_request(&self, id: &str, _scope: &ScopeMetadata) -> CoreResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push(StoreCall::Withdraw(id.to_string()));
        Ok(())
    }
}

fn manager(
    store: MemoryStore,
) -> (
    SubscriptionLifecycleManager<MemoryStore>,
    tokio::sync::mpsc::Receiver<crate::audit::AuditEvent>,
) {
    let (audit, rx) = AuditEmitter::channel();
    (SubscriptionLifecycleManager::new(store, audit), rx)
}

fn write_from(value: Value) -> SubscriptionWrite {
    serde_json::from_value(value).unwrap()
}

fn support_actor(org: &str) -> Actor {
    Actor {
        user_id: "u-support".to_string(),
        role: ActorRole::Support,
        support_organization_id: Some(org.to_string()),
    }
}

// =============================================================================
// Create
// =============================================================================

#[tokio::test]
async fn test_create_without_cart_marker_is_visible_and_audited() {
    let store = MemoryStore::with_org("org-1");
    let (manager, mut audit_rx) = manager(store.clone());
    let actor = Actor::admin("u-1");

    let created = manager
        .create(
            "org-1",
            write_from(json!({"product_id": "p-1"})),
            &actor,
        )
        .await
        .unwrap();

    assert_eq!(created.status, SubscriptionStatus::Visible);
    assert_eq!(created.organization_id, "org-1");
    assert_eq!(created.product_id, Some("p-1".to_string()));
    assert_eq!(created.user_id, Some("u-1".to_string()));

    let event = audit_rx.try_recv().unwrap();
    assert_eq!(event.kind, AuditEventKind::SubscriptionAdd);
    assert_eq!(event.actor_id, "u-1");
    assert_eq!(event.subject_id, created.id);

    // Subsequent default-scope list includes the new record
    let page = store
        .list_subscriptions(
            SubscriptionQuery::new()
                .organization("org-1")
                .status(SubscriptionStatus::Visible),
        )
        .await
        .unwrap();
    assert_eq!(page.records.len(), 1);
}

#[tokio::test]
async fn test_create_with_cart_marker_is_staged_and_not_audited() {
    let store = MemoryStore::with_org("org-1");
    let (manager, mut audit_rx) = manager(store.clone());

    let created = manager
        .create(
            "org-1",
            write_from(json!({
                "cart_entry": true,
                "product_id": "p-1",
                "max_licenses": 10,
                "currency": "USD"
            })),
            &Actor::admin("u-1"),
        )
        .await
        .unwrap();

    assert_eq!(created.status, SubscriptionStatus::Staged);
    assert_eq!(created.max_licenses, Some(10));
    assert!(audit_rx.try_recv().is_err(), "cart creations are not audited here");

    // Default-scope list excludes the staged record; staged scope includes it
    let visible = store
        .list_subscriptions(
            SubscriptionQuery::new()
                .organization("org-1")
                .status(SubscriptionStatus::Visible),
        )
        .await
        .unwrap();
    assert!(visible.records.is_empty());
    let staged = store
        .list_subscriptions(
            SubscriptionQuery::new()
                .organization("org-1")
                .status(SubscriptionStatus::Staged),
        )
        .await
        .unwrap();
    assert_eq!(staged.records.len(), 1);
}

#[tokio::test]
async fn test_create_admin_path_drops_cart_only_fields() {
    let store = MemoryStore::with_org("org-1");
    let (manager, _audit_rx) = manager(store.clone());

    let created = manager
        .create(
            "org-1",
            write_from(json!({
                "product_id": "p-1",
                "max_licenses": 99,
                "start_date": "2026-09-01",
                "currency": "EUR"
            })),
            &Actor::admin("u-1"),
        )
        .await
        .unwrap();

    let persisted = store.record(&created.id);
    assert_eq!(persisted.max_licenses, None);
    assert_eq!(persisted.start_date, None);
    assert_eq!(persisted.currency, None);
}

#[tokio::test]
async fn test_create_missing_organization_is_not_found() {
    let store = MemoryStore::default();
    let (manager, _audit_rx) = manager(store.clone());

    let result = manager
        .create(
            "org-404",
            write_from(json!({"product_id": "p-1"})),
            &Actor::admin("u-1"),
        )
        .await;

    assert!(matches!(result, Err(CoreError::NotFound("Organization"))));
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn test_create_from_support_actor_is_denied_before_any_store_call() {
    let store = MemoryStore::with_org("org-1");
    let (manager, mut audit_rx) = manager(store.clone());

    let result = manager
        .create(
            "org-1",
            write_from(json!({"product_id": "p-1"})),
            &support_actor("org-1"),
        )
        .await;

    assert!(matches!(result, Err(CoreError::AccessDenied)));
    assert!(store.calls().is_empty());
    assert!(audit_rx.try_recv().is_err());
}

// =============================================================================
// Update: direct admin edit
// =============================================================================

#[tokio::test]
async fn test_update_non_cart_persists_and_audits() {
    let store = MemoryStore::with_org("org-1");
    store.seed(json!({
        "id": "sub-2",
        "organization_id": "org-1",
        "status": "visible",
        "product_contract_id": "c-1"
    }));
    let (manager, mut audit_rx) = manager(store.clone());

    let outcome = manager
        .update(
            "org-1",
            "sub-2",
            write_from(json!({"product_contract_id": "c-2"})),
            &Actor::admin("u-1"),
        )
        .await
        .unwrap();

    match outcome {
        UpdateOutcome::Updated(sub) => {
            assert_eq!(sub.product_contract_id, Some("c-2".to_string()));
        }
        other => panic!("expected Updated, got {other:?}"),
    }
    assert_eq!(
        store.record("sub-2").product_contract_id,
        Some("c-2".to_string())
    );

    let event = audit_rx.try_recv().unwrap();
    assert_eq!(event.kind, AuditEventKind::SubscriptionUpdate);
    assert_eq!(event.extra, json!({"edit_action": ""}));
}

#[tokio::test]
async fn test_update_non_cart_never_applies_cart_only_fields() {
    let store = MemoryStore::with_org("org-1");
    store.seed(json!({
        "id": "sub-2",
        "organization_id": "org-1",
        "status": "visible",
        "max_licenses": 5
    }));
    let (manager, _audit_rx) = manager(store.clone());

    manager
        .update(
            "org-1",
            "sub-2",
            write_from(json!({"product_id": "p-2", "max_licenses": 500})),
            &Actor::admin("u-1"),
        )
        .await
        .unwrap();

    let persisted = store.record("sub-2");
    assert_eq!(persisted.product_id, Some("p-2".to_string()));
    assert_eq!(persisted.max_licenses, Some(5), "cart-only field must not persist");
}

#[tokio::test]
async fn test_update_missing_subscription_is_not_found() {
    let store = MemoryStore::with_org("org-1");
    let (manager, _audit_rx) = manager(store);

    let result = manager
        .update(
            "org-1",
            "sub-404",
            write_from(json!({"product_contract_id": "c-2"})),
            &Actor::admin("u-1"),
        )
        .await;

    assert!(matches!(result, Err(CoreError::NotFound("Subscription"))));
}

// =============================================================================
// Update: cart-originated staged change
// =============================================================================

#[tokio::test]
async fn test_update_cart_submits_staged_request_without_persisting() {
    let store = MemoryStore::with_org("org-1");
    store.seed(json!({
        "id": "sub-1",
        "organization_id": "org-1",
        "status": "staged",
        "max_licenses": 5
    }));
    let (manager, mut audit_rx) = manager(store.clone());

    let outcome = manager
        .update(
            "org-1",
            "sub-1",
            write_from(json!({
                "cart_entry": true,
                "edit_action": "upgrade",
                "max_licenses": 25
            })),
            &Actor::admin("u-1"),
        )
        .await
        .unwrap();

    assert!(matches!(outcome, UpdateOutcome::StagedRequestSubmitted(_)));
    // Canonical record is untouched
    assert_eq!(store.record("sub-1").max_licenses, Some(5));
    // The staged request carries the applied cart fields
    assert_eq!(
        store.calls(),
        vec![StoreCall::SubmitStaged {
            id: "sub-1".to_string(),
            edit_action: "upgrade".to_string()
        }]
    );
    let document = store.staged_documents.lock().unwrap()[0].clone();
    assert_eq!(document["max_licenses"], json!(25));
    assert_eq!(document["id"], json!("sub-1"));
    assert!(audit_rx.try_recv().is_err(), "staged submissions are not audited");
}

#[tokio::test]
async fn test_update_cart_cancel_withdraws_and_leaves_record_unchanged() {
    let store = MemoryStore::with_org("org-1");
    let seeded = store.seed(json!({
        "id": "sub-1",
        "organization_id": "org-1",
        "status": "staged",
        "max_licenses": 5,
        "currency": "USD",
        "custom_data": {"note": "keep me"}
    }));
    let before = serde_json::to_value(&seeded).unwrap();
    let (manager, mut audit_rx) = manager(store.clone());

    let outcome = manager
        .update(
            "org-1",
            "sub-1",
            write_from(json!({
                "cart_entry": true,
                "edit_action": "cancel",
                "max_licenses": 999
            })),
            &Actor::admin("u-1"),
        )
        .await
        .unwrap();

    assert!(matches!(outcome, UpdateOutcome::StagedRequestWithdrawn));
    assert_eq!(
        serde_json::to_value(&store.record("sub-1")).unwrap(),
        before,
        "cancel must not mutate any stored attribute"
    );
    assert_eq!(store.calls(), vec![StoreCall::Withdraw("sub-1".to_string())]);
    assert!(audit_rx.try_recv().is_err(), "request-level cancel is not audited");
}

#[tokio::test]
async fn test_update_cart_scopes_to_staged_records() {
    let store = MemoryStore::with_org("org-1");
    store.seed(json!({
        "id": "sub-2",
        "organization_id": "org-1",
        "status": "visible"
    }));
    let (manager, _audit_rx) = manager(store);

    // Cart context looks for a staged record; a visible one is invisible to it
    let result = manager
        .update(
            "org-1",
            "sub-2",
            write_from(json!({"cart_entry": true, "max_licenses": 10})),
            &Actor::admin("u-1"),
        )
        .await;

    assert!(matches!(result, Err(CoreError::NotFound("Subscription"))));
}

// =============================================================================
// Search mode
// =============================================================================

#[tokio::test]
async fn test_search_unions_term_sets_and_dedupes_by_id() {
    let store = MemoryStore::with_org("org-1");
    store.seed(json!({
        "id": "sub-a",
        "organization_id": "org-1",
        "status": "visible",
        "currency": "USD"
    }));
    store.seed(json!({
        "id": "sub-b",
        "organization_id": "org-1",
        "status": "visible",
        "currency": "EUR",
        "max_licenses": 5
    }));
    store.seed(json!({
        "id": "sub-c",
        "organization_id": "org-1",
        "status": "visible",
        "currency": "USD",
        "max_licenses": 5
    }));

    let base = SubscriptionQuery::new()
        .organization("org-1")
        .status(SubscriptionStatus::Visible);
    // sub-a and sub-c match the first term set; sub-b and sub-c the second
    let union = query::search(
        &store,
        base,
        vec![
            vec![("currency".to_string(), "USD".to_string())],
            vec![("max_licenses".to_string(), "5".to_string())],
        ],
    )
    .await
    .unwrap();

    let ids: Vec<&str> = union.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["sub-a", "sub-c", "sub-b"]);
    assert_eq!(union.len(), 3, "count is the de-duplicated union size");
}

#[tokio::test]
async fn test_search_with_disjoint_term_sets() {
    let store = MemoryStore::with_org("org-1");
    store.seed(json!({
        "id": "sub-a",
        "organization_id": "org-1",
        "status": "visible",
        "currency": "USD"
    }));
    store.seed(json!({
        "id": "sub-b",
        "organization_id": "org-1",
        "status": "visible",
        "currency": "EUR"
    }));

    let base = SubscriptionQuery::new()
        .organization("org-1")
        .status(SubscriptionStatus::Visible);
    let union = query::search(
        &store,
        base,
        vec![
            vec![("currency".to_string(), "USD".to_string())],
            vec![("currency".to_string(), "EUR".to_string())],
        ],
    )
    .await
    .unwrap();

    assert_eq!(union.len(), 2);
}

// =============================================================================
// Listing scope
// =============================================================================

#[tokio::test]
async fn test_default_listing_never_returns_staged_records() {
    let store = MemoryStore::with_org("org-1");
    store.seed(json!({
        "id": "sub-v",
        "organization_id": "org-1",
        "status": "visible"
    }));
    store.seed(json!({
        "id": "sub-s",
        "organization_id": "org-1",
        "status": "staged"
    }));

    let page = store
        .list_subscriptions(
            SubscriptionQuery::new()
                .organization("org-1")
                .status(SubscriptionStatus::Visible),
        )
        .await
        .unwrap();

    assert_eq!(page.records.len(), 1);
    assert_eq!(page.records[0].id, "sub-v");
    assert_eq!(page.total, 1);
}

#[tokio::test]
async fn test_structured_listing_total_is_independent_of_page_size() {
    let store = MemoryStore::with_org("org-1");
    for n in 0..5 {
        store.seed(json!({
            "id": format!("sub-{n}"),
            "organization_id": "org-1",
            "status": "visible"
        }));
    }

    let page = store
        .list_subscriptions(
            SubscriptionQuery::new()
                .organization("org-1")
                .status(SubscriptionStatus::Visible)
                .page(1, 2),
        )
        .await
        .unwrap();

    assert_eq!(page.records.len(), 2);
    assert_eq!(page.total, 5);
}
