//! Subscription lifecycle
//!
//! The state machine governing creation, staged-request submission,
//! staged-request cancellation and direct mutation:
//!
//! | Current        | Trigger                        | Next      | Side effect                      |
//! |----------------|--------------------------------|-----------|----------------------------------|
//! | (none)         | create, no cart marker         | visible   | persist, audit                   |
//! | (none)         | create, cart marker            | staged    | persist (cart field set)         |
//! | staged/visible | update, non-cart               | unchanged | persist, audit                   |
//! | staged/visible | update, cart, action != cancel | unchanged | submit staged request            |
//! | staged/visible | update, cart, action == cancel | unchanged | withdraw staged request, 204     |

use serde_json::{json, Value};

use crate::audit::{AuditEmitter, AuditEventKind};
use crate::error::{CoreError, CoreResult};
use crate::model::{Subscription, SubscriptionStatus, SUBSCRIPTION_INCLUDES};
use crate::query::SubscriptionQuery;
use crate::scope::{Actor, ScopeMetadata};
use crate::staged::{EditAction, SubscriptionWrite, WritePlan};
use crate::store::ResourceStore;

/// Outcome of an update, mapped by the transport layer to 200 or 204.
#[derive(Debug)]
pub enum UpdateOutcome {
    /// Direct admin edit applied and persisted
    Updated(Subscription),
    /// Cart-originated change packaged into a pending staged request; the
    /// canonical record is unchanged
    StagedRequestSubmitted(Subscription),
    /// Pending staged request withdrawn; nothing mutated, no body
    StagedRequestWithdrawn,
}

/// Drives subscription writes against the remote resource store.
pub struct SubscriptionLifecycleManager<S> {
    store: S,
    audit: AuditEmitter,
}

impl<S: ResourceStore> SubscriptionLifecycleManager<S> {
    pub fn new(store: S, audit: AuditEmitter) -> Self {
        Self { store, audit }
    }

    /// The store handle, for read paths composed outside the manager.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates a subscription for the organization. Cart-originated payloads
    /// produce a `staged` record from the cart field set; direct admin
    /// payloads produce a `visible` record from the admin field set. Only
    /// the non-cart path is audited here (cart creations are audited
    /// downstream, once approved).
    pub async fn create(
        &self,
        organization_id: &str,
        payload: SubscriptionWrite,
        actor: &Actor,
    ) -> CoreResult<Subscription> {
        actor.ensure_can_write()?;
        let scope = actor.scope_metadata();

        let organization = self
            .store
            .find_organization(organization_id, &scope)
            .await?
            .ok_or(CoreError::NotFound("Organization"))?;

        // Relationship ids come from the raw payload in both paths; the
        // whitelists only govern attributes.
        let product_id = payload.product_id.clone();
        let product_pricing_id = payload.product_pricing_id.clone();
        let product_contract_id = payload.product_contract_id.clone();

        let (mut document, status) = match payload.into_plan()? {
            WritePlan::Cart { fields, .. } => {
                (serde_json::to_value(&fields)?, SubscriptionStatus::Staged)
            }
            WritePlan::Admin { fields, .. } => {
                (serde_json::to_value(&fields)?, SubscriptionStatus::Visible)
            }
        };
        document["status"] = json!(status.as_str());

        let mut relationships = json!({
            "organization": { "id": organization.id },
            "user": { "id": actor.user_id },
        });
        if let Some(id) = product_id {
            relationships["product"] = json!({ "id": id });
        }
        if let Some(id) = product_pricing_id {
            relationships["product_pricing"] = json!({ "id": id });
        }
        if let Some(id) = product_contract_id {
            relationships["product_contract"] = json!({ "id": id });
        }
        document["relationships"] = relationships;

        let created = self.store.create_subscription(document, &scope).await?;

        let subscription = self
            .fetch_with_includes(organization_id, &created.id, status, &scope)
            .await?
            .unwrap_or(created);

        if status == SubscriptionStatus::Visible {
            self.audit.emit(
                AuditEventKind::SubscriptionAdd,
                &actor.user_id,
                "Subscription added",
                &subscription.id,
                json!({}),
            );
        }

        tracing::info!(
            organization_id = %organization_id,
            subscription_id = %subscription.id,
            status = %status,
            "subscription created"
        );
        Ok(subscription)
    }

    /// Updates a subscription. Cart-originated payloads either submit a
    /// staged update request (the canonical record stays untouched) or, for
    /// `edit_action == cancel`, withdraw the pending request. Direct admin
    /// payloads persist synchronously and are audited.
    pub async fn update(
        &self,
        organization_id: &str,
        id: &str,
        payload: SubscriptionWrite,
        actor: &Actor,
    ) -> CoreResult<UpdateOutcome> {
        actor.ensure_can_write()?;
        let scope = actor.scope_metadata().with_organization(organization_id);

        // Cart context operates on staged records, everything else on
        // visible ones.
        let status_scope = if payload.is_cart() {
            SubscriptionStatus::Staged
        } else {
            SubscriptionStatus::Visible
        };

        let query = SubscriptionQuery::new()
            .organization(organization_id)
            .id(id)
            .status(status_scope)
            .metadata(scope.clone());
        let subscription = self
            .store
            .find_subscription(query)
            .await?
            .ok_or(CoreError::NotFound("Subscription"))?;

        match payload.into_plan()? {
            WritePlan::Cart {
                edit_action: EditAction::Cancel,
                ..
            } => {
                self.store
                    .withdraw_staged_request(&subscription.id, &scope)
                    .await?;
                tracing::info!(
                    subscription_id = %subscription.id,
                    "staged request withdrawn"
                );
                Ok(UpdateOutcome::StagedRequestWithdrawn)
            }
            WritePlan::Cart {
                fields,
                edit_action,
            } => {
                let mut proposed = subscription.clone();
                fields.apply_to(&mut proposed);
                let document: Value = serde_json::to_value(&proposed)?;
                self.store
                    .submit_staged_request(&subscription.id, document, edit_action.as_str(), &scope)
                    .await?;

                let refetched = self
                    .fetch_with_includes(organization_id, &subscription.id, status_scope, &scope)
                    .await?
                    .unwrap_or(subscription);
                tracing::info!(
                    subscription_id = %refetched.id,
                    edit_action = edit_action.as_str(),
                    "staged request submitted"
                );
                Ok(UpdateOutcome::StagedRequestSubmitted(refetched))
            }
            WritePlan::Admin {
                fields,
                edit_action,
            } => {
                let document: Value = serde_json::to_value(&fields)?;
                self.store
                    .update_subscription(&subscription.id, document, &scope)
                    .await?;

                let refetched = self
                    .fetch_with_includes(organization_id, &subscription.id, status_scope, &scope)
                    .await?
                    .unwrap_or(subscription);
                self.audit.emit(
                    AuditEventKind::SubscriptionUpdate,
                    &actor.user_id,
                    "Subscription updated",
                    &refetched.id,
                    json!({ "edit_action": edit_action.as_str() }),
                );
                tracing::info!(subscription_id = %refetched.id, "subscription updated");
                Ok(UpdateOutcome::Updated(refetched))
            }
        }
    }

    async fn fetch_with_includes(
        &self,
        organization_id: &str,
        id: &str,
        status: SubscriptionStatus,
        scope: &ScopeMetadata,
    ) -> CoreResult<Option<Subscription>> {
        let query = SubscriptionQuery::new()
            .organization(organization_id)
            .id(id)
            .status(status)
            .includes(SUBSCRIPTION_INCLUDES)
            .metadata(scope.clone().with_organization(organization_id));
        self.store.find_subscription(query).await
    }
}
