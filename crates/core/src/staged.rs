//! Staged-change processing
//!
//! Write payloads arrive in one of two trust shapes, selected solely by the
//! presence of the `cart_entry` marker: cart-originated changes (built from
//! the pre-checkout staging flow) and direct admin edits. Each shape has its
//! own whitelist of writable fields; anything outside the active whitelist
//! is silently dropped and never persisted.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreResult;
use crate::model::{CustomData, Subscription};

/// Caller-supplied intent tag on an update.
///
/// Only `cancel` has special handling (withdraw the pending staged request,
/// meaningful in cart context only). Every other value is carried opaquely
/// into the staged request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditAction {
    Cancel,
    Propose(String),
}

impl EditAction {
    pub fn from_raw(raw: Option<String>) -> Self {
        match raw.as_deref() {
            Some("cancel") => EditAction::Cancel,
            _ => EditAction::Propose(raw.unwrap_or_default()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EditAction::Cancel => "cancel",
            EditAction::Propose(action) => action,
        }
    }
}

/// Raw write payload for create and update requests. Unknown fields are
/// ignored on deserialization; field selection happens in [`into_plan`].
///
/// [`into_plan`]: SubscriptionWrite::into_plan
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionWrite {
    /// Marker: presence means the change originates from the cart flow
    pub cart_entry: Option<Value>,
    pub edit_action: Option<String>,
    pub product_id: Option<String>,
    pub product_pricing_id: Option<String>,
    pub product_contract_id: Option<String>,
    pub start_date: Option<String>,
    pub max_licenses: Option<i64>,
    pub currency: Option<String>,
    pub custom_data: Option<Value>,
    pub subscription_events_attributes: Option<Value>,
}

impl SubscriptionWrite {
    pub fn is_cart(&self) -> bool {
        self.cart_entry.is_some()
    }

    /// Splits the payload into the shape matching its trust level.
    pub fn into_plan(self) -> CoreResult<WritePlan> {
        let edit_action = EditAction::from_raw(self.edit_action);
        if self.cart_entry.is_some() {
            // Non-structured custom_data is dropped rather than rejected,
            // matching the store's tolerance for sloppy cart clients.
            let custom_data = match self.custom_data {
                Some(value) if value.is_object() => Some(CustomData::new(value)?),
                _ => None,
            };
            Ok(WritePlan::Cart {
                fields: CartWrite {
                    start_date: self.start_date,
                    max_licenses: self.max_licenses,
                    custom_data,
                    product_contract_id: self.product_contract_id,
                    product_pricing_id: self.product_pricing_id,
                    currency: self.currency,
                },
                edit_action,
            })
        } else {
            Ok(WritePlan::Admin {
                fields: AdminWrite {
                    product_contract_id: self.product_contract_id,
                    product_id: self.product_id,
                    subscription_events_attributes: self.subscription_events_attributes,
                },
                edit_action,
            })
        }
    }
}

/// A validated write, split by trust level.
#[derive(Debug, Clone)]
pub enum WritePlan {
    Cart {
        fields: CartWrite,
        edit_action: EditAction,
    },
    Admin {
        fields: AdminWrite,
        edit_action: EditAction,
    },
}

/// Fields the cart flow may set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CartWrite {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_licenses: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_data: Option<CustomData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_contract_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_pricing_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

impl CartWrite {
    /// Applies the present fields to an in-memory copy of a subscription.
    /// Used to build the staged-change request document; never used to
    /// persist the canonical record directly.
    pub fn apply_to(&self, subscription: &mut Subscription) {
        if let Some(start_date) = &self.start_date {
            subscription.start_date = Some(start_date.clone());
        }
        if let Some(max_licenses) = self.max_licenses {
            subscription.max_licenses = Some(max_licenses);
        }
        if let Some(custom_data) = &self.custom_data {
            subscription.custom_data = Some(custom_data.clone());
        }
        if let Some(contract_id) = &self.product_contract_id {
            subscription.product_contract_id = Some(contract_id.clone());
        }
        if let Some(pricing_id) = &self.product_pricing_id {
            subscription.product_pricing_id = Some(pricing_id.clone());
        }
        if let Some(currency) = &self.currency {
            subscription.currency = Some(currency.clone());
        }
    }
}

/// Fields the administrative flow may set. The nested subscription-event
/// attributes (change-history entries) pass through unvalidated.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AdminWrite {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_contract_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_events_attributes: Option<Value>,
}
