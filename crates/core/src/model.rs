//! Subscription data model
//!
//! Entities mirror the remote resource store's representation. The store is
//! the system of record; this crate never computes with the commercial
//! attributes, it routes them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, CoreResult, FieldErrors};

/// Relationship include list used when fetching a single subscription
/// (and when listing, so the admin UI gets fully expanded rows).
pub const SUBSCRIPTION_INCLUDES: &[&str] = &[
    "product_pricing.product",
    "product",
    "product_contract",
    "organization",
    "user",
    "license_assignments.user",
];

/// Subscription visibility state. Drives default listing visibility:
/// standard queries see `visible` records only, cart/staging context sees
/// `staged` records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Not yet effective; excluded from default listings
    Staged,
    /// Active and effective
    Visible,
    /// Terminal; not reachable through any operation in this core
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Staged => "staged",
            SubscriptionStatus::Visible => "visible",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "staged" => Some(SubscriptionStatus::Staged),
            "visible" => Some(SubscriptionStatus::Visible),
            "cancelled" => Some(SubscriptionStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Maximum nesting depth accepted for `custom_data` documents
pub const MAX_CUSTOM_DATA_DEPTH: usize = 16;
/// Maximum serialized size accepted for `custom_data` documents
pub const MAX_CUSTOM_DATA_BYTES: usize = 64 * 1024;

/// Opaque, arbitrarily-structured key/value document attached to a
/// subscription. Stored and returned verbatim, never interpreted.
///
/// Construction bounds the document (depth and serialized size) so a write
/// payload cannot smuggle an unbounded blob through the opaque field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomData(Value);

impl CustomData {
    /// Accepts a structured document within the depth/size bounds.
    pub fn new(value: Value) -> CoreResult<Self> {
        if !value.is_object() {
            return Err(CoreError::Validation(FieldErrors::single(
                "custom_data",
                "must be a structured document",
            )));
        }
        if depth_of(&value) > MAX_CUSTOM_DATA_DEPTH {
            return Err(CoreError::Validation(FieldErrors::single(
                "custom_data",
                "exceeds maximum nesting depth",
            )));
        }
        let size = serde_json::to_vec(&value).map(|v| v.len()).unwrap_or(0);
        if size > MAX_CUSTOM_DATA_BYTES {
            return Err(CoreError::Validation(FieldErrors::single(
                "custom_data",
                "exceeds maximum size",
            )));
        }
        Ok(Self(value))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_inner(self) -> Value {
        self.0
    }
}

fn depth_of(value: &Value) -> usize {
    match value {
        Value::Object(map) => 1 + map.values().map(depth_of).max().unwrap_or(0),
        Value::Array(items) => 1 + items.iter().map(depth_of).max().unwrap_or(0),
        _ => 0,
    }
}

/// A (user, subscription) license grant. Read-only in this core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseAssignment {
    pub id: Option<String>,
    pub user_id: Option<String>,
}

/// Organization as fetched for the existence/access check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The central entity: an organization's subscription to a product.
///
/// Relationship fields (`organization`, `product`, ...) carry the store's
/// expanded documents verbatim when the query requested includes; they are
/// absent otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub organization_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_pricing_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_contract_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_licenses: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_data: Option<CustomData>,
    pub status: SubscriptionStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub license_assignments: Vec<LicenseAssignment>,

    // Expanded relationships, passed through from the store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_pricing: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_contract: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,
}
