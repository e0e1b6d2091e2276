// Core crate clippy configuration
// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Storefront Admin Core
//!
//! The subscription lifecycle and staged-change workflow behind the
//! marketplace admin API.
//!
//! ## Features
//!
//! - **Role scoping**: derive the metadata the remote store needs to
//!   enforce visibility per acting user
//! - **Query building**: structured listing and multi-term search against
//!   the remote resource store
//! - **Staged changes**: split write payloads into the direct-admin shape
//!   vs. the cart-originated shape
//! - **Lifecycle**: create, direct update, staged-request submission and
//!   staged-request withdrawal
//! - **Audit**: fire-and-forget event emission for state-changing operations

pub mod audit;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod query;
pub mod scope;
pub mod staged;
pub mod store;

#[cfg(test)]
mod lifecycle_tests;

// Audit
pub use audit::{AuditEmitter, AuditEvent, AuditEventKind};

// Error
pub use error::{CoreError, CoreResult, FieldErrors};

// Lifecycle
pub use lifecycle::{SubscriptionLifecycleManager, UpdateOutcome};

// Model
pub use model::{
    CustomData, LicenseAssignment, Organization, Subscription, SubscriptionStatus,
    SUBSCRIPTION_INCLUDES,
};

// Query
pub use query::{parse_terms, search, SubscriptionPage, SubscriptionQuery, TermSet};

// Scope
pub use scope::{Actor, ActorRole, ScopeMetadata};

// Staged changes
pub use staged::{AdminWrite, CartWrite, EditAction, SubscriptionWrite, WritePlan};

// Store
pub use store::{HttpResourceStore, ResourceStore};
