//! Role scope resolution
//!
//! Derives the query-scoping metadata the remote store needs to enforce
//! visibility and access. Scope metadata is attached to every remote query;
//! it is never optional.

use std::collections::BTreeMap;

use crate::error::{CoreError, CoreResult};

/// Role of the acting user, taken from the auth token's role claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorRole {
    /// Full administrative access
    Admin,
    /// Elevated support role: may read everything, may write nothing
    Staff,
    /// Support role bound to a single organization: may read that
    /// organization only, may write nothing
    Support,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Admin => "admin",
            ActorRole::Staff => "staff",
            ActorRole::Support => "support",
        }
    }

    /// Unknown role strings resolve to the least-privileged role.
    pub fn parse(s: &str) -> Self {
        match s {
            "admin" | "superadmin" => ActorRole::Admin,
            "staff" => ActorRole::Staff,
            _ => ActorRole::Support,
        }
    }
}

/// The acting user, as established by the transport layer.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: String,
    pub role: ActorRole,
    /// Organization the actor is bound to, for support-role actors
    pub support_organization_id: Option<String>,
}

impl Actor {
    pub fn admin(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            role: ActorRole::Admin,
            support_organization_id: None,
        }
    }

    /// Scope metadata injected into every remote query for this actor.
    pub fn scope_metadata(&self) -> ScopeMetadata {
        let mut metadata = ScopeMetadata::default();
        metadata.insert("acting_user_id", &self.user_id);
        metadata.insert("role", self.role.as_str());
        if let Some(org_id) = &self.support_organization_id {
            metadata.insert("support_organization_id", org_id);
        }
        metadata
    }

    pub fn can_read(&self, organization_id: &str) -> bool {
        match self.role {
            ActorRole::Admin | ActorRole::Staff => true,
            ActorRole::Support => {
                self.support_organization_id.as_deref() == Some(organization_id)
            }
        }
    }

    pub fn can_write(&self) -> bool {
        self.role == ActorRole::Admin
    }

    /// Rejects writes from support-role actors before any mutation is
    /// attempted.
    pub fn ensure_can_write(&self) -> CoreResult<()> {
        if self.can_write() {
            Ok(())
        } else {
            Err(CoreError::AccessDenied)
        }
    }
}

/// Role- and organization-derived parameters injected into remote queries.
///
/// Encoded as `_metadata[...]` query params on the wire; the store enforces
/// access using them. Backed by a BTreeMap so param order is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeMetadata(BTreeMap<String, String>);

impl ScopeMetadata {
    pub fn insert(&mut self, key: &str, value: &str) {
        self.0.insert(key.to_string(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Single-subscription fetches additionally scope by organization.
    pub fn with_organization(mut self, organization_id: &str) -> Self {
        self.insert("organization_id", organization_id);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
