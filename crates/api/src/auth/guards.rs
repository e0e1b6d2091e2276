//! Authorization guard chain
//!
//! Each guard is a pure predicate over (actor, action, target organization),
//! evaluated in order before handler dispatch. The first failing guard
//! decides the response.

use storefront_core::{Actor, ActorRole};

use crate::error::ApiError;

/// The handler-level action being authorized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    List,
    Show,
    Create,
    Update,
}

impl Action {
    pub fn is_read(&self) -> bool {
        matches!(self, Action::List | Action::Show)
    }
}

type Guard = fn(&Actor, Action, &str) -> Result<(), ApiError>;

const GUARDS: &[Guard] = &[block_support_writes, require_support_org_binding];

/// Runs the guard chain. All guards must pass.
pub fn authorize(actor: &Actor, action: Action, organization_id: &str) -> Result<(), ApiError> {
    for guard in GUARDS {
        guard(actor, action, organization_id)?;
    }
    Ok(())
}

/// Support-role actors (staff included) never write.
fn block_support_writes(actor: &Actor, action: Action, _organization_id: &str) -> Result<(), ApiError> {
    if action.is_read() || actor.role == ActorRole::Admin {
        Ok(())
    } else {
        tracing::warn!(
            user_id = %actor.user_id,
            role = actor.role.as_str(),
            action = ?action,
            "write blocked for support-role actor"
        );
        Err(ApiError::Forbidden)
    }
}

/// Support actors read only the organization they are bound to.
fn require_support_org_binding(
    actor: &Actor,
    _action: Action,
    organization_id: &str,
) -> Result<(), ApiError> {
    if actor.can_read(organization_id) {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}
