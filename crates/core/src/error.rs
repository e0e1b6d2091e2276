//! Error types for the admin core

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Field-level validation detail as reported by the remote store:
/// field name to list of error messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(pub BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn single(field: &str, message: &str) -> Self {
        let mut map = BTreeMap::new();
        map.insert(field.to_string(), vec![message.to_string()]);
        Self(map)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{}: {}", field, message)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Errors surfaced by the subscription workflow.
///
/// All variants are terminal for the request: no partial application and no
/// automatic retry. Transient store failures surface as [`CoreError::Store`].
#[derive(Debug, Error)]
pub enum CoreError {
    /// Resource absent, or not accessible under the resolved scope
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Payload failed store-side or local validation
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    /// The actor's resolved scope forbids the operation
    #[error("access denied")]
    AccessDenied,

    /// Remote store transport or protocol failure, surfaced as-is
    #[error("remote store error: {0}")]
    Store(String),
}

impl From<reqwest::Error> for CoreError {
    fn from(err: reqwest::Error) -> Self {
        CoreError::Store(err.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Store(format!("serialization failed: {err}"))
    }
}
