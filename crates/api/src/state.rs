//! Application state

use std::sync::Arc;

use jsonwebtoken::DecodingKey;
use storefront_core::{AuditEmitter, HttpResourceStore, SubscriptionLifecycleManager};

use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Lifecycle manager over the remote resource store; read paths go
    /// through its store handle
    pub manager: Arc<SubscriptionLifecycleManager<HttpResourceStore>>,
    pub jwt_decoding_key: DecodingKey,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let http_client = reqwest::Client::new();
        let store = HttpResourceStore::new(http_client, &config.resource_store_url);
        tracing::info!(url = %config.resource_store_url, "remote resource store client initialized");

        let audit = AuditEmitter::new(config.audit_endpoint.clone());
        match &config.audit_endpoint {
            Some(endpoint) => tracing::info!(endpoint = %endpoint, "audit delivery enabled"),
            None => tracing::warn!("no AUDIT_ENDPOINT configured - audit events will be logged only"),
        }

        let manager = Arc::new(SubscriptionLifecycleManager::new(store, audit));
        let jwt_decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());

        Self {
            config,
            manager,
            jwt_decoding_key,
        }
    }
}
