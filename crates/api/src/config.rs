//! Environment-driven configuration

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to
    pub bind_address: String,
    /// Base URL of the remote resource store
    pub resource_store_url: String,
    /// Optional endpoint audit events are delivered to; events are logged
    /// locally when unset
    pub audit_endpoint: Option<String>,
    /// Secret for validating bearer tokens
    pub jwt_secret: String,
    /// Comma-separated CORS origin allowlist
    pub allowed_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let resource_store_url =
            std::env::var("RESOURCE_STORE_URL").context("RESOURCE_STORE_URL must be set")?;
        let audit_endpoint = std::env::var("AUDIT_ENDPOINT").ok().filter(|s| !s.is_empty());
        let jwt_secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            bind_address,
            resource_store_url,
            audit_endpoint,
            jwt_secret,
            allowed_origins,
        })
    }
}
