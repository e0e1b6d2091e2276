//! Authentication middleware for Axum
//!
//! Session establishment lives elsewhere; this layer only validates the
//! bearer token and turns its claims into the acting user.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, Algorithm, Validation};
use serde::Deserialize;
use storefront_core::{Actor, ActorRole};

use crate::{error::ApiError, state::AppState};

/// Authenticated user information extracted from the bearer token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub role: ActorRole,
    pub support_organization_id: Option<String>,
}

impl AuthUser {
    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.user_id.clone(),
            role: self.role,
            support_organization_id: self.support_organization_id.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    support_organization_id: Option<String>,
    #[allow(dead_code)]
    exp: usize,
}

fn extract_bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(String::from)
}

/// Middleware that requires a valid bearer token
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    let Some(token) = extract_bearer_token(&request) else {
        tracing::warn!(path = %path, "require_auth: missing bearer token");
        return ApiError::Unauthorized.into_response();
    };

    let claims = match decode::<Claims>(
        &token,
        &state.jwt_decoding_key,
        &Validation::new(Algorithm::HS256),
    ) {
        Ok(data) => data.claims,
        Err(err) => {
            tracing::warn!(path = %path, error = %err, "require_auth: token rejected");
            return ApiError::Unauthorized.into_response();
        }
    };

    let auth_user = AuthUser {
        user_id: claims.sub,
        role: ActorRole::parse(&claims.role),
        support_organization_id: claims.support_organization_id,
    };
    tracing::debug!(
        path = %path,
        user_id = %auth_user.user_id,
        role = auth_user.role.as_str(),
        "require_auth: authentication successful"
    );

    request.extensions_mut().insert(auth_user);
    next.run(request).await
}
