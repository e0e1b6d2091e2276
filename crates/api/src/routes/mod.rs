//! HTTP routes

pub mod subscriptions;

use axum::{middleware, routing::get, Router};

use crate::{auth, state::AppState};

pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            "/api/v1/organizations/{org_id}/subscriptions",
            get(subscriptions::index).post(subscriptions::create),
        )
        .route(
            "/api/v1/organizations/{org_id}/subscriptions/{id}",
            get(subscriptions::show).put(subscriptions::update),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    Router::new()
        .merge(protected)
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
