//! HTTP API for the aid registration dashboard.

mod handlers;
mod middleware;
mod types;

pub use handlers::*;
pub use middleware::{auth_middleware, logging_middleware, rate_limit_middleware, RateLimitState};
pub use types::*;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;
use yardim_registry::{AdmissionService, AidStore};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Registration store
    pub store: Arc<dyn AidStore>,
    /// Admission procedure over the same store
    pub admission: AdmissionService,
    /// Header carrying the authenticated user id
    pub user_header: HeaderName,
}

impl AppState {
    /// Create new application state.
    pub fn new(store: Arc<dyn AidStore>, user_header: HeaderName) -> Self {
        Self {
            admission: AdmissionService::new(store.clone()),
            store,
            user_header,
        }
    }
}

/// Create the API router with default rate limiting.
pub fn create_router(state: AppState) -> Router {
    create_router_with_rate_limit(state, RateLimitState::new(600))
}

/// Create the API router with custom rate limiting.
pub fn create_router_with_rate_limit(state: AppState, rate_limit: RateLimitState) -> Router {
    let v1 = Router::new()
        .route("/v1/me", get(handlers::me))
        .route("/v1/kimlik/:tc", get(handlers::check_kimlik))
        .route(
            "/v1/registrations",
            get(handlers::list_registrations).post(handlers::create_registration),
        )
        .route(
            "/v1/registrations/:id",
            get(handlers::get_registration).patch(handlers::update_registration),
        )
        .route("/v1/duplicate-attempts", get(handlers::list_duplicate_attempts))
        .route(
            "/v1/neighborhoods",
            get(handlers::list_neighborhoods).post(handlers::create_neighborhood),
        )
        .route(
            "/v1/users",
            get(handlers::list_users).post(handlers::create_user),
        )
        .route("/v1/stats/overview", get(handlers::overview))
        .route(
            "/v1/reports/registrations.csv",
            get(handlers::registrations_csv),
        )
        .route(
            "/v1/reports/duplicate-attempts.csv",
            get(handlers::duplicate_attempts_csv),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            rate_limit,
            rate_limit_middleware,
        ));

    Router::new()
        // Health check (no caller, no rate limiting)
        .route("/health", get(handlers::health))
        .merge(v1)
        .layer(axum_middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS layer for browser front ends, or `None` when no origin is configured.
pub fn cors_layer(origins: &[String], user_header: &HeaderName) -> Option<CorsLayer> {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods([Method::GET, Method::POST, Method::PATCH])
            .allow_headers([header::CONTENT_TYPE, user_header.clone()]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_requires_valid_origin() {
        let header = HeaderName::from_static("x-user-id");
        assert!(cors_layer(&[], &header).is_none());
        assert!(cors_layer(&["bad\norigin".to_string()], &header).is_none());
        assert!(cors_layer(&["https://panel.example.org".to_string()], &header).is_some());
    }
}
