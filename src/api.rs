//! Unified API router for the context server
//!
//! Merges all module routers into a single axum `Router` with CORS and
//! request tracing.
//!
//! ## Endpoint Map
//!
//! | Prefix                   | Module   | Description                        |
//! |--------------------------|----------|------------------------------------|
//! | `/health`                | api      | Load balancer health probe         |
//! | `/context.js`            | context  | Visitor context script             |
//! | `/api/v1/profiles/*`     | identity | Profile inspection                 |
//! | `/api/v1/sessions/*`     | identity | Session inspection                 |
//! | `/api/v1/personas/*`     | identity | Persona registration and lookup    |
//! | `/api/v1/events`         | events   | Recent persistent events           |

use crate::context::{context_router, ContextState};
use crate::events::{events_router, EventsState};
use crate::identity::{identity_router, IdentityState};
use axum::{
    http::{header, Method},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the complete HTTP application
///
/// Merges all module routers, adds CORS and trace middleware, and returns a
/// single `Router` ready to be served by `axum::serve`.
pub fn build_app(
    context_state: ContextState,
    identity_state: IdentityState,
    events_state: EventsState,
    cors_origins: &[String],
) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(context_router(context_state))
        .merge(identity_router(identity_state))
        .merge(events_router(events_state))
        .layer(build_cors(cors_origins))
        .layer(TraceLayer::new_for_http())
}

// =============================================================================
// Root handlers
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// CORS
// =============================================================================

fn build_cors(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        // Cookies only travel cross-origin with an explicit origin list
        let parsed: Vec<_> = origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(parsed).allow_credentials(true)
    }
}
