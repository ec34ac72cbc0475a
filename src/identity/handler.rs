//! HTTP handlers for the identity admin API
//!
//! Provides 4 REST endpoints:
//! - GET    /api/v1/profiles/:id   — profile detail
//! - GET    /api/v1/sessions/:id   — session detail (does not touch last-seen)
//! - GET    /api/v1/personas/:id   — persona with its sessions
//! - PUT    /api/v1/personas/:id   — register or replace a persona

use crate::error::{ApiError, Result};
use crate::identity::store::IdentityStore;
use crate::identity::types::*;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;

/// Shared state for identity handlers
#[derive(Clone)]
pub struct IdentityState {
    pub store: Arc<dyn IdentityStore>,
}

/// Create the identity admin router
pub fn identity_router(state: IdentityState) -> Router {
    Router::new()
        .route("/api/v1/profiles/:id", get(get_profile))
        .route("/api/v1/sessions/:id", get(get_session))
        .route("/api/v1/personas/:id", get(get_persona).put(put_persona))
        .with_state(state)
}

fn found_or_404<T: serde::Serialize>(item: Option<T>, what: &str, id: &str) -> Response {
    match item {
        Some(item) => (StatusCode::OK, Json(item)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiError::not_found(format!("{} '{}' not found", what, id))),
        )
            .into_response(),
    }
}

/// GET /api/v1/profiles/:id
async fn get_profile(
    State(state): State<IdentityState>,
    Path(id): Path<String>,
) -> Result<Response> {
    let profile = state.store.load_profile(&id).await?;
    Ok(found_or_404(profile, "Profile", &id))
}

/// GET /api/v1/sessions/:id
async fn get_session(
    State(state): State<IdentityState>,
    Path(id): Path<String>,
) -> Result<Response> {
    let session = state.store.find_session(&id).await?;
    Ok(found_or_404(session, "Session", &id))
}

/// GET /api/v1/personas/:id
async fn get_persona(
    State(state): State<IdentityState>,
    Path(id): Path<String>,
) -> Result<Response> {
    let persona = state.store.load_persona_with_sessions(&id).await?;
    Ok(found_or_404(persona, "Persona", &id))
}

/// PUT /api/v1/personas/:id
async fn put_persona(
    State(state): State<IdentityState>,
    Path(id): Path<String>,
    Json(request): Json<UpsertPersonaRequest>,
) -> Result<impl IntoResponse> {
    let mut persona = Identity::persona(id);
    persona.properties = request.properties;
    persona.segments = request.segments;

    state.store.save_persona(&persona).await?;
    tracing::info!(persona_id = %persona.id, "Registered persona");
    Ok((StatusCode::OK, Json(persona)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::store::MemoryIdentityStore;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::Utc;
    use tower::ServiceExt;

    fn make_app() -> (Router, Arc<MemoryIdentityStore>) {
        let store = Arc::new(MemoryIdentityStore::new());
        let state = IdentityState {
            store: store.clone(),
        };
        (identity_router(state), store)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), 1024 * 64)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_get_profile_not_found() {
        let (app, _store) = make_app();
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/profiles/nobody")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let json = body_json(resp).await;
        assert_eq!(json["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_get_profile() {
        let (app, store) = make_app();
        let mut profile = Identity::profile("p-1");
        profile.set_property("age", serde_json::json!(42));
        store.save_profile(&profile).await.unwrap();

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/profiles/p-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["id"], "p-1");
        assert_eq!(json["properties"]["age"], 42);
    }

    #[tokio::test]
    async fn test_put_then_get_persona() {
        let (app, store) = make_app();

        let body = serde_json::json!({
            "properties": {"gender": "male"},
            "segments": ["vip"]
        });
        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/api/v1/personas/joe")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let created = body_json(resp).await;
        assert_eq!(created["kind"], "persona");

        store
            .save_session(&Session::new("s-joe", "joe", Utc::now()))
            .await
            .unwrap();

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/personas/joe")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["persona"]["segments"][0], "vip");
        assert_eq!(json["sessions"][0]["id"], "s-joe");
    }

    #[tokio::test]
    async fn test_get_session_does_not_touch() {
        let (app, store) = make_app();
        let session = Session::new("s-1", "p-1", Utc::now());
        store.save_session(&session).await.unwrap();

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/sessions/s-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let stored = store.find_session("s-1").await.unwrap().unwrap();
        assert_eq!(stored.last_seen, session.last_seen);
    }
}
