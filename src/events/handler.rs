//! HTTP handler for the Events API
//!
//! - GET /api/v1/events — recent persistent events (newest first)

use crate::events::store::EventLog;
use crate::events::types::Event;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared state for event handlers
#[derive(Clone)]
pub struct EventsState {
    pub log: Arc<EventLog>,
}

/// Create the events router
pub fn events_router(state: EventsState) -> Router {
    Router::new()
        .route("/api/v1/events", get(list_events))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListEventsQuery {
    identity_id: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListEventsResponse {
    data: Vec<Event>,
    buffered: usize,
    total_recorded: u64,
}

/// GET /api/v1/events
async fn list_events(
    State(state): State<EventsState>,
    Query(params): Query<ListEventsQuery>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(50).clamp(1, 500);
    let data = state.log.recent(params.identity_id.as_deref(), limit).await;

    Json(ListEventsResponse {
        data,
        buffered: state.log.len().await,
        total_recorded: state.log.total_recorded(),
    })
}
