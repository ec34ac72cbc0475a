//! HTTP handler for the context script
//!
//! - GET     /context.js   — resolve the visitor, payload via `?payload=`
//! - POST    /context.js   — resolve the visitor, payload in the body
//! - OPTIONS /context.js   — preflight

use crate::config::CookieConfig;
use crate::context::assembler::ResponseAssembler;
use crate::context::cookies::{apply_directives, read_cookie};
use crate::context::pipeline::ContextPipeline;
use crate::context::types::{ContextInput, PayloadSource, TransportContext};
use crate::error::Result;
use axum::{
    extract::{ConnectInfo, Query, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;

const JAVASCRIPT: &str = "application/javascript; charset=utf-8";

/// Shared state for the context handler
#[derive(Clone)]
pub struct ContextState {
    pub pipeline: Arc<ContextPipeline>,
    pub assembler: Arc<ResponseAssembler>,
    pub cookies: Arc<CookieConfig>,
}

/// Create the context script router
pub fn context_router(state: ContextState) -> Router {
    Router::new()
        .route(
            "/context.js",
            get(serve_context).post(serve_context).options(preflight),
        )
        .with_state(state)
}

// =============================================================================
// Request parsing
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContextQuery {
    timestamp: Option<String>,
    persona_id: Option<String>,
    session_id: Option<String>,
    payload: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Body wins when non-blank; otherwise fall back to the query payload
fn payload_source(body: String, query_payload: Option<String>) -> PayloadSource {
    if !body.trim().is_empty() {
        return PayloadSource::Body(body);
    }
    match non_empty(query_payload) {
        Some(payload) => PayloadSource::Query(payload),
        None => PayloadSource::None,
    }
}

fn request_descriptor(
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    remote: Option<SocketAddr>,
) -> serde_json::Value {
    let header_str = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    serde_json::json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query(),
        "userAgent": header_str(header::USER_AGENT),
        "referer": header_str(header::REFERER),
        "remoteAddr": remote.map(|addr| addr.to_string()),
    })
}

// =============================================================================
// Handlers
// =============================================================================

/// GET|POST /context.js
async fn serve_context(
    State(state): State<ContextState>,
    method: Method,
    uri: Uri,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Query(query): Query<ContextQuery>,
    body: String,
) -> Result<Response> {
    let transport = TransportContext {
        request: request_descriptor(&method, &uri, &headers, connect_info.map(|c| c.0)),
    };

    let input = ContextInput {
        timestamp: non_empty(query.timestamp),
        persona_id: non_empty(query.persona_id),
        session_id: non_empty(query.session_id),
        cookie_profile_id: read_cookie(&headers, &state.cookies.profile_cookie),
        cookie_persona_id: read_cookie(&headers, &state.cookies.persona_cookie),
        payload: payload_source(body, query.payload),
        transport,
    };

    let outcome = state.pipeline.handle(input).await?;
    let script = state
        .assembler
        .render(&outcome.response, outcome.identity_kind)?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(JAVASCRIPT));
    response_headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    apply_directives(&mut response_headers, &outcome.directives, &state.cookies);

    Ok((StatusCode::OK, response_headers, script).into_response())
}

/// OPTIONS /context.js
async fn preflight() -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [(header::ALLOW, "GET, POST, OPTIONS")],
    )
}
