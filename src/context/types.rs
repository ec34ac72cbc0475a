//! Context request/response wire types
//!
//! `ContextRequest` is untrusted caller input; `ContextResponse` is what the
//! browser script receives. Both use camelCase JSON.

use crate::condition::Condition;
use crate::error::{Error, Result};
use crate::identity::{IdentityKind, Properties};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Persona parameter value that ends impersonation
pub const CURRENT_USER: &str = "currentUser";

/// Caller payload
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextRequest {
    #[serde(default)]
    pub require_segments: bool,
    #[serde(default, alias = "requiredProfileProperties")]
    pub required_user_properties: Option<HashSet<String>>,
    #[serde(default)]
    pub required_session_properties: Option<HashSet<String>>,
    #[serde(default)]
    pub filters: Option<Vec<FilterNode>>,
}

impl ContextRequest {
    /// Parse a JSON payload
    pub fn parse(payload: &str) -> Result<Self> {
        serde_json::from_str(payload)
            .map_err(|e| Error::BadRequest(format!("invalid context payload: {}", e)))
    }
}

/// A caller-named group of conditions
#[derive(Debug, Clone, Deserialize)]
pub struct FilterNode {
    #[serde(rename = "filterid", alias = "filterId")]
    pub id: String,
    #[serde(default)]
    pub filters: Vec<Filter>,
}

/// A single condition inside a filter node
#[derive(Debug, Clone, Deserialize)]
pub struct Filter {
    pub condition: Condition,
}

/// Context payload rendered into the bootstrap script
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_segments: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_properties: Option<Properties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_properties: Option<Properties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filtering_results: Option<HashMap<String, bool>>,
}

/// Where the caller payload came from
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PayloadSource {
    /// Bare request, identity resolution only
    #[default]
    None,
    /// Request body (POST)
    Body(String),
    /// `payload` query parameter (GET)
    Query(String),
}

impl PayloadSource {
    /// Parse the payload; an empty or blank body counts as no payload
    pub fn parse(&self) -> Result<Option<ContextRequest>> {
        match self {
            Self::None => Ok(None),
            Self::Body(raw) | Self::Query(raw) if raw.trim().is_empty() => Ok(None),
            Self::Body(raw) | Self::Query(raw) => ContextRequest::parse(raw).map(Some),
        }
    }
}

/// Opaque transport descriptor attached to emitted events
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransportContext {
    pub request: serde_json::Value,
}

/// One inbound interaction, as seen by the pipeline
#[derive(Debug, Clone, Default)]
pub struct ContextInput {
    /// Raw `timestamp` parameter (epoch millis)
    pub timestamp: Option<String>,
    pub persona_id: Option<String>,
    pub session_id: Option<String>,
    pub cookie_profile_id: Option<String>,
    pub cookie_persona_id: Option<String>,
    pub payload: PayloadSource,
    pub transport: TransportContext,
}

/// Cookie change the serving layer must apply
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum CookieDirective {
    /// Drop the impersonation cookie
    ClearPersona,
    /// (Re)issue the cookie for this identity
    SetIdentity { id: String, kind: IdentityKind },
}

/// Resolve the request timestamp; a present but unparseable value is a caller error
pub fn parse_timestamp(raw: Option<&str>, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let Some(raw) = raw else {
        return Ok(now);
    };
    let millis: i64 = raw
        .trim()
        .parse()
        .map_err(|_| Error::BadRequest(format!("invalid timestamp '{}'", raw)))?;
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| Error::BadRequest(format!("timestamp out of range '{}'", raw)))
}
