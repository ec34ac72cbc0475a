//! Event record handed to the dispatcher
//!
//! Events are created by the context pipeline, dispatched once and not
//! retained by the pipeline afterwards.

use crate::identity::{Identity, Session};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Emitted when a session is bootstrapped for a visitor
pub const SESSION_CREATED: &str = "sessionCreated";

/// Emitted when a brand-new visitor profile has been created
pub const USER_UPDATED: &str = "userUpdated";

/// Attribute key for the inbound request descriptor
pub const HTTP_REQUEST_ATTRIBUTE: &str = "http_request";

/// Attribute key for the outbound response descriptor
pub const HTTP_RESPONSE_ATTRIBUTE: &str = "http_response";

/// A timestamped fact about an identity and, optionally, a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub event_type: String,
    pub identity_id: String,
    pub session_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
    pub persistent: bool,
}

impl Event {
    /// Create a persistent event about `identity`
    pub fn new(
        event_type: impl Into<String>,
        identity: &Identity,
        session: Option<&Session>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: format!("evt-{}", uuid::Uuid::new_v4()),
            event_type: event_type.into(),
            identity_id: identity.id.clone(),
            session_id: session.map(|s| s.id.clone()),
            timestamp,
            attributes: HashMap::new(),
            persistent: true,
        }
    }

    /// Mark whether listeners should store this event durably
    pub fn with_persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    /// Attach an attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}
