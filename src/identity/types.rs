//! Identity wire types
//!
//! Profiles and personas share one shape and differ only by kind. All types
//! use camelCase JSON serialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Free-form property bag
pub type Properties = HashMap<String, serde_json::Value>;

/// Property stamped on every freshly bootstrapped profile
pub const FIRST_VISIT_PROPERTY: &str = "firstVisit";

/// Identity kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKind {
    /// Organic visitor profile
    Profile,
    /// Impersonation identity used for previews
    Persona,
}

impl std::fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Profile => write!(f, "profile"),
            Self::Persona => write!(f, "persona"),
        }
    }
}

/// A profile or persona
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub kind: IdentityKind,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub segments: BTreeSet<String>,
}

impl Identity {
    /// Create an empty visitor profile
    pub fn profile(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: IdentityKind::Profile,
            properties: Properties::new(),
            segments: BTreeSet::new(),
        }
    }

    /// Create an empty persona
    pub fn persona(id: impl Into<String>) -> Self {
        Self {
            kind: IdentityKind::Persona,
            ..Self::profile(id)
        }
    }

    pub fn is_persona(&self) -> bool {
        self.kind == IdentityKind::Persona
    }

    /// Set a property, replacing any previous value
    pub fn set_property(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.properties.insert(key.into(), value);
    }
}

/// A bounded interaction window bound to one identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub identity_id: String,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    #[serde(default)]
    pub properties: Properties,
}

impl Session {
    /// Create a session owned by `identity_id`, started at `timestamp`
    pub fn new(id: impl Into<String>, identity_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            identity_id: identity_id.into(),
            created_at: timestamp,
            last_seen: timestamp,
            properties: Properties::new(),
        }
    }

    /// Record activity; never moves the last-seen mark backwards
    pub fn touch(&mut self, timestamp: DateTime<Utc>) {
        if timestamp > self.last_seen {
            self.last_seen = timestamp;
        }
    }
}

/// A persona together with the sessions recorded for it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonaWithSessions {
    pub persona: Identity,
    pub sessions: Vec<Session>,
}

impl PersonaWithSessions {
    /// Most recently active session, if any
    pub fn last_session(&self) -> Option<&Session> {
        self.sessions.iter().max_by_key(|s| s.last_seen)
    }
}

/// Request body for registering or replacing a persona
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertPersonaRequest {
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub segments: BTreeSet<String>,
}
