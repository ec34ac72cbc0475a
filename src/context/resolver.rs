//! Visitor identity resolution
//!
//! Reconciles the persona parameter, the two identity cookies and the
//! session parameter into one acting identity. Precedence, first match wins:
//!
//! 1. `personaId` is `currentUser` or equals the profile cookie: impersonation
//!    ends and the persona cookie is cleared.
//! 2. `personaId` names a persona: act as it, with its latest session, and
//!    reissue the identity cookie.
//! 3. Persona cookie present: act as that persona (cookie already matches).
//! 4. Otherwise resolve a profile via the session, then the profile cookie,
//!    bootstrapping a new profile when neither yields one.
//!
//! Unknown ids are never errors; they fall through to the next rule.
//! Cookie changes are returned as directives, never applied here.

use crate::context::types::{CookieDirective, CURRENT_USER};
use crate::error::Result;
use crate::identity::types::FIRST_VISIT_PROPERTY;
use crate::identity::{Identity, IdentityStore, Session};
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;

/// Identity signals extracted from one request
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentitySignals<'a> {
    pub persona_id: Option<&'a str>,
    pub session_id: Option<&'a str>,
    pub cookie_profile_id: Option<&'a str>,
    pub cookie_persona_id: Option<&'a str>,
}

/// Outcome of one resolution cycle
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub identity: Option<Identity>,
    pub session: Option<Session>,
    pub directives: Vec<CookieDirective>,
    /// A brand-new profile was persisted in this cycle
    pub identity_created: bool,
    /// A brand-new session was persisted in this cycle
    pub session_created: bool,
}

impl Resolution {
    fn set_identity_cookie(&mut self, identity: &Identity) {
        self.directives.push(CookieDirective::SetIdentity {
            id: identity.id.clone(),
            kind: identity.kind,
        });
    }
}

/// Resolves the acting identity and session for a request
pub struct IdentityResolver {
    store: Arc<dyn IdentityStore>,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }

    /// Run one resolution cycle at `timestamp`
    pub async fn resolve(
        &self,
        signals: IdentitySignals<'_>,
        timestamp: DateTime<Utc>,
    ) -> Result<Resolution> {
        let mut resolution = Resolution::default();

        match signals.persona_id {
            Some(persona_id)
                if persona_id == CURRENT_USER || Some(persona_id) == signals.cookie_profile_id =>
            {
                tracing::debug!(persona_id, "Leaving impersonation");
                resolution.directives.push(CookieDirective::ClearPersona);
            }
            Some(persona_id) => {
                if self.impersonate(persona_id, &mut resolution).await? {
                    let persona = resolution.identity.clone();
                    if let Some(persona) = persona {
                        resolution.set_identity_cookie(&persona);
                    }
                }
            }
            None => {
                if let Some(persona_id) = signals.cookie_persona_id {
                    self.impersonate(persona_id, &mut resolution).await?;
                }
            }
        }

        if resolution.identity.is_none() {
            self.resolve_profile(signals, timestamp, &mut resolution)
                .await?;
        }

        Ok(resolution)
    }

    /// Load a persona with its latest session; false when it does not exist
    async fn impersonate(&self, persona_id: &str, resolution: &mut Resolution) -> Result<bool> {
        match self.store.load_persona_with_sessions(persona_id).await? {
            Some(found) => {
                tracing::debug!(persona_id, sessions = found.sessions.len(), "Impersonating persona");
                resolution.session = found.last_session().cloned();
                resolution.identity = Some(found.persona);
                Ok(true)
            }
            None => {
                tracing::debug!(persona_id, "Unknown persona, falling back to profile");
                Ok(false)
            }
        }
    }

    async fn resolve_profile(
        &self,
        signals: IdentitySignals<'_>,
        timestamp: DateTime<Utc>,
        resolution: &mut Resolution,
    ) -> Result<()> {
        let mut from_session = None;
        if let Some(session_id) = signals.session_id {
            resolution.session = self.store.load_session(session_id, timestamp).await?;
            if let Some(session) = &resolution.session {
                from_session = self.store.load_profile(&session.identity_id).await?;
            }
        }

        let profile = match from_session {
            Some(profile) => {
                if signals.cookie_profile_id != Some(profile.id.as_str()) {
                    resolution.set_identity_cookie(&profile);
                }
                profile
            }
            None => match signals.cookie_profile_id {
                None => self.bootstrap(None, timestamp, resolution).await?,
                Some(cookie_id) => match self.store.load_profile(cookie_id).await? {
                    Some(profile) => profile,
                    None => self.bootstrap(Some(cookie_id), timestamp, resolution).await?,
                },
            },
        };

        if let (Some(session_id), None) = (signals.session_id, &resolution.session) {
            let session = Session::new(session_id, profile.id.clone(), timestamp);
            if self.store.create_session_if_absent(&session).await? {
                tracing::debug!(session_id, profile_id = %profile.id, "Created session");
                resolution.session = Some(session);
                resolution.session_created = true;
            } else {
                // A concurrent request created it between lookup and insert
                tracing::debug!(session_id, "Session created concurrently, reusing it");
                resolution.session = self.store.load_session(session_id, timestamp).await?;
            }
        }

        resolution.identity = Some(profile);
        Ok(())
    }

    /// Create and persist a new profile, reusing `existing_id` when the
    /// visitor already carries a (stale) cookie
    async fn bootstrap(
        &self,
        existing_id: Option<&str>,
        timestamp: DateTime<Utc>,
        resolution: &mut Resolution,
    ) -> Result<Identity> {
        let id = existing_id
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut profile = Identity::profile(id);
        profile.set_property(
            FIRST_VISIT_PROPERTY,
            serde_json::Value::String(timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        self.store.save_profile(&profile).await?;

        tracing::info!(
            profile_id = %profile.id,
            reused_cookie = existing_id.is_some(),
            "Created visitor profile"
        );

        resolution.set_identity_cookie(&profile);
        resolution.identity_created = true;
        Ok(profile)
    }
}
