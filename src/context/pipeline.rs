//! Context pipeline
//!
//! One `handle` call per inbound request: validate input, resolve the
//! visitor, emit lifecycle events, then build the context response from the
//! caller payload.

use crate::condition::ConditionEvaluator;
use crate::context::properties::filter_properties;
use crate::context::resolver::{IdentityResolver, IdentitySignals, Resolution};
use crate::context::types::{
    parse_timestamp, ContextInput, ContextRequest, ContextResponse, CookieDirective, FilterNode,
};
use crate::error::{Error, Result};
use crate::events::types::{
    HTTP_REQUEST_ATTRIBUTE, HTTP_RESPONSE_ATTRIBUTE, SESSION_CREATED, USER_UPDATED,
};
use crate::events::{Event, EventDispatcher};
use crate::identity::{Identity, IdentityKind, IdentityStore, Session};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// Result of one pipeline run, ready for the serving layer
#[derive(Debug, Clone)]
pub struct ContextOutcome {
    pub response: ContextResponse,
    pub identity_kind: IdentityKind,
    pub directives: Vec<CookieDirective>,
}

/// Orchestrates resolution, event emission and payload processing
pub struct ContextPipeline {
    resolver: IdentityResolver,
    dispatcher: Arc<dyn EventDispatcher>,
    evaluator: Arc<dyn ConditionEvaluator>,
}

impl ContextPipeline {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        dispatcher: Arc<dyn EventDispatcher>,
        evaluator: Arc<dyn ConditionEvaluator>,
    ) -> Self {
        Self {
            resolver: IdentityResolver::new(store),
            dispatcher,
            evaluator,
        }
    }

    /// Run one request through the pipeline
    pub async fn handle(&self, input: ContextInput) -> Result<ContextOutcome> {
        // Malformed input fails before anything is created or emitted
        let timestamp = parse_timestamp(input.timestamp.as_deref(), Utc::now())?;
        let request = input.payload.parse()?;

        let signals = IdentitySignals {
            persona_id: input.persona_id.as_deref(),
            session_id: input.session_id.as_deref(),
            cookie_profile_id: input.cookie_profile_id.as_deref(),
            cookie_persona_id: input.cookie_persona_id.as_deref(),
        };
        let resolution = self.resolver.resolve(signals, timestamp).await?;

        self.emit_lifecycle_events(&resolution, &input.transport.request, timestamp)
            .await?;

        let response = match &request {
            Some(request) => {
                self.process_payload(
                    request,
                    resolution.identity.as_ref(),
                    resolution.session.as_ref(),
                )
                .await?
            }
            None => ContextResponse::default(),
        };

        let identity_kind = resolution
            .identity
            .as_ref()
            .map(|identity| identity.kind)
            .unwrap_or(IdentityKind::Profile);

        Ok(ContextOutcome {
            response,
            identity_kind,
            directives: resolution.directives,
        })
    }

    async fn emit_lifecycle_events(
        &self,
        resolution: &Resolution,
        transport: &serde_json::Value,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        let Some(identity) = &resolution.identity else {
            return Ok(());
        };
        if !resolution.session_created && !resolution.identity_created {
            return Ok(());
        }

        let response_attr = serde_json::to_value(&resolution.directives)?;
        let decorate = |event: Event| {
            event
                .with_attribute(HTTP_REQUEST_ATTRIBUTE, transport.clone())
                .with_attribute(HTTP_RESPONSE_ATTRIBUTE, response_attr.clone())
        };

        if resolution.session_created {
            let event = Event::new(
                SESSION_CREATED,
                identity,
                resolution.session.as_ref(),
                timestamp,
            );
            self.dispatcher.send(decorate(event)).await?;
        }

        if resolution.identity_created {
            let event = Event::new(USER_UPDATED, identity, resolution.session.as_ref(), timestamp)
                .with_persistent(false);
            self.dispatcher.send(decorate(event)).await?;
        }

        Ok(())
    }

    /// Build the response for a parsed payload
    pub async fn process_payload(
        &self,
        request: &ContextRequest,
        identity: Option<&Identity>,
        session: Option<&Session>,
    ) -> Result<ContextResponse> {
        let identity = identity.ok_or_else(|| {
            Error::Invariant("no identity resolved before payload processing".to_string())
        })?;

        let mut response = ContextResponse {
            user_id: Some(identity.id.clone()),
            ..Default::default()
        };

        if request.require_segments {
            response.user_segments = Some(identity.segments.clone());
        }

        if let Some(requested) = &request.required_user_properties {
            response.user_properties = Some(filter_properties(&identity.properties, requested));
        }

        if let Some(session) = session {
            response.session_id = Some(session.id.clone());
            if let Some(requested) = &request.required_session_properties {
                response.session_properties =
                    Some(filter_properties(&session.properties, requested));
            }
        }

        if let Some(nodes) = &request.filters {
            let mut results = HashMap::with_capacity(nodes.len());
            for node in nodes {
                let matched = self.evaluate_node(node, identity, session).await?;
                results.insert(node.id.clone(), matched);
            }
            response.filtering_results = Some(results);
        }

        Ok(response)
    }

    /// AND of every filter in the node; an empty node matches
    async fn evaluate_node(
        &self,
        node: &FilterNode,
        identity: &Identity,
        session: Option<&Session>,
    ) -> Result<bool> {
        let mut matched = true;
        for filter in &node.filters {
            matched &= self
                .evaluator
                .matches(&filter.condition, identity, session)
                .await?;
        }
        tracing::debug!(filter_id = %node.id, matched, "Evaluated filter node");
        Ok(matched)
    }
}
