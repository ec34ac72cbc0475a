//! Bounded in-memory log of persistent events
//!
//! Registered as an `EventListener`; events flagged `persistent = false`
//! never reach it.

use crate::error::Result;
use crate::events::dispatcher::EventListener;
use crate::events::types::Event;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Ring buffer of the most recent persistent events
pub struct EventLog {
    capacity: usize,
    events: RwLock<VecDeque<Event>>,
    total_recorded: AtomicU64,
}

impl EventLog {
    /// Create a log retaining at most `capacity` events
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: RwLock::new(VecDeque::new()),
            total_recorded: AtomicU64::new(0),
        }
    }

    /// Record an event, evicting the oldest when full
    pub async fn record(&self, event: Event) {
        let mut events = self.events.write().await;
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event);
        self.total_recorded.fetch_add(1, Ordering::Relaxed);
    }

    /// Most recent events first, optionally restricted to one identity
    pub async fn recent(&self, identity_id: Option<&str>, limit: usize) -> Vec<Event> {
        self.events
            .read()
            .await
            .iter()
            .rev()
            .filter(|e| identity_id.map_or(true, |id| e.identity_id == id))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Number of events currently buffered
    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }

    /// Events recorded since startup, including evicted ones
    pub fn total_recorded(&self) -> u64 {
        self.total_recorded.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EventListener for EventLog {
    fn name(&self) -> &str {
        "event-log"
    }

    fn can_handle(&self, event: &Event) -> bool {
        event.persistent
    }

    async fn on_event(&self, event: &Event) -> Result<()> {
        self.record(event.clone()).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::dispatcher::{EventDispatcher, EventService};
    use crate::events::types::{SESSION_CREATED, USER_UPDATED};
    use crate::identity::Identity;
    use chrono::Utc;
    use std::sync::Arc;

    fn event_for(identity_id: &str, kind: &str) -> Event {
        Event::new(kind, &Identity::profile(identity_id), None, Utc::now())
    }

    #[tokio::test]
    async fn test_recent_newest_first() {
        let log = EventLog::new(10);
        log.record(event_for("a", SESSION_CREATED)).await;
        log.record(event_for("b", SESSION_CREATED)).await;

        let recent = log.recent(None, 10).await;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].identity_id, "b");
        assert_eq!(recent[1].identity_id, "a");
    }

    #[tokio::test]
    async fn test_recent_by_identity_and_limit() {
        let log = EventLog::new(10);
        for _ in 0..3 {
            log.record(event_for("a", SESSION_CREATED)).await;
        }
        log.record(event_for("b", SESSION_CREATED)).await;

        assert_eq!(log.recent(Some("a"), 10).await.len(), 3);
        assert_eq!(log.recent(Some("a"), 2).await.len(), 2);
        assert_eq!(log.recent(Some("zzz"), 10).await.len(), 0);
    }

    #[tokio::test]
    async fn test_capacity_eviction() {
        let log = EventLog::new(2);
        log.record(event_for("a", SESSION_CREATED)).await;
        log.record(event_for("b", SESSION_CREATED)).await;
        log.record(event_for("c", SESSION_CREATED)).await;

        assert_eq!(log.len().await, 2);
        assert_eq!(log.total_recorded(), 3);
        let ids: Vec<_> = log
            .recent(None, 10)
            .await
            .into_iter()
            .map(|e| e.identity_id)
            .collect();
        assert_eq!(ids, vec!["c", "b"]);
    }

    #[tokio::test]
    async fn test_skips_non_persistent_events() {
        let service = EventService::new(16);
        let log = Arc::new(EventLog::new(10));
        service.register(log.clone()).await;

        service
            .send(event_for("a", USER_UPDATED).with_persistent(false))
            .await
            .unwrap();
        service.send(event_for("a", SESSION_CREATED)).await.unwrap();

        let recent = log.recent(None, 10).await;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].event_type, SESSION_CREATED);
    }
}
