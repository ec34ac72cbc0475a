//! Event dispatch
//!
//! `EventService` delivers each event to its registered listeners in
//! registration order, then publishes it on a broadcast channel for any
//! live subscribers. A failing listener aborts dispatch and surfaces as
//! `Error::Dispatch`.

use crate::error::{Error, Result};
use crate::events::types::Event;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// Capability interface the context pipeline emits events through
#[async_trait]
pub trait EventDispatcher: Send + Sync {
    /// Hand an event to every interested listener
    async fn send(&self, event: Event) -> Result<()>;
}

/// A consumer of dispatched events
#[async_trait]
pub trait EventListener: Send + Sync {
    /// Human-readable name (used in error messages and logs)
    fn name(&self) -> &str;

    /// Whether this listener wants the event at all
    fn can_handle(&self, _event: &Event) -> bool {
        true
    }

    /// Handle one event
    async fn on_event(&self, event: &Event) -> Result<()>;
}

/// Listener fan-out plus broadcast publication
pub struct EventService {
    listeners: RwLock<Vec<Arc<dyn EventListener>>>,
    tx: broadcast::Sender<Event>,
}

impl EventService {
    /// Create a dispatcher whose broadcast channel holds `capacity` events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            listeners: RwLock::new(Vec::new()),
            tx,
        }
    }

    /// Register a listener
    pub async fn register(&self, listener: Arc<dyn EventListener>) {
        tracing::debug!(listener = listener.name(), "Registered event listener");
        self.listeners.write().await.push(listener);
    }

    /// Subscribe to every event dispatched from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Number of registered listeners
    pub async fn listener_count(&self) -> usize {
        self.listeners.read().await.len()
    }
}

#[async_trait]
impl EventDispatcher for EventService {
    async fn send(&self, event: Event) -> Result<()> {
        let listeners = self.listeners.read().await.clone();
        for listener in listeners.iter().filter(|l| l.can_handle(&event)) {
            listener.on_event(&event).await.map_err(|e| {
                Error::Dispatch(format!(
                    "listener '{}' rejected {} event {}: {}",
                    listener.name(),
                    event.event_type,
                    event.id,
                    e
                ))
            })?;
        }

        // No subscribers is not an error
        let _ = self.tx.send(event);
        Ok(())
    }
}

/// Logs every event at debug level
pub struct TracingListener;

#[async_trait]
impl EventListener for TracingListener {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn on_event(&self, event: &Event) -> Result<()> {
        tracing::debug!(
            event_type = %event.event_type,
            identity_id = %event.identity_id,
            session_id = ?event.session_id,
            persistent = event.persistent,
            "Event dispatched"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types::{SESSION_CREATED, USER_UPDATED};
    use crate::identity::Identity;
    use chrono::Utc;
    use std::sync::Mutex;

    struct Recording {
        seen: Mutex<Vec<String>>,
        only_persistent: bool,
    }

    #[async_trait]
    impl EventListener for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        fn can_handle(&self, event: &Event) -> bool {
            !self.only_persistent || event.persistent
        }

        async fn on_event(&self, event: &Event) -> Result<()> {
            self.seen.lock().unwrap().push(event.event_type.clone());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl EventListener for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn on_event(&self, _event: &Event) -> Result<()> {
            Err(Error::Internal("disk full".to_string()))
        }
    }

    fn event(kind: &str) -> Event {
        Event::new(kind, &Identity::profile("p-1"), None, Utc::now())
    }

    #[tokio::test]
    async fn test_listeners_receive_in_order() {
        let service = EventService::new(16);
        let all = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
            only_persistent: false,
        });
        service.register(all.clone()).await;

        service.send(event(SESSION_CREATED)).await.unwrap();
        service.send(event(USER_UPDATED)).await.unwrap();

        assert_eq!(
            *all.seen.lock().unwrap(),
            vec!["sessionCreated".to_string(), "userUpdated".to_string()]
        );
    }

    #[tokio::test]
    async fn test_can_handle_filters() {
        let service = EventService::new(16);
        let durable = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
            only_persistent: true,
        });
        service.register(durable.clone()).await;

        service
            .send(event(USER_UPDATED).with_persistent(false))
            .await
            .unwrap();
        assert!(durable.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failing_listener_surfaces_dispatch_error() {
        let service = EventService::new(16);
        service.register(Arc::new(Failing)).await;

        let err = service.send(event(SESSION_CREATED)).await.unwrap_err();
        assert!(matches!(err, Error::Dispatch(_)));
        assert!(err.to_string().contains("failing"));
    }

    #[tokio::test]
    async fn test_broadcast_subscribers() {
        let service = EventService::new(16);
        let mut rx = service.subscribe();

        service.send(event(SESSION_CREATED)).await.unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type, SESSION_CREATED);
    }

    #[tokio::test]
    async fn test_send_without_subscribers() {
        let service = EventService::new(16);
        tokio_test::assert_ok!(service.send(event(USER_UPDATED)).await);
        assert_eq!(service.listener_count().await, 0);
    }

    #[tokio::test]
    async fn test_tracing_listener() {
        let service = EventService::new(16);
        service.register(Arc::new(TracingListener)).await;
        tokio_test::assert_ok!(service.send(event(USER_UPDATED)).await);
    }
}
