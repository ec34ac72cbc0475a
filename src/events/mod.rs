//! Events module — lifecycle event records and dispatch
//!
//! The context pipeline emits `sessionCreated` and `userUpdated` events
//! through the `EventDispatcher` capability. `EventService` fans them out
//! to listeners; `EventLog` keeps the recent persistent ones for the REST
//! endpoint.

pub mod dispatcher;
pub mod handler;
pub mod store;
pub mod types;

pub use dispatcher::{EventDispatcher, EventListener, EventService, TracingListener};
pub use handler::{events_router, EventsState};
pub use store::EventLog;
pub use types::Event;
