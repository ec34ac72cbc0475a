//! Identity module — profiles, personas and sessions
//!
//! Defines the `IdentityStore` capability the context pipeline resolves
//! visitors against, an in-memory implementation with JSON snapshot
//! persistence, and admin REST endpoints for inspection and persona
//! registration.

pub mod handler;
pub mod store;
pub mod types;

pub use handler::{identity_router, IdentityState};
pub use store::{IdentityStore, MemoryIdentityStore};
pub use types::{Identity, IdentityKind, PersonaWithSessions, Properties, Session};
