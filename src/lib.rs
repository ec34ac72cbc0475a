//! Context Server - visitor context resolution for personalized pages
//!
//! A page includes `/context.js`; the server works out who the visitor is,
//! attaches a session, reports lifecycle events and answers the page's
//! questions about the visitor (segments, properties, filter matches).
//!
//! ## Architecture
//!
//! ```text
//!   browser ──GET|POST /context.js──▶ context::handler
//!                                          │ cookies, query, body
//!                                          ▼
//!                                   ContextPipeline
//!                     ┌────────────────────┼─────────────────────┐
//!                     ▼                    ▼                     ▼
//!             IdentityResolver      EventDispatcher      ConditionEvaluator
//!                     │              (EventService)      (BuiltinEvaluator)
//!                     ▼                    │
//!               IdentityStore        EventLog, TracingListener
//!           (MemoryIdentityStore)
//!                                          │
//!                                          ▼
//!                                 ResponseAssembler ──▶ script + Set-Cookie
//! ```
//!
//! ## Modules
//!
//! - [`context`]: identity resolution, pipeline and script rendering
//! - [`identity`]: profiles, personas, sessions and their store
//! - [`events`]: lifecycle events and dispatch
//! - [`condition`]: declarative filter conditions
//! - [`api`]: combined HTTP application
//! - [`config`]: configuration management

pub mod api;
pub mod condition;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod identity;

pub use config::ContextServerConfig;
pub use error::{Error, Result};
