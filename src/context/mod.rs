//! Context module — visitor resolution and the `/context.js` pipeline
//!
//! `IdentityResolver` picks the acting identity (profile or persona) and
//! session, `ContextPipeline` emits lifecycle events and builds the
//! `ContextResponse`, and `ResponseAssembler` renders it as a browser
//! script. Cookie writes travel as `CookieDirective`s to the HTTP layer.

pub mod assembler;
pub mod cookies;
pub mod handler;
pub mod pipeline;
pub mod properties;
pub mod resolver;
pub mod types;

pub use assembler::{ResponseAssembler, ScriptSet};
pub use handler::{context_router, ContextState};
pub use pipeline::{ContextOutcome, ContextPipeline};
pub use properties::filter_properties;
pub use resolver::{IdentityResolver, IdentitySignals, Resolution};
pub use types::{ContextInput, ContextRequest, ContextResponse, CookieDirective};
