//! helios-core: shared library for the Helios Insight Gateway.
//!
//! Holds the closed insight-module registry, the uniform response envelope,
//! the injected cache capability, and the gateway configuration so the
//! adapter crate and the HTTP add-on keep a consistent public API.

mod cache;
mod config;
mod envelope;
mod module;

pub use cache::{InsightCache, MemoryCache};
pub use config::GatewayConfig;
pub use envelope::{FallbackPayload, InsightContext, InsightEnvelope, Source};
pub use module::{ModuleKind, UnknownModule, MODULES};
