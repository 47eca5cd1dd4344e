//! helios-insight: the insight pipeline behind the gateway.
//!
//! Wraps the upstream chat-completion service in a cache-aware adapter that
//! reports tagged outcomes instead of raising, and reconciles whatever the
//! upstream produced against each module's static fallback payload.

mod adapter;
mod reconcile;
mod upstream;

pub use adapter::{AdapterOutcome, InsightAdapter, LlmMode};
pub use reconcile::reconcile;
