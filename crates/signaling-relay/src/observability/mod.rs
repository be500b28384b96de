//! Observability for the signaling relay.
//!
//! - [`health`]: `/health` and `/ready`, readiness driven by the [`RelayPhase`] in [`HealthState`]
//! - [`metrics`]: Prometheus recorder setup and `relay_*` metric helpers

pub mod health;
pub mod metrics;

pub use health::{health_router, HealthState, RelayPhase};
