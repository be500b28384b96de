//! `/health` and `/ready` for orchestrators.
//!
//! Liveness is answered by the router itself: if the health server can
//! respond, the process is alive. Readiness follows the relay's lifecycle
//! phase, which `main` advances from `Starting` to `Serving` once the
//! signaling listener is bound and to `Draining` when shutdown begins. Only
//! `Serving` is ready; the body names the phase so a failing check is
//! self-explanatory.

use axum::{extract::State, http::StatusCode, routing::get, Router};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Where the relay is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RelayPhase {
    Starting = 0,
    Serving = 1,
    Draining = 2,
}

impl RelayPhase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            RelayPhase::Starting => "starting",
            RelayPhase::Serving => "serving",
            RelayPhase::Draining => "draining",
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => RelayPhase::Serving,
            2 => RelayPhase::Draining,
            _ => RelayPhase::Starting,
        }
    }
}

/// Lifecycle phase shared between `main` and the health server.
#[derive(Debug)]
pub struct HealthState {
    phase: AtomicU8,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(RelayPhase::Starting as u8),
        }
    }

    /// The signaling listener is bound and accepting upgrades.
    pub fn begin_serving(&self) {
        self.phase.store(RelayPhase::Serving as u8, Ordering::SeqCst);
    }

    /// Shutdown has begun. There is no way back to `Serving`.
    pub fn begin_draining(&self) {
        self.phase.store(RelayPhase::Draining as u8, Ordering::SeqCst);
    }

    #[must_use]
    pub fn phase(&self) -> RelayPhase {
        RelayPhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.phase() == RelayPhase::Serving
    }
}

pub fn health_router(health_state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .route("/ready", get(readiness_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(health_state)
}

async fn readiness_handler(State(state): State<Arc<HealthState>>) -> (StatusCode, &'static str) {
    let phase = state.phase();
    let status = if phase == RelayPhase::Serving {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, phase.as_str())
}
