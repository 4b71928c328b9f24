use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::http::server::AppState;
use crate::resilience::BreakerStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitStatus {
    pub state: String,
    pub failure_count: u32,
    pub failure_threshold: u32,
    pub recovery_timeout_ms: u64,
    pub last_failure_secs_ago: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitStatus {
    pub enabled: bool,
    pub max_requests: usize,
    pub window_ms: u64,
    pub tracked_clients: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub upstream: String,
    pub circuit: CircuitStatus,
    pub rate_limit: RateLimitStatus,
}

fn circuit_status(state: &AppState, status: BreakerStatus) -> CircuitStatus {
    let config = state.executor.breaker().config();
    CircuitStatus {
        state: status.state.as_str().to_string(),
        failure_count: status.failure_count,
        failure_threshold: config.failure_threshold,
        recovery_timeout_ms: config.recovery_timeout.as_millis() as u64,
        last_failure_secs_ago: status.last_failure_age().map(|age| age.as_secs()),
    }
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let circuit = circuit_status(&state, state.executor.status());
    let limiter = &state.limiter;

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        upstream: state.upstream.url().to_string(),
        circuit,
        rate_limit: RateLimitStatus {
            enabled: state.config.rate_limit.enabled,
            max_requests: limiter.max_requests(),
            window_ms: limiter.window().as_millis() as u64,
            tracked_clients: limiter.tracked(),
        },
    })
}

/// Force the breaker closed and clear its counter.
pub async fn reset_circuit(State(state): State<AppState>) -> Json<CircuitStatus> {
    state.executor.reset();
    tracing::info!("Circuit breaker reset by admin");
    Json(circuit_status(&state, state.executor.status()))
}
