//! Metrics collection and exposition.
//!
//! # Metrics
//! - `circuit_breaker_transitions_total` (counter): transitions by breaker, state
//! - `circuit_breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `circuit_breaker_fallbacks_total` (counter): fallbacks served by breaker
//! - `circuit_breaker_calls_total` (counter): guarded calls by breaker, outcome
//!
//! Without an installed recorder every call here is a no-op.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;

use crate::resilience::CircuitState;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_transition(breaker: &str, state: CircuitState) {
    counter!(
        "circuit_breaker_transitions_total",
        "breaker" => breaker.to_string(),
        "state" => state.to_string()
    )
    .increment(1);
    gauge!("circuit_breaker_state", "breaker" => breaker.to_string()).set(state_value(state));
}

pub fn record_fallback(breaker: &str) {
    counter!("circuit_breaker_fallbacks_total", "breaker" => breaker.to_string()).increment(1);
}

pub fn record_call(breaker: &str, outcome: &'static str) {
    counter!(
        "circuit_breaker_calls_total",
        "breaker" => breaker.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

fn state_value(state: CircuitState) -> f64 {
    match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    }
}
