use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::http::server::AppContext;
use crate::resilience::{BreakerSnapshot, CircuitState};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub breakers: BreakerCounts,
    pub services: Vec<String>,
}

#[derive(Serialize, Default)]
pub struct BreakerCounts {
    pub total: usize,
    pub closed: usize,
    pub open: usize,
    pub half_open: usize,
}

#[derive(Serialize)]
pub struct ResetSummary {
    pub breakers: usize,
    pub reset: usize,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn get_status(State(context): State<AppContext>) -> Json<SystemStatus> {
    let mut counts = BreakerCounts::default();
    for snap in context.registry().snapshots() {
        counts.total += 1;
        match snap.state {
            CircuitState::Closed => counts.closed += 1,
            CircuitState::Open => counts.open += 1,
            CircuitState::HalfOpen => counts.half_open += 1,
        }
    }

    let status = if counts.open > 0 { "degraded" } else { "operational" };
    let services = context
        .clients()
        .services()
        .into_iter()
        .map(str::to_string)
        .collect();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status,
        breakers: counts,
        services,
    })
}

pub async fn list_breakers(State(context): State<AppContext>) -> Json<Vec<BreakerSnapshot>> {
    Json(context.registry().snapshots())
}

pub async fn get_breaker(
    State(context): State<AppContext>,
    Path(name): Path<String>,
) -> Result<Json<BreakerSnapshot>, (StatusCode, Json<ErrorBody>)> {
    context.registry().snapshot(&name).map(Json).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: format!("no circuit breaker named '{}'", name),
            }),
        )
    })
}

pub async fn reset_breakers(State(context): State<AppContext>) -> Json<ResetSummary> {
    let registry = context.registry();
    let reset = registry.reset_all();
    tracing::info!(reset, "Admin reset of all circuit breakers");

    Json(ResetSummary {
        breakers: registry.len(),
        reset,
    })
}
