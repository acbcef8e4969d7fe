//! Failure injection against mock downstream services.

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use circuit_manager::clients::{ClientError, ServiceClients};
use circuit_manager::config::BreakersConfig;
use circuit_manager::{BreakerRegistry, CircuitState, GuardedExecutor};

mod common;

#[derive(Debug, Deserialize, PartialEq)]
struct Route {
    id: String,
    eta_minutes: u32,
}

fn cached_route() -> Route {
    Route {
        id: "cached".into(),
        eta_minutes: 0,
    }
}

fn clients(
    service: &str,
    addr: std::net::SocketAddr,
    timeout_ms: u64,
    layers: BreakersConfig,
) -> (ServiceClients, Arc<BreakerRegistry>) {
    let registry = Arc::new(BreakerRegistry::with_listeners(layers, Vec::new()));
    let executor = GuardedExecutor::new(registry.clone());
    let mut services = HashMap::new();
    services.insert(service.to_string(), common::endpoint(addr, timeout_ms));
    (
        ServiceClients::from_config(&services, &executor).unwrap(),
        registry,
    )
}

#[tokio::test]
async fn test_5xx_trips_breaker_then_fallback() {
    let call_count = Arc::new(AtomicU32::new(0));
    let cc = call_count.clone();
    let addr = common::start_programmable_backend(move || {
        let cc = cc.clone();
        async move {
            cc.fetch_add(1, Ordering::SeqCst);
            (503, r#"{"error":"overloaded"}"#.into())
        }
    })
    .await;

    let mut layers = BreakersConfig::default();
    layers.defaults.failure_threshold = 3;
    layers.defaults.reset_timeout_ms = 60_000;
    let (clients, registry) = clients("routing", addr, 2_000, layers);
    let routing = clients.get("routing").unwrap();

    for _ in 0..3 {
        let err = routing
            .get_json("getOptimalRoute", "/routes/optimal", cached_route())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(503));
    }
    assert_eq!(
        registry.get("routing.getOptimalRoute").state(),
        CircuitState::Open
    );

    let route = routing
        .get_json("getOptimalRoute", "/routes/optimal", cached_route())
        .await
        .unwrap();
    assert_eq!(route, cached_route());
    assert_eq!(call_count.load(Ordering::SeqCst), 3, "Open breaker must not reach the service");
}

#[tokio::test]
async fn test_4xx_does_not_trip_breaker() {
    let addr = common::start_programmable_backend(|| async {
        (400, r#"{"error":"unknown parcel"}"#.into())
    })
    .await;

    let mut layers = BreakersConfig::default();
    layers.defaults.failure_threshold = 2;
    let (clients, registry) = clients("tracking", addr, 2_000, layers);
    let tracking = clients.get("tracking").unwrap();

    for _ in 0..5 {
        let err = tracking
            .get_json::<serde_json::Value>("getStatus", "/parcels/x", serde_json::Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 400, .. }));
    }

    let snap = registry.snapshot("tracking.getStatus").unwrap();
    assert_eq!(snap.state, CircuitState::Closed);
    assert_eq!(snap.failure_count, 0);
}

#[tokio::test]
async fn test_recovery_after_reset_timeout() {
    let healthy = Arc::new(AtomicBool::new(false));
    let h = healthy.clone();
    let addr = common::start_programmable_backend(move || {
        let h = h.clone();
        async move {
            if h.load(Ordering::SeqCst) {
                (200, r#"{"id":"r-1","eta_minutes":12}"#.into())
            } else {
                (500, "{}".into())
            }
        }
    })
    .await;

    let mut layers = BreakersConfig::default();
    layers.defaults.failure_threshold = 1;
    layers.defaults.reset_timeout_ms = 200;
    layers.defaults.half_open_success_threshold = 2;
    let (clients, registry) = clients("routing", addr, 2_000, layers);
    let routing = clients.get("routing").unwrap();

    assert!(routing
        .get_json("getOptimalRoute", "/routes/optimal", cached_route())
        .await
        .is_err());
    assert_eq!(
        routing
            .get_json("getOptimalRoute", "/routes/optimal", cached_route())
            .await
            .unwrap(),
        cached_route()
    );

    healthy.store(true, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(250)).await;

    for _ in 0..2 {
        let route = routing
            .get_json("getOptimalRoute", "/routes/optimal", cached_route())
            .await
            .unwrap();
        assert_eq!(route.id, "r-1");
    }
    assert_eq!(
        registry.get("routing.getOptimalRoute").state(),
        CircuitState::Closed
    );
}

#[tokio::test]
async fn test_slow_service_times_out_as_failure() {
    let addr = common::start_programmable_backend(|| async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        (200, r#"{"congestion":"low"}"#.into())
    })
    .await;

    let mut layers = BreakersConfig::default();
    layers.defaults.failure_threshold = 1;
    let (clients, registry) = clients("routing", addr, 5_000, layers);
    let traffic = clients
        .get("routing")
        .unwrap()
        .with_timeout(Duration::from_millis(100));

    let err = traffic
        .get_json::<serde_json::Value>("getTrafficConditions", "/traffic", serde_json::json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Transport { .. }));
    assert_eq!(
        registry.get("routing.getTrafficConditions").state(),
        CircuitState::Open
    );

    // other operations on the same service are unaffected
    assert!(!registry.contains("routing.getOptimalRoute"));
}

#[tokio::test]
async fn test_post_json_round_trip() {
    let addr = common::start_programmable_backend(|| async {
        (200, r#"{"payout_id":"p-9","status":"queued"}"#.into())
    })
    .await;

    let (clients, _) = clients("payout", addr, 2_000, BreakersConfig::default());
    let payout = clients.get("payout").unwrap();

    let response: serde_json::Value = payout
        .post_json(
            "createPayout",
            "/payouts",
            &serde_json::json!({"courier_id": "c-1", "amount_cents": 4200}),
            serde_json::Value::Null,
        )
        .await
        .unwrap();
    assert_eq!(response["payout_id"], "p-9");
}
