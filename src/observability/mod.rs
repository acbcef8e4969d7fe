//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Breaker events (via resilience::events::TracingListener):
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging with breaker name as a field on every event
//! - Metrics are cheap; recording without an installed recorder is a no-op

pub mod logging;
pub mod metrics;
