//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound call:
//!     → executor.rs (resolve breaker by operation name)
//!     → registry.rs (lazy creation, layered settings)
//!     → circuit_breaker.rs (admit or reject, record outcome, transition)
//!     → events.rs (listeners observe transitions and fallbacks)
//!     → result | operation error | fallback
//! ```
//!
//! # Design Decisions
//! - Fail fast: no retries here, callers own retry policy
//! - Circuit breaker prevents cascading failures
//! - Only an open circuit produces a fallback; operation errors propagate
//! - The breaker never times out an operation; callers bound their calls

pub mod circuit_breaker;
pub mod error;
pub mod events;
pub mod executor;
pub mod registry;

pub use circuit_breaker::{BreakerSnapshot, CircuitBreaker, CircuitState};
pub use error::BreakerError;
pub use events::{BreakerEvent, BreakerListener, ChannelListener, EventRecord, TracingListener};
pub use executor::GuardedExecutor;
pub use registry::{service_type, BreakerRegistry};
