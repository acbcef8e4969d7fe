//! Circuit breaker manager for outbound calls to downstream services.

pub mod admin;
pub mod clients;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::ManagerConfig;
pub use http::{AppContext, HttpServer};
pub use lifecycle::Shutdown;
pub use resilience::{BreakerError, BreakerRegistry, CircuitBreaker, CircuitState, GuardedExecutor};
