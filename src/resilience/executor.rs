//! Call-site API for guarded downstream calls.
//!
//! The executor is the only place that substitutes fallback values, and it
//! does so only when the breaker rejected the call. An operation that ran and
//! failed always reaches the caller as an error.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use crate::config::BreakerOverride;
use crate::observability::metrics;
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::error::BreakerError;
use crate::resilience::events::BreakerEvent;
use crate::resilience::registry::BreakerRegistry;

/// Runs operations under named breakers with fallback substitution.
#[derive(Clone)]
pub struct GuardedExecutor {
    registry: Arc<BreakerRegistry>,
}

impl GuardedExecutor {
    pub fn new(registry: Arc<BreakerRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<BreakerRegistry> {
        &self.registry
    }

    /// Run `operation` under the breaker named `name`.
    ///
    /// Returns `fallback` when the circuit is open, the operation's value on
    /// success, and the operation's own error when it ran and failed.
    pub async fn execute<T, E, F, Fut>(&self, name: &str, operation: F, fallback: T) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let breaker = self.registry.get(name);
        run(&breaker, operation, fallback).await
    }

    /// Like [`execute`](Self::execute), creating the breaker with `custom`
    /// layered over the configured settings if it does not exist yet.
    pub async fn execute_with_config<T, E, F, Fut>(
        &self,
        name: &str,
        custom: &BreakerOverride,
        operation: F,
        fallback: T,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let breaker = self.registry.get_with_config(name, custom);
        run(&breaker, operation, fallback).await
    }
}

async fn run<T, E, F, Fut>(breaker: &CircuitBreaker, operation: F, fallback: T) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    match breaker.fire(operation).await {
        Ok(value) => {
            metrics::record_call(breaker.name(), "success");
            Ok(value)
        }
        Err(BreakerError::Open { name }) => {
            tracing::warn!(breaker = %name, state = %breaker.state(), "Circuit open, using fallback");
            metrics::record_call(&name, "rejected");
            breaker.notify(BreakerEvent::Fallback);
            Ok(fallback)
        }
        Err(BreakerError::Operation(e)) => {
            tracing::error!(breaker = %breaker.name(), state = %breaker.state(), error = %e, "Guarded operation failed");
            metrics::record_call(breaker.name(), "failure");
            Err(e)
        }
    }
}
