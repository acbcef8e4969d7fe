//! Process-scoped collection of circuit breakers.
//!
//! # Responsibilities
//! - Own every breaker, keyed by operation name
//! - Create breakers lazily on first use, exactly once per name
//! - Resolve settings: defaults ← service-type override ← caller override
//!   (a caller override that fails validation is dropped)
//! - Administrative reset of every breaker
//!
//! # Design Decisions
//! - An explicit context object, shared via Arc, never a global
//! - Settings are fixed when a breaker is built; later overrides are ignored
//! - Reloads swap the settings layers atomically and only affect new breakers

use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::sync::Arc;

use crate::config::validation::validate_settings;
use crate::config::{BreakerOverride, BreakerSettings, BreakersConfig};
use crate::resilience::circuit_breaker::{BreakerSnapshot, CircuitBreaker};
use crate::resilience::events::{BreakerListener, TracingListener};

/// The service type of an operation name: everything before the first `.`,
/// or the whole name when there is none.
pub fn service_type(name: &str) -> &str {
    name.split_once('.').map(|(prefix, _)| prefix).unwrap_or(name)
}

/// Keyed collection of breakers with layered configuration.
pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    layers: ArcSwap<BreakersConfig>,
    listeners: Vec<Arc<dyn BreakerListener>>,
}

impl BreakerRegistry {
    /// Registry whose breakers report to the tracing/metrics listener.
    pub fn new(layers: BreakersConfig) -> Self {
        Self::with_listeners(layers, vec![Arc::new(TracingListener)])
    }

    /// Registry whose breakers report to exactly `listeners`.
    pub fn with_listeners(layers: BreakersConfig, listeners: Vec<Arc<dyn BreakerListener>>) -> Self {
        Self {
            breakers: DashMap::new(),
            layers: ArcSwap::from_pointee(layers),
            listeners,
        }
    }

    /// Get or create the breaker for `name`.
    pub fn get(&self, name: &str) -> Arc<CircuitBreaker> {
        self.get_or_create(name, None)
    }

    /// Get or create the breaker for `name`, applying `custom` on top of the
    /// configured layers. Ignored if the breaker already exists.
    pub fn get_with_config(&self, name: &str, custom: &BreakerOverride) -> Arc<CircuitBreaker> {
        self.get_or_create(name, Some(custom))
    }

    fn get_or_create(&self, name: &str, custom: Option<&BreakerOverride>) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(name) {
            if custom.is_some() {
                tracing::trace!(breaker = %name, "Breaker already exists, ignoring custom settings");
            }
            return existing.clone();
        }

        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                let settings = self.resolve_settings(name, custom);
                tracing::debug!(
                    breaker = %name,
                    service = %service_type(name),
                    failure_threshold = settings.failure_threshold,
                    failure_rate_threshold = settings.failure_rate_threshold,
                    reset_timeout_ms = settings.reset_timeout_ms,
                    half_open_success_threshold = settings.half_open_success_threshold,
                    "Created circuit breaker"
                );
                Arc::new(CircuitBreaker::new(name, settings, self.listeners.clone()))
            })
            .clone()
    }

    /// The settings a breaker named `name` would be built with right now.
    pub fn resolve_settings(&self, name: &str, custom: Option<&BreakerOverride>) -> BreakerSettings {
        let layers = self.layers.load();
        let mut settings = layers.defaults.clone();
        if let Some(service) = layers.services.get(service_type(name)) {
            settings = settings.merged(service);
        }
        if let Some(custom) = custom {
            let merged = settings.clone().merged(custom);
            match validate_settings(&merged) {
                Ok(()) => settings = merged,
                Err(errors) => {
                    tracing::warn!(
                        breaker = %name,
                        errors = ?errors,
                        "Invalid custom breaker settings, using configured settings"
                    );
                }
            }
        }
        settings
    }

    /// Force every registered breaker back to CLOSED with zeroed counters.
    ///
    /// Returns how many breakers were not closed before the reset.
    pub fn reset_all(&self) -> usize {
        // Collected first so listeners never run under a map shard lock.
        let breakers: Vec<Arc<CircuitBreaker>> =
            self.breakers.iter().map(|e| e.value().clone()).collect();

        let reopened = breakers.iter().filter(|b| b.reset()).count();
        tracing::info!(
            breakers = breakers.len(),
            were_tripped = reopened,
            "Reset all circuit breakers"
        );
        reopened
    }

    /// Replace the default and service-type layers used for new breakers.
    pub fn reload(&self, layers: BreakersConfig) {
        tracing::info!(
            services = layers.services.len(),
            existing_breakers = self.breakers.len(),
            "Breaker settings reloaded; existing breakers keep their settings"
        );
        self.layers.store(Arc::new(layers));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.breakers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// Names of every registered breaker, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn snapshot(&self, name: &str) -> Option<BreakerSnapshot> {
        let breaker = self.breakers.get(name).map(|e| e.value().clone())?;
        Some(breaker.snapshot())
    }

    /// Snapshots of every registered breaker, sorted by name.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let breakers: Vec<Arc<CircuitBreaker>> =
            self.breakers.iter().map(|e| e.value().clone()).collect();
        let mut snapshots: Vec<BreakerSnapshot> = breakers.iter().map(|b| b.snapshot()).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::new(BreakersConfig::default())
    }
}
