//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the manager.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Root configuration for the circuit manager.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ManagerConfig {
    /// Admin API settings.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Breaker thresholds: defaults plus per-service-type overrides.
    pub breakers: BreakersConfig,

    /// Downstream service endpoints, keyed by service type.
    pub services: HashMap<String, ServiceEndpoint>,
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Admin API bind address.
    pub bind_address: String,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Request timeout for admin calls in seconds.
    pub request_timeout_secs: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8081".to_string(),
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            request_timeout_secs: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Breaker configuration layers.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BreakersConfig {
    /// Settings every breaker starts from.
    pub defaults: BreakerSettings,

    /// Overrides keyed by service type (the operation-name prefix before the
    /// first `.`), e.g. `routing` for `routing.getOptimalRoute`.
    pub services: HashMap<String, BreakerOverride>,
}

/// Effective thresholds of one breaker.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerSettings {
    /// Consecutive failures in CLOSED that trip the breaker.
    pub failure_threshold: u32,

    /// Failure percentage (0-100) over the rolling window that trips the breaker.
    pub failure_rate_threshold: f64,

    /// How long the breaker stays OPEN before admitting a probe, in milliseconds.
    pub reset_timeout_ms: u64,

    /// Consecutive probe successes needed to close from HALF_OPEN.
    pub half_open_success_threshold: u32,

    /// Length of the failure-rate window in milliseconds.
    pub rolling_window_ms: u64,

    /// Outcomes required in the window before the failure rate is evaluated.
    pub minimum_calls: u32,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_rate_threshold: 50.0,
            reset_timeout_ms: 30_000,
            half_open_success_threshold: 2,
            rolling_window_ms: 60_000,
            minimum_calls: 10,
        }
    }
}

impl BreakerSettings {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }

    pub fn rolling_window(&self) -> Duration {
        Duration::from_millis(self.rolling_window_ms)
    }

    /// Return these settings with every field the override sets replaced.
    pub fn merged(mut self, layer: &BreakerOverride) -> Self {
        if let Some(v) = layer.failure_threshold {
            self.failure_threshold = v;
        }
        if let Some(v) = layer.failure_rate_threshold {
            self.failure_rate_threshold = v;
        }
        if let Some(v) = layer.reset_timeout_ms {
            self.reset_timeout_ms = v;
        }
        if let Some(v) = layer.half_open_success_threshold {
            self.half_open_success_threshold = v;
        }
        if let Some(v) = layer.rolling_window_ms {
            self.rolling_window_ms = v;
        }
        if let Some(v) = layer.minimum_calls {
            self.minimum_calls = v;
        }
        self
    }
}

/// Partial settings; unset fields fall through to the layer below.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BreakerOverride {
    pub failure_threshold: Option<u32>,
    pub failure_rate_threshold: Option<f64>,
    pub reset_timeout_ms: Option<u64>,
    pub half_open_success_threshold: Option<u32>,
    pub rolling_window_ms: Option<u64>,
    pub minimum_calls: Option<u32>,
}

/// A downstream service the manager calls out to.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceEndpoint {
    /// Base URL, e.g. "http://routing.internal:8080".
    pub base_url: String,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_service_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_service_timeout_ms() -> u64 {
    5_000
}

impl ServiceEndpoint {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
