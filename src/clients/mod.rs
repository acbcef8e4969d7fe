//! Downstream service clients.
//!
//! # Data Flow
//! ```text
//! Handler code
//!     → ServiceClients::get("routing")
//!     → DownstreamClient::get_json("getOptimalRoute", path, fallback)
//!     → GuardedExecutor under "routing.getOptimalRoute"
//!     → reqwest (per-service timeout)
//! ```

pub mod downstream;

use std::collections::HashMap;

use crate::config::ServiceEndpoint;
use crate::resilience::GuardedExecutor;

pub use downstream::{ClientError, DownstreamClient};

/// One client per configured service type.
#[derive(Clone, Default)]
pub struct ServiceClients {
    clients: HashMap<String, DownstreamClient>,
}

impl ServiceClients {
    pub fn from_config(
        services: &HashMap<String, ServiceEndpoint>,
        executor: &GuardedExecutor,
    ) -> Result<Self, ClientError> {
        let mut clients = HashMap::with_capacity(services.len());
        for (service, endpoint) in services {
            let client = DownstreamClient::new(service.clone(), endpoint, executor.clone())?;
            tracing::debug!(service = %service, base_url = %endpoint.base_url, timeout_ms = endpoint.timeout_ms, "Downstream client ready");
            clients.insert(service.clone(), client);
        }
        Ok(Self { clients })
    }

    pub fn get(&self, service: &str) -> Result<&DownstreamClient, ClientError> {
        self.clients
            .get(service)
            .ok_or_else(|| ClientError::UnknownService(service.to_string()))
    }

    pub fn services(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.clients.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
