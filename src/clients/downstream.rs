//! Guarded HTTP client for one downstream service.
//!
//! # Design Decisions
//! - Every call runs under the breaker `"{service}.{operation}"`
//! - Connection errors, timeouts and 5xx count as breaker failures
//! - 4xx are NOT breaker failures (client error, not service health); they
//!   still reach the caller as `ClientError::Status`
//! - The request timeout bounds the call; the breaker imposes none

use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::config::ServiceEndpoint;
use crate::resilience::GuardedExecutor;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid base URL for {service}: {source}")]
    BadBaseUrl {
        service: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("request to {service} failed: {source}")]
    Transport {
        service: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} responded with status {status}")]
    Status { service: String, status: u16 },

    #[error("invalid response body from {service}: {source}")]
    Decode {
        service: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("no client configured for service '{0}'")]
    UnknownService(String),
}

impl ClientError {
    /// HTTP status returned by the service, if the call got that far.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// HTTP client bound to one service type.
#[derive(Clone)]
pub struct DownstreamClient {
    service: String,
    base_url: String,
    http: Client,
    timeout: Duration,
    executor: GuardedExecutor,
}

impl DownstreamClient {
    pub fn new(
        service: impl Into<String>,
        endpoint: &ServiceEndpoint,
        executor: GuardedExecutor,
    ) -> Result<Self, ClientError> {
        let service = service.into();
        Url::parse(&endpoint.base_url).map_err(|source| ClientError::BadBaseUrl {
            service: service.clone(),
            source,
        })?;

        let http = Client::builder()
            .timeout(endpoint.timeout())
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self {
            service,
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
            http,
            timeout: endpoint.timeout(),
            executor,
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// A copy of this client with a different per-request timeout, for calls
    /// that must answer faster than the service default.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            timeout,
            ..self.clone()
        }
    }

    /// Breaker name used for `operation` on this service.
    pub fn operation_name(&self, operation: &str) -> String {
        format!("{}.{}", self.service, operation)
    }

    pub async fn get_json<T>(&self, operation: &str, path: &str, fallback: T) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
    {
        let request = self.request(Method::GET, path);
        self.guarded(operation, request, fallback).await
    }

    pub async fn post_json<B, T>(
        &self,
        operation: &str,
        path: &str,
        body: &B,
        fallback: T,
    ) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.request(Method::POST, path).json(body);
        self.guarded(operation, request, fallback).await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        self.http.request(method, url).timeout(self.timeout)
    }

    async fn guarded<T>(&self, operation: &str, request: RequestBuilder, fallback: T) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
    {
        let name = self.operation_name(operation);
        // Outer error: counted against the breaker. Inner error: returned to
        // the caller without affecting breaker health.
        self.executor
            .execute(&name, || self.send::<T>(request), Ok(fallback))
            .await?
    }

    async fn send<T>(&self, request: RequestBuilder) -> Result<Result<T, ClientError>, ClientError>
    where
        T: DeserializeOwned,
    {
        let response = request.send().await.map_err(|source| ClientError::Transport {
            service: self.service.clone(),
            source,
        })?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ClientError::Status {
                service: self.service.clone(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            tracing::debug!(service = %self.service, status = %status, "Downstream rejected request");
            return Ok(Err(ClientError::Status {
                service: self.service.clone(),
                status: status.as_u16(),
            }));
        }

        let value = response.json::<T>().await.map_err(|source| ClientError::Decode {
            service: self.service.clone(),
            source,
        })?;
        Ok(Ok(value))
    }
}
