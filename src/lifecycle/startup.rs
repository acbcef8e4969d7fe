//! Startup orchestration.
//!
//! # Order
//! 1. Load and validate configuration (file or defaults + environment)
//! 2. Initialize logging, then metrics
//! 3. Build the application context
//! 4. Bind the admin listener last, so traffic only arrives when ready
//!
//! Any startup error is fatal.

use std::path::Path;
use thiserror::Error;

use crate::clients::ClientError;
use crate::config::{loader, ConfigError, ManagerConfig};
use crate::http::AppContext;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("downstream client setup failed: {0}")]
    Clients(#[from] ClientError),

    #[error("cannot bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("metrics exporter failed: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("config watcher failed: {0}")]
    Watcher(#[from] notify::Error),

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Load configuration from `path` if given, otherwise defaults plus environment.
pub fn load_startup_config(path: Option<&Path>) -> Result<ManagerConfig, StartupError> {
    let config = match path {
        Some(path) => loader::load_config(path)?,
        None => loader::load_from_env()?,
    };
    Ok(config)
}

/// Build the application context from a validated configuration.
pub fn build_context(config: ManagerConfig) -> Result<AppContext, StartupError> {
    let context = AppContext::new(config)?;
    tracing::info!(
        services = ?context.clients().services(),
        "Application context ready"
    );
    Ok(context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_startup_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[services.tracking]\nbase_url = \"http://tracking.internal\"\ntimeout_ms = 800"
        )
        .unwrap();

        let config = load_startup_config(Some(file.path())).unwrap();
        let context = build_context(config).unwrap();
        assert_eq!(context.clients().services(), vec!["tracking"]);
    }

    #[test]
    fn test_invalid_file_is_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[breakers.defaults]\nfailure_rate_threshold = 0.0").unwrap();

        let err = load_startup_config(Some(file.path())).unwrap_err();
        assert!(matches!(err, StartupError::Config(ConfigError::Validation(_))));
    }
}
