//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds > 0, rates within 0-100, durations > 0)
//! - Check that service endpoints and bind addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ManagerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::{BreakerOverride, BreakerSettings, ManagerConfig};

/// One semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    NotPositive { field: String },

    #[error("{field} must be within (0, 100], got {value}")]
    RateOutOfRange { field: String, value: f64 },

    #[error("{field} is not a valid socket address: {value}")]
    BadAddress { field: String, value: String },

    #[error("services.{service}.base_url is not a valid URL: {reason}")]
    BadUrl { service: String, reason: String },

    #[error("service type '{0}' must not contain '.'")]
    DottedServiceType(String),
}

/// Validate a loaded configuration, collecting every violation.
pub fn validate_config(config: &ManagerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.admin.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BadAddress {
            field: "admin.bind_address".into(),
            value: config.admin.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::BadAddress {
            field: "observability.metrics_address".into(),
            value: config.observability.metrics_address.clone(),
        });
    }

    check_settings("breakers.defaults", &config.breakers.defaults, &mut errors);

    for (service, layer) in &config.breakers.services {
        if service.contains('.') {
            errors.push(ValidationError::DottedServiceType(service.clone()));
        }
        check_override(&format!("breakers.services.{}", service), layer, &mut errors);
    }

    for (service, endpoint) in &config.services {
        if service.contains('.') {
            errors.push(ValidationError::DottedServiceType(service.clone()));
        }
        if let Err(e) = Url::parse(&endpoint.base_url) {
            errors.push(ValidationError::BadUrl {
                service: service.clone(),
                reason: e.to_string(),
            });
        }
        if endpoint.timeout_ms == 0 {
            errors.push(ValidationError::NotPositive {
                field: format!("services.{}.timeout_ms", service),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate fully merged settings, such as those built from a caller override.
pub fn validate_settings(settings: &BreakerSettings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    check_settings("settings", settings, &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_settings(prefix: &str, s: &BreakerSettings, errors: &mut Vec<ValidationError>) {
    positive(prefix, "failure_threshold", s.failure_threshold as u64, errors);
    rate(prefix, s.failure_rate_threshold, errors);
    positive(prefix, "reset_timeout_ms", s.reset_timeout_ms, errors);
    positive(prefix, "half_open_success_threshold", s.half_open_success_threshold as u64, errors);
    positive(prefix, "rolling_window_ms", s.rolling_window_ms, errors);
    positive(prefix, "minimum_calls", s.minimum_calls as u64, errors);
}

fn check_override(prefix: &str, o: &BreakerOverride, errors: &mut Vec<ValidationError>) {
    if let Some(v) = o.failure_threshold {
        positive(prefix, "failure_threshold", v as u64, errors);
    }
    if let Some(v) = o.failure_rate_threshold {
        rate(prefix, v, errors);
    }
    if let Some(v) = o.reset_timeout_ms {
        positive(prefix, "reset_timeout_ms", v, errors);
    }
    if let Some(v) = o.half_open_success_threshold {
        positive(prefix, "half_open_success_threshold", v as u64, errors);
    }
    if let Some(v) = o.rolling_window_ms {
        positive(prefix, "rolling_window_ms", v, errors);
    }
    if let Some(v) = o.minimum_calls {
        positive(prefix, "minimum_calls", v as u64, errors);
    }
}

fn positive(prefix: &str, name: &str, value: u64, errors: &mut Vec<ValidationError>) {
    if value == 0 {
        errors.push(ValidationError::NotPositive {
            field: format!("{}.{}", prefix, name),
        });
    }
}

fn rate(prefix: &str, value: f64, errors: &mut Vec<ValidationError>) {
    if !(value > 0.0 && value <= 100.0) {
        errors.push(ValidationError::RateOutOfRange {
            field: format!("{}.failure_rate_threshold", prefix),
            value,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ServiceEndpoint;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ManagerConfig::default()).is_ok());
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = ManagerConfig::default();
        config.breakers.defaults.failure_threshold = 0;
        config.breakers.defaults.failure_rate_threshold = 150.0;
        config.breakers.services.insert(
            "payout".into(),
            BreakerOverride {
                reset_timeout_ms: Some(0),
                ..BreakerOverride::default()
            },
        );
        config.services.insert(
            "routing".into(),
            ServiceEndpoint {
                base_url: "not a url".into(),
                timeout_ms: 100,
            },
        );

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::NotPositive {
            field: "breakers.defaults.failure_threshold".into()
        }));
        assert!(errors.contains(&ValidationError::NotPositive {
            field: "breakers.services.payout.reset_timeout_ms".into()
        }));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::RateOutOfRange { value, .. } if *value == 150.0)));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::BadUrl { service, .. } if service == "routing")));
    }

    #[test]
    fn test_dotted_service_type_rejected() {
        let mut config = ManagerConfig::default();
        config
            .breakers
            .services
            .insert("routing.v2".into(), BreakerOverride::default());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::DottedServiceType("routing.v2".into())]);
    }

    #[test]
    fn test_bad_bind_address() {
        let mut config = ManagerConfig::default();
        config.admin.bind_address = "localhost".into();
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::BadAddress { .. }));
    }
}
