//! Errors raised by guarded calls.

use thiserror::Error;

/// Outcome of a call that went through a circuit breaker and did not succeed.
///
/// `Open` means the operation was never invoked. `Operation` carries the
/// operation's own error, untouched.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The breaker rejected the call (open, or a probe is already in flight).
    #[error("circuit breaker '{name}' is open")]
    Open { name: String },

    /// The wrapped operation ran and failed.
    #[error(transparent)]
    Operation(E),
}

impl<E> BreakerError<E> {
    /// True if the call was rejected without invoking the operation.
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open { .. })
    }

    /// Unwrap the operation's error, if there is one.
    pub fn into_operation(self) -> Option<E> {
        match self {
            BreakerError::Operation(e) => Some(e),
            BreakerError::Open { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_is_distinguishable() {
        let open: BreakerError<std::io::Error> = BreakerError::Open {
            name: "routing.getOptimalRoute".into(),
        };
        assert!(open.is_open());
        assert_eq!(
            open.to_string(),
            "circuit breaker 'routing.getOptimalRoute' is open"
        );

        let op: BreakerError<std::io::Error> =
            BreakerError::Operation(std::io::Error::other("connection reset"));
        assert!(!op.is_open());
        assert_eq!(op.to_string(), "connection reset");
        assert!(op.into_operation().is_some());
    }
}
