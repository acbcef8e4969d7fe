//! Breaker event notification.
//!
//! Breakers never log on their own. Every state transition, every fallback
//! served by the executor and every administrative reset is reported to the
//! listeners the registry attached at construction time.

use serde::Serialize;
use std::fmt;
use std::time::SystemTime;
use tokio::sync::broadcast;

use crate::observability::metrics;
use crate::resilience::circuit_breaker::CircuitState;

/// Something that happened to a named breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerEvent {
    /// Tripped (from CLOSED or from a failed probe).
    Open,
    /// Reset timeout elapsed; the next call is a probe.
    HalfOpen,
    /// Probes succeeded; normal traffic resumes.
    Close,
    /// A caller received its fallback value because the circuit was open.
    Fallback,
    /// An administrative reset forced the breaker back to CLOSED.
    Reset,
}

impl BreakerEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerEvent::Open => "open",
            BreakerEvent::HalfOpen => "half_open",
            BreakerEvent::Close => "close",
            BreakerEvent::Fallback => "fallback",
            BreakerEvent::Reset => "reset",
        }
    }

    /// The state a breaker is in right after this event, if it is a transition.
    pub fn resulting_state(&self) -> Option<CircuitState> {
        match self {
            BreakerEvent::Open => Some(CircuitState::Open),
            BreakerEvent::HalfOpen => Some(CircuitState::HalfOpen),
            BreakerEvent::Close | BreakerEvent::Reset => Some(CircuitState::Closed),
            BreakerEvent::Fallback => None,
        }
    }
}

impl fmt::Display for BreakerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observer of breaker events.
///
/// Called synchronously while the breaker holds its state lock, so events
/// arrive in the order the transitions happened. Implementations must not call
/// back into the breaker and should not block.
pub trait BreakerListener: Send + Sync {
    fn on_event(&self, breaker: &str, event: BreakerEvent, at: SystemTime);
}

/// Writes breaker events to the tracing subscriber and the metrics recorder.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingListener;

impl BreakerListener for TracingListener {
    fn on_event(&self, breaker: &str, event: BreakerEvent, at: SystemTime) {
        match event {
            BreakerEvent::Open => {
                tracing::warn!(breaker = %breaker, event = %event, at = ?at, "Circuit breaker opened, failing fast");
            }
            BreakerEvent::HalfOpen => {
                tracing::info!(breaker = %breaker, event = %event, at = ?at, "Circuit breaker half-open, admitting probe");
            }
            BreakerEvent::Close => {
                tracing::info!(breaker = %breaker, event = %event, at = ?at, "Circuit breaker closed, downstream recovered");
            }
            BreakerEvent::Reset => {
                tracing::info!(breaker = %breaker, event = %event, at = ?at, "Circuit breaker reset by administrator");
            }
            // The executor already logs every fallback it serves.
            BreakerEvent::Fallback => {}
        }

        match event.resulting_state() {
            Some(state) => metrics::record_transition(breaker, state),
            None => metrics::record_fallback(breaker),
        }
    }
}

/// A breaker event as delivered through a channel.
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    pub breaker: String,
    pub event: BreakerEvent,
    #[serde(skip)]
    pub at: SystemTime,
}

/// Fans breaker events out over a tokio broadcast channel.
///
/// Slow subscribers lag and lose the oldest events; the breaker is never
/// blocked by them.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: broadcast::Sender<EventRecord>,
}

impl ChannelListener {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.tx.subscribe()
    }
}

impl BreakerListener for ChannelListener {
    fn on_event(&self, breaker: &str, event: BreakerEvent, at: SystemTime) {
        // No subscribers is fine.
        let _ = self.tx.send(EventRecord {
            breaker: breaker.to_string(),
            event,
            at,
        });
    }
}
