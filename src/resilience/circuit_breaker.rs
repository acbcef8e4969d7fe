//! Circuit breaker for downstream service protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: downstream assumed down, calls fail fast
//! - Half-Open: testing if downstream recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= failure_threshold,
//!                or failure rate >= failure_rate_threshold once minimum_calls
//!                outcomes sit in the rolling window
//! Open → Half-Open: first call after reset_timeout (checked lazily, no timers)
//! Half-Open → Closed: half_open_success_threshold consecutive probe successes
//! Half-Open → Open: any probe failure
//! ```
//!
//! # Design Decisions
//! - One breaker per operation name, owned by the registry
//! - State lives behind a mutex that is never held across an await
//! - Single probe in Half-Open; concurrent callers are rejected as if open
//! - Every transition bumps a generation; outcomes admitted under an older
//!   generation are counted in the totals but never drive a transition

use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime};

use crate::config::BreakerSettings;
use crate::resilience::error::BreakerError;
use crate::resilience::events::{BreakerEvent, BreakerListener};

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        };
        f.write_str(s)
    }
}

/// Read-only view of a breaker, for admin tooling and tests.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub total_calls: u64,
    pub total_failures: u64,
    pub total_rejections: u64,
    /// Failure percentage over the current rolling window.
    pub window_failure_rate: f64,
    pub window_calls: usize,
    /// Milliseconds since the breaker last opened, while open or half-open.
    pub open_for_ms: Option<u64>,
    pub last_failure_ms_ago: Option<u64>,
    pub settings: BreakerSettings,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    generation: u64,
    failure_count: u32,
    success_count: u32,
    probe_in_flight: bool,
    opened_at: Option<Instant>,
    last_failure_at: Option<Instant>,
    /// (completed at, failed) for outcomes recorded while closed.
    window: VecDeque<(Instant, bool)>,
    total_calls: u64,
    total_failures: u64,
    total_rejections: u64,
}

impl Inner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            generation: 0,
            failure_count: 0,
            success_count: 0,
            probe_in_flight: false,
            opened_at: None,
            last_failure_at: None,
            window: VecDeque::new(),
            total_calls: 0,
            total_failures: 0,
            total_rejections: 0,
        }
    }

    fn transition(&mut self, to: CircuitState, now: Instant) {
        self.state = to;
        self.generation = self.generation.wrapping_add(1);
        self.failure_count = 0;
        self.success_count = 0;
        self.probe_in_flight = false;
        self.window.clear();
        match to {
            CircuitState::Open => self.opened_at = Some(now),
            CircuitState::Closed => self.opened_at = None,
            CircuitState::HalfOpen => {}
        }
    }

    fn prune_window(&mut self, now: Instant, window: Duration) {
        while let Some((at, _)) = self.window.front() {
            if now.duration_since(*at) > window {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }

    fn window_failure_rate(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        let failures = self.window.iter().filter(|(_, failed)| *failed).count();
        failures as f64 * 100.0 / self.window.len() as f64
    }
}

/// Admission ticket for one invocation of the guarded operation.
///
/// Dropping a probe permit without recording an outcome (the caller's future
/// was cancelled) frees the probe slot so the next caller can probe.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    probe: bool,
    recorded: bool,
}

impl Permit<'_> {
    fn record(mut self, failed: bool) {
        self.recorded = true;
        self.breaker.record(self.generation, self.probe, failed);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.probe && !self.recorded {
            self.breaker.release_probe(self.generation);
        }
    }
}

/// A single-resource state machine guarding one named operation.
pub struct CircuitBreaker {
    name: String,
    settings: BreakerSettings,
    inner: Mutex<Inner>,
    listeners: Vec<Arc<dyn BreakerListener>>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("settings", &self.settings)
            .field("state", &self.state())
            .finish()
    }
}

impl CircuitBreaker {
    /// Breakers are built by the registry only.
    pub(crate) fn new(
        name: impl Into<String>,
        settings: BreakerSettings,
        listeners: Vec<Arc<dyn BreakerListener>>,
    ) -> Self {
        Self {
            name: name.into(),
            settings,
            inner: Mutex::new(Inner::new()),
            listeners,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &BreakerSettings {
        &self.settings
    }

    /// Current stored state. Reading never moves an open breaker to half-open;
    /// only the next `fire` does.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Run `operation` under the breaker.
    ///
    /// Returns `BreakerError::Open` without invoking the operation when the
    /// breaker is open (or a probe is already in flight), otherwise the
    /// operation's own result with its error wrapped in `BreakerError::Operation`.
    pub async fn fire<T, E, F, Fut>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = match self.admit() {
            Some(permit) => permit,
            None => {
                return Err(BreakerError::Open {
                    name: self.name.clone(),
                })
            }
        };

        let result = operation().await;
        permit.record(result.is_err());
        result.map_err(BreakerError::Operation)
    }

    /// Force the breaker back to CLOSED with zeroed counters.
    ///
    /// Returns true if the breaker was not already closed.
    pub fn reset(&self) -> bool {
        let mut inner = self.lock();
        let changed = inner.state != CircuitState::Closed;
        inner.transition(CircuitState::Closed, Instant::now());
        if changed {
            self.emit(BreakerEvent::Reset);
        }
        changed
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let now = Instant::now();
        let mut inner = self.lock();
        inner.prune_window(now, self.settings.rolling_window());

        BreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            total_calls: inner.total_calls,
            total_failures: inner.total_failures,
            total_rejections: inner.total_rejections,
            window_failure_rate: inner.window_failure_rate(),
            window_calls: inner.window.len(),
            open_for_ms: inner
                .opened_at
                .map(|at| now.duration_since(at).as_millis() as u64),
            last_failure_ms_ago: inner
                .last_failure_at
                .map(|at| now.duration_since(at).as_millis() as u64),
            settings: self.settings.clone(),
        }
    }

    /// Report an event that happened outside the state machine (fallbacks).
    pub(crate) fn notify(&self, event: BreakerEvent) {
        let _inner = self.lock();
        self.emit(event);
    }

    fn admit(&self) -> Option<Permit<'_>> {
        let now = Instant::now();

        let permit = {
            let mut inner = self.lock();
            match inner.state {
                CircuitState::Closed => Some((inner.generation, false)),
                CircuitState::Open => {
                    let expired = inner
                        .opened_at
                        .map(|at| now.duration_since(at) >= self.settings.reset_timeout())
                        .unwrap_or(true);
                    if expired {
                        inner.transition(CircuitState::HalfOpen, now);
                        inner.probe_in_flight = true;
                        self.emit(BreakerEvent::HalfOpen);
                        Some((inner.generation, true))
                    } else {
                        inner.total_rejections += 1;
                        None
                    }
                }
                CircuitState::HalfOpen => {
                    if inner.probe_in_flight {
                        inner.total_rejections += 1;
                        None
                    } else {
                        inner.probe_in_flight = true;
                        Some((inner.generation, true))
                    }
                }
            }
        };

        permit.map(|(generation, probe)| Permit {
            breaker: self,
            generation,
            probe,
            recorded: false,
        })
    }

    fn record(&self, generation: u64, probe: bool, failed: bool) {
        let now = Instant::now();
        let mut event = None;

        let mut inner = self.lock();
        inner.total_calls += 1;
        if failed {
            inner.total_failures += 1;
            inner.last_failure_at = Some(now);
        }

        if inner.generation != generation {
            tracing::trace!(breaker = %self.name, "Discarding outcome from a previous breaker state");
            return;
        }

        if probe {
            inner.probe_in_flight = false;
        }

        match inner.state {
            CircuitState::Closed => {
                inner.window.push_back((now, failed));
                inner.prune_window(now, self.settings.rolling_window());

                if failed {
                    inner.failure_count += 1;
                    let count_tripped = inner.failure_count >= self.settings.failure_threshold;
                    let rate_tripped = inner.window.len() >= self.settings.minimum_calls as usize
                        && inner.window_failure_rate() >= self.settings.failure_rate_threshold;

                    if count_tripped || rate_tripped {
                        tracing::debug!(
                            breaker = %self.name,
                            failures = inner.failure_count,
                            failure_rate = inner.window_failure_rate(),
                            "Failure threshold crossed"
                        );
                        inner.transition(CircuitState::Open, now);
                        event = Some(BreakerEvent::Open);
                    }
                } else {
                    inner.failure_count = 0;
                }
            }
            CircuitState::HalfOpen => {
                if failed {
                    inner.transition(CircuitState::Open, now);
                    event = Some(BreakerEvent::Open);
                } else {
                    inner.success_count += 1;
                    if inner.success_count >= self.settings.half_open_success_threshold {
                        inner.transition(CircuitState::Closed, now);
                        event = Some(BreakerEvent::Close);
                    }
                }
            }
            // Open admits nothing under its own generation.
            CircuitState::Open => {}
        }

        if let Some(event) = event {
            self.emit(event);
        }
    }

    fn release_probe(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.generation == generation && inner.state == CircuitState::HalfOpen {
            tracing::debug!(breaker = %self.name, "Probe abandoned before completion");
            inner.probe_in_flight = false;
        }
    }

    /// Callers hold the state lock, so listeners see events in transition order.
    fn emit(&self, event: BreakerEvent) {
        let at = SystemTime::now();
        for listener in &self.listeners {
            listener.on_event(&self.name, event, at);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
