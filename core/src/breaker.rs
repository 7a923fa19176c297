//! Consecutive-failure circuit breaker.
//!
//! Closed: every request is admitted. After `threshold` consecutive failures
//! the breaker opens and rejects requests without touching the network until
//! `open_duration` has passed since the last failure. It then admits a single
//! trial (half-open): success closes it, failure reopens it and restarts the
//! timer. A trial that never reports back is replaced after another
//! `open_duration`.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Point-in-time view of the breaker, for monitoring and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub failures: u32,
    pub last_failure: Option<Instant>,
}

#[derive(Debug, Clone)]
pub(crate) struct CircuitBreaker {
    threshold: u32,
    open_duration: Duration,
    failures: u32,
    last_failure: Option<Instant>,
    state: BreakerState,
    trial_started: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, open_duration: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            open_duration,
            failures: 0,
            last_failure: None,
            state: BreakerState::Closed,
            trial_started: None,
        }
    }

    /// Decide whether a request may proceed. `Err` carries the time left
    /// before the breaker will admit a trial.
    pub fn admit(&mut self, now: Instant) -> Result<(), Duration> {
        match self.state {
            BreakerState::Closed => Ok(()),
            BreakerState::Open => {
                let elapsed = self
                    .last_failure
                    .map_or(self.open_duration, |at| now.saturating_duration_since(at));
                if elapsed > self.open_duration {
                    tracing::info!(
                        elapsed_ms = elapsed.as_millis() as u64,
                        "circuit breaker half-open, admitting one trial"
                    );
                    self.state = BreakerState::HalfOpen;
                    self.trial_started = Some(now);
                    Ok(())
                } else {
                    Err(self.open_duration - elapsed)
                }
            }
            BreakerState::HalfOpen => {
                let waited = self
                    .trial_started
                    .map_or(self.open_duration, |at| now.saturating_duration_since(at));
                if waited > self.open_duration {
                    tracing::warn!("half-open trial never completed, admitting another");
                    self.trial_started = Some(now);
                    Ok(())
                } else {
                    Err(self.open_duration - waited)
                }
            }
        }
    }

    pub fn record_success(&mut self) {
        if self.state != BreakerState::Closed {
            tracing::info!(failures = self.failures, "circuit breaker closed");
        }
        self.failures = 0;
        self.state = BreakerState::Closed;
        self.trial_started = None;
    }

    pub fn record_failure(&mut self, now: Instant) {
        self.failures = self.failures.saturating_add(1);
        self.last_failure = Some(now);

        if self.state == BreakerState::HalfOpen || self.failures >= self.threshold {
            if self.state != BreakerState::Open {
                tracing::warn!(
                    failures = self.failures,
                    threshold = self.threshold,
                    open_ms = self.open_duration.as_millis() as u64,
                    "circuit breaker opened"
                );
            }
            self.state = BreakerState::Open;
            self.trial_started = None;
        } else {
            tracing::debug!(
                failures = self.failures,
                threshold = self.threshold,
                "circuit breaker failure recorded"
            );
        }
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        BreakerSnapshot {
            state: self.state,
            failures: self.failures,
            last_failure: self.last_failure,
        }
    }
}
