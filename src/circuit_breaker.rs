//! Per-source circuit breaker: CLOSED -> OPEN -> HALF_OPEN -> CLOSED.
//!
//! State lives behind a `Mutex` since the engine shares one breaker
//! per source across every concurrent fan-out task.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::BreakerSettings;
use crate::domain::SourceID;
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub failure_count: u32,
    pub last_failure_at: Option<Instant>,
    pub last_success_at: Option<Instant>,
}

struct Inner {
    state: BreakerState,
    failure_count: u32,
    opened_at: Option<Instant>,
    last_failure_at: Option<Instant>,
    last_success_at: Option<Instant>,
}

/// Guards calls to a single upstream source.
pub struct CircuitBreaker {
    settings: BreakerSettings,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(settings: BreakerSettings) -> Self {
        Self {
            settings,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                failure_count: 0,
                opened_at: None,
                last_failure_at: None,
                last_success_at: None,
            }),
        }
    }

    /// Call before attempting a request. Transitions OPEN -> HALF_OPEN
    /// once `recovery_timeout` has elapsed; otherwise rejects the call.
    pub fn allow_request(&self, source: SourceID) -> Result<(), Error> {
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");
        match inner.state {
            BreakerState::Closed | BreakerState::HalfOpen => Ok(()),
            BreakerState::Open => {
                let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or(Duration::MAX);
                if elapsed >= self.settings.recovery_timeout {
                    info!(%source, "circuit breaker entering half-open probe");
                    inner.state = BreakerState::HalfOpen;
                    Ok(())
                } else {
                    Err(Error::BreakerOpen {
                        source: source.to_string(),
                    })
                }
            }
        }
    }

    pub fn record_success(&self, source: SourceID) {
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");
        if inner.state != BreakerState::Closed {
            info!(%source, "circuit breaker closing after successful probe");
        }
        inner.state = BreakerState::Closed;
        inner.failure_count = 0;
        inner.opened_at = None;
        inner.last_success_at = Some(Instant::now());
    }

    pub fn record_failure(&self, source: SourceID) {
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");
        inner.failure_count += 1;
        inner.last_failure_at = Some(Instant::now());
        if inner.state == BreakerState::HalfOpen || inner.failure_count >= self.settings.failure_threshold
        {
            if inner.state != BreakerState::Open {
                warn!(%source, failures = inner.failure_count, "circuit breaker opening");
            }
            inner.state = BreakerState::Open;
            inner.opened_at = Some(Instant::now());
        }
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock().expect("breaker mutex poisoned");
        BreakerSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            last_failure_at: inner.last_failure_at,
            last_success_at: inner.last_success_at,
        }
    }

    pub fn reset(&self) {
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");
        inner.state = BreakerState::Closed;
        inner.failure_count = 0;
        inner.opened_at = None;
    }
}

/// One breaker per active source, built once at engine construction.
pub struct CircuitBreakerRegistry {
    breakers: HashMap<SourceID, Arc<CircuitBreaker>>,
}

impl CircuitBreakerRegistry {
    pub fn new(settings: impl Fn(SourceID) -> BreakerSettings, sources: &[SourceID]) -> Self {
        let breakers = sources
            .iter()
            .map(|&s| (s, Arc::new(CircuitBreaker::new(settings(s)))))
            .collect();
        Self { breakers }
    }

    pub fn get(&self, source: SourceID) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(&source).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn settings() -> BreakerSettings {
        BreakerSettings {
            failure_threshold: 2,
            recovery_timeout: Duration::from_millis(20),
        }
    }

    #[test]
    fn opens_after_threshold_failures() {
        let cb = CircuitBreaker::new(settings());
        cb.allow_request(SourceID::WindyGfs).unwrap();
        cb.record_failure(SourceID::WindyGfs);
        cb.allow_request(SourceID::WindyGfs).unwrap();
        cb.record_failure(SourceID::WindyGfs);
        assert!(cb.allow_request(SourceID::WindyGfs).is_err());
    }

    #[test]
    fn half_opens_after_recovery_timeout_then_closes_on_success() {
        let cb = CircuitBreaker::new(settings());
        cb.record_failure(SourceID::WindyGfs);
        cb.record_failure(SourceID::WindyGfs);
        assert!(cb.allow_request(SourceID::WindyGfs).is_err());
        std::thread::sleep(Duration::from_millis(25));
        assert!(cb.allow_request(SourceID::WindyGfs).is_ok());
        cb.record_success(SourceID::WindyGfs);
        assert_eq!(cb.snapshot().state, BreakerState::Closed);
    }

    #[test]
    fn half_open_failure_reopens_immediately() {
        let cb = CircuitBreaker::new(settings());
        cb.record_failure(SourceID::WindyGfs);
        cb.record_failure(SourceID::WindyGfs);
        std::thread::sleep(Duration::from_millis(25));
        cb.allow_request(SourceID::WindyGfs).unwrap();
        cb.record_failure(SourceID::WindyGfs);
        assert!(cb.allow_request(SourceID::WindyGfs).is_err());
    }
}
