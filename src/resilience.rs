//! Retry with backoff under a per-operation circuit breaker
//!
//! Every object-store and queue call goes through [`Resilience::call`]. The
//! circuit is consulted once per call; retries happen underneath it, while
//! the circuit is closed or during the single half-open trial. One call
//! records exactly one outcome on its circuit.

use rand::Rng;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::{BoundaryError, ResilienceError};

/// Boundary operation classes; each has its own circuit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationClass {
    Fetch,
    Delete,
    Publish,
}

impl OperationClass {
    pub const ALL: [Self; 3] = [Self::Fetch, Self::Delete, Self::Publish];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Delete => "delete",
            Self::Publish => "publish",
        }
    }
}

impl fmt::Display for OperationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delay growth between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed,
    Exponential,
    /// Exponential plus 10-50% random spread
    ExponentialJitter,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown backoff strategy: {0}")]
pub struct ParseBackoffError(String);

impl FromStr for Backoff {
    type Err = ParseBackoffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "exponential" => Ok(Self::Exponential),
            "exponential_jitter" | "jitter" => Ok(Self::ExponentialJitter),
            other => Err(ParseBackoffError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff: Backoff::ExponentialJitter,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after `attempt` failed attempts (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponential = || {
            let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
            self.base_delay.saturating_mul(factor)
        };

        let delay = match self.backoff {
            Backoff::Fixed => self.base_delay,
            Backoff::Exponential => exponential(),
            Backoff::ExponentialJitter => {
                let base = exponential();
                let spread = rand::thread_rng().gen_range(0.1..=0.5);
                base.saturating_add(base.mul_f64(spread))
            }
        };

        delay.min(self.max_delay)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitPolicy {
    /// Consecutive failed calls that open the circuit
    pub failure_threshold: u32,
    /// Time spent open before a trial call is let through
    pub cooldown: Duration,
}

impl Default for CircuitPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

/// Circuit breaker for one operation class.
///
/// State lives behind a mutex so concurrent outcomes are each counted once
/// and a transition is visible to the next caller immediately.
#[derive(Debug)]
pub struct CircuitBreaker {
    operation: OperationClass,
    policy: CircuitPolicy,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    #[must_use]
    pub const fn new(operation: OperationClass, policy: CircuitPolicy) -> Self {
        Self {
            operation,
            policy,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trial_in_flight: false,
            }),
        }
    }

    // A panic while holding the lock leaves the counters consistent, so a
    // poisoned mutex is still usable.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    /// Ask to make a call now. `None` means the call must not be attempted.
    #[must_use]
    pub fn try_acquire(&self) -> Option<Permit<'_>> {
        self.try_acquire_at(Instant::now())
    }

    #[must_use]
    pub fn try_acquire_at(&self, now: Instant) -> Option<Permit<'_>> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => Some(Permit::new(self, false)),
            CircuitState::Open => {
                let cooled = inner
                    .opened_at
                    .is_some_and(|at| now.saturating_duration_since(at) >= self.policy.cooldown);
                if !cooled {
                    return None;
                }
                inner.state = CircuitState::HalfOpen;
                inner.trial_in_flight = true;
                info!(operation = %self.operation, "Circuit half-open, allowing trial call");
                Some(Permit::new(self, true))
            }
            CircuitState::HalfOpen if inner.trial_in_flight => None,
            CircuitState::HalfOpen => {
                inner.trial_in_flight = true;
                Some(Permit::new(self, true))
            }
        }
    }

    fn record_success(&self, trial: bool) {
        let mut inner = self.lock();
        if trial {
            inner.state = CircuitState::Closed;
            inner.consecutive_failures = 0;
            inner.opened_at = None;
            inner.trial_in_flight = false;
            info!(operation = %self.operation, "Circuit closed after successful trial");
        } else if inner.state == CircuitState::Closed {
            inner.consecutive_failures = 0;
        }
    }

    fn record_failure(&self, trial: bool, now: Instant) {
        let mut inner = self.lock();
        if trial {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(now);
            inner.trial_in_flight = false;
            warn!(operation = %self.operation, "Trial call failed, circuit re-opened");
            return;
        }
        if inner.state != CircuitState::Closed {
            return;
        }

        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        if inner.consecutive_failures >= self.policy.failure_threshold {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(now);
            warn!(
                operation = %self.operation,
                failures = inner.consecutive_failures,
                cooldown_ms = u64::try_from(self.policy.cooldown.as_millis()).unwrap_or(u64::MAX),
                "Circuit opened"
            );
        }
    }

    fn release_trial(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.trial_in_flight = false;
        }
    }
}

/// Right to make one call. Settle it with [`Permit::succeed`] or
/// [`Permit::fail`]; dropping an unsettled trial permit frees the trial slot.
#[must_use]
#[derive(Debug)]
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl<'a> Permit<'a> {
    const fn new(breaker: &'a CircuitBreaker, trial: bool) -> Self {
        Self {
            breaker,
            trial,
            settled: false,
        }
    }

    #[must_use]
    pub const fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn succeed(mut self) {
        self.settled = true;
        self.breaker.record_success(self.trial);
    }

    pub fn fail(self) {
        self.fail_at(Instant::now());
    }

    pub fn fail_at(mut self, now: Instant) {
        self.settled = true;
        self.breaker.record_failure(self.trial, now);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            self.breaker.release_trial();
        }
    }
}

/// Retry policy plus one circuit per operation class
#[derive(Debug)]
pub struct Resilience {
    retry: RetryPolicy,
    fetch: CircuitBreaker,
    delete: CircuitBreaker,
    publish: CircuitBreaker,
}

impl Default for Resilience {
    fn default() -> Self {
        Self::new(RetryPolicy::default(), CircuitPolicy::default())
    }
}

impl Resilience {
    #[must_use]
    pub const fn new(retry: RetryPolicy, circuit: CircuitPolicy) -> Self {
        Self {
            retry,
            fetch: CircuitBreaker::new(OperationClass::Fetch, circuit),
            delete: CircuitBreaker::new(OperationClass::Delete, circuit),
            publish: CircuitBreaker::new(OperationClass::Publish, circuit),
        }
    }

    #[must_use]
    pub const fn breaker(&self, operation: OperationClass) -> &CircuitBreaker {
        match operation {
            OperationClass::Fetch => &self.fetch,
            OperationClass::Delete => &self.delete,
            OperationClass::Publish => &self.publish,
        }
    }

    #[must_use]
    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Run `attempt` under the operation's circuit, retrying transient errors.
    pub async fn call<T, F, Fut>(
        &self,
        operation: OperationClass,
        attempt: F,
    ) -> Result<T, ResilienceError>
    where
        T: Send,
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, BoundaryError>> + Send,
    {
        self.call_classified(operation, BoundaryError::is_retriable, attempt)
            .await
    }

    /// Like [`Resilience::call`], with the caller deciding which errors may be
    /// retried. Errors it refuses end the call at once as
    /// [`ResilienceError::Rejected`] and do not count against the circuit.
    pub async fn call_classified<T, F, Fut, C>(
        &self,
        operation: OperationClass,
        is_retriable: C,
        mut attempt: F,
    ) -> Result<T, ResilienceError>
    where
        T: Send,
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, BoundaryError>> + Send,
        C: Fn(&BoundaryError) -> bool + Send + Sync,
    {
        let Some(permit) = self.breaker(operation).try_acquire() else {
            debug!(%operation, "Circuit open, call short-circuited");
            return Err(ResilienceError::CircuitOpen { operation });
        };

        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempts = 0;
        loop {
            attempts += 1;
            match attempt().await {
                Ok(value) => {
                    permit.succeed();
                    return Ok(value);
                }
                Err(error) if !is_retriable(&error) => {
                    permit.succeed();
                    warn!(%operation, %error, "Call rejected, not retrying");
                    return Err(ResilienceError::Rejected {
                        operation,
                        source: error,
                    });
                }
                Err(error) if attempts >= max_attempts => {
                    permit.fail();
                    warn!(%operation, attempts, %error, "Retries exhausted");
                    return Err(ResilienceError::RetriesExhausted {
                        operation,
                        attempts,
                        last: error,
                    });
                }
                Err(error) => {
                    let delay = self.retry.delay_for(attempts);
                    debug!(
                        %operation,
                        attempts,
                        %error,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
