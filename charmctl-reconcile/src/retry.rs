//! Bounded exponential-backoff executor shared by deploy and convergence.
//!
//! One loop, parameterized by the operation, a retryability predicate, and a
//! per-failure notification. Cancellation is checked at the top of every
//! attempt and while sleeping; a cancelled loop leaves remote state as is.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use charmctl_core::RetrySettings;

use crate::error::ReconcileError;

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub multiplier: u32,
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// 1s initial delay, doubling, 30 attempts.
    pub const fn standard() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            multiplier: 2,
            max_attempts: 30,
        }
    }

    /// No delay between attempts; used by tests.
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            initial_delay: Duration::ZERO,
            multiplier: 2,
            max_attempts,
        }
    }

    /// Delay to wait after the given 1-based attempt failed.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self
            .multiplier
            .checked_pow(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            multiplier: settings.multiplier.max(1),
            max_attempts: settings.max_attempts.max(1),
        }
    }
}

// ---------------------------------------------------------------------------
// Cancellation and sleeping
// ---------------------------------------------------------------------------

/// Externally owned cancellation signal. Clones share one flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Blocks the calling thread between attempts.
pub trait Sleeper: Send + Sync {
    /// Sleep for `duration`, returning early once `cancel` fires.
    fn sleep(&self, duration: Duration, cancel: &CancelToken);
}

/// Real sleeper: wakes every `POLL` to observe cancellation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl ThreadSleeper {
    const POLL: Duration = Duration::from_millis(100);
}

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration, cancel: &CancelToken) {
        let deadline = Instant::now() + duration;
        while !cancel.is_cancelled() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep((deadline - now).min(Self::POLL));
        }
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Progress of one retry loop, handed to the operation and the notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    /// 1-based attempt number.
    pub attempt: u32,
    /// Delay before the next attempt if this one fails.
    pub next_delay: Duration,
}

/// Why a retry loop stopped without success.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The error was not retryable.
    Fatal(E),
    Exhausted { attempts: u32, last: E },
    Cancelled { attempts: u32 },
}

impl From<RetryError<ReconcileError>> for ReconcileError {
    fn from(err: RetryError<ReconcileError>) -> Self {
        match err {
            RetryError::Fatal(e) => e,
            RetryError::Exhausted { attempts, last } => ReconcileError::RetryExhausted {
                attempts,
                source: Box::new(last),
            },
            RetryError::Cancelled { attempts } => ReconcileError::Cancelled { attempts },
        }
    }
}

/// Retry executor: policy + cancellation + sleeper.
#[derive(Clone)]
pub struct Retrier {
    policy: RetryPolicy,
    cancel: CancelToken,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for Retrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retrier")
            .field("policy", &self.policy)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl Default for Retrier {
    fn default() -> Self {
        Self::new(RetryPolicy::standard(), CancelToken::new())
    }
}

impl Retrier {
    pub fn new(policy: RetryPolicy, cancel: CancelToken) -> Self {
        Self {
            policy,
            cancel,
            sleeper: Arc::new(ThreadSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, the
    /// attempt budget runs out, or the token is cancelled.
    pub fn call<T, E, Op, IsRetryable, OnAttempt>(
        &self,
        mut op: Op,
        is_retryable: IsRetryable,
        mut on_attempt: OnAttempt,
    ) -> Result<T, RetryError<E>>
    where
        Op: FnMut(&RetryState) -> Result<T, E>,
        IsRetryable: Fn(&E) -> bool,
        OnAttempt: FnMut(&E, &RetryState),
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            if self.cancel.is_cancelled() {
                return Err(RetryError::Cancelled {
                    attempts: attempt - 1,
                });
            }
            let state = RetryState {
                attempt,
                next_delay: self.policy.delay_after(attempt),
            };
            let err = match op(&state) {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if !is_retryable(&err) {
                return Err(RetryError::Fatal(err));
            }
            on_attempt(&err, &state);
            if attempt >= max_attempts {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: err,
                });
            }
            self.sleeper.sleep(state.next_delay, &self.cancel);
            attempt += 1;
        }
    }
}
