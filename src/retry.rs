//! Retry with exponential backoff.
//!
//! [`RetryExecutor`] runs a fallible operation up to
//! [`RetryPolicy::max_attempts`] times. Between failed attempts it blocks for
//! `min(base_delay * 2^i, max_delay)`, where `i` is the 0-indexed attempt that
//! just failed. No delay follows a success or the final attempt. When every
//! attempt fails the last error is returned to the caller.

use std::fmt::Display;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::error::PolicyViolation;

/// Bounds for a retry loop. Construct with [`RetryPolicy::new`] so the
/// invariants hold for every policy an executor sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Rejects zero attempts and a `max_delay` below `base_delay`.
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
    ) -> Result<Self, PolicyViolation> {
        if max_attempts == 0 {
            return Err(PolicyViolation::ZeroAttempts);
        }
        if max_delay < base_delay {
            return Err(PolicyViolation::MaxDelayBelowBase {
                base_ms: base_delay.as_millis(),
                max_ms: max_delay.as_millis(),
            });
        }
        Ok(Self {
            max_attempts,
            base_delay,
            max_delay,
        })
    }

    /// Builds a policy from millisecond values, as read from config or the CLI.
    pub fn from_millis(
        max_attempts: u32,
        base_delay_ms: u64,
        max_delay_ms: u64,
    ) -> Result<Self, PolicyViolation> {
        Self::new(
            max_attempts,
            Duration::from_millis(base_delay_ms),
            Duration::from_millis(max_delay_ms),
        )
    }

    /// Total attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after the first failure.
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Upper bound on any single delay.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Delay to wait after the 0-indexed `attempt` has failed.
    /// delay = min(base_delay * 2^attempt, max_delay)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// Blocks the calling thread between attempts.
pub trait Sleeper {
    fn sleep(&self, delay: Duration);
}

/// Default [`Sleeper`] backed by [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, delay: Duration) {
        std::thread::sleep(delay);
    }
}

/// Runs operations under a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryExecutor<S = ThreadSleeper> {
    policy: RetryPolicy,
    sleeper: S,
}

impl RetryExecutor<ThreadSleeper> {
    /// Executor that sleeps on the calling thread.
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_sleeper(policy, ThreadSleeper)
    }
}

impl<S: Sleeper> RetryExecutor<S> {
    /// Executor with a custom [`Sleeper`], e.g. one that records delays.
    pub fn with_sleeper(policy: RetryPolicy, sleeper: S) -> Self {
        Self { policy, sleeper }
    }

    /// Policy this executor was built with.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Attempts `operation` until it succeeds or the policy is exhausted.
    ///
    /// Earlier failures are logged and dropped; only the last one is returned.
    pub fn execute<T, E, F>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        E: Display,
    {
        let max = self.policy.max_attempts;
        let mut attempt = 0;
        loop {
            info!(
                attempt = attempt + 1,
                max_attempts = max,
                "Attempt {} of {max}",
                attempt + 1
            );
            match operation() {
                Ok(value) => {
                    info!(attempt = attempt + 1, "Success on attempt {}", attempt + 1);
                    return Ok(value);
                }
                Err(err) => {
                    warn!(
                        attempt = attempt + 1,
                        error = %err,
                        "Attempt {} failed: {err}",
                        attempt + 1
                    );
                    if attempt + 1 >= max {
                        error!(max_attempts = max, "All {max} attempts failed");
                        return Err(err);
                    }
                    let delay = self.policy.delay_for_attempt(attempt);
                    info!(
                        delay_ms = delay.as_millis() as u64,
                        "Waiting {:.1} seconds before retry...",
                        delay.as_secs_f64()
                    );
                    self.sleeper.sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::test_support::{capture_events, messages_at};
    use std::cell::{Cell, RefCell};
    use tracing::Level;

    /// Records every requested delay instead of sleeping.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingSleeper {
        pub(crate) delays: RefCell<Vec<Duration>>,
    }

    impl Sleeper for &RecordingSleeper {
        fn sleep(&self, delay: Duration) {
            self.delays.borrow_mut().push(delay);
        }
    }

    fn policy(max_attempts: u32, base_secs: f64, max_secs: f64) -> RetryPolicy {
        RetryPolicy::new(
            max_attempts,
            Duration::from_secs_f64(base_secs),
            Duration::from_secs_f64(max_secs),
        )
        .unwrap()
    }

    #[test]
    fn default_policy_values() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_attempts(), 3);
        assert_eq!(p.base_delay(), Duration::from_secs(1));
        assert_eq!(p.max_delay(), Duration::from_secs(60));
    }

    #[test]
    fn policy_rejects_zero_attempts() {
        let err = RetryPolicy::from_millis(0, 100, 1000).unwrap_err();
        assert_eq!(err, PolicyViolation::ZeroAttempts);
    }

    #[test]
    fn policy_rejects_max_below_base() {
        let err = RetryPolicy::from_millis(3, 1000, 10).unwrap_err();
        assert!(matches!(err, PolicyViolation::MaxDelayBelowBase { .. }));
    }

    #[test]
    fn exponential_backoff_is_capped() {
        let p = policy(10, 1.0, 10.0);
        assert_eq!(p.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(p.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(p.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(p.delay_for_attempt(3), Duration::from_secs(8));
        assert_eq!(p.delay_for_attempt(4), Duration::from_secs(10));
        assert_eq!(p.delay_for_attempt(200), Duration::from_secs(10));
    }

    #[test]
    fn successful_first_attempt() {
        let sleeper = RecordingSleeper::default();
        let executor = RetryExecutor::with_sleeper(policy(3, 1.0, 60.0), &sleeper);
        let calls = Cell::new(0);

        let result: Result<&str, String> = executor.execute(|| {
            calls.set(calls.get() + 1);
            Ok("success")
        });

        assert_eq!(result.unwrap(), "success");
        assert_eq!(calls.get(), 1);
        assert!(sleeper.delays.borrow().is_empty());
    }

    #[test]
    fn success_after_retries() {
        let sleeper = RecordingSleeper::default();
        let executor = RetryExecutor::with_sleeper(policy(3, 1.0, 60.0), &sleeper);
        let calls = Cell::new(0);

        let result = executor.execute(|| {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(format!("failure {}", calls.get()))
            } else {
                Ok("success")
            }
        });

        assert_eq!(result.unwrap(), "success");
        assert_eq!(calls.get(), 3);
        assert_eq!(sleeper.delays.borrow().len(), 2);
    }

    #[test]
    fn all_attempts_fail_returns_last_error() {
        let sleeper = RecordingSleeper::default();
        let executor = RetryExecutor::with_sleeper(policy(4, 0.5, 60.0), &sleeper);
        let calls = Cell::new(0);

        let result: Result<(), String> = executor.execute(|| {
            calls.set(calls.get() + 1);
            Err(format!("failure {}", calls.get()))
        });

        assert_eq!(result.unwrap_err(), "failure 4");
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn always_failing_sleeps_one_then_two_seconds() {
        let sleeper = RecordingSleeper::default();
        let executor = RetryExecutor::with_sleeper(policy(3, 1.0, 60.0), &sleeper);

        let result: Result<(), &str> = executor.execute(|| Err("Always fails"));

        assert_eq!(result.unwrap_err(), "Always fails");
        assert_eq!(
            *sleeper.delays.borrow(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[test]
    fn delays_never_exceed_max_delay() {
        let sleeper = RecordingSleeper::default();
        let executor = RetryExecutor::with_sleeper(policy(4, 10.0, 15.0), &sleeper);

        let _: Result<(), &str> = executor.execute(|| Err("Always fails"));

        let delays = sleeper.delays.borrow();
        assert_eq!(
            *delays,
            vec![
                Duration::from_secs(10),
                Duration::from_secs(15),
                Duration::from_secs(15)
            ]
        );
    }

    #[test]
    fn single_attempt_never_sleeps() {
        let sleeper = RecordingSleeper::default();
        let executor = RetryExecutor::with_sleeper(policy(1, 1.0, 1.0), &sleeper);
        let calls = Cell::new(0);

        let result: Result<(), &str> = executor.execute(|| {
            calls.set(calls.get() + 1);
            Err("boom")
        });

        assert_eq!(result.unwrap_err(), "boom");
        assert_eq!(calls.get(), 1);
        assert!(sleeper.delays.borrow().is_empty());
    }

    #[test]
    fn zero_base_delay_retries_without_waiting() {
        let executor = RetryExecutor::new(RetryPolicy::from_millis(3, 0, 0).unwrap());
        let calls = Cell::new(0);

        let result: Result<u32, &str> = executor.execute(|| {
            calls.set(calls.get() + 1);
            if calls.get() == 2 { Ok(42) } else { Err("not yet") }
        });

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn every_attempt_and_the_exhaustion_are_logged() {
        let sleeper = RecordingSleeper::default();
        let executor = RetryExecutor::with_sleeper(policy(3, 1.0, 60.0), &sleeper);

        let (result, events) =
            capture_events(|| executor.execute(|| Err::<(), _>("Always fails")));

        assert!(result.is_err());
        let attempts: Vec<_> = messages_at(&events, Level::INFO)
            .into_iter()
            .filter(|m| m.starts_with("Attempt "))
            .collect();
        assert_eq!(attempts, vec!["Attempt 1 of 3", "Attempt 2 of 3", "Attempt 3 of 3"]);
        assert_eq!(messages_at(&events, Level::WARN).len(), 3);
        assert_eq!(messages_at(&events, Level::ERROR), vec!["All 3 attempts failed"]);
    }

    #[test]
    fn success_is_logged_without_warnings() {
        let sleeper = RecordingSleeper::default();
        let executor = RetryExecutor::with_sleeper(policy(3, 1.0, 60.0), &sleeper);

        let (_, events) = capture_events(|| executor.execute(|| Ok::<_, &str>(1)));

        assert!(messages_at(&events, Level::INFO).contains(&"Success on attempt 1"));
        assert!(messages_at(&events, Level::WARN).is_empty());
        assert!(messages_at(&events, Level::ERROR).is_empty());
    }
}
