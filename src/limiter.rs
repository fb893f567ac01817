//! Permit-per-period rate limiter
//!
//! The limiter grants a fixed number of permits per refresh period,
//! independent of call outcome. Refill is lazy: the cycle boundary is
//! reconciled on every acquire, so no background timer runs. Skipped periods
//! never accumulate permits; however long the limiter sat idle, one refresh
//! restores exactly `limit_for_period` permits.

use crate::errors::{CallError, RequestNotPermittedError};
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Permits granted per refresh period
    pub limit_for_period: usize,
    /// Length of one refresh period
    pub limit_refresh_period: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            limit_for_period: 50,
            limit_refresh_period: Duration::from_secs(1),
        }
    }
}

/// Mutable bucket state, guarded by the limiter's mutex
#[derive(Debug)]
struct BucketState {
    /// Permits left in the current period, never exceeds `limit_for_period`
    available: usize,
    /// Start of the current period
    cycle_start: Instant,
}

/// Admission controller capping the call rate per refresh period.
///
/// Denial is a value, not an error: [`try_acquire`] answers `false` and
/// leaves the reaction to the caller. The [`call`] decorators translate a
/// denial into [`RequestNotPermittedError`] without running the work.
///
/// [`try_acquire`]: RateLimiter::try_acquire
/// [`call`]: RateLimiter::call
#[derive(Debug)]
pub struct RateLimiter {
    name: String,
    config: RateLimiterConfig,
    state: Mutex<BucketState>,
}

impl RateLimiter {
    /// Create a new rate limiter.
    ///
    /// # Panics
    ///
    /// Panics if `limit_for_period` is 0 or the refresh period is zero.
    pub fn new(name: impl Into<String>, config: RateLimiterConfig) -> Self {
        assert!(
            config.limit_for_period > 0,
            "Permit limit must be greater than 0"
        );
        assert!(
            !config.limit_refresh_period.is_zero(),
            "Refresh period must be greater than zero"
        );

        let state = BucketState {
            available: config.limit_for_period,
            cycle_start: Instant::now(),
        };

        Self {
            name: name.into(),
            config,
            state: Mutex::new(state),
        }
    }

    /// Create a new rate limiter builder
    pub fn builder(name: impl Into<String>) -> crate::builder::RateLimiterBuilder {
        crate::builder::RateLimiterBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Try to acquire one permit, waiting at most `max_wait`.
    ///
    /// A zero `max_wait` never suspends. Otherwise, when no permit is left,
    /// the calling thread sleeps until the next cycle boundary or until
    /// `max_wait` elapses (whichever comes first) and retries exactly once.
    /// Timing out resolves to `false`, never to an error.
    pub fn try_acquire(&self, max_wait: Duration) -> bool {
        if self.acquire_once() {
            return true;
        }
        if max_wait.is_zero() {
            debug!(limiter = %self.name, "permit denied");
            return false;
        }

        let pause = {
            let state = self.state.lock().unwrap();
            let boundary = state.cycle_start + self.config.limit_refresh_period;
            boundary
                .saturating_duration_since(Instant::now())
                .min(max_wait)
        };
        if !pause.is_zero() {
            std::thread::sleep(pause);
        }

        let granted = self.acquire_once();
        if !granted {
            debug!(limiter = %self.name, ?max_wait, "permit denied after wait");
        }
        granted
    }

    /// Permits left in the current period (after reconciling the cycle).
    pub fn available_permits(&self) -> usize {
        let mut state = self.state.lock().unwrap();
        self.refresh(&mut state);
        state.available
    }

    /// Execute a fallible closure once a permit is granted.
    ///
    /// On denial the closure is never invoked and the call fails with
    /// [`CallError::NotPermitted`]. Work errors pass through unchanged.
    pub fn call<T, E, F>(&self, max_wait: Duration, f: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if !self.try_acquire(max_wait) {
            return Err(CallError::NotPermitted(self.not_permitted()));
        }
        f().map_err(CallError::Execution)
    }

    /// Execute a future-returning closure once a permit is granted.
    ///
    /// Acquisition is zero-wait: bounded waiting would suspend the whole
    /// executor thread, so async callers get an immediate grant-or-deny.
    pub async fn call_async<T, E, F, Fut>(&self, f: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.try_acquire(Duration::ZERO) {
            return Err(CallError::NotPermitted(self.not_permitted()));
        }
        f().await.map_err(CallError::Execution)
    }

    pub(crate) fn not_permitted(&self) -> RequestNotPermittedError {
        RequestNotPermittedError {
            limiter: self.name.clone(),
        }
    }

    /// Reconcile the cycle, then debit one permit if available.
    fn acquire_once(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        self.refresh(&mut state);

        if state.available > 0 {
            state.available -= 1;
            true
        } else {
            false
        }
    }

    /// Advance `cycle_start` to the most recent boundary and restore permits.
    ///
    /// One reset regardless of how many periods elapsed: idle time never
    /// banks extra permits.
    fn refresh(&self, state: &mut BucketState) {
        let period = self.config.limit_refresh_period;
        let elapsed = state.cycle_start.elapsed();
        if elapsed < period {
            return;
        }

        let into_current = elapsed.as_nanos() % period.as_nanos();
        state.cycle_start = Instant::now() - Duration::from_nanos(into_current as u64);
        state.available = self.config.limit_for_period;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn limiter(limit: usize, period: Duration) -> RateLimiter {
        RateLimiter::new(
            "test",
            RateLimiterConfig {
                limit_for_period: limit,
                limit_refresh_period: period,
            },
        )
    }

    #[test]
    fn test_grants_up_to_limit_then_denies() {
        let limiter = limiter(3, Duration::from_secs(60));

        assert!(limiter.try_acquire(Duration::ZERO));
        assert!(limiter.try_acquire(Duration::ZERO));
        assert!(limiter.try_acquire(Duration::ZERO));
        assert!(!limiter.try_acquire(Duration::ZERO));
        assert_eq!(limiter.available_permits(), 0);
    }

    #[test]
    fn test_zero_wait_never_suspends() {
        let limiter = limiter(1, Duration::from_secs(60));
        assert!(limiter.try_acquire(Duration::ZERO));

        let start = Instant::now();
        assert!(!limiter.try_acquire(Duration::ZERO));
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_refresh_restores_permits() {
        let limiter = limiter(1, Duration::from_millis(20));

        assert!(limiter.try_acquire(Duration::ZERO));
        assert!(!limiter.try_acquire(Duration::ZERO));

        std::thread::sleep(Duration::from_millis(25));
        assert!(limiter.try_acquire(Duration::ZERO));
    }

    #[test]
    fn test_skipped_periods_grant_single_reset() {
        let limiter = limiter(2, Duration::from_millis(5));

        assert!(limiter.try_acquire(Duration::ZERO));
        assert!(limiter.try_acquire(Duration::ZERO));

        // Many periods elapse unused
        std::thread::sleep(Duration::from_millis(40));

        assert_eq!(limiter.available_permits(), 2);
        assert!(limiter.try_acquire(Duration::ZERO));
        assert!(limiter.try_acquire(Duration::ZERO));
        assert!(!limiter.try_acquire(Duration::ZERO));
    }

    #[test]
    fn test_bounded_wait_reaches_next_period() {
        let limiter = limiter(1, Duration::from_millis(20));

        assert!(limiter.try_acquire(Duration::ZERO));
        // Wait spans the boundary, so the retry is granted
        assert!(limiter.try_acquire(Duration::from_millis(50)));
    }

    #[test]
    fn test_bounded_wait_times_out_to_denial() {
        let limiter = limiter(1, Duration::from_secs(60));

        assert!(limiter.try_acquire(Duration::ZERO));

        let start = Instant::now();
        assert!(!limiter.try_acquire(Duration::from_millis(10)));
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(10));
        assert!(waited < Duration::from_secs(1));
    }

    #[test]
    fn test_never_exceeds_limit_within_period() {
        let limiter = Arc::new(limiter(5, Duration::from_secs(60)));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let limiter = Arc::clone(&limiter);
            handles.push(std::thread::spawn(move || {
                limiter.try_acquire(Duration::ZERO)
            }));
        }

        let granted = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|granted| *granted)
            .count();
        assert_eq!(granted, 5, "exactly limit_for_period grants per period");
        assert_eq!(limiter.available_permits(), 0);
    }

    #[test]
    fn test_call_denied_never_runs_work() {
        let limiter = limiter(1, Duration::from_secs(60));
        assert!(limiter.try_acquire(Duration::ZERO));

        let mut executed = false;
        let result = limiter.call(Duration::ZERO, || {
            executed = true;
            Ok::<_, String>(())
        });

        assert!(matches!(result, Err(CallError::NotPermitted(_))));
        assert!(!executed);
    }

    #[test]
    fn test_call_passes_results_through() {
        let limiter = limiter(2, Duration::from_secs(60));

        let ok = limiter.call(Duration::ZERO, || Ok::<_, String>("granted"));
        assert_eq!(ok.unwrap(), "granted");

        let err = limiter.call(Duration::ZERO, || Err::<(), _>("boom"));
        assert!(matches!(err, Err(CallError::Execution(e)) if e == "boom"));
    }

    #[test]
    fn test_call_async() {
        let limiter = limiter(1, Duration::from_secs(60));

        let ok = futures::executor::block_on(limiter.call_async(|| async { Ok::<_, String>(7) }));
        assert_eq!(ok.unwrap(), 7);

        let denied =
            futures::executor::block_on(limiter.call_async(|| async { Ok::<_, String>(8) }));
        assert!(matches!(denied, Err(CallError::NotPermitted(_))));
    }

    #[test]
    #[should_panic(expected = "Permit limit must be greater than 0")]
    fn test_zero_limit_panics() {
        limiter(0, Duration::from_secs(1));
    }
}
