//! Builder APIs for ergonomic breaker and limiter configuration

use crate::breaker::{CircuitBreaker, Config};
use crate::callbacks::TransitionHooks;
use crate::classifier::{FailureClassifier, FailureContext, PredicateClassifier, RecordAllClassifier};
use crate::limiter::{RateLimiter, RateLimiterConfig};
use std::sync::Arc;
use std::time::Duration;

/// Builder for creating circuit breakers with a fluent API
pub struct BreakerBuilder {
    name: String,
    config: Config,
    classifier: Option<Arc<dyn FailureClassifier>>,
    hooks: TransitionHooks,
}

impl BreakerBuilder {
    /// Create a new builder for a breaker with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: Config::default(),
            classifier: None,
            hooks: TransitionHooks::new(),
        }
    }

    /// Set the failure rate threshold as a percentage (0-100).
    /// The circuit opens when a full window's failure rate reaches this value.
    pub fn failure_rate_threshold(mut self, percent: f32) -> Self {
        self.config.failure_rate_threshold = percent.clamp(0.0, 100.0);
        self
    }

    /// Set the outcome window capacity used while the circuit is closed
    pub fn closed_buffer_size(mut self, size: usize) -> Self {
        self.config.closed_buffer_size = size;
        self
    }

    /// Set the probe window capacity used while the circuit is half-open
    pub fn half_open_buffer_size(mut self, size: usize) -> Self {
        self.config.half_open_buffer_size = size;
        self
    }

    /// Set how long an open circuit rejects calls before permitting a probe
    pub fn wait_duration_in_open(mut self, wait: Duration) -> Self {
        self.config.wait_duration_in_open = wait;
        self
    }

    /// Set the jitter factor for the open wait (0.0 = no jitter, 1.0 = full jitter)
    pub fn jitter_factor(mut self, factor: f64) -> Self {
        self.config.jitter_factor = factor;
        self
    }

    /// Set a failure classifier to filter which errors count toward opening
    /// the circuit.
    ///
    /// Use this to ignore "expected" errors like validation failures or client
    /// errors (4xx), while still tripping on server errors (5xx). Ignored
    /// errors record no outcome at all.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use callguard::{CircuitBreaker, PredicateClassifier};
    /// use std::sync::Arc;
    /// use std::time::Duration;
    ///
    /// let breaker = CircuitBreaker::builder("api")
    ///     .failure_classifier(Arc::new(PredicateClassifier::new(|ctx| {
    ///         // Only trip on slow errors
    ///         ctx.elapsed > Duration::from_secs(1)
    ///     })))
    ///     .build();
    /// ```
    pub fn failure_classifier(mut self, classifier: Arc<dyn FailureClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Shorthand for [`failure_classifier`] with a plain predicate.
    ///
    /// [`failure_classifier`]: BreakerBuilder::failure_classifier
    pub fn record_failure<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&FailureContext<'_>) -> bool + Send + Sync + 'static,
    {
        self.classifier = Some(Arc::new(PredicateClassifier::new(predicate)));
        self
    }

    /// Set callback for when the circuit opens
    pub fn on_open<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.hooks.on_open = Some(Arc::new(f));
        self
    }

    /// Set callback for when the circuit closes
    pub fn on_close<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.hooks.on_close = Some(Arc::new(f));
        self
    }

    /// Set callback for when the circuit enters half-open
    pub fn on_half_open<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.hooks.on_half_open = Some(Arc::new(f));
        self
    }

    /// Build the circuit breaker.
    ///
    /// # Panics
    ///
    /// Panics if either buffer size was set to 0.
    pub fn build(self) -> CircuitBreaker {
        let classifier = self
            .classifier
            .unwrap_or_else(|| Arc::new(RecordAllClassifier));

        CircuitBreaker::with_parts(self.name, self.config, classifier, self.hooks)
    }
}

/// Builder for creating rate limiters with a fluent API
pub struct RateLimiterBuilder {
    name: String,
    config: RateLimiterConfig,
}

impl RateLimiterBuilder {
    /// Create a new builder for a limiter with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: RateLimiterConfig::default(),
        }
    }

    /// Set the number of permits granted per refresh period
    pub fn limit_for_period(mut self, limit: usize) -> Self {
        self.config.limit_for_period = limit;
        self
    }

    /// Set the length of one refresh period
    pub fn limit_refresh_period(mut self, period: Duration) -> Self {
        self.config.limit_refresh_period = period;
        self
    }

    /// Build the rate limiter.
    ///
    /// # Panics
    ///
    /// Panics if the permit limit was set to 0 or the period to zero.
    pub fn build(self) -> RateLimiter {
        RateLimiter::new(self.name, self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let breaker = BreakerBuilder::new("test").build();

        assert_eq!(breaker.name(), "test");
        assert!(breaker.is_closed());
    }

    #[test]
    fn test_threshold_clamped_to_percentage_range() {
        let breaker = BreakerBuilder::new("test")
            .closed_buffer_size(1)
            .failure_rate_threshold(250.0)
            .build();

        // Clamped to 100%, so a fully failing window still opens the circuit
        breaker.on_error(Duration::ZERO, &"error");
        assert!(breaker.is_open());
    }

    #[test]
    fn test_record_failure_shorthand() {
        let breaker = BreakerBuilder::new("test")
            .closed_buffer_size(1)
            .record_failure(|ctx| {
                ctx.error
                    .downcast_ref::<&str>()
                    .map(|e| *e != "ignored")
                    .unwrap_or(true)
            })
            .build();

        breaker.on_error(Duration::ZERO, &"ignored");
        assert!(breaker.is_closed());
        assert_eq!(breaker.metrics().buffered_calls, 0);

        breaker.on_error(Duration::ZERO, &"counted");
        assert!(breaker.is_open());
    }

    #[test]
    fn test_builder_with_hooks() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let opened = Arc::new(AtomicBool::new(false));
        let opened_clone = opened.clone();

        let breaker = BreakerBuilder::new("test")
            .closed_buffer_size(2)
            .on_open(move |_name| {
                opened_clone.store(true, Ordering::SeqCst);
            })
            .build();

        let _ = breaker.call(|| Err::<(), _>("error 1"));
        let _ = breaker.call(|| Err::<(), _>("error 2"));

        assert!(opened.load(Ordering::SeqCst));
    }

    #[test]
    fn test_limiter_builder() {
        let limiter = RateLimiterBuilder::new("test")
            .limit_for_period(2)
            .limit_refresh_period(Duration::from_secs(60))
            .build();

        assert_eq!(limiter.name(), "test");
        assert_eq!(limiter.available_permits(), 2);
        assert!(limiter.try_acquire(Duration::ZERO));
        assert!(limiter.try_acquire(Duration::ZERO));
        assert!(!limiter.try_acquire(Duration::ZERO));
    }
}
