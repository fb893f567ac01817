//! Failure classification for error filtering
//!
//! Decides which work errors count as failures for the breaker's metrics.
//! An error the classifier ignores writes no outcome slot and leaves the
//! metrics untouched, but still propagates to the caller unchanged.

use std::any::Any;
use std::time::Duration;

/// Context handed to failure classifiers for each observed error.
#[derive(Debug)]
pub struct FailureContext<'a> {
    /// Name of the breaker that observed the error
    pub circuit_name: &'a str,
    /// The error value (can be downcast to concrete types)
    pub error: &'a dyn Any,
    /// How long the failed call took
    pub elapsed: Duration,
}

/// Decides whether an error counts as a failure for metrics purposes.
///
/// Classification is purely functional: no state, no side effects, called
/// synchronously while the failed outcome is being recorded.
///
/// # Examples
///
/// ```rust
/// use callguard::{FailureClassifier, FailureContext};
///
/// #[derive(Debug)]
/// struct ServerErrorsOnly;
///
/// impl FailureClassifier for ServerErrorsOnly {
///     fn is_failure(&self, ctx: &FailureContext<'_>) -> bool {
///         ctx.error
///             .downcast_ref::<u16>()
///             .map(|status| *status >= 500)
///             .unwrap_or(true)
///     }
/// }
/// ```
pub trait FailureClassifier: Send + Sync + std::fmt::Debug {
    /// Return `true` to record this error as a failure, `false` to exclude it
    /// from the outcome window entirely.
    fn is_failure(&self, ctx: &FailureContext<'_>) -> bool;
}

/// Default classifier: every error counts as a failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordAllClassifier;

impl FailureClassifier for RecordAllClassifier {
    fn is_failure(&self, _ctx: &FailureContext<'_>) -> bool {
        true
    }
}

/// Closure-backed classifier for simple filtering patterns.
pub struct PredicateClassifier<F>
where
    F: Fn(&FailureContext<'_>) -> bool + Send + Sync,
{
    predicate: F,
}

impl<F> PredicateClassifier<F>
where
    F: Fn(&FailureContext<'_>) -> bool + Send + Sync,
{
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<F> FailureClassifier for PredicateClassifier<F>
where
    F: Fn(&FailureContext<'_>) -> bool + Send + Sync,
{
    fn is_failure(&self, ctx: &FailureContext<'_>) -> bool {
        (self.predicate)(ctx)
    }
}

impl<F> std::fmt::Debug for PredicateClassifier<F>
where
    F: Fn(&FailureContext<'_>) -> bool + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredicateClassifier")
            .field("predicate", &"<closure>")
            .finish()
    }
}
