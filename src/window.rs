//! Fixed-capacity outcome window for failure-rate calculation
//!
//! The window keeps the last N call outcomes in a ring and maintains running
//! totals, so recording an outcome and querying the failure rate are both O(1).
//! The failure rate is only meaningful once the window has filled; callers must
//! not evaluate it on a partially filled window.

/// Fixed-capacity ring of call outcomes.
///
/// Each slot holds one outcome (success or failure). Once the window is at
/// capacity, every new outcome evicts the oldest slot, removing the evicted
/// outcome's contribution to the running totals before adding the new one.
///
/// Capacity never changes after construction: a breaker that needs a
/// different window size (e.g. when moving between closed and half-open)
/// allocates a fresh window and discards this one entirely.
#[derive(Debug)]
pub struct OutcomeWindow {
    /// Outcome slots, `true` marks a failure. Length is the fixed capacity.
    slots: Box<[bool]>,
    /// Position of the next insert (also the oldest slot once full).
    head: usize,
    /// Number of slots filled so far, never exceeds capacity.
    filled: usize,
    /// Running count of failures among the filled slots.
    failures: usize,
}

impl OutcomeWindow {
    /// Create an empty window with the given capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Window capacity must be greater than 0");
        Self {
            slots: vec![false; capacity].into_boxed_slice(),
            head: 0,
            filled: 0,
            failures: 0,
        }
    }

    /// Record one outcome, evicting the oldest slot if at capacity.
    ///
    /// Returns `true` if the window is full after the insert, which is the
    /// signal to evaluate the failure rate.
    pub fn record(&mut self, is_failure: bool) -> bool {
        if self.filled == self.slots.len() {
            if self.slots[self.head] {
                self.failures -= 1;
            }
        } else {
            self.filled += 1;
        }

        self.slots[self.head] = is_failure;
        if is_failure {
            self.failures += 1;
        }
        self.head = (self.head + 1) % self.slots.len();

        self.is_full()
    }

    /// Failure rate as a percentage of all outcomes in the window.
    ///
    /// Only defined when the window is full; callers must check [`is_full`]
    /// first.
    ///
    /// [`is_full`]: OutcomeWindow::is_full
    pub fn failure_rate(&self) -> f32 {
        debug_assert!(self.is_full(), "failure rate requires a full window");
        self.failures as f32 / self.filled as f32 * 100.0
    }

    /// Failure rate if the window is full, `None` otherwise.
    pub fn full_failure_rate(&self) -> Option<f32> {
        self.is_full().then(|| self.failure_rate())
    }

    pub fn is_full(&self) -> bool {
        self.filled == self.slots.len()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of outcomes recorded so far, capped at capacity.
    pub fn filled(&self) -> usize {
        self.filled
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn successes(&self) -> usize {
        self.filled - self.failures
    }

    /// Point-in-time metrics view of this window.
    pub fn metrics(&self) -> Metrics {
        Metrics {
            buffered_calls: self.filled,
            failed_calls: self.failures,
            successful_calls: self.successes(),
            failure_rate: self.full_failure_rate(),
        }
    }
}

/// Read-only snapshot of a breaker's outcome window.
///
/// `failure_rate` is `None` while the window has not yet filled; below that
/// point the rate is not evaluable and never drives a state transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub buffered_calls: usize,
    pub failed_calls: usize,
    pub successful_calls: usize,
    pub failure_rate: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_window_not_full() {
        let window = OutcomeWindow::new(3);

        assert!(!window.is_full());
        assert_eq!(window.filled(), 0);
        assert_eq!(window.failures(), 0);
        assert_eq!(window.successes(), 0);
        assert_eq!(window.full_failure_rate(), None);
    }

    #[test]
    fn test_record_reports_full() {
        let mut window = OutcomeWindow::new(2);

        assert!(!window.record(true));
        assert!(window.record(false));
        assert!(window.is_full());
        assert_eq!(window.filled(), 2);
    }

    #[test]
    fn test_failure_rate_on_full_window() {
        let mut window = OutcomeWindow::new(4);

        window.record(true);
        window.record(true);
        window.record(false);
        window.record(false);

        assert_eq!(window.failure_rate(), 50.0);
        assert_eq!(window.full_failure_rate(), Some(50.0));
    }

    #[test]
    fn test_eviction_updates_totals() {
        let mut window = OutcomeWindow::new(2);

        window.record(true);
        window.record(true);
        assert_eq!(window.failures(), 2);
        assert_eq!(window.failure_rate(), 100.0);

        // Oldest failure evicted, replaced by a success
        window.record(false);
        assert_eq!(window.failures(), 1);
        assert_eq!(window.successes(), 1);
        assert_eq!(window.failure_rate(), 50.0);

        // Second failure evicted as well
        window.record(false);
        assert_eq!(window.failures(), 0);
        assert_eq!(window.failure_rate(), 0.0);
    }

    #[test]
    fn test_totals_match_filled_count() {
        let mut window = OutcomeWindow::new(5);

        for i in 0..23 {
            window.record(i % 3 == 0);
            assert_eq!(window.failures() + window.successes(), window.filled());
            assert!(window.filled() <= window.capacity());
        }
    }

    #[test]
    fn test_metrics_snapshot() {
        let mut window = OutcomeWindow::new(3);

        window.record(true);
        window.record(false);

        let metrics = window.metrics();
        assert_eq!(metrics.buffered_calls, 2);
        assert_eq!(metrics.failed_calls, 1);
        assert_eq!(metrics.successful_calls, 1);
        assert_eq!(metrics.failure_rate, None);

        window.record(true);
        let metrics = window.metrics();
        assert_eq!(metrics.buffered_calls, 3);
        assert!((metrics.failure_rate.unwrap() - 66.666_67).abs() < 0.001);
    }

    #[test]
    #[should_panic(expected = "Window capacity must be greater than 0")]
    fn test_zero_capacity_panics() {
        OutcomeWindow::new(0);
    }
}
