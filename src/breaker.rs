//! Circuit breaker with sliding-window failure metrics
//!
//! The breaker owns one outcome window at a time plus the Closed / Open /
//! HalfOpen lifecycle, driven by a dynamic state machine. All operations go
//! through `&self`; a breaker is shared freely across threads and every
//! state-changing operation runs as one critical section.

use crate::callbacks::TransitionHooks;
use crate::classifier::{FailureClassifier, FailureContext, RecordAllClassifier};
use crate::errors::{CallError, CircuitOpenError};
use crate::window::{Metrics, OutcomeWindow};
use state_machines::state_machine;
use std::any::Any;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Failure rate (percentage, 0-100) at or above which the circuit opens.
    /// Only evaluated on a full outcome window.
    pub failure_rate_threshold: f32,

    /// Outcome window capacity while the circuit is closed
    pub closed_buffer_size: usize,

    /// Outcome window capacity while the circuit is half-open
    pub half_open_buffer_size: usize,

    /// How long an open circuit rejects calls before permitting a probe
    pub wait_duration_in_open: Duration,

    /// Jitter factor for the open wait (0.0 = no jitter, 1.0 = full jitter)
    /// Uses chrono-machines formula: wait * (1 - jitter + rand * jitter)
    pub jitter_factor: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 50.0,
            closed_buffer_size: 100,
            half_open_buffer_size: 10,
            wait_duration_in_open: Duration::from_secs(60),
            jitter_factor: 0.0,
        }
    }
}

/// Breaker lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Closed,
    Open,
    HalfOpen,
}

/// Window handle shared between the breaker and the machine's guards.
///
/// The inner mutex gives readers a consistent snapshot; writers additionally
/// hold the machine lock, so a state transition and its window swap publish
/// together.
#[derive(Clone)]
pub(crate) struct SharedWindow(Arc<Mutex<OutcomeWindow>>);

impl SharedWindow {
    fn new(capacity: usize) -> Self {
        Self(Arc::new(Mutex::new(OutcomeWindow::new(capacity))))
    }

    fn reset(&self, capacity: usize) {
        *self.0.lock().unwrap() = OutcomeWindow::new(capacity);
    }

    fn record(&self, is_failure: bool) -> bool {
        self.0.lock().unwrap().record(is_failure)
    }

    fn full_failure_rate(&self) -> Option<f32> {
        self.0.lock().unwrap().full_failure_rate()
    }

    fn snapshot(&self) -> Metrics {
        self.0.lock().unwrap().metrics()
    }
}

/// Breaker context - shared data available to the machine's guards
#[derive(Clone)]
pub struct BreakerContext {
    pub name: String,
    pub config: Config,
    pub(crate) window: SharedWindow,
    /// Monotonic anchor; `opened_at` is seconds since this instant
    pub(crate) epoch: Instant,
}

impl Default for BreakerContext {
    fn default() -> Self {
        let config = Config::default();
        Self {
            name: String::new(),
            window: SharedWindow::new(config.closed_buffer_size),
            config,
            epoch: Instant::now(),
        }
    }
}

impl std::fmt::Debug for BreakerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakerContext")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("window", &self.window.snapshot())
            .finish()
    }
}

/// Data specific to the Open state
#[derive(Debug, Clone, Default)]
pub struct OpenData {
    /// Seconds since the breaker's epoch at which the circuit opened
    pub opened_at: f64,
}

// Define the breaker state machine with dynamic mode
state_machine! {
    name: Breaker,
    context: BreakerContext,
    dynamic: true,  // Enable dynamic mode for runtime state transitions

    initial: Closed,
    states: [
        Closed,
        Open(OpenData),
        HalfOpen,
    ],
    events {
        trip {
            guards: [should_open],
            transition: { from: [Closed, HalfOpen], to: Open }
        }
        attempt_reset {
            guards: [wait_elapsed],
            transition: { from: Open, to: HalfOpen }
        }
        close {
            guards: [should_close],
            transition: { from: HalfOpen, to: Closed }
        }
    }
}

// Guards for dynamic mode - implemented on typestate machines
impl Breaker<Closed> {
    /// Full window with a failure rate at or above the threshold
    fn should_open(&self, ctx: &BreakerContext) -> bool {
        matches!(
            ctx.window.full_failure_rate(),
            Some(rate) if rate >= ctx.config.failure_rate_threshold
        )
    }
}

impl Breaker<HalfOpen> {
    /// Full probe window with a failure rate at or above the threshold
    fn should_open(&self, ctx: &BreakerContext) -> bool {
        matches!(
            ctx.window.full_failure_rate(),
            Some(rate) if rate >= ctx.config.failure_rate_threshold
        )
    }

    /// Full probe window with a failure rate below the threshold
    fn should_close(&self, ctx: &BreakerContext) -> bool {
        matches!(
            ctx.window.full_failure_rate(),
            Some(rate) if rate < ctx.config.failure_rate_threshold
        )
    }
}

impl Breaker<Open> {
    /// Check if the open wait has elapsed for Open -> HalfOpen
    fn wait_elapsed(&self, ctx: &BreakerContext) -> bool {
        let data = self.state_data_open().expect("Open state must have data");
        let now = ctx.epoch.elapsed().as_secs_f64();
        let elapsed = now - data.opened_at;

        // Apply jitter using chrono-machines if jitter_factor > 0
        let wait_secs = if ctx.config.jitter_factor > 0.0 {
            let wait_ms = (ctx.config.wait_duration_in_open.as_secs_f64() * 1000.0) as u64;
            let policy = chrono_machines::Policy {
                max_attempts: 1,
                base_delay_ms: wait_ms,
                multiplier: 1.0,
                max_delay_ms: wait_ms,
            };
            policy.calculate_delay(1, ctx.config.jitter_factor) as f64 / 1000.0
        } else {
            ctx.config.wait_duration_in_open.as_secs_f64()
        };

        elapsed >= wait_secs
    }
}

/// Circuit breaker public API
///
/// Call sites either use the [`try_acquire`] / [`on_success`] / [`on_error`]
/// primitives directly, or wrap a closure with [`call`] / [`call_async`].
///
/// [`try_acquire`]: CircuitBreaker::try_acquire
/// [`on_success`]: CircuitBreaker::on_success
/// [`on_error`]: CircuitBreaker::on_error
/// [`call`]: CircuitBreaker::call
/// [`call_async`]: CircuitBreaker::call_async
pub struct CircuitBreaker {
    machine: Mutex<DynamicBreaker>,
    context: BreakerContext,
    classifier: Arc<dyn FailureClassifier>,
    hooks: TransitionHooks,
}

impl CircuitBreaker {
    /// Create a new circuit breaker (use builder() for more options)
    ///
    /// # Panics
    ///
    /// Panics if either buffer size in `config` is 0.
    pub fn new(name: impl Into<String>, config: Config) -> Self {
        let context = Self::context_for(name.into(), config);
        let machine = DynamicBreaker::new(context.clone());

        Self {
            machine: Mutex::new(machine),
            context,
            classifier: Arc::new(RecordAllClassifier),
            hooks: TransitionHooks::new(),
        }
    }

    /// Create a breaker with custom classifier and hooks (used by builder)
    pub(crate) fn with_parts(
        name: String,
        config: Config,
        classifier: Arc<dyn FailureClassifier>,
        hooks: TransitionHooks,
    ) -> Self {
        let context = Self::context_for(name, config);
        let machine = DynamicBreaker::new(context.clone());

        Self {
            machine: Mutex::new(machine),
            context,
            classifier,
            hooks,
        }
    }

    fn context_for(name: String, config: Config) -> BreakerContext {
        assert!(
            config.closed_buffer_size > 0,
            "Closed buffer size must be greater than 0"
        );
        assert!(
            config.half_open_buffer_size > 0,
            "Half-open buffer size must be greater than 0"
        );

        BreakerContext {
            name,
            window: SharedWindow::new(config.closed_buffer_size),
            config,
            epoch: Instant::now(),
        }
    }

    /// Create a new circuit breaker builder
    pub fn builder(name: impl Into<String>) -> crate::builder::BreakerBuilder {
        crate::builder::BreakerBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.context.name
    }

    /// Ask permission to make one call.
    ///
    /// Closed and half-open circuits always permit. An open circuit denies
    /// until its wait duration has elapsed; the first `try_acquire` at or
    /// after that point flips the circuit to half-open (allocating a fresh
    /// probe window) and is itself permitted as the first probe.
    ///
    /// Denied calls never touch the outcome window. The check is lazy: with
    /// no traffic during the open wait, the circuit stays open until traffic
    /// resumes.
    pub fn try_acquire(&self) -> Result<(), CircuitOpenError> {
        let mut machine = self.machine.lock().unwrap();

        if machine.current_state() != "Open" {
            return Ok(());
        }

        if machine.handle(BreakerEvent::AttemptReset).is_ok() {
            // Wait elapsed: fresh probe window, and this call goes through
            // as the first probe.
            self.context
                .window
                .reset(self.context.config.half_open_buffer_size);
            debug!(circuit = %self.context.name, "circuit half-open, probing");
            self.hooks.half_opened(&self.context.name);
            return Ok(());
        }

        Err(CircuitOpenError {
            circuit: self.context.name.clone(),
            metrics: self.context.window.snapshot(),
        })
    }

    /// Record a successful call outcome.
    pub fn on_success(&self, elapsed: Duration) {
        let mut machine = self.machine.lock().unwrap();
        trace!(circuit = %self.context.name, ?elapsed, "success recorded");

        if self.context.window.record(false) {
            self.evaluate(&mut machine);
        }
    }

    /// Record a failed call outcome.
    ///
    /// The failure classifier is consulted first: an error it does not count
    /// writes no slot and changes no metrics. Either way the caller keeps and
    /// rethrows the original error; this is bookkeeping only.
    pub fn on_error(&self, elapsed: Duration, error: &dyn Any) {
        let counted = self.classifier.is_failure(&FailureContext {
            circuit_name: &self.context.name,
            error,
            elapsed,
        });
        if !counted {
            trace!(circuit = %self.context.name, "error ignored by classifier");
            return;
        }

        let mut machine = self.machine.lock().unwrap();
        trace!(circuit = %self.context.name, ?elapsed, "failure recorded");

        if self.context.window.record(true) {
            self.evaluate(&mut machine);
        }
    }

    /// Point-in-time metrics snapshot. Never blocks on in-flight calls.
    pub fn metrics(&self) -> Metrics {
        self.context.window.snapshot()
    }

    pub fn state(&self) -> State {
        match self.machine.lock().unwrap().current_state() {
            "Open" => State::Open,
            "HalfOpen" => State::HalfOpen,
            _ => State::Closed,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state() == State::Open
    }

    pub fn is_closed(&self) -> bool {
        self.state() == State::Closed
    }

    pub fn is_half_open(&self) -> bool {
        self.state() == State::HalfOpen
    }

    /// Execute a fallible closure with circuit protection.
    ///
    /// On denial the closure is never invoked. On execution failure the
    /// outcome is recorded and the original error returned unchanged inside
    /// [`CallError::Execution`].
    pub fn call<T, E, F>(&self, f: F) -> Result<T, CallError<E>>
    where
        E: 'static,
        F: FnOnce() -> Result<T, E>,
    {
        self.try_acquire()?;

        let start = Instant::now();
        match f() {
            Ok(value) => {
                self.on_success(start.elapsed());
                Ok(value)
            }
            Err(e) => {
                self.on_error(start.elapsed(), &e);
                Err(CallError::Execution(e))
            }
        }
    }

    /// Execute a future-returning closure with circuit protection.
    ///
    /// The closure runs only after permission is granted, so a denied call
    /// never starts the work. Dropping the returned future mid-flight records
    /// no outcome.
    pub async fn call_async<T, E, F, Fut>(&self, f: F) -> Result<T, CallError<E>>
    where
        E: 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.try_acquire()?;

        let start = Instant::now();
        match f().await {
            Ok(value) => {
                self.on_success(start.elapsed());
                Ok(value)
            }
            Err(e) => {
                self.on_error(start.elapsed(), &e);
                Err(CallError::Execution(e))
            }
        }
    }

    /// Apply the transition rule after an outcome left the window full.
    ///
    /// Rate at or above threshold opens the circuit; otherwise a full
    /// half-open window closes it; otherwise closed stays closed. Must be
    /// called with the machine lock held.
    fn evaluate(&self, machine: &mut DynamicBreaker) {
        if machine.handle(BreakerEvent::Trip).is_ok() {
            self.mark_open(machine);
        } else if machine.current_state() == "HalfOpen"
            && machine.handle(BreakerEvent::Close).is_ok()
        {
            self.context
                .window
                .reset(self.context.config.closed_buffer_size);
            debug!(circuit = %self.context.name, "circuit closed");
            self.hooks.closed(&self.context.name);
        }
    }

    /// Apply Open-state bookkeeping (timestamp + hook).
    ///
    /// The tripping window is retained while open so denials and metrics can
    /// report the rates that caused the trip; a fresh window is allocated on
    /// the next transition out of Open.
    fn mark_open(&self, machine: &mut DynamicBreaker) {
        if let Some(data) = machine.open_data_mut() {
            data.opened_at = self.context.epoch.elapsed().as_secs_f64();
        }
        debug!(circuit = %self.context.name, "circuit opened");
        self.hooks.opened(&self.context.name);
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.context.name)
            .field("state", &self.state())
            .field("metrics", &self.metrics())
            .finish()
    }
}
