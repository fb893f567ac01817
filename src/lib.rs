//! CallGuard - circuit breaker and rate limiter for fallible calls
//!
//! This crate protects calls to unreliable dependencies with two composable
//! mechanisms:
//! - A circuit breaker tracking outcomes in a fixed-size sliding window and
//!   driving a Closed → Open → HalfOpen lifecycle through a state machine
//! - A rate limiter granting a fixed number of permits per refresh period,
//!   with an admission-controlled stream adapter for lazy sources
//!
//! Both are thread-safe through `&self` and use monotonic time throughout, so
//! wall-clock adjustments never affect open waits or refresh cycles.
//!
//! # Example
//!
//! ```rust
//! use callguard::CircuitBreaker;
//! use std::time::Duration;
//!
//! let breaker = CircuitBreaker::builder("my_service")
//!     .failure_rate_threshold(50.0)
//!     .closed_buffer_size(10)
//!     .wait_duration_in_open(Duration::from_secs(30))
//!     .on_open(|name| println!("Circuit {} opened!", name))
//!     .build();
//!
//! // Execute with circuit protection
//! let result = breaker.call(|| {
//!     // Your service call here
//!     Ok::<_, String>("success")
//! });
//! assert_eq!(result.unwrap(), "success");
//!
//! // Check circuit state
//! if breaker.is_open() {
//!     println!("Circuit is open, skipping call");
//! }
//! ```

pub mod breaker;
pub mod builder;
pub mod callbacks;
pub mod classifier;
pub mod errors;
pub mod gate;
pub mod limiter;
pub mod registry;
pub mod window;

pub use breaker::{CircuitBreaker, Config, State};
pub use builder::{BreakerBuilder, RateLimiterBuilder};
pub use callbacks::TransitionHooks;
pub use classifier::{FailureClassifier, FailureContext, PredicateClassifier, RecordAllClassifier};
pub use errors::{CallError, CircuitOpenError, RequestNotPermittedError};
pub use gate::RateLimitedStream;
pub use limiter::{RateLimiter, RateLimiterConfig};
pub use registry::{BreakerRegistry, RateLimiterRegistry};
pub use window::Metrics;
