//! Error types for protected calls
//!
//! Denial errors are raised by this crate before the wrapped work runs.
//! Work errors are never wrapped beyond the `Execution` variant and never
//! swallowed; bookkeeping happens first, then the original error is handed
//! back unchanged.

use crate::window::Metrics;
use std::error::Error;
use std::fmt;

/// A call was refused because the circuit is open.
///
/// Carries the breaker name and a metrics snapshot taken at denial time for
/// diagnostics.
#[derive(Debug, Clone)]
pub struct CircuitOpenError {
    pub circuit: String,
    pub metrics: Metrics,
}

impl fmt::Display for CircuitOpenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Circuit '{}' is open, call rejected", self.circuit)
    }
}

impl Error for CircuitOpenError {}

/// A call or subscription was refused because no permit was available.
#[derive(Debug, Clone)]
pub struct RequestNotPermittedError {
    pub limiter: String,
}

impl fmt::Display for RequestNotPermittedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rate limiter '{}' has no permits available",
            self.limiter
        )
    }
}

impl Error for RequestNotPermittedError {}

/// Outcome of a decorated call that did not succeed.
#[derive(Debug)]
pub enum CallError<E = Box<dyn Error + Send + Sync>> {
    /// The breaker refused the call before it ran
    Open(CircuitOpenError),
    /// The rate limiter refused the call before it ran
    NotPermitted(RequestNotPermittedError),
    /// The wrapped work itself failed; the original error, untouched
    Execution(E),
}

impl<E: fmt::Display> fmt::Display for CallError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallError::Open(e) => e.fmt(f),
            CallError::NotPermitted(e) => e.fmt(f),
            CallError::Execution(e) => write!(f, "Call execution failed: {}", e),
        }
    }
}

impl<E: Error + 'static> Error for CallError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CallError::Execution(e) => Some(e),
            _ => None,
        }
    }
}

impl<E> From<CircuitOpenError> for CallError<E> {
    fn from(e: CircuitOpenError) -> Self {
        CallError::Open(e)
    }
}

impl<E> From<RequestNotPermittedError> for CallError<E> {
    fn from(e: RequestNotPermittedError) -> Self {
        CallError::NotPermitted(e)
    }
}
