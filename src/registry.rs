//! Named registries handing out shared breaker and limiter instances
//!
//! A registry maps names to instances so that every call site protecting the
//! same dependency shares one set of metrics and one state machine. Lookup is
//! create-on-first-use with the registry's default configuration.

use crate::breaker::{CircuitBreaker, Config};
use crate::limiter::{RateLimiter, RateLimiterConfig};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Registry of circuit breakers keyed by name
#[derive(Debug)]
pub struct BreakerRegistry {
    default_config: Config,
    entries: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    /// Create a registry whose breakers use `default_config`
    pub fn new(default_config: Config) -> Self {
        Self {
            default_config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Create a registry using the default breaker configuration
    pub fn of_defaults() -> Self {
        Self::new(Config::default())
    }

    /// Get the breaker registered under `name`, creating it with the
    /// registry's default configuration if absent.
    pub fn breaker(&self, name: &str) -> Arc<CircuitBreaker> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(existing) = entries.get(name) {
            return Arc::clone(existing);
        }

        debug!(circuit = %name, "registering breaker");
        let breaker = Arc::new(CircuitBreaker::new(name, self.default_config.clone()));
        entries.insert(name.to_string(), Arc::clone(&breaker));
        breaker
    }

    /// Names of all registered breakers
    pub fn names(&self) -> Vec<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::of_defaults()
    }
}

/// Registry of rate limiters keyed by name
#[derive(Debug)]
pub struct RateLimiterRegistry {
    default_config: RateLimiterConfig,
    entries: Mutex<HashMap<String, Arc<RateLimiter>>>,
}

impl RateLimiterRegistry {
    /// Create a registry whose limiters use `default_config`
    pub fn new(default_config: RateLimiterConfig) -> Self {
        Self {
            default_config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Create a registry using the default limiter configuration
    pub fn of_defaults() -> Self {
        Self::new(RateLimiterConfig::default())
    }

    /// Get the limiter registered under `name`, creating it with the
    /// registry's default configuration if absent.
    pub fn limiter(&self, name: &str) -> Arc<RateLimiter> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(existing) = entries.get(name) {
            return Arc::clone(existing);
        }

        debug!(limiter = %name, "registering limiter");
        let limiter = Arc::new(RateLimiter::new(name, self.default_config.clone()));
        entries.insert(name.to_string(), Arc::clone(&limiter));
        limiter
    }

    /// Names of all registered limiters
    pub fn names(&self) -> Vec<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }
}

impl Default for RateLimiterRegistry {
    fn default() -> Self {
        Self::of_defaults()
    }
}
