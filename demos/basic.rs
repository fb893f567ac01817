//! Basic circuit breaker and rate limiter usage example

use callguard::{CircuitBreaker, RateLimiter};
use futures::StreamExt;
use futures::executor::block_on;
use std::sync::Arc;
use std::time::Duration;

fn main() {
    println!("=== Circuit Breaker Basic Example ===\n");

    // Create a breaker with the builder API
    let breaker = CircuitBreaker::builder("payment_api")
        .failure_rate_threshold(50.0)
        .closed_buffer_size(4)
        .half_open_buffer_size(2)
        .wait_duration_in_open(Duration::from_millis(200))
        .on_open(|name| println!("🔴 Circuit '{}' opened!", name))
        .on_close(|name| println!("🟢 Circuit '{}' closed!", name))
        .on_half_open(|name| println!("🟡 Circuit '{}' half-open, testing...", name))
        .build();

    println!("Initial state: {:?}\n", breaker.state());

    // Simulate successful calls
    println!("--- Successful calls ---");
    for i in 1..=2 {
        match breaker.call(move || Ok::<_, String>(format!("Payment {}", i))) {
            Ok(result) => println!("✓ {}", result),
            Err(e) => println!("✗ {}", e),
        }
    }
    println!("State: {:?}\n", breaker.state());

    // Simulate failures until the window fills and the rate trips the circuit
    println!("--- Triggering failures ---");
    for i in 1..=2 {
        match breaker.call(move || Err::<String, _>(format!("Payment failed {}", i))) {
            Ok(_) => println!("✓ Success"),
            Err(e) => println!("✗ {}", e),
        }
    }
    println!("State: {:?} (circuit opened)\n", breaker.state());

    // Try calling while open
    println!("--- Attempting call while open ---");
    match breaker.call(|| Ok::<_, String>("Should be rejected")) {
        Ok(_) => println!("✓ Success"),
        Err(e) => println!("✗ {}", e),
    }
    println!();

    // Wait out the open duration, then probe back to closed
    println!("--- Recovery after wait ---");
    std::thread::sleep(Duration::from_millis(250));
    for _ in 0..2 {
        match breaker.call(|| Ok::<_, String>("Payment successful")) {
            Ok(result) => println!("✓ {}", result),
            Err(e) => println!("✗ {}", e),
        }
    }
    println!("State: {:?}\n", breaker.state());

    println!("=== Rate Limiter Example ===\n");

    let limiter = Arc::new(
        RateLimiter::builder("search_api")
            .limit_for_period(2)
            .limit_refresh_period(Duration::from_secs(1))
            .build(),
    );

    for i in 1..=3 {
        if limiter.try_acquire(Duration::ZERO) {
            println!("✓ Request {} permitted", i);
        } else {
            println!("✗ Request {} denied", i);
        }
    }

    // Gate a stream behind the limiter: one permit per subscription
    println!("\n--- Gated stream ---");
    std::thread::sleep(Duration::from_secs(1));
    let results: Vec<_> = block_on(limiter.gate(futures::stream::iter(1..=3)).collect());
    for item in results {
        match item {
            Ok(n) => println!("✓ item {}", n),
            Err(e) => println!("✗ {}", e),
        }
    }
}
