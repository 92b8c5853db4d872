//! Relay Core Resilience: Pure-logic fault tolerance primitives
//!
//! # Overview
//!
//! This crate provides the fault-tolerance building blocks used by the Relay
//! SDK when talking to a backend that may be unhealthy:
//!
//! - **Circuit Breaker**: Prevents cascading failures by failing fast when a
//!   service is unhealthy
//! - **Failure Classification**: A seam that lets callers decide which errors
//!   count as evidence of backend unhealthiness
//!
//! # Key Principles
//!
//! This crate is **pure logic** with zero knowledge of:
//! - HTTP, request paths, or status codes
//! - The SDK's operation table or resource wrappers
//! - Application-specific concerns
//!
//! The breaker guards any async operation and re-raises the operation's own
//! error unchanged; only the breaker-open rejection is a failure of its own.
//!
//! # Example
//!
//! ```no_run
//! use relay_core_resilience::{CircuitBreaker, CircuitBreakerConfig, FailureClassification};
//!
//! #[derive(Debug, thiserror::Error)]
//! #[error("backend down")]
//! struct BackendDown;
//!
//! impl FailureClassification for BackendDown {}
//!
//! #[tokio::main]
//! async fn main() {
//!     let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
//!
//!     let result = breaker
//!         .guard(|| async { Ok::<_, BackendDown>(42) })
//!         .await;
//!
//!     assert_eq!(result.unwrap(), 42);
//! }
//! ```

pub mod circuit_breaker;
pub mod error;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use error::{FailureClassification, GuardError};

/// Commonly used types, importable in one line.
pub mod prelude {
    pub use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
    pub use super::error::{FailureClassification, GuardError};
}
