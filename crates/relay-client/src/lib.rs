//! Relay Client: resilient operation dispatch for a REST backend
//!
//! This crate is the dispatch core of the Relay SDK. Resource wrappers (the
//! per-endpoint CRUD surface) sit on top of it; everything they need lives
//! here:
//!
//! - **Operation registry**: resolves a symbolic operation id against a
//!   read-only operation table and renders its path template into a concrete
//!   request, failing closed on any missing or null parameter
//! - **Transport contract**: a narrow async `send` seam with a reqwest-backed
//!   implementation, so the registry never depends on a concrete HTTP stack
//! - **Typed errors**: every failure a caller sees is one of a small closed
//!   taxonomy carrying structured context, classified at the transport
//!   boundary from the response status and payload
//!
//! Circuit breaking comes from `relay-core-resilience`; wrap any dispatch in a
//! [`CircuitBreaker`](relay_core_resilience::CircuitBreaker) owned by the call
//! site that needs protection.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use relay_client::{
//!     CallOptions, HttpTransport, HttpTransportConfig, OperationTable, RawOperations,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), relay_client::ClientError> {
//!     let table = Arc::new(OperationTable::from_json(
//!         r#"[{"operation_id": "get_widget", "method": "GET",
//!              "path": "/widgets/{widget_id}", "path_params": ["widget_id"]}]"#,
//!     )?);
//!     let transport = Arc::new(HttpTransport::new(HttpTransportConfig {
//!         base_url: "https://api.example.com/v1".to_string(),
//!         bearer_token: Some("token".to_string()),
//!         ..Default::default()
//!     })?);
//!
//!     let ops = RawOperations::new(transport, table);
//!     let response = ops
//!         .call(
//!             "get_widget",
//!             CallOptions::new().path_param("widget_id", 42),
//!         )
//!         .await?;
//!     println!("{}", response.payload);
//!     Ok(())
//! }
//! ```

pub mod classify;
pub mod error;
pub mod operations;
pub mod transport;

pub use classify::classify_response;
pub use error::{ClientError, ErrorDetails};
pub use operations::{CallOptions, Method, OperationDefinition, OperationTable, RawOperations};
pub use transport::{HttpTransport, HttpTransportConfig, RequestParts, Response, Transport};
