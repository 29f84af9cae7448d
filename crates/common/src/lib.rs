//! Shared configuration, error types, IDs, timestamps, and observability
//! primitives for vectorgate crates.
//!
//! Architecture role:
//! - defines the gateway request bounds passed across layers
//! - provides common [`VgateError`] / [`Result`] contracts
//! - hosts typed ids, hybrid-logical-clock helpers, and metrics
//!
//! Key modules:
//! - [`config`]
//! - [`error`]
//! - [`ids`]
//! - [`timestamp`]
//! - [`metrics`]

/// Gateway request-bound configuration types.
pub mod config;
/// Shared error taxonomy.
pub mod error;
/// Strongly-typed identifier wrappers.
pub mod ids;
/// Metrics registry and Prometheus rendering helpers.
pub mod metrics;
/// Hybrid-logical-clock timestamp helpers.
pub mod timestamp;

pub use config::GatewayConfig;
pub use error::{Result, VgateError};
pub use ids::*;
pub use metrics::MetricsRegistry;
pub use timestamp::{Timestamp, ZERO_TIMESTAMP};
