//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Handlers and store produce:
//!     → context.rs (request-scoped diagnostic fields)
//!     → logging.rs (log lines, prefixed with the diagnostic fields)
//!     → tracing.rs (spans, exception recording)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//!     → Distributed tracing (any `tracing` layer, e.g. an OTel bridge)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every log line of the request
//! - Diagnostic context is scoped, never cleared by hand
//! - Metrics are cheap (atomic increments)

pub mod context;
pub mod logging;
pub mod metrics;
pub mod tracing;

pub use context::{DiagnosticContext, DiagnosticKey};
