//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Executor observer, rate limiter, HTTP handlers produce:
//!     → logging.rs (structured `tracing` events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through handler spans
//! - Metric labels never carry client identifiers

pub mod logging;
pub mod metrics;
