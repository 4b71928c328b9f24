//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (sliding-window quota per API key or peer IP)
//!     → Pass to handler
//! ```
//!
//! # Design Decisions
//! - Rejections never consume quota
//! - Idle client windows are garbage-collected, so memory tracks active clients only

pub mod rate_limit;

pub use rate_limit::WindowRateLimiter;
