//! Client for the protected language-model API.
//!
//! # Data Flow
//! ```text
//! format handler
//!     → executor (retry, breaker)
//!     → client.rs (one POST per attempt)
//!     → error.rs (status / transport → FailureKind)
//! ```

pub mod client;
pub mod error;

pub use client::UpstreamClient;
pub use error::UpstreamError;
