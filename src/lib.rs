//! Resilient gateway in front of a language-model formatting API.
//!
//! The core is [`resilience::ResilientExecutor`] (retry, backoff, circuit
//! breaker) and [`security::WindowRateLimiter`]; the rest is the HTTP facade
//! and its ambient stack.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;
pub mod upstream;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use resilience::{ExecuteError, ResilientExecutor};
pub use security::WindowRateLimiter;
