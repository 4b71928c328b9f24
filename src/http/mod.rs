//! HTTP facade subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID, client identity)
//!     → security::rate_limit (per-client quota)
//!     → handlers.rs (validate, run upstream call through the executor)
//!     → response.rs (map terminal failures to status codes)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::{ClientId, RequestId, X_API_KEY, X_REQUEST_ID};
pub use server::{build_router, AppState, HttpServer};
