//! Failure taxonomy for wrapped operations.
//!
//! # Responsibilities
//! - Define the closed set of failure kinds an operation may surface
//! - Map each kind to its retry and breaker policy
//!
//! # Policy
//! ```text
//! kind               retryable  breaker-relevant
//! RateLimited        yes        no
//! ServerUnavailable  yes        yes
//! NetworkFailure     yes        yes
//! Unauthorized       no         yes
//! ClientFault        no         no
//! Unknown            no         no
//! ```
//!
//! # Design Decisions
//! - Classification is a total function over `FailureKind`, no string matching
//! - Unknown failures fail fast and never touch the breaker

use std::fmt;
use std::io;

/// Category of a failed remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The dependency throttled us.
    RateLimited,
    /// The dependency answered with a server-side error or is unavailable.
    ServerUnavailable,
    /// Timeout, connection refused/reset, DNS failure.
    NetworkFailure,
    /// Credentials rejected.
    Unauthorized,
    /// Malformed request or missing resource. A caller bug.
    ClientFault,
    /// Anything the wrapped layer could not categorize.
    Unknown,
}

/// Retry and breaker policy derived from a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// Another attempt may succeed.
    pub retryable: bool,
    /// Counts toward opening the circuit breaker.
    pub breaker_relevant: bool,
}

impl FailureKind {
    /// Policy for this kind of failure.
    pub const fn classify(self) -> Classification {
        let (retryable, breaker_relevant) = match self {
            FailureKind::RateLimited => (true, false),
            FailureKind::ServerUnavailable => (true, true),
            FailureKind::NetworkFailure => (true, true),
            // Repeated credential failures point at a systemic problem.
            FailureKind::Unauthorized => (false, true),
            FailureKind::ClientFault => (false, false),
            FailureKind::Unknown => (false, false),
        };
        Classification {
            retryable,
            breaker_relevant,
        }
    }

    /// Stable label for logs and metrics.
    pub const fn as_str(self) -> &'static str {
        match self {
            FailureKind::RateLimited => "rate_limited",
            FailureKind::ServerUnavailable => "server_unavailable",
            FailureKind::NetworkFailure => "network_failure",
            FailureKind::Unauthorized => "unauthorized",
            FailureKind::ClientFault => "client_fault",
            FailureKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for FailureKind {}

/// Structured failure interface every wrapped operation's error must provide.
pub trait Classify {
    /// The category of this failure.
    fn failure_kind(&self) -> FailureKind;

    /// Retry and breaker policy for this failure.
    fn classification(&self) -> Classification {
        self.failure_kind().classify()
    }
}

impl Classify for FailureKind {
    fn failure_kind(&self) -> FailureKind {
        *self
    }
}

impl Classify for io::Error {
    fn failure_kind(&self) -> FailureKind {
        match self.kind() {
            io::ErrorKind::TimedOut
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::UnexpectedEof => FailureKind::NetworkFailure,
            io::ErrorKind::PermissionDenied => FailureKind::Unauthorized,
            io::ErrorKind::NotFound | io::ErrorKind::InvalidInput => FailureKind::ClientFault,
            _ => FailureKind::Unknown,
        }
    }
}

impl<T: Classify + ?Sized> Classify for Box<T> {
    fn failure_kind(&self) -> FailureKind {
        (**self).failure_kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_table() {
        let cases = [
            (FailureKind::RateLimited, true, false),
            (FailureKind::ServerUnavailable, true, true),
            (FailureKind::NetworkFailure, true, true),
            (FailureKind::Unauthorized, false, true),
            (FailureKind::ClientFault, false, false),
            (FailureKind::Unknown, false, false),
        ];

        for (kind, retryable, breaker_relevant) in cases {
            let c = kind.classify();
            assert_eq!(c.retryable, retryable, "{kind} retryable");
            assert_eq!(c.breaker_relevant, breaker_relevant, "{kind} breaker");
        }
    }

    #[test]
    fn test_io_error_mapping() {
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert_eq!(refused.failure_kind(), FailureKind::NetworkFailure);

        let timeout = io::Error::from(io::ErrorKind::TimedOut);
        assert!(timeout.classification().retryable);

        let other = io::Error::other("opaque");
        assert_eq!(other.failure_kind(), FailureKind::Unknown);
        assert!(!other.classification().retryable);
    }

    #[test]
    fn test_labels() {
        assert_eq!(FailureKind::ServerUnavailable.to_string(), "server_unavailable");
        assert_eq!(FailureKind::ClientFault.as_str(), "client_fault");
    }
}
