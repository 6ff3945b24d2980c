//! Error types used by the streaming client.
//!
//! This module defines two error enums:
//!
//! - [`StreamError`] — failures of a single connection attempt or of the
//!   read loop. Each value maps to a retry category via
//!   [`StreamError::retry_class`].
//! - [`RuntimeError`] — failures of the supervisor itself (currently only a
//!   hot-swap whose replacement died before connecting).
//!
//! The worker never lets a `StreamError` escape its run loop: every failure
//! is either converted into a retry decision or a terminal sink event.

use thiserror::Error;

/// Retry category for a failed connection attempt or read.
///
/// Status-code failures (420, 5xx, anything unexpected) back off
/// exponentially; socket-level failures during the read phase back off
/// linearly. See [`crate::BackoffState`] for the exact delay sequences.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryClass {
    /// Socket I/O or unclassified failure: retry with linearly growing delay.
    Linear,
    /// Rate-limited/server/unexpected status: retry with doubling delay.
    Exponential,
}

/// # Failures of a single connection attempt or read.
///
/// The variants follow the failure taxonomy of the upstream service:
/// connect-level failures and client errors are fatal, status-code failures
/// retry exponentially, socket failures retry linearly.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StreamError {
    /// The request never reached the server (DNS, connect, request write,
    /// or no response head). Fatal; reported immediately, never retried.
    #[error("connection failed: {0}")]
    Unreachable(String),

    /// The server rejected the request with a 4xx (other than 420). Carries
    /// the message extracted from the error payload, verbatim. Fatal.
    #[error("{0}")]
    Rejected(String),

    /// Any non-200 status that is not a plain client error: 420, 5xx, or
    /// something unexpected. Exponential-backoff-eligible.
    #[error("received {status} response")]
    BadStatus {
        /// The HTTP status code that was received.
        status: u16,
    },

    /// Socket-level failure while reading the stream, including the server
    /// closing the connection. Linear-backoff-eligible.
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    /// The response could not be understood (bad status line, bad chunk size
    /// line). Folded into the linear-backoff bucket.
    #[error("malformed response: {0}")]
    Protocol(String),
}

impl StreamError {
    /// Returns the retry category, or `None` for fatal errors that must not
    /// be retried.
    pub fn retry_class(&self) -> Option<RetryClass> {
        match self {
            StreamError::Unreachable(_) | StreamError::Rejected(_) => None,
            StreamError::BadStatus { .. } => Some(RetryClass::Exponential),
            StreamError::Io(_) | StreamError::Protocol(_) => Some(RetryClass::Linear),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            StreamError::Unreachable(_) => "stream_unreachable",
            StreamError::Rejected(_) => "stream_rejected",
            StreamError::BadStatus { .. } => "stream_bad_status",
            StreamError::Io(_) => "stream_io",
            StreamError::Protocol(_) => "stream_protocol",
        }
    }
}

/// # Failures of the supervisor runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A hot-swap replacement worker terminated before it ever connected.
    /// The previous worker is left running; the failure that killed the
    /// replacement was already reported through the event bus.
    #[error("replacement stream terminated before connecting")]
    SwapFailed,
}
