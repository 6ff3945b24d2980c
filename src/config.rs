//! # Client configuration.
//!
//! Provides [`Config`], the tunables shared by the supervisor and its
//! workers. All fields are public; `Default` carries the values the upstream
//! service documents.
//!
//! ## Field semantics
//! - `connect_timeout`: bound on TCP connect and on waiting for the response
//!   head.
//! - `read_poll`: bound on each socket readiness wait, so stop flags are
//!   reevaluated periodically even while the stream is idle.
//! - `recv_size`: maximum bytes pulled off the socket per read.
//! - `bus_capacity`: event bus ring buffer size (min 1; clamped by the bus).
//! - `swap_poll`: interval at which `restart()` polls the replacement
//!   worker's connected flag during a hot-swap.
//! - `liveness_poll`: interval at which the driving loop checks that the
//!   current worker is still executing.
//! - `backoff`: the two-tier retry delay constants.

use std::time::Duration;

use crate::policies::BackoffPolicy;

/// Tunables for the supervisor and its stream workers.
#[derive(Clone, Debug)]
pub struct Config {
    /// Bound on TCP connect and on waiting for the response head.
    pub connect_timeout: Duration,
    /// Bound on each socket readiness wait in the decoder.
    pub read_poll: Duration,
    /// Maximum bytes received per socket read.
    pub recv_size: usize,
    /// Capacity of the event bus broadcast channel.
    pub bus_capacity: usize,
    /// Poll interval for the hot-swap connected-flag wait.
    pub swap_poll: Duration,
    /// Poll interval for the driving loop's liveness check.
    pub liveness_poll: Duration,
    /// Retry delay constants for both failure categories.
    pub backoff: BackoffPolicy,
}

impl Default for Config {
    /// Provides the upstream-documented defaults:
    /// - `connect_timeout = 30s`
    /// - `read_poll = 1s`
    /// - `recv_size = 16 KiB`
    /// - `bus_capacity = 1024`
    /// - `swap_poll = 100ms`
    /// - `liveness_poll = 1s`
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            read_poll: Duration::from_secs(1),
            recv_size: 16 * 1024,
            bus_capacity: 1024,
            swap_poll: Duration::from_millis(100),
            liveness_poll: Duration::from_secs(1),
            backoff: BackoffPolicy::default(),
        }
    }
}
