//! # Events emitted by stream workers.
//!
//! [`EventKind`] classifies the five user-meaningful outcomes that cross the
//! worker boundary: connect, data, warning, error, disconnect. Nothing else
//! escapes a worker's run loop.
//!
//! [`Event`] carries the payload metadata: timestamps, the worker name, the
//! decoded frame, retry delays and attempt counts.
//!
//! ## Ordering
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically; use it to restore order if events are observed through a
//! lagging receiver.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use bytes::Bytes;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of stream events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A connection reached status 200 and the worker entered the read loop.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    Connected,

    /// One decoded protocol frame, delivered in near-real-time.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `frame`: the frame payload
    FrameReceived,

    /// A retry was scheduled; names the computed delay.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `reason`: human-readable message ("…, retrying in N seconds")
    /// - `delay`: the computed delay
    /// - `attempt`: the attempt that failed
    RetryScheduled,

    /// A non-retryable failure, or a retry budget exhausted.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `reason`: failure message
    /// - `attempt`: the attempt that failed
    StreamFailed,

    /// The worker terminated for any reason other than a planned hot-swap
    /// retirement or an explicit stop.
    ///
    /// Sets:
    /// - `worker`: worker name
    Disconnected,
}

/// Stream event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Name of the worker that produced the event.
    pub worker: Option<Arc<str>>,
    /// Decoded frame payload (`FrameReceived` only).
    pub frame: Option<Bytes>,
    /// Human-readable reason (warnings and errors).
    pub reason: Option<Arc<str>>,
    /// Backoff delay before the next attempt.
    pub delay: Option<Duration>,
    /// Connection attempt count (starting from 1).
    pub attempt: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp and
    /// the next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            worker: None,
            frame: None,
            reason: None,
            delay: None,
            attempt: None,
        }
    }

    /// Attaches the producing worker's name.
    #[inline]
    pub fn with_worker(mut self, worker: impl Into<Arc<str>>) -> Self {
        self.worker = Some(worker.into());
        self
    }

    /// Attaches a frame payload.
    #[inline]
    pub fn with_frame(mut self, frame: Bytes) -> Self {
        self.frame = Some(frame);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a backoff delay.
    #[inline]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }
}
