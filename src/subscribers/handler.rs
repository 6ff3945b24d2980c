//! # Event handler trait.
//!
//! [`Handler`] is the extension point for reacting to the stream: it exposes
//! the five user-meaningful callbacks (connect, data, warning, error,
//! disconnect) plus a provided [`Handler::on_event`] dispatcher that the
//! supervisor's listener calls with each bus event.
//!
//! All callbacks have empty default bodies, so an implementation overrides
//! only what it cares about.

use async_trait::async_trait;
use bytes::Bytes;

use crate::events::{Event, EventKind};

/// Callback surface receiving stream lifecycle notifications.
///
/// # Example
/// ```rust
/// use async_trait::async_trait;
/// use bytes::Bytes;
/// use firehose::Handler;
///
/// struct Printer;
///
/// #[async_trait]
/// impl Handler for Printer {
///     async fn on_frame(&self, frame: &Bytes) {
///         println!("{}", String::from_utf8_lossy(frame));
///     }
///     async fn on_error(&self, message: &str) {
///         eprintln!("stream error: {message}");
///     }
/// }
/// ```
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// A connection reached status 200.
    async fn on_connect(&self) {}

    /// One decoded frame.
    async fn on_frame(&self, _frame: &Bytes) {}

    /// A retry was scheduled; `message` names the computed delay.
    async fn on_warning(&self, _message: &str) {}

    /// A non-retryable failure or an exhausted retry budget.
    async fn on_error(&self, _message: &str) {}

    /// The worker terminated outside of a planned hot-swap or stop.
    async fn on_disconnect(&self) {}

    /// Dispatches a bus event to the matching callback.
    ///
    /// Override this only to observe raw events (sequence numbers, worker
    /// names); the default routing is what the supervisor relies on.
    async fn on_event(&self, event: &Event) {
        match event.kind {
            EventKind::Connected => self.on_connect().await,
            EventKind::FrameReceived => {
                if let Some(frame) = &event.frame {
                    self.on_frame(frame).await;
                }
            }
            EventKind::RetryScheduled => {
                if let Some(message) = event.reason.as_deref() {
                    self.on_warning(message).await;
                }
            }
            EventKind::StreamFailed => {
                if let Some(message) = event.reason.as_deref() {
                    self.on_error(message).await;
                }
            }
            EventKind::Disconnected => self.on_disconnect().await,
        }
    }
}
