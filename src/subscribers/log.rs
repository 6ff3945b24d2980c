//! # Logging handler for debugging and demos.
//!
//! [`LogWriter`] forwards every event to the `log` facade in a compact,
//! human-readable format:
//!
//! ```text
//! [connected] worker=stream-1
//! [frame] worker=stream-1 len=142
//! [retry] worker=stream-1 msg="received 503 response, retrying in 10 seconds"
//! [failed] worker=stream-1 msg="Unknown hash"
//! [disconnected] worker=stream-1
//! ```
//!
//! Wire it up like any other handler; install a `log` backend of your choice
//! to see the output.

use async_trait::async_trait;

use super::Handler;
use crate::events::{Event, EventKind};

/// Built-in handler that logs every event via the `log` facade.
///
/// Frames are logged by length only; implement a custom [`Handler`] to do
/// anything useful with payloads.
pub struct LogWriter;

#[async_trait]
impl Handler for LogWriter {
    async fn on_event(&self, event: &Event) {
        let worker = event.worker.as_deref().unwrap_or("?");
        match event.kind {
            EventKind::Connected => {
                log::info!("[connected] worker={worker}");
            }
            EventKind::FrameReceived => {
                let len = event.frame.as_ref().map_or(0, |f| f.len());
                log::debug!("[frame] worker={worker} len={len}");
            }
            EventKind::RetryScheduled => {
                let msg = event.reason.as_deref().unwrap_or("");
                log::warn!("[retry] worker={worker} msg={msg:?}");
            }
            EventKind::StreamFailed => {
                let msg = event.reason.as_deref().unwrap_or("");
                log::error!("[failed] worker={worker} msg={msg:?}");
            }
            EventKind::Disconnected => {
                log::info!("[disconnected] worker={worker}");
            }
        }
    }
}
