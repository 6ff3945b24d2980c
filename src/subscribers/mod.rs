//! # Event handlers: the sink side of the client.
//!
//! This module provides the [`Handler`] trait — the callback surface the
//! supervisor and workers report to — and a built-in [`LogWriter`] that logs
//! every event through the `log` facade.
//!
//! ## Architecture
//! ```text
//! StreamWorker ── publish(Event) ──► Bus ──► handler listener (supervisor)
//!                                               │
//!                                               ├──► handler.on_event(&ev)
//!                                               │        │ dispatches to
//!                                               │        ▼
//!                                               │   on_connect / on_frame /
//!                                               │   on_warning / on_error /
//!                                               │   on_disconnect
//!                                               └──► next handler …
//! ```
//!
//! Handlers run on the supervisor's listener task; keep them quick and use
//! async I/O. A handler that needs heavy work should hand the event off to
//! its own task.

mod handler;
mod log;

pub use self::log::LogWriter;
pub use handler::Handler;
