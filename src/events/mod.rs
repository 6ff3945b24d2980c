//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to the events emitted by stream workers and the
//! supervisor.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `StreamWorker` (connect/frame/warning/error/disconnect).
//! - **Consumers**: the supervisor's handler listener (fans out to
//!   [`Handler`](crate::Handler) implementations) and any receiver obtained
//!   from [`Supervisor::events`](crate::Supervisor::events).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
