//! # Broadcast channel carrying stream events.
//!
//! Workers publish into one bounded [`tokio::sync::broadcast`] channel; the
//! supervisor's handler listener and any receiver handed out by
//! [`Supervisor::events`](crate::Supervisor::events) read from it
//! independently. A worker never waits on its consumers: with nobody
//! subscribed an event is simply dropped, and a receiver that falls more
//! than the channel capacity behind observes `RecvError::Lagged` in place
//! of the overwritten events. Frames ride the bus too, so size the
//! capacity for the feed's burst rate, not its average.

use tokio::sync::broadcast;

use super::event::Event;

/// Fan-out point between the workers and everything that observes them.
///
/// Clones share one underlying channel, so a worker and the supervisor can
/// hold the same bus; cloning is an `Arc` bump.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus whose ring buffer holds `capacity` events (at least 1;
    /// `broadcast::channel` panics on zero).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Event>(capacity);
        Self { tx }
    }

    /// Sends an event to every live receiver without blocking. With no
    /// receivers the event is dropped.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Opens an independent receiver. It observes only events published
    /// after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
