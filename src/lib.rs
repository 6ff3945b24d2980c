//! # firehose
//!
//! Persistent streaming client for newline-delimited JSON firehose feeds
//! over raw HTTP sockets.
//!
//! The crate keeps one long-lived connection to a streaming endpoint,
//! decodes the body into discrete frames as bytes arrive (identity and
//! chunked transfer framing), classifies every failure into a retry
//! category with its own backoff curve, and replaces the connection
//! without a coverage gap when the subscription set changes.
//!
//! ## Architecture
//!
//! ```text
//!   Supervisor ───────────────────────────────────────────────┐
//!     │ owns subscription set (hashes)                        │
//!     │ spawn / hot-swap / stop                               │
//!     ▼                                                       │
//!   StreamWorker (tokio task)                                 │
//!     │ connect → classify status → stream                    │
//!     │      │                                                │
//!     │      └─ on failure: BackoffState::advance             │
//!     │           ├─ Retry(delay) → sleep, reconnect          │
//!     │           └─ GiveUp       → halt                      │
//!     ▼                                                       ▼
//!   ChunkDecoder ── frames ──► Bus ──► handler listener ──► Handler
//!                               │
//!                               └────► Supervisor::events() receivers
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use std::collections::BTreeSet;
//! use std::sync::Arc;
//!
//! use firehose::{Config, Feed, LogWriter, Supervisor};
//!
//! struct MyFeed;
//!
//! impl Feed for MyFeed {
//!     fn is_running(&self, _blocking: bool) -> bool {
//!         true
//!     }
//!     fn auth_header(&self) -> String {
//!         "user:api-key".into()
//!     }
//!     fn user_agent(&self) -> String {
//!         "my-consumer/1.0".into()
//!     }
//!     fn url(&self, hashes: &BTreeSet<String>) -> String {
//!         let joined = hashes.iter().cloned().collect::<Vec<_>>().join(",");
//!         format!("http://stream.example.com/multi?hashes={joined}")
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut sup = Supervisor::new(
//!         Arc::new(MyFeed),
//!         vec![Arc::new(LogWriter)],
//!         Config::default(),
//!     );
//!     sup.subscribe("2459a09b6a3b5ef4ab8f21291d1d9a3a", false).await;
//!     sup.start();
//!     sup.run().await;
//! }
//! ```
//!
//! ## Failure handling
//!
//! Every connection failure carries a retry category
//! ([`StreamError::retry_class`]):
//!
//! - **Exponential** (non-200 status worth retrying): 10s, doubling to a
//!   320s ceiling, then give up.
//! - **Linear** (socket errors mid-stream): 1s, +1s per failure to 16s,
//!   then give up.
//! - **Fatal** (endpoint unreachable, 4xx rejection): no retry; the worker
//!   reports and halts.
//!
//! Both counters reset the moment a connection attempt reaches a 200.

mod client;
mod config;
mod error;
mod events;
mod feed;
mod policies;
mod subscribers;

pub use client::Supervisor;
pub use config::Config;
pub use error::{RetryClass, RuntimeError, StreamError};
pub use events::{Bus, Event, EventKind};
pub use feed::Feed;
pub use policies::{BackoffDecision, BackoffPolicy, BackoffState};
pub use subscribers::{Handler, LogWriter};
