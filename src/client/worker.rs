//! # StreamWorker: one connection attempt end-to-end.
//!
//! Owns the per-connection state machine:
//!
//! ```text
//! CONNECTING ──► 200 ──► READING ──► stop/halt ──► exit
//!     │            │
//!     │            └─ I/O failure ─────────► linear backoff ──┐
//!     ├─ 4xx (≠420): extract message ─────► fatal, exit       │
//!     ├─ 420 / 5xx / other status ────────► exponential ──────┤
//!     ├─ unreachable endpoint ────────────► fatal, exit       │
//!     └◄──────────────── sleep(delay), retry ◄────────────────┘
//! ```
//!
//! ## Rules
//! - Both backoff counters reset whenever a connection reaches 200.
//! - The connected flag is set once, never reset; the supervisor reads it
//!   to decide when a hot-swap may retire the old worker.
//! - Every retry publishes a warning naming the computed delay; every
//!   give-up or non-retryable failure publishes an error.
//! - `Disconnected` is suppressed when the stop token fired: a hot-swap
//!   retirement or explicit stop is seamless from the caller's view.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::decoder::{ChunkDecoder, Decoded};
use super::response;
use crate::config::Config;
use crate::error::StreamError;
use crate::events::{Bus, Event, EventKind};
use crate::feed::Feed;
use crate::policies::{BackoffDecision, BackoffState};

/// Supervisor-side handle to a spawned worker.
pub(crate) struct WorkerHandle {
    /// Join handle for the worker's run loop.
    pub join: JoinHandle<()>,
    /// Set once the worker's connection reaches status 200.
    pub connected: Arc<AtomicBool>,
    /// Cancelling this retires the worker cooperatively.
    pub stop: CancellationToken,
}

impl WorkerHandle {
    pub(crate) fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

/// Clean exits from a connection attempt.
enum Exit {
    /// The stop token fired (hot-swap retirement or shutdown).
    Stopped,
    /// The collaborator reported it is no longer running.
    Halted,
}

/// Structured error payload carried by non-2xx responses.
#[derive(Deserialize)]
struct ErrorPayload {
    message: Option<String>,
}

/// One connection attempt end-to-end, retried in place per the backoff
/// policy until a terminal condition.
pub(crate) struct StreamWorker {
    pub name: Arc<str>,
    pub feed: Arc<dyn Feed>,
    pub hashes: Arc<RwLock<BTreeSet<String>>>,
    pub bus: Bus,
    pub cfg: Config,
    pub connected: Arc<AtomicBool>,
    pub stop: CancellationToken,
}

impl StreamWorker {
    /// Runs the connect/stream/retry loop until a terminal condition.
    ///
    /// Exit conditions:
    /// - the stop token fired (disconnect suppressed),
    /// - the collaborator's running flag cleared,
    /// - a fatal failure (unreachable endpoint, 4xx rejection),
    /// - an exhausted retry budget.
    pub(crate) async fn run(self) {
        let mut backoff = BackoffState::default();
        let mut attempt: u32 = 0;

        loop {
            if self.stop.is_cancelled() || !self.feed.is_running(true) {
                break;
            }
            attempt += 1;

            let err = match self.attempt(&mut backoff).await {
                Ok(_exit) => break,
                Err(err) => err,
            };
            log::debug!("[{}] attempt {attempt} failed: {}", self.name, err.as_label());

            let Some(class) = err.retry_class() else {
                self.publish(
                    Event::new(EventKind::StreamFailed)
                        .with_reason(err.to_string())
                        .with_attempt(attempt),
                );
                break;
            };
            match backoff.advance(class, &self.cfg.backoff) {
                BackoffDecision::Retry(delay) => {
                    self.publish(
                        Event::new(EventKind::RetryScheduled)
                            .with_reason(format!(
                                "{err}, retrying in {} seconds",
                                delay.as_secs()
                            ))
                            .with_delay(delay)
                            .with_attempt(attempt),
                    );
                    tokio::select! {
                        _ = time::sleep(delay) => {}
                        _ = self.stop.cancelled() => break,
                    }
                }
                BackoffDecision::GiveUp => {
                    self.publish(
                        Event::new(EventKind::StreamFailed)
                            .with_reason(format!("{err}, no more retries"))
                            .with_attempt(attempt),
                    );
                    break;
                }
            }
        }

        // The socket, if any, was dropped with its attempt. A planned
        // retirement is invisible to the caller.
        if !self.stop.is_cancelled() {
            self.publish(Event::new(EventKind::Disconnected));
        }
        log::debug!("[{}] exiting", self.name);
    }

    /// One attempt: connect, classify the response, and stream on 200.
    async fn attempt(&self, backoff: &mut BackoffState) -> Result<Exit, StreamError> {
        let raw_url = {
            let hashes = self.hashes.read().await;
            self.feed.url(&hashes)
        };
        let url = Url::parse(&raw_url)
            .map_err(|e| StreamError::Unreachable(format!("invalid url {raw_url:?}: {e}")))?;
        let (host, port) = response::endpoint(&url)?;
        log::info!("[{}] connecting to <{url}>", self.name);

        let mut sock =
            time::timeout(self.cfg.connect_timeout, TcpStream::connect((host.as_str(), port)))
                .await
                .map_err(|_| {
                    StreamError::Unreachable(format!("connect to {host}:{port} timed out"))
                })?
                .map_err(|e| StreamError::Unreachable(e.to_string()))?;

        let request =
            response::format_request(&url, &self.feed.auth_header(), &self.feed.user_agent());
        sock.write_all(request.as_bytes())
            .await
            .map_err(|e| StreamError::Unreachable(format!("sending request: {e}")))?;

        let head = response::read_head(&mut sock, self.cfg.connect_timeout).await?;
        let mut decoder =
            ChunkDecoder::new(sock, head.chunked, self.cfg.recv_size, self.cfg.read_poll);
        decoder.seed(&head.remainder);

        match head.status {
            200 => {
                backoff.reset();
                self.publish(Event::new(EventKind::Connected));
                self.connected.store(true, Ordering::Release);
                self.stream(&mut decoder).await
            }
            status if (400..500).contains(&status) && status != 420 => {
                Err(self.rejection(status, &mut decoder).await)
            }
            status => Err(StreamError::BadStatus { status }),
        }
    }

    /// Pulls frames and hands each to the sink until stop or halt.
    async fn stream(&self, decoder: &mut ChunkDecoder<TcpStream>) -> Result<Exit, StreamError> {
        loop {
            if self.stop.is_cancelled() {
                return Ok(Exit::Stopped);
            }
            if !self.feed.is_running(false) {
                return Ok(Exit::Halted);
            }
            match decoder.next_frame(&self.stop).await? {
                Decoded::Frame(frame) => {
                    self.publish(Event::new(EventKind::FrameReceived).with_frame(frame));
                }
                Decoded::Stopped => return Ok(Exit::Stopped),
                Decoded::End => {
                    return Err(StreamError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "server ended the response body",
                    )))
                }
            }
        }
    }

    /// Extracts the error message from a 4xx response body.
    async fn rejection(&self, status: u16, decoder: &mut ChunkDecoder<TcpStream>) -> StreamError {
        let fallback = format!("Connection failed: {status} [no error message]");
        let frame = match decoder.next_frame(&self.stop).await {
            Ok(Decoded::Frame(frame)) => frame,
            _ => return StreamError::Rejected(fallback),
        };
        match serde_json::from_slice::<ErrorPayload>(&frame) {
            Ok(ErrorPayload {
                message: Some(message),
            }) => StreamError::Rejected(message),
            Ok(_) => StreamError::Rejected("Hash not found".into()),
            Err(_) => StreamError::Rejected(fallback),
        }
    }

    fn publish(&self, event: Event) {
        self.bus.publish(event.with_worker(self.name.clone()));
    }
}
