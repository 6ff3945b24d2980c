//! # Connection supervisor.
//!
//! Owns the subscription set and the current worker, and exposes the
//! control surface: `start`, `stop`, `subscribe`, `unsubscribe`, `restart`,
//! `poll`, `run`.
//!
//! ## Hot-swap protocol
//! `restart()` is the core correctness guarantee of a subscription change:
//!
//! ```text
//! spawn replacement worker (current hash set)
//!        │
//!        ▼ poll its connected flag
//! replacement reaches 200 ── happens-before ──► cancel old worker
//!        │                                           │
//!        ▼                                           ▼
//! supervisor's current = replacement        old worker exits silently
//! ```
//!
//! The old connection is never torn down before the new one is confirmed
//! live, so there is no coverage gap; a brief double-connected overlap is
//! expected. The ordering is enforced by this function's sequential logic,
//! not by a lock.

use std::collections::BTreeSet;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, RwLock};
use tokio::time;
use tokio_util::sync::CancellationToken;

use super::worker::{StreamWorker, WorkerHandle};
use crate::config::Config;
use crate::error::RuntimeError;
use crate::events::{Bus, Event};
use crate::feed::Feed;
use crate::subscribers::Handler;

/// Supervises one logical subscription session.
///
/// The subscription set persists across worker restarts; a worker reads it
/// only at the moment it builds its connection request. Mutations with
/// `restart = false` are staged and take effect on the next restart.
pub struct Supervisor {
    feed: Arc<dyn Feed>,
    handlers: Vec<Arc<dyn Handler>>,
    cfg: Config,
    bus: Bus,
    hashes: Arc<RwLock<BTreeSet<String>>>,
    current: Option<WorkerHandle>,
    runtime: CancellationToken,
    listening: bool,
    spawned: u64,
}

impl Supervisor {
    /// Creates a supervisor. Nothing runs until [`start`](Self::start).
    pub fn new(feed: Arc<dyn Feed>, handlers: Vec<Arc<dyn Handler>>, cfg: Config) -> Self {
        let bus = Bus::new(cfg.bus_capacity);
        Self {
            feed,
            handlers,
            cfg,
            bus,
            hashes: Arc::new(RwLock::new(BTreeSet::new())),
            current: None,
            runtime: CancellationToken::new(),
            listening: false,
            spawned: 0,
        }
    }

    /// Returns an independent receiver for the raw event stream.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Returns a snapshot of the subscription set.
    pub async fn hashes(&self) -> BTreeSet<String> {
        self.hashes.read().await.clone()
    }

    /// Clears any previous stop and spawns a worker.
    ///
    /// A stale handle left behind by a stop or a dead worker counts as
    /// absent, so a stop/start cycle begins a fresh session. A no-op only
    /// while a live worker is current.
    pub fn start(&mut self) {
        if self.runtime.is_cancelled() {
            self.runtime = CancellationToken::new();
        }
        self.ensure_listener();
        let live = self
            .current
            .as_ref()
            .map_or(false, |h| !h.join.is_finished());
        if !live {
            self.current = Some(self.spawn_worker());
        }
    }

    /// Signals the current worker to wind down cooperatively.
    ///
    /// No blocking call is interrupted; cancellation latency is bounded by
    /// the decoder's readiness-check interval and by sleep granularity.
    pub fn stop(&self) {
        self.runtime.cancel();
    }

    /// Adds a hash to the subscription set.
    ///
    /// Subscribing an already-present hash is a no-op that logs and returns
    /// `false` without mutating the set. On a successful mutation, `restart`
    /// decides whether the hot-swap runs now or the change stays staged.
    pub async fn subscribe(&mut self, hash: &str, restart: bool) -> bool {
        {
            let mut set = self.hashes.write().await;
            if !set.insert(hash.to_owned()) {
                log::error!("cannot add: hash {hash} is already being tracked");
                return false;
            }
        }
        self.maybe_restart(restart).await;
        true
    }

    /// Removes a hash from the subscription set.
    ///
    /// Symmetric to [`subscribe`](Self::subscribe): removing an absent hash
    /// logs and returns `false` without mutating the set.
    pub async fn unsubscribe(&mut self, hash: &str, restart: bool) -> bool {
        {
            let mut set = self.hashes.write().await;
            if !set.remove(hash) {
                log::error!("cannot remove: hash {hash} is not currently being tracked");
                return false;
            }
        }
        self.maybe_restart(restart).await;
        true
    }

    async fn maybe_restart(&mut self, restart: bool) {
        if !restart {
            return;
        }
        if let Err(e) = self.restart().await {
            log::error!("hot-swap after subscription change failed: {e}");
        }
    }

    /// Replaces the current worker without a coverage gap.
    ///
    /// Spawns a replacement with the current subscription set, waits for its
    /// connected flag, and only then retires the old worker. If the
    /// replacement terminates before ever connecting (for example a 4xx
    /// rejection), the old worker keeps running and
    /// [`RuntimeError::SwapFailed`] is returned; whatever killed the
    /// replacement was already reported through the event bus.
    pub async fn restart(&mut self) -> Result<(), RuntimeError> {
        self.ensure_listener();
        let fresh = self.spawn_worker();
        while !fresh.is_connected() {
            if fresh.join.is_finished() {
                return Err(RuntimeError::SwapFailed);
            }
            time::sleep(self.cfg.swap_poll).await;
        }
        if let Some(old) = self.current.take() {
            old.stop.cancel();
        }
        self.current = Some(fresh);
        log::debug!("hot-swap complete after {} spawned workers", self.spawned);
        Ok(())
    }

    /// Liveness check: whether the current worker is still executing,
    /// blocking up to `timeout` waiting for it to finish.
    pub async fn poll(&mut self, timeout: Duration) -> bool {
        let Some(handle) = self.current.as_mut() else {
            return false;
        };
        match time::timeout(timeout, &mut handle.join).await {
            Ok(_joined) => {
                self.current = None;
                false
            }
            Err(_elapsed) => true,
        }
    }

    /// Driving loop: polls worker liveness once per `liveness_poll` until
    /// stopped or the worker dies unexpectedly.
    pub async fn run(&mut self) {
        loop {
            if self.runtime.is_cancelled() {
                return;
            }
            if !self.poll(self.cfg.liveness_poll).await {
                return;
            }
        }
    }

    fn spawn_worker(&mut self) -> WorkerHandle {
        self.spawned += 1;
        let name: Arc<str> = format!("stream-{}", self.spawned).into();
        let stop = self.runtime.child_token();
        let connected = Arc::new(AtomicBool::new(false));
        let worker = StreamWorker {
            name,
            feed: self.feed.clone(),
            hashes: self.hashes.clone(),
            bus: self.bus.clone(),
            cfg: self.cfg.clone(),
            connected: connected.clone(),
            stop: stop.clone(),
        };
        WorkerHandle {
            join: tokio::spawn(worker.run()),
            connected,
            stop,
        }
    }

    /// Spawns the task that fans bus events out to the handlers. Runs for
    /// the lifetime of the supervisor; survives stop/start cycles.
    fn ensure_listener(&mut self) {
        if self.listening {
            return;
        }
        self.listening = true;
        if self.handlers.is_empty() {
            return;
        }
        let handlers = self.handlers.clone();
        let mut rx = self.bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => {
                        for handler in &handlers {
                            handler.on_event(&ev).await;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        log::warn!("handler listener lagged, skipped {n} events");
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;

    struct TestFeed {
        base: String,
    }

    impl Feed for TestFeed {
        fn is_running(&self, _blocking: bool) -> bool {
            true
        }
        fn auth_header(&self) -> String {
            "user:key".into()
        }
        fn user_agent(&self) -> String {
            "firehose-test/0".into()
        }
        fn url(&self, hashes: &BTreeSet<String>) -> String {
            let joined = hashes.iter().cloned().collect::<Vec<_>>().join(",");
            format!("{}?hashes={joined}", self.base)
        }
    }

    fn test_config() -> Config {
        Config {
            connect_timeout: Duration::from_secs(2),
            read_poll: Duration::from_millis(50),
            swap_poll: Duration::from_millis(20),
            liveness_poll: Duration::from_millis(50),
            ..Config::default()
        }
    }

    fn supervisor_at(addr: SocketAddr) -> Supervisor {
        let feed = Arc::new(TestFeed {
            base: format!("http://{addr}/stream"),
        });
        Supervisor::new(feed, Vec::new(), test_config())
    }

    /// Reads one HTTP request off the socket, returning its head as text.
    async fn read_request(sock: &mut TcpStream) -> String {
        let mut data = Vec::new();
        let mut byte = [0u8; 256];
        loop {
            let n = sock.read(&mut byte).await.unwrap();
            data.extend_from_slice(&byte[..n]);
            if n == 0 || data.windows(4).any(|w| w == b"\r\n\r\n") {
                return String::from_utf8_lossy(&data).into_owned();
            }
        }
    }

    async fn next_event(rx: &mut broadcast::Receiver<Event>) -> Event {
        time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    /// Waits for the next event of the given kind, skipping frames.
    async fn wait_for(rx: &mut broadcast::Receiver<Event>, kind: EventKind) -> Event {
        loop {
            let ev = next_event(rx).await;
            if ev.kind == kind {
                return ev;
            }
            assert_eq!(
                ev.kind,
                EventKind::FrameReceived,
                "unexpected event while waiting for {kind:?}"
            );
        }
    }

    #[tokio::test]
    async fn subscribing_a_tracked_hash_is_a_no_op() {
        let mut sup = supervisor_at("127.0.0.1:1".parse().unwrap());
        assert!(sup.subscribe("abc", false).await);
        assert!(!sup.subscribe("abc", false).await);
        assert_eq!(sup.hashes().await.len(), 1);
    }

    #[tokio::test]
    async fn unsubscribing_an_untracked_hash_is_a_no_op() {
        let mut sup = supervisor_at("127.0.0.1:1".parse().unwrap());
        assert!(!sup.unsubscribe("abc", false).await);
        assert!(sup.subscribe("abc", false).await);
        assert!(sup.unsubscribe("abc", false).await);
        assert!(sup.hashes().await.is_empty());
    }

    #[tokio::test]
    async fn staged_mutations_apply_in_order() {
        let mut sup = supervisor_at("127.0.0.1:1".parse().unwrap());
        sup.subscribe("a", false).await;
        sup.subscribe("b", false).await;
        sup.subscribe("c", false).await;
        sup.unsubscribe("b", false).await;
        let set = sup.hashes().await;
        assert_eq!(
            set.into_iter().collect::<Vec<_>>(),
            vec!["a".to_owned(), "c".to_owned()]
        );
    }

    #[tokio::test]
    async fn connects_and_delivers_identity_frames() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            read_request(&mut sock).await;
            sock.write_all(b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\nA\nB\nC\n")
                .await
                .unwrap();
            // Keep the stream open so no EOF interleaves with the frames.
            time::sleep(Duration::from_secs(5)).await;
        });

        let mut sup = supervisor_at(addr);
        let mut rx = sup.events();
        sup.start();

        assert_eq!(next_event(&mut rx).await.kind, EventKind::Connected);
        for expected in ["A", "B", "C"] {
            let ev = next_event(&mut rx).await;
            assert_eq!(ev.kind, EventKind::FrameReceived);
            assert_eq!(ev.frame.as_deref(), Some(expected.as_bytes()));
        }
        sup.stop();
    }

    #[tokio::test]
    async fn chunked_stream_is_decoded_frame_by_frame() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            read_request(&mut sock).await;
            sock.write_all(
                b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nHELLO\r\n",
            )
            .await
            .unwrap();
            time::sleep(Duration::from_secs(5)).await;
        });

        let mut sup = supervisor_at(addr);
        let mut rx = sup.events();
        sup.start();

        assert_eq!(next_event(&mut rx).await.kind, EventKind::Connected);
        let ev = next_event(&mut rx).await;
        assert_eq!(ev.kind, EventKind::FrameReceived);
        assert_eq!(ev.frame.as_deref(), Some(&b"HELLO"[..]));
        sup.stop();
    }

    #[tokio::test]
    async fn rejection_reports_the_message_and_never_reconnects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepts = Arc::new(AtomicUsize::new(0));
        let counter = accepts.clone();
        tokio::spawn(async move {
            loop {
                let (mut sock, _) = listener.accept().await.unwrap();
                counter.fetch_add(1, Ordering::SeqCst);
                read_request(&mut sock).await;
                sock.write_all(
                    b"HTTP/1.1 404 Not Found\r\nContent-Type: application/json\r\n\r\n{\"message\":\"Unknown hash\"}\n",
                )
                .await
                .unwrap();
            }
        });

        let mut sup = supervisor_at(addr);
        let mut rx = sup.events();
        sup.start();

        let ev = next_event(&mut rx).await;
        assert_eq!(ev.kind, EventKind::StreamFailed);
        assert_eq!(ev.reason.as_deref(), Some("Unknown hash"));
        assert_eq!(next_event(&mut rx).await.kind, EventKind::Disconnected);

        time::sleep(Duration::from_millis(300)).await;
        assert_eq!(accepts.load(Ordering::SeqCst), 1, "4xx must not reconnect");
        assert!(!sup.poll(Duration::from_millis(100)).await);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_fatal_without_retry() {
        // Bind then drop to get a port that refuses connections.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut sup = supervisor_at(addr);
        let mut rx = sup.events();
        sup.start();

        let ev = next_event(&mut rx).await;
        assert_eq!(ev.kind, EventKind::StreamFailed);
        assert_eq!(next_event(&mut rx).await.kind, EventKind::Disconnected);

        // The driving loop observes the dead worker and exits.
        time::timeout(Duration::from_secs(2), sup.run())
            .await
            .expect("run() should return once the worker dies");
    }

    #[tokio::test]
    async fn server_errors_schedule_an_exponential_retry() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let (mut sock, _) = listener.accept().await.unwrap();
                read_request(&mut sock).await;
                let _ = sock
                    .write_all(b"HTTP/1.1 503 Service Unavailable\r\n\r\n")
                    .await;
            }
        });

        let mut sup = supervisor_at(addr);
        let mut rx = sup.events();
        sup.start();

        let ev = next_event(&mut rx).await;
        assert_eq!(ev.kind, EventKind::RetryScheduled);
        assert_eq!(ev.delay, Some(Duration::from_secs(10)));
        assert_eq!(
            ev.reason.as_deref(),
            Some("received 503 response, retrying in 10 seconds")
        );
        sup.stop();
    }

    #[tokio::test]
    async fn hot_swap_never_leaves_a_coverage_gap() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (req_tx, mut req_rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(async move {
            loop {
                let (mut sock, _) = listener.accept().await.unwrap();
                let req_tx = req_tx.clone();
                tokio::spawn(async move {
                    let request = read_request(&mut sock).await;
                    let _ = req_tx.send(request);
                    if sock.write_all(b"HTTP/1.1 200 OK\r\n\r\n").await.is_err() {
                        return;
                    }
                    loop {
                        if sock.write_all(b"tick\n").await.is_err() {
                            return;
                        }
                        time::sleep(Duration::from_millis(25)).await;
                    }
                });
            }
        });

        let mut sup = supervisor_at(addr);
        let mut rx = sup.events();
        sup.subscribe("a", false).await;
        sup.start();

        let first = req_rx.recv().await.unwrap();
        assert!(first.contains("hashes=a "), "first request: {first}");
        assert_eq!(next_event(&mut rx).await.kind, EventKind::Connected);

        assert!(sup.subscribe("b", true).await);
        let second = req_rx.recv().await.unwrap();
        assert!(second.contains("hashes=a,b "), "second request: {second}");

        // Drain events for a while: the swap must produce a second connect
        // and suppress the old worker's disconnect entirely.
        let mut connects = 0;
        let deadline = time::Instant::now() + Duration::from_millis(500);
        while time::Instant::now() < deadline {
            let ev = match time::timeout(Duration::from_millis(100), rx.recv()).await {
                Ok(Ok(ev)) => ev,
                _ => continue,
            };
            match ev.kind {
                EventKind::Connected => connects += 1,
                EventKind::Disconnected => panic!("hot-swap leaked a disconnect"),
                _ => {}
            }
        }
        assert_eq!(connects, 1, "replacement must connect exactly once more");
        assert!(sup.poll(Duration::from_millis(50)).await, "worker must survive the swap");
        sup.stop();
    }

    #[tokio::test]
    async fn start_after_stop_begins_a_new_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let (mut sock, _) = listener.accept().await.unwrap();
                tokio::spawn(async move {
                    read_request(&mut sock).await;
                    if sock.write_all(b"HTTP/1.1 200 OK\r\n\r\n").await.is_err() {
                        return;
                    }
                    loop {
                        if sock.write_all(b"tick\n").await.is_err() {
                            return;
                        }
                        time::sleep(Duration::from_millis(25)).await;
                    }
                });
            }
        });

        let mut sup = supervisor_at(addr);
        let mut rx = sup.events();
        sup.start();
        wait_for(&mut rx, EventKind::Connected).await;

        sup.stop();

        // An explicit stop is a clean shutdown: no disconnect is reported.
        let deadline = time::Instant::now() + Duration::from_millis(300);
        while time::Instant::now() < deadline {
            if let Ok(Ok(ev)) = time::timeout(Duration::from_millis(100), rx.recv()).await {
                assert_ne!(ev.kind, EventKind::Disconnected, "stop() leaked a disconnect");
            }
        }

        // The finished handle is still held; a second session starts anyway.
        sup.start();
        wait_for(&mut rx, EventKind::Connected).await;
        assert!(
            sup.poll(Duration::from_millis(50)).await,
            "restarted session must have a live worker"
        );
        sup.stop();
    }

    #[tokio::test]
    async fn failed_swap_keeps_the_old_worker() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepts = Arc::new(AtomicUsize::new(0));
        let counter = accepts.clone();
        tokio::spawn(async move {
            loop {
                let (mut sock, _) = listener.accept().await.unwrap();
                let n = counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    read_request(&mut sock).await;
                    if n == 0 {
                        // First connection streams happily.
                        let _ = sock.write_all(b"HTTP/1.1 200 OK\r\n\r\n").await;
                        time::sleep(Duration::from_secs(5)).await;
                    } else {
                        // Replacement is rejected outright.
                        let _ = sock
                            .write_all(b"HTTP/1.1 404 Not Found\r\n\r\n{\"message\":\"nope\"}\n")
                            .await;
                    }
                });
            }
        });

        let mut sup = supervisor_at(addr);
        let mut rx = sup.events();
        sup.start();
        assert_eq!(next_event(&mut rx).await.kind, EventKind::Connected);

        assert!(matches!(
            sup.restart().await,
            Err(RuntimeError::SwapFailed)
        ));
        assert!(
            sup.poll(Duration::from_millis(50)).await,
            "old worker must keep running after a failed swap"
        );
        sup.stop();
    }
}
