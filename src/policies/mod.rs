//! Reconnection policies.
//!
//! Pure decision logic mapping "which failure category + how far into the
//! streak" to "wait N seconds and retry" or "give up". No I/O, no clocks;
//! the worker owns the sleeping.
//!
//! ## Contents
//! - [`BackoffPolicy`] the delay constants for both retry categories
//! - [`BackoffState`]  the per-worker-run counters
//! - [`BackoffDecision`] retry-with-delay or give-up
//!
//! ## Quick wiring
//! ```text
//! StreamWorker run loop:
//!     attempt() fails with class C
//!         └─► state.advance(C, &policy)
//!               ├─► Retry(delay)  → publish warning, sleep, reconnect
//!               └─► GiveUp        → publish error, exit
//!     attempt() reaches status 200
//!         └─► state.reset()
//! ```

mod backoff;

pub use backoff::{BackoffDecision, BackoffPolicy, BackoffState};
