//! Client core: connection lifecycle and wire decoding.
//!
//! Internal modules:
//! - [`decoder`]: turns the raw byte stream into discrete protocol frames
//!   (identity and chunked-transfer framing);
//! - [`response`]: writes the GET request and parses the response head off
//!   the raw socket;
//! - [`worker`]: one connection attempt end-to-end — connect, classify,
//!   stream, back off, retry;
//! - [`supervisor`]: owns the subscription set, starts/replaces workers,
//!   runs the hot-swap protocol.
//!
//! The only public API from this module is [`Supervisor`].

mod decoder;
mod response;
mod supervisor;
mod worker;

pub use supervisor::Supervisor;
