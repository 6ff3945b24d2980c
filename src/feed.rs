//! # The collaborator query interface.
//!
//! The client core does not know how subscription URLs, credentials, or user
//! agent strings are built; it asks a [`Feed`] implementation supplied by the
//! caller. The supervisor owns the hash set and passes it to
//! [`Feed::url`] at the moment a worker builds its connection request.

use std::collections::BTreeSet;

/// Queries the client core issues against its owner.
///
/// Implementations are expected to be cheap and non-blocking: `is_running`
/// is consulted before every reconnect (`blocking = true`) and again
/// between frames (`blocking = false`).
///
/// # Example
/// ```
/// use std::collections::BTreeSet;
/// use firehose::Feed;
///
/// struct MyFeed;
///
/// impl Feed for MyFeed {
///     fn is_running(&self, _blocking: bool) -> bool { true }
///     fn auth_header(&self) -> String { "user:apikey".into() }
///     fn user_agent(&self) -> String { "my-client/1.0".into() }
///     fn url(&self, hashes: &BTreeSet<String>) -> String {
///         let joined = hashes.iter().cloned().collect::<Vec<_>>().join(",");
///         format!("http://stream.example.com/multi?hashes={joined}")
///     }
/// }
/// ```
pub trait Feed: Send + Sync + 'static {
    /// Whether the owning application still wants the stream. Workers exit
    /// their run loop once this returns false. `blocking` distinguishes the
    /// pre-reconnect checkpoint (`true`) from the between-frames one
    /// (`false`).
    fn is_running(&self, blocking: bool) -> bool;

    /// Value for the `Auth` request header.
    fn auth_header(&self) -> String;

    /// Value for the `User-Agent` request header.
    fn user_agent(&self) -> String;

    /// Builds the subscription URL for the given hash set. Called once per
    /// connection attempt, with the set as it is at that moment.
    fn url(&self, hashes: &BTreeSet<String>) -> String;
}
