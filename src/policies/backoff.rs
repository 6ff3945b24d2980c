//! # Two-tier backoff for reconnecting workers.
//!
//! The upstream service prescribes two retry tracks, selected by failure
//! category:
//!
//! - **Exponential** (status-code failures): 10s, then doubling up to 320s.
//!   Once a retry has already waited 320s, the next failure gives up.
//! - **Linear** (socket failures): 1s, growing by 1s up to 16s. Once a retry
//!   has already waited 16s, the next failure gives up.
//!
//! The two tracks keep independent counters; both reset when a connection
//! reaches status 200. Within a single streak of one category the delay is
//! monotonically nondecreasing.
//!
//! # Example
//! ```rust
//! use firehose::{BackoffDecision, BackoffPolicy, BackoffState, RetryClass};
//! use std::time::Duration;
//!
//! let policy = BackoffPolicy::default();
//! let mut state = BackoffState::default();
//!
//! assert_eq!(
//!     state.advance(RetryClass::Exponential, &policy),
//!     BackoffDecision::Retry(Duration::from_secs(10)),
//! );
//! assert_eq!(
//!     state.advance(RetryClass::Exponential, &policy),
//!     BackoffDecision::Retry(Duration::from_secs(20)),
//! );
//!
//! // Reaching status 200 resets both tracks.
//! state.reset();
//! assert_eq!(
//!     state.advance(RetryClass::Linear, &policy),
//!     BackoffDecision::Retry(Duration::from_secs(1)),
//! );
//! ```

use std::time::Duration;

use crate::error::RetryClass;

/// Delay constants for both retry categories, in whole seconds.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// First exponential delay.
    pub exp_first: u64,
    /// Exponential cap; a failure arriving with the counter already at this
    /// value gives up.
    pub exp_max: u64,
    /// Linear increment per retry.
    pub linear_step: u64,
    /// Linear cap; a failure arriving with the counter already at this value
    /// gives up.
    pub linear_max: u64,
}

impl Default for BackoffPolicy {
    /// The upstream service's prescribed timing: exponential 10→320s,
    /// linear 1→16s.
    fn default() -> Self {
        Self {
            exp_first: 10,
            exp_max: 320,
            linear_step: 1,
            linear_max: 16,
        }
    }
}

/// Outcome of one backoff decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackoffDecision {
    /// Sleep for the given delay, then reconnect.
    Retry(Duration),
    /// The category's budget is exhausted; stop with no further retry.
    GiveUp,
}

/// Per-worker-run retry counters, one per category.
///
/// Both counters start at zero and are reset together by
/// [`reset`](BackoffState::reset) whenever a connection reaches status 200.
#[derive(Clone, Copy, Debug, Default)]
pub struct BackoffState {
    exp_secs: u64,
    lin_secs: u64,
}

impl BackoffState {
    /// Clears both counters. Called on every successful (200) connect.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Advances the counter for the given category and decides whether to
    /// retry.
    ///
    /// Exponential: 0 → `exp_first`, then doubling; gives up once the
    /// counter already sits at `exp_max`. Linear: grows by `linear_step`
    /// until `linear_max`, then gives up.
    pub fn advance(&mut self, class: RetryClass, policy: &BackoffPolicy) -> BackoffDecision {
        match class {
            RetryClass::Exponential => {
                if self.exp_secs == 0 {
                    self.exp_secs = policy.exp_first;
                } else if self.exp_secs < policy.exp_max {
                    self.exp_secs *= 2;
                } else {
                    return BackoffDecision::GiveUp;
                }
                BackoffDecision::Retry(Duration::from_secs(self.exp_secs))
            }
            RetryClass::Linear => {
                if self.lin_secs < policy.linear_max {
                    self.lin_secs += policy.linear_step;
                    BackoffDecision::Retry(Duration::from_secs(self.lin_secs))
                } else {
                    BackoffDecision::GiveUp
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(decision: BackoffDecision) -> u64 {
        match decision {
            BackoffDecision::Retry(d) => d.as_secs(),
            BackoffDecision::GiveUp => panic!("unexpected give-up"),
        }
    }

    #[test]
    fn exponential_sequence_doubles_then_gives_up() {
        let policy = BackoffPolicy::default();
        let mut state = BackoffState::default();

        let mut delays = Vec::new();
        for _ in 0..6 {
            delays.push(secs(state.advance(RetryClass::Exponential, &policy)));
        }
        assert_eq!(delays, vec![10, 20, 40, 80, 160, 320]);
        assert_eq!(
            state.advance(RetryClass::Exponential, &policy),
            BackoffDecision::GiveUp
        );
    }

    #[test]
    fn linear_sequence_increments_then_gives_up() {
        let policy = BackoffPolicy::default();
        let mut state = BackoffState::default();

        let mut delays = Vec::new();
        for _ in 0..16 {
            delays.push(secs(state.advance(RetryClass::Linear, &policy)));
        }
        assert_eq!(delays, (1..=16).collect::<Vec<u64>>());
        assert_eq!(
            state.advance(RetryClass::Linear, &policy),
            BackoffDecision::GiveUp
        );
    }

    #[test]
    fn reset_restarts_both_sequences() {
        let policy = BackoffPolicy::default();
        let mut state = BackoffState::default();

        for _ in 0..4 {
            state.advance(RetryClass::Exponential, &policy);
            state.advance(RetryClass::Linear, &policy);
        }
        state.reset();

        assert_eq!(secs(state.advance(RetryClass::Exponential, &policy)), 10);
        assert_eq!(secs(state.advance(RetryClass::Linear, &policy)), 1);
    }

    #[test]
    fn tracks_are_independent() {
        let policy = BackoffPolicy::default();
        let mut state = BackoffState::default();

        assert_eq!(secs(state.advance(RetryClass::Exponential, &policy)), 10);
        assert_eq!(secs(state.advance(RetryClass::Linear, &policy)), 1);
        assert_eq!(secs(state.advance(RetryClass::Linear, &policy)), 2);
        // Linear failures in between do not disturb the exponential track.
        assert_eq!(secs(state.advance(RetryClass::Exponential, &policy)), 20);
    }

    #[test]
    fn delays_are_monotonic_within_a_streak() {
        let policy = BackoffPolicy::default();
        for class in [RetryClass::Exponential, RetryClass::Linear] {
            let mut state = BackoffState::default();
            let mut prev = 0;
            while let BackoffDecision::Retry(d) = state.advance(class, &policy) {
                assert!(d.as_secs() >= prev, "{class:?} shrank: {prev} → {:?}", d);
                prev = d.as_secs();
            }
        }
    }
}
