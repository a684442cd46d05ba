//! Automatic reconnection after transport loss.
//!
//! A pure state machine: the driver reports failures and successes, polls
//! with the current time, and dials when [`ReconnectController::poll`] says
//! so. Nothing here sleeps or touches the network.
//!
//! ```text
//! ┌──────┐ failure  ┌───────────┐ deadline ┌────────────┐
//! │ Idle │─────────>│ Scheduled │─────────>│ Attempting │
//! └──────┘          └───────────┘          └────────────┘
//!    ^                                        │      │
//!    └──────────── login complete ────────────┘      │ failure
//!                                   Scheduled <──────┘ (until budget spent)
//! ```

use std::time::Duration;

use crate::env::Moment;

/// Delay before the first reconnection attempt.
pub const DEFAULT_RECONNECT_BASE_DELAY: Duration = Duration::from_secs(5);

/// Upper bound on the delay between attempts.
pub const DEFAULT_RECONNECT_MAX_DELAY: Duration = Duration::from_secs(60);

/// Attempts made before giving up.
pub const DEFAULT_RECONNECT_MAX_ATTEMPTS: u32 = 5;

/// Exponential backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay before the first attempt
    pub base_delay: Duration,
    /// Cap applied after doubling
    pub max_delay: Duration,
    /// Attempts before giving up
    pub max_attempts: u32,
}

impl BackoffPolicy {
    /// Delay before attempt number `attempt` (zero-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = 1_u32 << attempt.min(20);
        self.base_delay.saturating_mul(multiplier).min(self.max_delay)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_RECONNECT_BASE_DELAY,
            max_delay: DEFAULT_RECONNECT_MAX_DELAY,
            max_attempts: DEFAULT_RECONNECT_MAX_ATTEMPTS,
        }
    }
}

/// Where the controller stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectState<I> {
    /// No reconnection planned
    Idle,
    /// Attempt `attempt` will start at `at`
    Scheduled {
        /// One-based attempt number
        attempt: u32,
        /// When to dial
        at: I,
    },
    /// Attempt `attempt` is dialing or logging in
    Attempting {
        /// One-based attempt number
        attempt: u32,
    },
}

/// Decides when to redial after the transport drops.
#[derive(Debug, Clone)]
pub struct ReconnectController<I> {
    policy: BackoffPolicy,
    state: ReconnectState<I>,
    attempts: u32,
    /// A login completed since the last reset.
    established: bool,
}

impl<I: Moment> ReconnectController<I> {
    /// Idle controller using `policy`.
    pub fn new(policy: BackoffPolicy) -> Self {
        Self { policy, state: ReconnectState::Idle, attempts: 0, established: false }
    }

    /// Current state.
    pub fn state(&self) -> ReconnectState<I> {
        self.state
    }

    /// Attempts made since the last successful login.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// The transport failed or closed unexpectedly.
    ///
    /// Returns the delay until the next attempt, or `None` when no attempt
    /// will be made (no stored credentials, or the budget is spent).
    pub fn on_transport_failure(&mut self, now: I, has_credentials: bool) -> Option<Duration> {
        if !has_credentials || self.attempts >= self.policy.max_attempts {
            self.state = ReconnectState::Idle;
            return None;
        }

        let delay = self.policy.delay_for_attempt(self.attempts);
        self.attempts += 1;
        self.state = ReconnectState::Scheduled { attempt: self.attempts, at: now + delay };
        Some(delay)
    }

    /// Returns `true` exactly once when a scheduled attempt is due.
    pub fn poll(&mut self, now: I) -> bool {
        match self.state {
            ReconnectState::Scheduled { attempt, at } if at <= now => {
                self.state = ReconnectState::Attempting { attempt };
                true
            },
            _ => false,
        }
    }

    /// Deadline of the scheduled attempt, if any.
    pub fn deadline(&self) -> Option<I> {
        match self.state {
            ReconnectState::Scheduled { at, .. } => Some(at),
            _ => None,
        }
    }

    /// Login finished. Returns `true` if this ended a reconnection cycle.
    ///
    /// Retries that follow a first connect which never logged in are not a
    /// reconnection.
    pub fn on_login_complete(&mut self) -> bool {
        let reconnected = self.established && self.attempts > 0;
        self.state = ReconnectState::Idle;
        self.attempts = 0;
        self.established = true;
        reconnected
    }

    /// Forget any schedule, the attempt count and any earlier login.
    pub fn reset(&mut self) {
        self.state = ReconnectState::Idle;
        self.attempts = 0;
        self.established = false;
    }
}

impl<I: Moment> Default for ReconnectController<I> {
    fn default() -> Self {
        Self::new(BackoffPolicy::default())
    }
}
