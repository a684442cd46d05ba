//! Environment abstraction for deterministic testing.
//!
//! Decouples session logic from the clock. The state machines in this crate
//! never read time themselves: every input carries `now`, and every timer
//! is a deadline the driver sleeps towards through [`Environment`].

use std::{
    future::Future,
    ops::{Add, Sub},
    time::Duration,
};

/// A point in time usable for deadlines.
///
/// Implemented for any type with instant-like arithmetic, which covers both
/// `std::time::Instant` and `tokio::time::Instant`.
pub trait Moment:
    Copy + Ord + Send + Sync + 'static + Add<Duration, Output = Self> + Sub<Output = Duration>
{
}

impl<T> Moment for T where
    T: Copy + Ord + Send + Sync + 'static + Add<Duration, Output = T> + Sub<Output = Duration>
{
}

/// Abstract environment providing time and async sleeping.
///
/// Implementations MUST guarantee that `now()` never goes backwards.
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    type Instant: Moment;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Sleeps until `deadline`, returning immediately if it already passed.
    ///
    /// This is the ONLY async method in the trait, and it should only be used
    /// by driver code (not session logic).
    fn sleep_until(&self, deadline: Self::Instant) -> impl Future<Output = ()> + Send;
}

/// Earliest of a set of optional deadlines.
pub fn earliest<I: Moment>(deadlines: impl IntoIterator<Item = Option<I>>) -> Option<I> {
    deadlines.into_iter().flatten().min()
}
