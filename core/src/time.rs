//! Monotonic simulation time.

use std::{
    fmt,
    ops::{
        Add,
        Sub,
    },
    time::Duration,
};

/// A monotonic timestamp in milliseconds, supplied by the hosting scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time(u64);

impl Time {
    pub const ZERO: Time = Time(0);

    pub const fn from_millis(millis: u64) -> Self {
        Time(millis)
    }

    pub const fn from_secs(secs: u64) -> Self {
        Time(secs * 1000)
    }

    pub fn as_millis(self) -> u64 {
        self.0
    }

    /// Whole seconds, truncated.
    pub fn as_secs(self) -> u64 {
        self.0 / 1000
    }

    /// The time left until `deadline`, zero if it has passed.
    pub fn until(self, deadline: Time) -> Duration {
        if time_before(self, deadline) {
            Duration::from_millis(deadline.0.wrapping_sub(self.0))
        } else {
            Duration::from_millis(0)
        }
    }

    /// The later of two timestamps.
    pub fn max(self, other: Time) -> Time {
        if time_after(other, self) {
            other
        } else {
            self
        }
    }
}

impl Add<Duration> for Time {
    type Output = Time;

    fn add(self, rhs: Duration) -> Time {
        Time(self.0.wrapping_add(rhs.as_millis() as u64))
    }
}

impl Sub<Duration> for Time {
    type Output = Time;

    fn sub(self, rhs: Duration) -> Time {
        Time(self.0.wrapping_sub(rhs.as_millis() as u64))
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{:03}s", self.0 / 1000, self.0 % 1000)
    }
}

/// `x` is strictly before `y`, wraparound-safe.
///
/// A tie is "not before", so an entry whose lifetime equals the current time
/// is still considered valid.
pub fn time_before(x: Time, y: Time) -> bool {
    (x.0.wrapping_sub(y.0) as i64) < 0
}

/// `x` is strictly after `y`, wraparound-safe.
pub fn time_after(x: Time, y: Time) -> bool {
    time_before(y, x)
}
