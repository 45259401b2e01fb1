//! The randomized exponential backoff of DHCPDISCOVER and DHCPREQUEST.

use std::time::Duration;

use rand::Rng;

/// Retransmission interval bookkeeping, in whole seconds.
///
/// The interval roughly doubles with every transmission and is reselected
/// from `[cutoff / 2, cutoff]` whenever it would grow past the cutoff.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: u64,
    cutoff: u64,
    interval: u64,
}

impl Backoff {
    /// Constructs a backoff which has not sent anything yet.
    ///
    /// * `initial`
    /// The first interval.
    ///
    /// * `cutoff`
    /// The maximal interval, inclusively.
    pub fn new(initial: Duration, cutoff: Duration) -> Backoff {
        Backoff {
            initial: initial.as_secs().max(1),
            cutoff: cutoff.as_secs().max(1),
            interval: 0,
        }
    }

    /// Starts over from the initial interval.
    pub fn reset(&mut self) {
        self.interval = 0;
    }

    /// The current interval in seconds.
    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Grows the interval for the next transmission.
    pub fn next<R: Rng>(&mut self, rng: &mut R) -> u64 {
        self.interval = if self.interval == 0 {
            self.initial
        } else {
            self.interval + rng.gen_range(0..2 * self.interval)
        };

        if self.interval > self.cutoff {
            let half = self.cutoff / 2;
            self.interval = half + rng.gen_range(0..=self.cutoff - half);
        }
        self.interval
    }

    /// Shortens the interval so that the next timer fires one second after
    /// `remaining` runs out, which is when the caller gives up.
    pub fn clamp(&mut self, remaining: u64) -> u64 {
        if self.interval > remaining {
            self.interval = remaining + 1;
        }
        self.interval
    }
}
