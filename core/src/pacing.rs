//! Virtual-time pacing
//!
//! The scheduler keeps a virtual clock that advances by the emulated length
//! of every timeslice. If the virtual clock is ahead of real time the
//! scheduler sleeps until it catches up. If real time has run ahead by more
//! than the allowed lag, the backlog is dropped and the virtual clock snaps
//! to now instead of trying to catch up with a burst of timeslices.

use std::time::{Duration, Instant};

/// What the scheduler should do after a timeslice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    /// Sleep until the given instant
    Sleep(Instant),
    /// Virtual time is at or slightly behind real time; continue at once
    OnTime,
    /// Real time ran too far ahead; virtual time was reset to now
    Snapped { lag: Duration },
}

#[derive(Debug, Clone)]
pub struct VirtualClock {
    virtual_time: Instant,
}

impl VirtualClock {
    pub fn new(now: Instant) -> Self {
        Self { virtual_time: now }
    }

    /// Realign virtual time with real time
    pub fn reset(&mut self, now: Instant) {
        self.virtual_time = now;
    }

    pub fn virtual_time(&self) -> Instant {
        self.virtual_time
    }

    /// Account for one timeslice and decide how to wait
    pub fn advance(&mut self, timeslice: Duration, now: Instant, max_lag: Duration) -> Pace {
        self.virtual_time += timeslice;

        if now > self.virtual_time {
            let lag = now - self.virtual_time;
            if lag > max_lag {
                self.virtual_time = now;
                return Pace::Snapped { lag };
            }
            return Pace::OnTime;
        }

        if self.virtual_time > now {
            Pace::Sleep(self.virtual_time)
        } else {
            Pace::OnTime
        }
    }
}
