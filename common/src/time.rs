//! Millisecond timestamps from a free-running `u32` counter.
//!
//! The counter wraps roughly every 49.7 days. Every elapsed-time computation
//! goes through [`elapsed`], which uses wrapping subtraction so that a wrap
//! between two samples still yields the true elapsed time.

/// Milliseconds since boot, truncated to 32 bits.
pub type Millis = u32;

pub fn elapsed(start: Millis, now: Millis) -> Millis {
    now.wrapping_sub(start)
}

pub fn interval_passed(last_time: Millis, now: Millis, interval: Millis) -> bool {
    elapsed(last_time, now) >= interval
}

pub fn has_timed_out(start: Millis, now: Millis, timeout: Millis) -> bool {
    elapsed(start, now) >= timeout
}

/// A timeout armed at `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    start: Millis,
    timeout: Millis,
}

impl Deadline {
    pub fn new(start: Millis, timeout: Millis) -> Self {
        Self { start, timeout }
    }

    pub fn expired(&self, now: Millis) -> bool {
        has_timed_out(self.start, now, self.timeout)
    }

    pub fn remaining(&self, now: Millis) -> Millis {
        self.timeout.saturating_sub(elapsed(self.start, now))
    }
}
