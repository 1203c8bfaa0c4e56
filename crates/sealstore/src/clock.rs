//! Monotonic timestamp source.
//!
//! Wall-clock unix milliseconds. Stamps issued for writes are nudged
//! forward so no two of them repeat or decrease; record ordering relies
//! on this, not on the OS clock behaving. Read-side peeks observe the
//! same timeline without advancing it, so heavy read traffic cannot
//! drive logical time ahead of the wall clock.

use chrono::Utc;
use parking_lot::Mutex;

#[derive(Debug, Default)]
pub struct LogicalClock {
    last: Mutex<i64>,
}

impl LogicalClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write stamp: current unix time in milliseconds, strictly greater
    /// than every stamp this instance issued before.
    pub fn now_ms(&self) -> i64 {
        let mut last = self.last.lock();
        let now = Utc::now().timestamp_millis();
        let stamped = if now > *last { now } else { *last + 1 };
        *last = stamped;
        stamped
    }

    /// Read-side view of the clock: never behind the last issued stamp,
    /// never advances it. Expiry checks use this so reads cannot age
    /// records out by themselves.
    pub fn peek_ms(&self) -> i64 {
        Utc::now().timestamp_millis().max(*self.last.lock())
    }
}
