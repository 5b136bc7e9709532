//! Timestamp sources for execution recording.
//!
//! The operation graph requires every new timestamp to be strictly larger
//! than the previous one. Wall-clock time alone cannot promise that for
//! bursts of executions inside the same microsecond, so [`MonotonicClock`]
//! bumps a colliding reading to `last + 1`.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::id::Timestamp;

/// Anything that can hand out timestamps for a batch of executions.
pub trait TimestampSource {
    fn next_timestamp(&mut self) -> Timestamp;
}

impl<F> TimestampSource for F
where
    F: FnMut() -> Timestamp,
{
    fn next_timestamp(&mut self) -> Timestamp {
        self()
    }
}

/// Wall-clock microseconds with a strictly increasing tie-break.
#[derive(Debug, Clone, Default)]
pub struct MonotonicClock {
    last: Option<Timestamp>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// A clock whose first reading is guaranteed to be after `ts`, for
    /// continuing a restored store.
    pub fn resume_after(ts: Timestamp) -> Self {
        MonotonicClock { last: Some(ts) }
    }

    /// Combines a raw reading with the previous timestamp.
    fn advance(&mut self, now: u64) -> Timestamp {
        let next = match self.last {
            Some(Timestamp(last)) if now <= last => last.saturating_add(1),
            _ => now,
        };
        self.last = Some(Timestamp(next));
        Timestamp(next)
    }
}

impl TimestampSource for MonotonicClock {
    fn next_timestamp(&mut self) -> Timestamp {
        // A clock set before the epoch reads as 0 and falls back to the tie-break.
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        self.advance(now)
    }
}

/// A deterministic counter: `start`, `start + 1`, ...
#[derive(Debug, Clone)]
pub struct SequenceClock {
    next: u64,
}

impl SequenceClock {
    pub fn starting_at(start: u64) -> Self {
        SequenceClock { next: start }
    }

    pub fn resume_after(ts: Timestamp) -> Self {
        SequenceClock {
            next: ts.0.saturating_add(1),
        }
    }
}

impl Default for SequenceClock {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl TimestampSource for SequenceClock {
    fn next_timestamp(&mut self) -> Timestamp {
        let ts = Timestamp(self.next);
        self.next = self.next.saturating_add(1);
        ts
    }
}
