//! Global version clock.

use std::sync::atomic::{AtomicU64, Ordering};

/// Distance between two adjacent timestamps.
///
/// Timestamps are always even: bit 0 of an orec word is the lock flag, so
/// odd values never name a point in time. The clock therefore advances in
/// steps of two, and a rollback that bumps a released orec past its old
/// version bumps it by one step.
pub(crate) const STEP: u64 = 2;

/// Monotonically increasing clock shared by every transaction.
pub(crate) struct GlobalClock {
    now: AtomicU64,
}

impl GlobalClock {
    pub(crate) const fn new() -> Self {
        Self {
            now: AtomicU64::new(0),
        }
    }

    /// Return a fresh timestamp strictly greater than every value returned
    /// or observed before this call. Concurrent callers receive distinct,
    /// totally ordered values.
    ///
    /// The `SeqCst` read-modify-write doubles as a full memory barrier, so
    /// no instrumented load or store moves across a tick.
    #[inline]
    pub(crate) fn tick(&self) -> u64 {
        self.now.fetch_add(STEP, Ordering::SeqCst) + STEP
    }

    /// Timestamp of the most recent tick.
    #[inline]
    pub(crate) fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    /// Raise the clock so the next `tick` returns a value greater than `v`.
    /// Returns whether the clock actually moved.
    ///
    /// Rollback bumps released orecs past their old versions, and a bumped
    /// version may run ahead of the clock; unlocked versions must never
    /// exceed it.
    #[inline]
    pub(crate) fn advance_past(&self, v: u64) -> bool {
        self.now.fetch_max(v, Ordering::SeqCst) < v
    }
}
