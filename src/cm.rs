//! Contention-management policies.

use crossbeam_utils::Backoff;

/// Policy plugin consulted at transaction lifecycle points.
///
/// The STM itself never sleeps; any waiting a policy wants happens inside
/// these callbacks. A policy is monomorphized into the runtime, and each
/// descriptor owns one instance that lives across retries of the same
/// transaction.
pub trait ContentionManager: Default + Send {
    /// Called when a transaction starts or restarts.
    fn on_begin(&mut self) {}
    /// Called after a successful commit.
    fn on_commit(&mut self) {}
    /// Called after a rollback, before the retry.
    fn on_abort(&mut self) {}
}

/// Abort-on-conflict with no waiting.
///
/// The transaction that detects a conflict rolls itself back immediately
/// and retries at full speed; the other party is never disturbed. This is
/// the default policy.
#[derive(Default)]
pub struct HyperAggressive;

impl ContentionManager for HyperAggressive {}

/// Exponential backoff between retries of a conflicted transaction.
///
/// Spins for the first few aborts, then yields to the scheduler. A commit
/// resets the delay.
pub struct ExponentialBackoff {
    backoff: Backoff,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            backoff: Backoff::new(),
        }
    }
}

impl ContentionManager for ExponentialBackoff {
    fn on_commit(&mut self) {
        self.backoff = Backoff::new();
    }

    fn on_abort(&mut self) {
        self.backoff.snooze();
    }
}
