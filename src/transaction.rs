//! The transaction: optimistic reads, encounter-time-locking writes, and
//! the two-phase commit / rollback engine.

use crate::clock;
use crate::cm::ContentionManager;
use crate::errors::StmError;
use crate::orec::{self, Orec};
use crate::undo::{self, UndoEntry, FULL_MASK};
use crate::Stm;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Active,
    Committed,
    Aborted,
}

/// A transaction over words of a shared heap.
///
/// Created by [`Stm::begin`]. Reads are optimistic; writes take the
/// covering orec at encounter time and go in place behind an undo log. Any
/// detected conflict rolls the transaction back on the spot and reports
/// `Err`, which `?` carries out of the closure and back to the retry loop
/// in [`Stm::atomically`]. After a rollback the descriptor can be reused
/// via [`restart`](Transaction::restart).
///
/// Every word handed to [`read`](Transaction::read) or
/// [`write`](Transaction::write) must stay alive until the transaction
/// commits or rolls back; the undo log holds addresses raw.
pub struct Transaction<'s, C: ContentionManager> {
    stm: &'s Stm<C>,
    /// Snapshot timestamp. Reads are only consistent against versions at
    /// or below it.
    start_time: u64,
    /// Owner token stored into every orec this transaction acquires.
    my_lock: u64,
    /// Orecs read from; duplicates allowed.
    r_orecs: Vec<&'s Orec>,
    /// Orecs currently owned.
    locks: Vec<&'s Orec>,
    /// Logged writes, in the order they happened.
    undo_log: Vec<UndoEntry>,
    cm: C,
    /// Side effects to run only after a successful commit.
    commit_hooks: Vec<Box<dyn FnOnce() + Send>>,
    /// Side effects to run only if this attempt rolls back.
    rollback_hooks: Vec<Box<dyn FnOnce() + Send>>,
    status: Status,
}

impl<'s, C: ContentionManager> Transaction<'s, C> {
    pub(crate) fn new(stm: &'s Stm<C>, slot: u64) -> Self {
        let mut tx = Self {
            stm,
            start_time: 0,
            my_lock: orec::owner_token(slot),
            r_orecs: Vec::new(),
            locks: Vec::new(),
            undo_log: Vec::new(),
            cm: C::default(),
            commit_hooks: Vec::new(),
            rollback_hooks: Vec::new(),
            status: Status::Aborted,
        };
        tx.restart();
        tx
    }

    /// Snapshot timestamp of the current attempt.
    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    /// Reset the descriptor and begin a fresh attempt.
    ///
    /// An attempt still active (e.g. after the caller swallowed an `Err`)
    /// is rolled back first, so no locks leak.
    pub fn restart(&mut self) {
        if self.status == Status::Active {
            self.rollback();
        }
        self.start_time = self.stm.clock.tick();
        self.cm.on_begin();
        self.status = Status::Active;
    }

    /// Schedule a side effect to run only after a successful commit, once
    /// all locks are released.
    pub fn on_commit<F>(&mut self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.commit_hooks.push(Box::new(f));
    }

    /// Schedule a side effect to run only if this attempt rolls back.
    /// Useful for releasing resources acquired inside the transaction.
    pub fn on_rollback<F>(&mut self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.rollback_hooks.push(Box::new(f));
    }

    /// Optimistically read a word.
    pub fn read(&mut self, addr: &AtomicU64) -> Result<u64, StmError> {
        self.ensure_active()?;
        let o = self.stm.orecs.get(addr.as_ptr() as usize);

        // The two orec loads bracket the value load; acquire ordering on
        // each gives the required load-load edges (free on x86-64).
        let v1 = o.state();
        let x = addr.load(Ordering::Acquire);

        // Locked by me: the in-place value is mine.
        if v1 == self.my_lock {
            return Ok(x);
        }

        let v2 = o.state();

        // Unlocked, unchanged while we read, and no newer than our
        // snapshot. Owner tokens sit above every timestamp, so the
        // comparison alone rules out locked words.
        if v1 == v2 && v1 <= self.start_time {
            self.r_orecs.push(o);
            return Ok(x);
        }

        // Locked by someone else, or committed past our snapshot.
        self.rollback();
        Err(StmError::Conflict)
    }

    /// Write a whole word in place.
    pub fn write(&mut self, addr: &AtomicU64, val: u64) -> Result<(), StmError> {
        self.write_masked(addr, val, FULL_MASK)
    }

    /// Write the bytes of `val` selected by `mask` in place, acquiring the
    /// covering orec if this transaction does not hold it yet.
    pub fn write_masked(&mut self, addr: &AtomicU64, val: u64, mask: u64) -> Result<(), StmError> {
        self.ensure_active()?;
        let o = self.stm.orecs.get(addr.as_ptr() as usize);
        let v = o.state();

        if v <= self.start_time {
            // Unlocked and old enough: take it or lose the race.
            if !o.try_acquire(v, self.my_lock) {
                self.rollback();
                return Err(StmError::Conflict);
            }
            o.set_prev(v);
            self.locks.push(o);
            self.undo_log.push(UndoEntry::capture(addr, mask));
            undo::masked_store(addr, val, mask);
            return Ok(());
        }

        if v == self.my_lock {
            // Already mine. Still log: other words hash to this orec, and
            // holding the lock does not mean *this* word was logged.
            self.undo_log.push(UndoEntry::capture(addr, mask));
            undo::masked_store(addr, val, mask);
            return Ok(());
        }

        // Locked by someone else, or committed past our snapshot.
        self.rollback();
        Err(StmError::Conflict)
    }

    /// Check every read-set orec against the snapshot. Read-only; does not
    /// roll back on failure.
    pub fn validate(&self) -> Result<(), StmError> {
        for o in &self.r_orecs {
            let v = o.state();
            if v > self.start_time && v != self.my_lock {
                return Err(StmError::Validation);
            }
        }
        Ok(())
    }

    /// Finalize the transaction.
    ///
    /// Read-only transactions commit without touching shared state and are
    /// linearized at their start timestamp. Writers take a fresh end
    /// timestamp, validate the read set, and release every owned orec at
    /// that timestamp; the release stores publish the in-place writes.
    /// On validation failure the transaction rolls back and reports `Err`.
    pub fn commit(&mut self) -> Result<u64, StmError> {
        self.ensure_active()?;

        // The lock set tells read-only from writer.
        if self.locks.is_empty() {
            self.cm.on_commit();
            self.r_orecs.clear();
            self.status = Status::Committed;
            self.run_commit_hooks();
            return Ok(self.start_time);
        }

        let end_time = self.stm.clock.tick();

        if self.validate().is_err() {
            self.rollback();
            return Err(StmError::Validation);
        }

        for o in &self.locks {
            debug_assert_eq!(o.state(), self.my_lock);
            o.release(end_time);
        }

        self.cm.on_commit();
        self.r_orecs.clear();
        self.locks.clear();
        self.undo_log.clear();
        self.status = Status::Committed;
        self.run_commit_hooks();
        Ok(end_time)
    }

    /// Attempt in-flight irrevocability: serialize now and keep running
    /// outside the transaction.
    ///
    /// The caller must already be globally serial. On success the in-place
    /// writes stay, every lock is released at a fresh timestamp, and the
    /// transaction is finished. On refusal (`false`) the transaction is
    /// left untouched and must abort by the normal path.
    pub fn irrevoc(&mut self) -> bool {
        if self.status != Status::Active {
            return false;
        }
        let end_time = self.stm.clock.tick();
        if self.validate().is_err() {
            return false;
        }
        for o in &self.locks {
            debug_assert_eq!(o.state(), self.my_lock);
            o.release(end_time);
        }
        self.r_orecs.clear();
        self.locks.clear();
        self.undo_log.clear();
        self.status = Status::Committed;
        true
    }

    /// Roll the transaction back: restore the undo log, release every
    /// owned orec past its old version, and notify the contention
    /// manager.
    ///
    /// Invoked internally whenever a read or write detects a conflict;
    /// also the integration point for an instrumentation layer that
    /// unwinds to the transaction's entry. Control returns to the retry
    /// loop through the `Err` the detecting operation reports.
    pub fn rollback(&mut self) {
        if self.status != Status::Active {
            return;
        }
        // Newest first, so overlapping masked writes restore correctly.
        for entry in self.undo_log.iter().rev() {
            entry.undo();
        }

        // Each released orec moves one step past the version it had when
        // acquired, so any reader that raced the ownership episode sees
        // the change.
        let mut max_released = 0;
        for o in &self.locks {
            debug_assert_eq!(o.state(), self.my_lock);
            let new_ver = o.prev() + clock::STEP;
            o.release(new_ver);
            max_released = max_released.max(new_ver);
        }

        // A bumped version may outrun the clock; unlocked versions must
        // never exceed it.
        if max_released != 0 && self.stm.clock.advance_past(max_released) {
            tracing::trace!(max_released, "clock advanced after rollback");
        }

        self.r_orecs.clear();
        self.undo_log.clear();
        self.locks.clear();
        self.cm.on_abort();
        self.status = Status::Aborted;
        self.run_rollback_hooks();
    }

    fn run_commit_hooks(&mut self) {
        self.rollback_hooks.clear();
        for hook in std::mem::take(&mut self.commit_hooks) {
            hook();
        }
    }

    fn run_rollback_hooks(&mut self) {
        self.commit_hooks.clear();
        for hook in std::mem::take(&mut self.rollback_hooks) {
            hook();
        }
    }

    #[inline]
    fn ensure_active(&self) -> Result<(), StmError> {
        if self.status == Status::Active {
            Ok(())
        } else {
            Err(StmError::Conflict)
        }
    }
}

impl<C: ContentionManager> Drop for Transaction<'_, C> {
    fn drop(&mut self) {
        // An abandoned active transaction must not leave locks behind or
        // its writes in place.
        if self.status == Status::Active {
            self.rollback();
        }
    }
}
