//! Ownership records: the versioned locks covering the transactional heap.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock flag, bit 0 of an orec word. Clear means the word holds a version.
pub(crate) const LOCK_BIT: u64 = 1;

/// High tag carried by every owner token. Tokens compare numerically
/// greater than any timestamp, so the `word <= start_time` fast-path test
/// in the read and write protocols can never pass for a locked orec.
pub(crate) const OWNER_TAG: u64 = 1 << 63;

/// Owner token for a descriptor slot. Tokens are odd and tagged; versions
/// are even. The two value spaces never intersect.
#[inline]
pub(crate) fn owner_token(slot: u64) -> u64 {
    OWNER_TAG | (slot << 1) | LOCK_BIT
}

#[inline]
pub(crate) fn is_locked(word: u64) -> bool {
    word & LOCK_BIT != 0
}

/// A versioned lock.
///
/// `state` holds either an even timestamp (unlocked) or an owner token
/// (locked by exactly one transaction). `prev` is the version the orec
/// held immediately before the current acquisition; only the owner writes
/// or reads it while the lock is held, so relaxed ordering suffices.
pub(crate) struct Orec {
    state: AtomicU64,
    prev: AtomicU64,
}

impl Orec {
    const fn new() -> Self {
        Self {
            state: AtomicU64::new(0),
            prev: AtomicU64::new(0),
        }
    }

    /// Current lock word.
    #[inline]
    pub(crate) fn state(&self) -> u64 {
        self.state.load(Ordering::Acquire)
    }

    /// Swing the word from an observed version to an owner token.
    #[inline]
    pub(crate) fn try_acquire(&self, seen: u64, token: u64) -> bool {
        self.state
            .compare_exchange(seen, token, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Store an unlocked version, releasing the lock. The release ordering
    /// publishes every in-place write performed while the lock was held.
    #[inline]
    pub(crate) fn release(&self, version: u64) {
        debug_assert!(!is_locked(version));
        self.state.store(version, Ordering::Release);
    }

    #[inline]
    pub(crate) fn set_prev(&self, version: u64) {
        self.prev.store(version, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn prev(&self) -> u64 {
        self.prev.load(Ordering::Relaxed)
    }
}

/// Default table size: 2^20 orecs.
pub const DEFAULT_TABLE_BITS: u32 = 20;

/// Fixed-size table of orecs indexed by a hash of the word address.
///
/// Collisions map distinct words onto one lock. That produces false
/// conflicts but never violates safety: the shared orec serializes every
/// word that hashes to it.
pub(crate) struct OrecTable {
    orecs: Box<[Orec]>,
    mask: usize,
}

impl OrecTable {
    pub(crate) fn new(bits: u32) -> Self {
        let len = 1usize << bits;
        let orecs: Box<[Orec]> = (0..len).map(|_| Orec::new()).collect();
        Self { orecs, mask: len - 1 }
    }

    /// Pure hash from a word address to its covering orec.
    #[inline]
    pub(crate) fn get(&self, addr: usize) -> &Orec {
        &self.orecs[(addr >> 3) & self.mask]
    }

    pub(crate) fn len(&self) -> usize {
        self.orecs.len()
    }
}
