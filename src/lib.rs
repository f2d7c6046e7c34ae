//! Eager software transactional memory over a table of versioned locks.
//!
//! # Architecture
//!
//! This STM uses encounter-time locking with in-place writes and undo
//! logging, driven by a global version clock.
//!
//! - **Reads**: optimistic. The covering ownership record ("orec") is
//!   sampled before and after the value load and checked against the
//!   transaction's snapshot timestamp; no lock is taken.
//! - **Writes**: eager. The writer acquires the covering orec at write
//!   time, logs the old value, and stores in place. An abort replays the
//!   log and releases every orec past its old version.
//! - **Commit**: writers take a fresh timestamp, validate their read set,
//!   and release every owned orec at that timestamp. Read-only
//!   transactions commit without touching shared state.
//! - **Conflicts**: hyper-aggressive by default. The transaction that sees
//!   the conflict rolls itself back and the retry loop runs it again; the
//!   other party is never disturbed.
//!
//! # Example
//!
//! ```
//! use orec_stm::Stm;
//! use std::sync::atomic::AtomicU64;
//!
//! let stm = Stm::new();
//! let account = AtomicU64::new(100);
//!
//! stm.atomically(|tx| {
//!     let balance = tx.read(&account)?;
//!     tx.write(&account, balance + 1)?;
//!     Ok(())
//! });
//! ```

mod clock;
mod cm;
mod config;
mod errors;
mod orec;
mod transaction;
mod undo;

pub use cm::{ContentionManager, ExponentialBackoff, HyperAggressive};
pub use config::{UnknownVariant, Variant, CONFIG_ENV};
pub use errors::StmError;
pub use orec::DEFAULT_TABLE_BITS;
pub use transaction::Transaction;
pub use undo::{byte_mask, FULL_MASK};

use clock::GlobalClock;
use core::marker::PhantomData;
use once_cell::sync::Lazy;
use orec::OrecTable;
use std::sync::atomic::{AtomicU64, Ordering};

/// The STM runtime: global clock, orec table, and descriptor slots.
///
/// The contention-management policy is a type parameter, monomorphized
/// into every transaction the runtime starts.
pub struct Stm<C: ContentionManager = HyperAggressive> {
    pub(crate) clock: GlobalClock,
    pub(crate) orecs: OrecTable,
    next_slot: AtomicU64,
    _cm: PhantomData<fn() -> C>,
}

impl Stm<HyperAggressive> {
    /// Runtime with the default table size and contention manager.
    pub fn new() -> Self {
        Self::with_table_bits(DEFAULT_TABLE_BITS)
    }

    /// Runtime with `2^bits` orecs and the default contention manager.
    /// Small tables force address collisions, which is useful in tests.
    pub fn with_table_bits(bits: u32) -> Self {
        Self::with_policy(bits)
    }
}

impl Default for Stm<HyperAggressive> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ContentionManager> Stm<C> {
    /// Runtime with `2^bits` orecs and an explicit contention-management
    /// policy, e.g. `Stm::<ExponentialBackoff>::with_policy(20)`.
    pub fn with_policy(bits: u32) -> Self {
        Self {
            clock: GlobalClock::new(),
            orecs: OrecTable::new(bits),
            next_slot: AtomicU64::new(0),
            _cm: PhantomData,
        }
    }

    /// Start a transaction. Never fails.
    ///
    /// The returned descriptor carries an owner token derived from a fresh
    /// slot, so any orec holding that token unambiguously identifies it.
    pub fn begin(&self) -> Transaction<'_, C> {
        let slot = self.next_slot.fetch_add(1, Ordering::Relaxed);
        Transaction::new(self, slot)
    }

    /// Execute a closure atomically, retrying on conflict until it
    /// commits.
    ///
    /// A read or write that hits a conflict has already rolled the
    /// transaction back by the time it returns `Err`; propagate such
    /// errors with `?`. Do not run IO inside the closure: attempts may
    /// execute many times before one commits.
    ///
    /// # Example
    ///
    /// ```
    /// use orec_stm::Stm;
    /// use std::sync::atomic::AtomicU64;
    ///
    /// let stm = Stm::new();
    /// let var = AtomicU64::new(10);
    ///
    /// let seen = stm.atomically(|tx| {
    ///     let v = tx.read(&var)?;
    ///     tx.write(&var, v + 1)?;
    ///     Ok(v)
    /// });
    /// assert_eq!(seen, 10);
    /// ```
    pub fn atomically<F, T>(&self, mut f: F) -> T
    where
        F: FnMut(&mut Transaction<'_, C>) -> Result<T, StmError>,
    {
        let mut tx = self.begin();
        loop {
            match f(&mut tx) {
                Ok(out) => {
                    if tx.commit().is_ok() {
                        return out;
                    }
                }
                // The failing operation already rolled back.
                Err(_) => {}
            }
            tx.restart();
        }
    }

    /// Current word of the orec covering `addr`: an even timestamp when
    /// unlocked, an owner token when locked. Diagnostic.
    pub fn orec_version(&self, addr: &AtomicU64) -> u64 {
        self.orecs.get(addr.as_ptr() as usize).state()
    }

    /// Current global clock value.
    pub fn clock_now(&self) -> u64 {
        self.clock.now()
    }

    /// Hook invoked when this algorithm becomes the active one.
    pub fn on_switch_to(&self) {
        tracing::debug!(
            variant = %Variant::OrecEager,
            orecs = self.orecs.len(),
            "stm algorithm active"
        );
    }
}

/// Process-wide runtime, selected once from `STM_CONFIG`.
static GLOBAL: Lazy<Stm> = Lazy::new(|| {
    let variant = Variant::from_env();
    tracing::info!(%variant, "selected stm variant");
    let stm = match variant {
        Variant::OrecEager => Stm::new(),
    };
    stm.on_switch_to();
    stm
});

/// The process-wide runtime.
pub fn global() -> &'static Stm {
    &GLOBAL
}

/// Run `f` atomically on the process-wide runtime.
pub fn atomically<F, T>(f: F) -> T
where
    F: FnMut(&mut Transaction<'_, HyperAggressive>) -> Result<T, StmError>,
{
    GLOBAL.atomically(f)
}
