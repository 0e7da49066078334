//! Cooperative reader/writer spin lock for frame coordination.
//!
//! Sorting threads hold the shared side while they examine and fill a
//! frame; the publishing scheduler takes the exclusive side for the brief
//! moment it flips the frame to published. Critical sections on both sides
//! are a few loads and stores, far cheaper than parking a thread, so
//! contention is resolved by spinning on a single atomic word.
//!
//! The lock carries no data. It is a coordination point the frame tracker
//! exposes to its scheduler; the tracker itself stays correct without it
//! (per-key access is internally synchronized) and does not arbitrate
//! callers that skip the contract.
//!
//! Writers take preference: once a writer is waiting, new readers spin
//! until it has entered and left, so publication is never starved by a
//! steady stream of sorters.

use std::fmt;
use std::hint;
use std::sync::atomic::{AtomicU32, Ordering};

// Bit 31 flags a writer; the low 31 bits count active readers.
const WRITER: u32 = 1 << 31;

/// Shared/exclusive spin lock.
///
/// Any number of threads may hold the shared side at once; the exclusive
/// side excludes every other holder. Guards release on drop.
#[derive(Default)]
pub struct ReaderWriterSpinLock {
    state: AtomicU32,
}

impl ReaderWriterSpinLock {
    /// Creates an unlocked lock.
    pub const fn new() -> Self {
        ReaderWriterSpinLock {
            state: AtomicU32::new(0),
        }
    }

    /// Acquires the shared side, spinning while a writer holds or awaits
    /// the lock.
    pub fn read(&self) -> ReadGuard<'_> {
        loop {
            let state = self.state.load(Ordering::Relaxed);
            if state & WRITER == 0
                && self
                    .state
                    .compare_exchange_weak(state, state + 1, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
            {
                return ReadGuard { lock: self };
            }
            hint::spin_loop();
        }
    }

    /// Acquires the exclusive side, spinning until all readers drain.
    ///
    /// The writer bit is claimed first, which stops new readers entering
    /// while existing ones finish.
    pub fn write(&self) -> WriteGuard<'_> {
        loop {
            let state = self.state.load(Ordering::Relaxed);
            if state & WRITER == 0
                && self
                    .state
                    .compare_exchange_weak(
                        state,
                        state | WRITER,
                        Ordering::Acquire,
                        Ordering::Relaxed,
                    )
                    .is_ok()
            {
                break;
            }
            hint::spin_loop();
        }
        while self.state.load(Ordering::Acquire) != WRITER {
            hint::spin_loop();
        }
        WriteGuard { lock: self }
    }
}

impl fmt::Debug for ReaderWriterSpinLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.load(Ordering::Relaxed);
        f.debug_struct("ReaderWriterSpinLock")
            .field("write_held", &(state & WRITER != 0))
            .field("readers", &(state & !WRITER))
            .finish()
    }
}

/// Shared-side guard; releases on drop.
#[must_use = "the shared lock is released when the guard drops"]
#[derive(Debug)]
pub struct ReadGuard<'a> {
    lock: &'a ReaderWriterSpinLock,
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        self.lock.state.fetch_sub(1, Ordering::Release);
    }
}

/// Exclusive-side guard; releases on drop.
#[must_use = "the exclusive lock is released when the guard drops"]
#[derive(Debug)]
pub struct WriteGuard<'a> {
    lock: &'a ReaderWriterSpinLock,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.lock.state.fetch_and(!WRITER, Ordering::Release);
    }
}
