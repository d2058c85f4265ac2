//! Single-in-flight execution guard
//!
//! The guard is a two-state flag (`Idle`, `Running`) owned by one engine.
//! Acquisition is a non-blocking compare-and-swap, so any number of trigger
//! sources may race for it; exactly one wins. The winner holds a
//! [`GuardToken`] whose drop returns the guard to `Idle`, on success, error
//! and panic paths alike.

use std::sync::atomic::{AtomicBool, Ordering};

/// Binary Idle/Running state with atomic test-and-set
#[derive(Debug, Default)]
pub struct ExecutionGuard {
    running: AtomicBool,
}

impl ExecutionGuard {
    /// Create a guard in the `Idle` state
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to move from `Idle` to `Running`
    ///
    /// Returns `None` when another execution already holds the guard.
    pub fn try_acquire(&self) -> Option<GuardToken<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GuardToken { guard: self })
    }

    /// Whether an execution currently holds the guard
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Proof of holding the guard; dropping it resets the guard to `Idle`
#[derive(Debug)]
pub struct GuardToken<'a> {
    guard: &'a ExecutionGuard,
}

impl Drop for GuardToken<'_> {
    fn drop(&mut self) {
        self.guard.running.store(false, Ordering::Release);
    }
}
