// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Test-and-set spin lock over a single atomic flag, plus the adaptive
// backoff used by the shared memory create/teardown retry loops.

use std::sync::atomic::{AtomicBool, Ordering};

/// Adaptive backoff for retry loops that wait on another process.
///
/// - k < 4:  busy spin (do nothing)
/// - k < 16: CPU pause hint
/// - k < 32: thread yield
/// - k >= 32: sleep 1ms
#[inline]
pub(crate) fn adaptive_yield(k: &mut u32) {
    if *k < 4 {
        // busy spin
    } else if *k < 16 {
        std::hint::spin_loop();
    } else if *k < 32 {
        std::thread::yield_now();
    } else {
        std::thread::sleep(std::time::Duration::from_millis(1));
        return;
    }
    *k += 1;
}

/// A minimal spin lock.
///
/// `#[repr(C)]` around one `AtomicBool`, so an all-zero byte is an unlocked
/// lock and the type can live in a freshly created shared memory segment.
/// There is no owner tracking: any holder of a reference may unlock it, and
/// unlocking a lock you do not hold is a logic error the lock cannot detect.
#[repr(C)]
pub struct SpinLock {
    flag: AtomicBool,
}

impl SpinLock {
    /// Create a new unlocked spin lock.
    pub const fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
        }
    }

    /// Acquire the lock, spinning until it is free. No fairness, no timeout.
    pub fn lock(&self) {
        while self.flag.swap(true, Ordering::Acquire) {
            while self.flag.load(Ordering::Relaxed) {
                std::hint::spin_loop();
            }
        }
    }

    /// Single acquisition attempt. Returns `true` if the lock was free and is
    /// now held by the caller.
    #[inline]
    pub fn try_lock(&self) -> bool {
        !self.flag.swap(true, Ordering::Acquire)
    }

    /// Release the lock.
    #[inline]
    pub fn unlock(&self) {
        self.flag.store(false, Ordering::Release);
    }

    /// Snapshot of the flag, for diagnostics only.
    pub fn is_locked(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

impl Default for SpinLock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SpinLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpinLock")
            .field("locked", &self.is_locked())
            .finish()
    }
}
