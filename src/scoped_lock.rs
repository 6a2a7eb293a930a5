// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// RAII guard that holds a spin lock for the lifetime of a scope.

use crate::{IpcSpinLock, SpinLock};

/// The lock/try_lock/unlock triple shared by [`SpinLock`] and
/// [`IpcSpinLock`].
pub trait RawLock {
    fn lock(&self);
    fn try_lock(&self) -> bool;
    fn unlock(&self);
}

impl RawLock for SpinLock {
    fn lock(&self) {
        SpinLock::lock(self)
    }
    fn try_lock(&self) -> bool {
        SpinLock::try_lock(self)
    }
    fn unlock(&self) {
        SpinLock::unlock(self)
    }
}

impl RawLock for IpcSpinLock {
    fn lock(&self) {
        IpcSpinLock::lock(self)
    }
    fn try_lock(&self) -> bool {
        IpcSpinLock::try_lock(self)
    }
    fn unlock(&self) {
        IpcSpinLock::unlock(self)
    }
}

/// RAII guard: locks on construction, unlocks on drop.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct ScopedLock<'a, L: RawLock + ?Sized> {
    lock: &'a L,
}

impl<'a, L: RawLock + ?Sized> ScopedLock<'a, L> {
    /// Lock `lock`, spinning until it is free.
    pub fn new(lock: &'a L) -> Self {
        lock.lock();
        Self { lock }
    }

    /// Lock `lock` only if it is free right now.
    pub fn try_new(lock: &'a L) -> Option<Self> {
        lock.try_lock().then(|| Self { lock })
    }
}

impl<L: RawLock + ?Sized> Drop for ScopedLock<'_, L> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}
