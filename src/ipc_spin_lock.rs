// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Spin lock whose flag lives in a named shared memory segment, so unrelated
// processes contend on the same physical byte.

use std::ptr::NonNull;

use crate::error::{Error, Result};
use crate::shm::SharedMemory;
use crate::SpinLock;

/// A named, inter-process spin lock.
///
/// Still a pure busy-wait lock: if a process dies while holding it, every
/// other process attached to the same name spins forever. Clearing that state
/// requires removing the segment (`SharedMemory::remove`) once all users are
/// gone.
pub struct IpcSpinLock {
    shm: SharedMemory,
    lock: NonNull<SpinLock>,
}

// Safety: `lock` points into `shm`'s mapping, which lives as long as self,
// and SpinLock is Sync.
unsafe impl Send for IpcSpinLock {}
unsafe impl Sync for IpcSpinLock {}

impl IpcSpinLock {
    /// Create or attach to the spin lock called `name`.
    pub fn open(name: &str) -> Result<Self> {
        let shm = SharedMemory::open(name, std::mem::size_of::<SpinLock>())?;
        let lock = shm
            .as_struct::<SpinLock>()
            .map(NonNull::from)
            .ok_or_else(|| Error::SizeMismatch {
                name: name.to_string(),
                requested: std::mem::size_of::<SpinLock>(),
                existing: shm.size(),
            })?;
        Ok(Self { shm, lock })
    }

    fn inner(&self) -> &SpinLock {
        // Safety: see the Send/Sync impls above.
        unsafe { self.lock.as_ref() }
    }

    /// Acquire the lock, spinning until it is free.
    pub fn lock(&self) {
        self.inner().lock();
    }

    pub fn try_lock(&self) -> bool {
        self.inner().try_lock()
    }

    pub fn unlock(&self) {
        self.inner().unlock();
    }

    pub fn name(&self) -> &str {
        self.shm.name()
    }

    /// Number of handles attached to this lock across all processes.
    pub fn reference_count(&self) -> i32 {
        self.shm.reference_count()
    }
}

impl std::fmt::Debug for IpcSpinLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpcSpinLock")
            .field("name", &self.name())
            .field("locked", &self.inner().is_locked())
            .field("reference_count", &self.reference_count())
            .finish()
    }
}
