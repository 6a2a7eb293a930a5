// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// System-wide named binary lock over a POSIX named semaphore.
// Every operation is non-blocking: acquisition is a single sem_trywait.

use crate::error::{Error, Result};
use crate::platform::PlatformSemaphore;
use crate::shm_name::{self, SEM_NAME_MAX};

/// A named, inter-process binary lock.
///
/// The semaphore is created with value 1 ("available") by the first opener
/// and persists in the system namespace after every handle is gone. Ownership
/// is tracked per handle, so re-acquiring through the same handle never
/// deadlocks and releasing through a handle that does not hold the lock is
/// refused.
pub struct NamedLock {
    name: String,
    sem: PlatformSemaphore,
    owned: bool,
}

impl NamedLock {
    /// Open (or create, initially available) the named lock.
    pub fn open(name: &str) -> Result<Self> {
        let c_name = shm_name::posix_name(name, SEM_NAME_MAX)?;
        let (sem, created) = PlatformSemaphore::create_or_open(&c_name, 1)
            .map_err(|e| Error::system(format!("can't access semaphore \"{name}\""), e))?;
        tracing::trace!(name, created, "named lock opened");
        Ok(Self {
            name: name.to_string(),
            sem,
            owned: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this handle currently holds the lock.
    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// Try once to take the lock. Returns `true` if this handle now holds it,
    /// including when it already did.
    pub fn try_acquire(&mut self) -> bool {
        self.try_acquire_checked().is_ok()
    }

    /// Like [`try_acquire`](Self::try_acquire), but a failed attempt carries
    /// the OS error (`EAGAIN` when another holder has it).
    pub fn try_acquire_checked(&mut self) -> Result<()> {
        if self.owned {
            return Ok(());
        }
        self.sem
            .try_wait()
            .map_err(|e| Error::system(format!("sem_trywait \"{}\"", self.name), e))?;
        self.owned = true;
        Ok(())
    }

    /// Give the lock back. Returns `false` if this handle did not hold it or
    /// the increment failed.
    pub fn release(&mut self) -> bool {
        self.release_checked().is_ok()
    }

    /// Like [`release`](Self::release), reporting why nothing was released.
    pub fn release_checked(&mut self) -> Result<()> {
        if !self.owned {
            return Err(Error::NotOwned {
                name: self.name.clone(),
            });
        }
        self.sem
            .post()
            .map_err(|e| Error::system(format!("sem_post \"{}\"", self.name), e))?;
        self.owned = false;
        Ok(())
    }

    /// Remove the named semaphore from the system namespace.
    ///
    /// Handles that are already open keep working; the next `open` creates a
    /// fresh, available semaphore. Intended for cleaning up after processes
    /// that died while holding the lock.
    pub fn remove(name: &str) -> Result<()> {
        let c_name = shm_name::posix_name(name, SEM_NAME_MAX)?;
        PlatformSemaphore::unlink(&c_name)
            .map_err(|e| Error::system(format!("sem_unlink \"{name}\""), e))
    }
}

impl Drop for NamedLock {
    fn drop(&mut self) {
        if self.owned {
            if let Err(e) = self.release_checked() {
                tracing::warn!(name = %self.name, error = %e, "failed to release named lock on drop");
            }
        }
        if let Err(e) = self.sem.close() {
            tracing::warn!(name = %self.name, error = %e, "failed to close semaphore");
        }
    }
}

impl std::fmt::Debug for NamedLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedLock")
            .field("name", &self.name)
            .field("owned", &self.owned)
            .finish()
    }
}
