// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// POSIX bindings for named semaphores and shared memory objects.
// Each call maps one-to-one onto a libc function and reports errno through
// `io::Error`; the protocols built on top live in `named_lock` and `shm`.

use std::ffi::CStr;
use std::io;
use std::ptr;

/// Permission bits for every object we create (S_IRUSR | S_IWUSR).
const PERMS: libc::mode_t = 0o600;

// ---------------------------------------------------------------------------
// PlatformSemaphore — POSIX named semaphore (sem_open family)
// ---------------------------------------------------------------------------

pub struct PlatformSemaphore {
    sem: *mut libc::sem_t,
}

// Safety: sem_t operations are thread-safe; the handle is just a pointer
// into a process-shared mapping owned by libc.
unsafe impl Send for PlatformSemaphore {}
unsafe impl Sync for PlatformSemaphore {}

impl PlatformSemaphore {
    /// Create the semaphore with `initial` if it does not exist, otherwise
    /// open the existing one. Returns the handle and whether we created it.
    pub fn create_or_open(name: &CStr, initial: u32) -> io::Result<(Self, bool)> {
        let sem = unsafe {
            libc::sem_open(
                name.as_ptr(),
                libc::O_CREAT | libc::O_EXCL,
                PERMS as libc::c_uint,
                initial as libc::c_uint,
            )
        };
        if sem != libc::SEM_FAILED {
            return Ok((Self { sem }, true));
        }
        let e = io::Error::last_os_error();
        if e.raw_os_error() != Some(libc::EEXIST) {
            return Err(e);
        }
        let sem = unsafe { libc::sem_open(name.as_ptr(), 0) };
        if sem == libc::SEM_FAILED {
            return Err(io::Error::last_os_error());
        }
        Ok((Self { sem }, false))
    }

    /// Single non-blocking decrement. `EAGAIN` means the count was zero.
    pub fn try_wait(&self) -> io::Result<()> {
        loop {
            if unsafe { libc::sem_trywait(self.sem) } == 0 {
                return Ok(());
            }
            let e = io::Error::last_os_error();
            if e.raw_os_error() != Some(libc::EINTR) {
                return Err(e);
            }
        }
    }

    /// Single increment.
    pub fn post(&self) -> io::Result<()> {
        if unsafe { libc::sem_post(self.sem) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Close the process-local handle. The owner must not use the handle
    /// afterwards.
    pub fn close(&self) -> io::Result<()> {
        if unsafe { libc::sem_close(self.sem) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Remove a named semaphore from the system namespace.
    pub fn unlink(name: &CStr) -> io::Result<()> {
        if unsafe { libc::sem_unlink(name.as_ptr()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PlatformShm — POSIX shared memory object (shm_open family) and its mapping
// ---------------------------------------------------------------------------

/// An open shared memory file descriptor.
pub struct ShmFd {
    fd: libc::c_int,
}

impl ShmFd {
    /// Open an existing object read/write. `ENOENT` if it does not exist.
    pub fn open(name: &CStr) -> io::Result<Self> {
        let fd = unsafe { libc::shm_open(name.as_ptr(), libc::O_RDWR, PERMS as libc::c_uint) };
        if fd == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { fd })
    }

    /// Exclusively create a new object. `EEXIST` if one is already linked.
    pub fn create_exclusive(name: &CStr) -> io::Result<Self> {
        let fd = unsafe {
            libc::shm_open(
                name.as_ptr(),
                libc::O_RDWR | libc::O_CREAT | libc::O_EXCL,
                PERMS as libc::c_uint,
            )
        };
        if fd == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { fd })
    }

    fn stat(&self) -> io::Result<libc::stat> {
        let mut st: libc::stat = unsafe { std::mem::zeroed() };
        if unsafe { libc::fstat(self.fd, &mut st) } == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(st)
    }

    /// Current size of the object in bytes.
    pub fn size(&self) -> io::Result<usize> {
        Ok(self.stat()?.st_size as usize)
    }

    /// `(st_dev, st_ino)` of the underlying object. Two descriptors refer to
    /// the same object iff these match.
    pub fn identity(&self) -> io::Result<(u64, u64)> {
        let st = self.stat()?;
        Ok((st.st_dev as u64, st.st_ino as u64))
    }

    pub fn truncate(&self, size: usize) -> io::Result<()> {
        if unsafe { libc::ftruncate(self.fd, size as libc::off_t) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Map `size` bytes of the object shared and read/write.
    pub fn map(&self, size: usize) -> io::Result<*mut u8> {
        let mem = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                self.fd,
                0,
            )
        };
        if mem == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        Ok(mem as *mut u8)
    }

    /// Close the descriptor, reporting the error instead of dropping it.
    pub fn close(self) -> io::Result<()> {
        let fd = self.fd;
        std::mem::forget(self);
        if unsafe { libc::close(fd) } == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Remove a named object from the system namespace. Existing mappings
    /// stay valid.
    pub fn unlink(name: &CStr) -> io::Result<()> {
        if unsafe { libc::shm_unlink(name.as_ptr()) } == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Drop for ShmFd {
    // Error paths during construction; explicit teardown goes through close().
    fn drop(&mut self) {
        unsafe { libc::close(self.fd) };
    }
}

/// Unmap a region previously returned by [`ShmFd::map`].
///
/// # Safety
/// `mem` and `size` must describe a live mapping that nothing references
/// afterwards.
pub unsafe fn unmap(mem: *mut u8, size: usize) -> io::Result<()> {
    if libc::munmap(mem as *mut libc::c_void, size) != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
