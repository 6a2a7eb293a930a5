// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Reference-counted POSIX shared memory segment.
//
// Layout of the mapped object:
//
//   offset 0           HEADER_SIZE                 HEADER_SIZE + data_size
//   | AtomicI32 refcnt | padding to a cache line | user data ... |
//
// Attach is lock-free. The named lock of the same name is held only while
// creating the object and while deciding whether to unlink it.
//
// Teardown re-reads the count under the named lock before unlinking, so an
// attacher that incremented after our decrement keeps the object alive. It
// also unlinks only while the name still resolves to our own object (same
// st_dev/st_ino), so a stale handle never removes a successor created after a
// `remove`. One window is still open: an attacher that has opened the
// descriptor but not yet incremented when the last holder unlinks ends up on
// an object that is no longer in the namespace, and later openers create a
// fresh one.

use std::ffi::CString;
use std::sync::atomic::{AtomicI32, Ordering};

use crate::error::{Error, Result};
use crate::named_lock::NamedLock;
use crate::platform::{self, ShmFd};
use crate::shm_name::{self, SEM_NAME_MAX};
use crate::spin_lock::adaptive_yield;

/// Assumed cache line size.
pub const CACHELINE_SIZE: usize = 64;

/// Bytes reserved in front of the user data for the reference count.
pub const HEADER_SIZE: usize = CACHELINE_SIZE;

/// Longest accepted segment name body. A segment always opens a named lock
/// under the same name, so the tighter semaphore bound applies.
pub const NAME_MAX: usize = SEM_NAME_MAX;

/// How many times create/attach and teardown retry while another process is
/// mid-creation or holds the named lock. With `adaptive_yield` this is roughly
/// one second.
const RETRY_LIMIT: u32 = 1024;

#[repr(C, align(64))]
struct Header {
    ref_count: AtomicI32,
}

const _: () = assert!(std::mem::size_of::<Header>() == HEADER_SIZE);

/// Types that may be viewed in place inside a shared memory segment.
///
/// # Safety
/// Every bit pattern, including all zeros (a freshly created segment), must
/// be a valid value, and the type must hold no pointers. Nothing more is
/// promised: plain integers are `ShmSafe` but a `&u64` into the segment does
/// not stop another handle or process from writing the same bytes. Only the
/// atomic types and `SpinLock` are sound under unsynchronized concurrent
/// access; for the rest callers serialize access themselves (for example
/// under an `IpcSpinLock`).
pub unsafe trait ShmSafe: Sync {}

macro_rules! impl_shm_safe {
    ($($t:ty),* $(,)?) => { $(unsafe impl ShmSafe for $t {})* };
}

impl_shm_safe!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64);

impl_shm_safe!(
    std::sync::atomic::AtomicBool,
    std::sync::atomic::AtomicU8,
    std::sync::atomic::AtomicU16,
    std::sync::atomic::AtomicU32,
    std::sync::atomic::AtomicU64,
    std::sync::atomic::AtomicUsize,
    std::sync::atomic::AtomicI8,
    std::sync::atomic::AtomicI16,
    std::sync::atomic::AtomicI32,
    std::sync::atomic::AtomicI64,
    std::sync::atomic::AtomicIsize,
    crate::SpinLock,
);

unsafe impl<T: ShmSafe, const N: usize> ShmSafe for [T; N] {}

/// A named shared memory segment with a process-shared reference count.
///
/// The first `open` for a name creates the object, later ones attach to it,
/// and the handle whose drop takes the count to zero unlinks it.
pub struct SharedMemory {
    name: String,
    posix_name: CString,
    lock: NamedLock,
    fd: Option<ShmFd>,
    mem: *mut u8,
    data_size: usize,
    total_size: usize,
}

// Safety: the mapping is process-shared by design; the only handle-local
// mutable state (lock, fd) is touched exclusively in drop.
unsafe impl Send for SharedMemory {}
unsafe impl Sync for SharedMemory {}

enum Pending {
    /// The object exists but its creator has not sized it yet.
    Sizing,
    /// The object does not exist and someone else holds the creation lock.
    Missing(std::io::Error),
}

impl SharedMemory {
    /// Create or attach to the segment `name` with `data_size` user bytes.
    ///
    /// Fails with `SizeMismatch` if the segment already exists with a
    /// different size. Nothing stays mapped or open on failure.
    pub fn open(name: &str, data_size: usize) -> Result<Self> {
        let posix_name = segment_name(name)?;
        if data_size == 0 {
            return Err(Error::InvalidArgument("requested 0 bytes of shared memory".into()));
        }
        let total_size = data_size
            .checked_add(HEADER_SIZE)
            .ok_or_else(|| Error::InvalidArgument(format!("requested size {data_size} overflows")))?;

        let mut lock = NamedLock::open(name)?;
        let fd = attach_or_create(name, &posix_name, &mut lock, total_size)?;
        let mem = fd
            .map(total_size)
            .map_err(|e| Error::system(format!("failed to map shared memory \"{name}\""), e))?;

        let shm = Self {
            name: name.to_string(),
            posix_name,
            lock,
            fd: Some(fd),
            mem,
            data_size,
            total_size,
        };
        let prev = shm.header().ref_count.fetch_add(1, Ordering::Release);
        tracing::debug!(name, data_size, ref_count = prev + 1, "shared memory attached");
        Ok(shm)
    }

    /// Whether an object called `name` is currently linked in the namespace.
    pub fn exists(name: &str) -> Result<bool> {
        let posix_name = segment_name(name)?;
        match ShmFd::open(&posix_name) {
            Ok(_) => Ok(true),
            Err(e) if e.raw_os_error() == Some(libc::ENOENT) => Ok(false),
            Err(e) => Err(Error::system(format!("failed to open shared memory \"{name}\""), e)),
        }
    }

    /// Force-unlink `name`, regardless of its reference count.
    ///
    /// For cleaning up after crashed processes. Live handles keep their
    /// mapping; their eventual unlink attempt is reported and ignored.
    pub fn remove(name: &str) -> Result<()> {
        let posix_name = segment_name(name)?;
        ShmFd::unlink(&posix_name)
            .map_err(|e| Error::system(format!("failed to unlink shared memory \"{name}\""), e))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// User-visible size in bytes.
    pub fn size(&self) -> usize {
        self.data_size
    }

    /// Total mapped size, header included.
    pub fn mapped_size(&self) -> usize {
        self.total_size
    }

    /// Number of handles currently attached across all processes, or -1 if
    /// this handle is not mapped.
    pub fn reference_count(&self) -> i32 {
        if self.mem.is_null() {
            return -1;
        }
        self.header().ref_count.load(Ordering::Acquire)
    }

    /// Pointer to the start of the user data.
    pub fn as_ptr(&self) -> *const u8 {
        self.data_ptr()
    }

    /// Mutable pointer to the start of the user data.
    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.data_ptr()
    }

    /// View the data region as a single `T`. `None` unless `T` fills the
    /// region exactly.
    pub fn as_struct<T: ShmSafe>(&self) -> Option<&T> {
        if self.mem.is_null()
            || std::mem::size_of::<T>() != self.data_size
            || std::mem::align_of::<T>() > HEADER_SIZE
        {
            return None;
        }
        // Safety: size and alignment checked above; T: ShmSafe accepts any
        // contents.
        Some(unsafe { &*(self.data_ptr() as *const T) })
    }

    /// View the whole data region as `[T]`. `None` unless the region is a
    /// whole number of `T`s.
    pub fn as_slice<T: ShmSafe>(&self) -> Option<&[T]> {
        let elem = std::mem::size_of::<T>();
        if self.mem.is_null()
            || elem == 0
            || self.data_size % elem != 0
            || std::mem::align_of::<T>() > HEADER_SIZE
        {
            return None;
        }
        Some(unsafe { std::slice::from_raw_parts(self.data_ptr() as *const T, self.data_size / elem) })
    }

    /// The data region as bytes.
    ///
    /// A snapshot view with no aliasing guarantee: other handles in this or
    /// any other process may write the same bytes while the slice is alive.
    /// Read under a lock shared with the writers when that matters.
    pub fn as_bytes(&self) -> &[u8] {
        if self.mem.is_null() {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(self.data_ptr(), self.data_size) }
    }

    /// The data region as mutable bytes.
    ///
    /// Exclusive only within this handle: other handles and processes can
    /// still write the same memory unless callers agree on a lock.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        if self.mem.is_null() {
            return &mut [];
        }
        unsafe { std::slice::from_raw_parts_mut(self.data_ptr(), self.data_size) }
    }

    fn header(&self) -> &Header {
        // Safety: mem is a live mapping of at least HEADER_SIZE bytes,
        // page-aligned, whenever this is called.
        unsafe { &*(self.mem as *const Header) }
    }

    fn data_ptr(&self) -> *mut u8 {
        unsafe { self.mem.add(HEADER_SIZE) }
    }

    /// Whether `name` currently resolves to the object this handle mapped.
    fn name_refers_to_self(&self) -> std::io::Result<bool> {
        let Some(fd) = &self.fd else {
            return Ok(false);
        };
        let ours = fd.identity()?;
        match ShmFd::open(&self.posix_name) {
            Ok(linked) => Ok(linked.identity()? == ours),
            Err(e) if e.raw_os_error() == Some(libc::ENOENT) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Called with the mapping still alive after our decrement hit zero.
    fn unlink_if_unused(&mut self) {
        let mut k = 0u32;
        let mut attempts = 0;
        while !self.lock.try_acquire() {
            attempts += 1;
            if attempts >= RETRY_LIMIT {
                tracing::error!(name = %self.name, "can't lock named lock; shared memory left linked");
                return;
            }
            adaptive_yield(&mut k);
        }

        let count = self.header().ref_count.load(Ordering::Acquire);
        if count == 0 {
            match self.name_refers_to_self() {
                Ok(true) => match ShmFd::unlink(&self.posix_name) {
                    Ok(()) => tracing::debug!(name = %self.name, "shared memory unlinked"),
                    Err(e) => {
                        tracing::warn!(name = %self.name, error = %e, "failed to unlink shared memory")
                    }
                },
                Ok(false) => {
                    tracing::debug!(name = %self.name, "name no longer refers to this segment; not unlinking")
                }
                Err(e) => {
                    tracing::warn!(name = %self.name, error = %e, "can't identify shared memory; left linked")
                }
            }
        } else {
            tracing::debug!(name = %self.name, ref_count = count, "re-attached before unlink; keeping");
        }

        if let Err(e) = self.lock.release_checked() {
            tracing::warn!(name = %self.name, error = %e, "failed to release named lock");
        }
    }
}

impl Drop for SharedMemory {
    fn drop(&mut self) {
        if !self.mem.is_null() {
            let remaining = self.header().ref_count.fetch_sub(1, Ordering::Release) - 1;
            tracing::debug!(name = %self.name, ref_count = remaining, "shared memory detached");
            if remaining == 0 {
                self.unlink_if_unused();
            }
            if let Err(e) = unsafe { platform::unmap(self.mem, self.total_size) } {
                tracing::warn!(name = %self.name, error = %e, "failed to unmap shared memory");
            }
            self.mem = std::ptr::null_mut();
        }
        if let Some(fd) = self.fd.take() {
            if let Err(e) = fd.close() {
                tracing::warn!(name = %self.name, error = %e, "failed to close shared memory");
            }
        }
    }
}

impl std::fmt::Debug for SharedMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedMemory")
            .field("name", &self.name)
            .field("size", &self.data_size)
            .field("reference_count", &self.reference_count())
            .finish()
    }
}

/// Validate a segment name. Bad segment names are argument errors, unlike the
/// named lock's `InvalidName`.
fn segment_name(name: &str) -> Result<CString> {
    shm_name::posix_name(name, NAME_MAX).map_err(|e| match e {
        Error::InvalidName { name, len, max } => Error::InvalidArgument(format!(
            "shared memory name \"{name}\" of length {len} is invalid: length must be in [1, {max}] with no '/' after the first byte and no NUL"
        )),
        other => other,
    })
}

/// Open the object, creating it under the named lock if it does not exist.
fn attach_or_create(
    name: &str,
    posix_name: &CString,
    lock: &mut NamedLock,
    total_size: usize,
) -> Result<ShmFd> {
    let mut k = 0u32;
    let mut attempts = 0;
    loop {
        attempts += 1;
        let pending = match ShmFd::open(posix_name) {
            Ok(fd) => {
                let existing = fd.size().map_err(|e| {
                    Error::system(format!("fstat failed for shared memory \"{name}\""), e)
                })?;
                if existing == total_size {
                    return Ok(fd);
                }
                if existing != 0 {
                    return Err(Error::SizeMismatch {
                        name: name.to_string(),
                        requested: total_size,
                        existing,
                    });
                }
                Pending::Sizing
            }
            Err(e) if e.raw_os_error() == Some(libc::ENOENT) => {
                if attempts < RETRY_LIMIT && create(name, posix_name, lock, total_size)? {
                    continue;
                }
                Pending::Missing(e)
            }
            Err(e) => {
                return Err(Error::system(format!("failed to open shared memory \"{name}\""), e))
            }
        };

        if attempts >= RETRY_LIMIT {
            return Err(match pending {
                Pending::Sizing => Error::SizeMismatch {
                    name: name.to_string(),
                    requested: total_size,
                    existing: 0,
                },
                Pending::Missing(e) => {
                    Error::system(format!("failed to open shared memory \"{name}\""), e)
                }
            });
        }
        adaptive_yield(&mut k);
    }
}

/// Create and size the object if we can take the named lock.
///
/// Returns `true` when the object should now exist (we created it, or lost
/// the `O_EXCL` race to another creator), `false` if the lock was busy.
fn create(name: &str, posix_name: &CString, lock: &mut NamedLock, total_size: usize) -> Result<bool> {
    if !lock.try_acquire() {
        return Ok(false);
    }

    let result = match ShmFd::create_exclusive(posix_name) {
        Ok(fd) => match fd.truncate(total_size) {
            Ok(()) => {
                tracing::debug!(name, total_size, "shared memory created");
                Ok(true)
            }
            Err(e) => {
                // Leave no zero-sized object behind for attachers to wait on.
                if let Err(e) = ShmFd::unlink(posix_name) {
                    tracing::warn!(name, error = %e, "failed to unlink unsized shared memory");
                }
                Err(Error::system(format!("failed to allocate shared memory \"{name}\""), e))
            }
        },
        Err(e) if e.raw_os_error() == Some(libc::EEXIST) => Ok(true),
        Err(e) => Err(Error::system(format!("failed to create shared memory \"{name}\""), e)),
    };

    if let Err(e) = lock.release_checked() {
        tracing::warn!(name, error = %e, "failed to release named lock");
    }
    result
}
