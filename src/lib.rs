// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Reference-counted POSIX shared memory, a named non-blocking lock built on
// POSIX named semaphores, and spin locks that work within one process or
// across processes through a shared segment.

#[cfg(not(unix))]
compile_error!("shmlock requires POSIX shared memory and named semaphores");

mod error;
pub use error::{Error, Result};

pub mod shm_name;

mod platform;

mod named_lock;
pub use named_lock::NamedLock;

mod shm;
pub use shm::{SharedMemory, ShmSafe, CACHELINE_SIZE, HEADER_SIZE, NAME_MAX};

mod spin_lock;
pub use spin_lock::SpinLock;

mod ipc_spin_lock;
pub use ipc_spin_lock::IpcSpinLock;

mod scoped_lock;
pub use scoped_lock::{RawLock, ScopedLock};
