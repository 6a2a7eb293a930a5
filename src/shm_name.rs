// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Validation and POSIX spelling of named-object identifiers.
//
// Callers may pass "foo" or "/foo"; both refer to the POSIX object "/foo".
// The length bounds below apply to the part after the leading '/'.

use std::ffi::CString;

use crate::error::{Error, Result};

/// `NAME_MAX` from `<linux/limits.h>`.
#[cfg(not(target_os = "macos"))]
const NAME_MAX: usize = 255;

/// Longest accepted shared memory name body.
///
/// glibc rejects `shm_open` names whose body plus terminator reaches
/// `NAME_MAX`. macOS limits the whole name, slash included, to `PSHMNAMLEN`.
#[cfg(target_os = "macos")]
pub const SHM_NAME_MAX: usize = 30;
#[cfg(not(target_os = "macos"))]
pub const SHM_NAME_MAX: usize = NAME_MAX - 2;

/// Longest accepted semaphore name body.
///
/// Linux stores named semaphores as `/dev/shm/sem.<body>`, so four bytes of
/// `NAME_MAX` go to the prefix.
#[cfg(target_os = "macos")]
pub const SEM_NAME_MAX: usize = 30;
#[cfg(not(target_os = "macos"))]
pub const SEM_NAME_MAX: usize = SHM_NAME_MAX - 4;

/// Strip one leading '/' if present.
fn body(name: &str) -> &str {
    name.strip_prefix('/').unwrap_or(name)
}

/// Check `name` against `max` and return its POSIX form (with leading '/').
pub fn posix_name(name: &str, max: usize) -> Result<CString> {
    let b = body(name);
    let invalid = || Error::InvalidName {
        name: name.to_string(),
        len: name.len(),
        max,
    };
    if b.is_empty() || b.len() > max || b.contains('/') || b.contains('\0') {
        return Err(invalid());
    }
    CString::new(format!("/{b}")).map_err(|_| invalid())
}
