// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Error taxonomy shared by the named lock, the shared memory segment and the
// cross-process spin lock.

use std::io;

use thiserror::Error;

/// Errors returned by `shmlock` constructors and checked lock operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A named lock name is empty, too long, or contains a character the
    /// POSIX namespace does not accept.
    #[error("name \"{name}\" of length {len} is invalid: length must be in [1, {max}] with no '/' after the first byte and no NUL")]
    InvalidName {
        name: String,
        len: usize,
        max: usize,
    },

    /// An argument to a shared memory constructor is out of range: a zero or
    /// overflowing data size, or an empty or over-long segment name.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A segment with this name already exists with different dimensions.
    #[error("shared memory \"{name}\" exists, but size does not match: {requested} requested vs. {existing} existing")]
    SizeMismatch {
        name: String,
        requested: usize,
        existing: usize,
    },

    /// An underlying OS call failed.
    #[error("{context}: {source}")]
    System {
        context: String,
        #[source]
        source: io::Error,
    },

    /// Release attempted on a named lock this handle does not hold.
    #[error("named lock \"{name}\" is not owned by this handle")]
    NotOwned { name: String },
}

impl Error {
    pub(crate) fn system(context: impl Into<String>, source: io::Error) -> Self {
        Self::System {
            context: context.into(),
            source,
        }
    }

    /// The raw OS error code, if this error came from a failed system call.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::System { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
