// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Name validation happens before any OS object is touched.

use proptest::prelude::*;

use shmlock::{Error, IpcSpinLock, NamedLock, SharedMemory, NAME_MAX};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn overlong_names_are_rejected(extra in 1usize..64, c in "[a-z]") {
        let name = c.repeat(NAME_MAX + extra);
        prop_assert!(
            matches!(SharedMemory::open(&name, 64), Err(Error::InvalidArgument(_))),
            "segment accepted {} byte name", name.len()
        );
        prop_assert!(matches!(NamedLock::open(&name), Err(Error::InvalidName { .. })), "expected Err(InvalidName)");
        prop_assert!(matches!(IpcSpinLock::open(&name), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn names_with_inner_slash_are_rejected(a in "[a-z]{1,16}", b in "[a-z]{1,16}") {
        let name = format!("{a}/{b}");
        prop_assert!(matches!(SharedMemory::open(&name, 64), Err(Error::InvalidArgument(_))));
        prop_assert!(matches!(NamedLock::open(&name), Err(Error::InvalidName { .. })), "expected Err(InvalidName)");
    }

    #[test]
    fn zero_size_never_creates(suffix in "[a-z0-9]{1,24}") {
        let name = format!("prop_zero_{}_{suffix}", std::process::id());
        prop_assert!(matches!(SharedMemory::open(&name, 0), Err(Error::InvalidArgument(_))));
        prop_assert!(!SharedMemory::exists(&name).unwrap());
    }
}
