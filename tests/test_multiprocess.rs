// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Separate processes (the shm_counter binary) attach to the same segment and
// spin lock as this test.

use std::process::Command;

use shmlock::{IpcSpinLock, SharedMemory};

fn unique_name(prefix: &str) -> String {
    format!("{prefix}_mp_{}", std::process::id())
}

#[test]
fn children_increment_under_ipc_lock() {
    let name = unique_name("counter");
    let lock = IpcSpinLock::open(&format!("{name}.lock")).unwrap();
    let shm = SharedMemory::open(&name, std::mem::size_of::<u64>()).unwrap();

    let children = 4;
    let iterations = 5000u64;
    let mut procs: Vec<_> = (0..children)
        .map(|_| {
            Command::new(env!("CARGO_BIN_EXE_shm_counter"))
                .arg(&name)
                .arg(iterations.to_string())
                .spawn()
                .expect("spawn shm_counter")
        })
        .collect();

    for p in procs.iter_mut() {
        let status = p.wait().expect("wait");
        assert!(status.success(), "child failed: {status}");
    }

    lock.lock();
    let total = unsafe { (shm.as_ptr() as *const u64).read_volatile() };
    lock.unlock();
    assert_eq!(total, children * iterations);

    // Every child detached on exit.
    assert_eq!(shm.reference_count(), 1);
    assert_eq!(lock.reference_count(), 1);
}

#[test]
fn child_sees_parent_writes_and_held_lock() {
    let name = unique_name("held");
    let lock = IpcSpinLock::open(&format!("{name}.lock")).unwrap();
    let mut shm = SharedMemory::open(&name, std::mem::size_of::<u64>()).unwrap();
    shm.as_bytes_mut().copy_from_slice(&41u64.to_ne_bytes());

    // With the lock held, the child blocks on its first increment.
    lock.lock();
    let mut child = Command::new(env!("CARGO_BIN_EXE_shm_counter"))
        .arg(&name)
        .arg("1")
        .spawn()
        .expect("spawn shm_counter");

    std::thread::sleep(std::time::Duration::from_millis(200));
    assert!(child.try_wait().expect("try_wait").is_none());
    assert_eq!(u64::from_ne_bytes(shm.as_bytes().try_into().unwrap()), 41);

    lock.unlock();
    assert!(child.wait().expect("wait").success());
    assert_eq!(u64::from_ne_bytes(shm.as_bytes().try_into().unwrap()), 42);
}

#[test]
fn segment_gone_after_all_processes_detach() {
    let name = unique_name("teardown");
    {
        let _lock = IpcSpinLock::open(&format!("{name}.lock")).unwrap();
        let _shm = SharedMemory::open(&name, std::mem::size_of::<u64>()).unwrap();
        let status = Command::new(env!("CARGO_BIN_EXE_shm_counter"))
            .arg(&name)
            .arg("10")
            .status()
            .expect("run shm_counter");
        assert!(status.success());
        assert!(SharedMemory::exists(&name).unwrap());
    }
    assert!(!SharedMemory::exists(&name).unwrap());
    assert!(!SharedMemory::exists(&format!("{name}.lock")).unwrap());
}
