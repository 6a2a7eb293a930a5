// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Usage:
//   shm_counter <name> <iterations>
//
// Attaches to the 8-byte segment <name> and the spin lock <name>.lock, then
// increments the u64 in the segment <iterations> times, one increment per
// lock hold. Run several copies against the same name to check that the
// lock excludes across processes: the final value is the sum of all
// iterations.

use std::process::exit;

use shmlock::{IpcSpinLock, ScopedLock, SharedMemory};

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("usage: shm_counter <name> <iterations>");
        exit(1);
    }
    let name = &args[1];
    let iterations: u64 = match args[2].parse() {
        Ok(n) => n,
        Err(e) => {
            eprintln!("bad iteration count {:?}: {e}", args[2]);
            exit(1);
        }
    };

    let lock = IpcSpinLock::open(&format!("{name}.lock")).unwrap_or_else(|e| {
        eprintln!("shm_counter: {e}");
        exit(2);
    });
    let shm = SharedMemory::open(name, std::mem::size_of::<u64>()).unwrap_or_else(|e| {
        eprintln!("shm_counter: {e}");
        exit(2);
    });

    let counter = shm.as_mut_ptr() as *mut u64;
    for _ in 0..iterations {
        let _g = ScopedLock::new(&lock);
        // Plain read-modify-write: only the lock makes this safe.
        unsafe { counter.write_volatile(counter.read_volatile() + 1) };
    }

    println!("shm_counter: {name} done, {iterations} increments");
}
