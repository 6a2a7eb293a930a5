// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// In-process spin lock: state machine, mutual exclusion under contention.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use shmlock::{ScopedLock, SpinLock};

#[test]
fn basic_lock_unlock() {
    let lock = SpinLock::new();
    lock.lock();
    assert!(lock.is_locked());
    lock.unlock();
    assert!(!lock.is_locked());
}

#[test]
fn try_lock_succeeds_once_until_unlock() {
    let lock = SpinLock::new();
    assert!(lock.try_lock());
    assert!(!lock.try_lock());
    assert!(!lock.try_lock());
    lock.unlock();
    assert!(lock.try_lock());
    lock.unlock();
}

#[test]
fn try_lock_fails_while_locked_by_lock() {
    let lock = SpinLock::default();
    lock.lock();
    assert!(!lock.try_lock());
    lock.unlock();
    assert!(lock.try_lock());
    lock.unlock();
}

#[test]
fn lock_waits_for_other_thread() {
    let lock = Arc::new(SpinLock::new());
    let entered = Arc::new(AtomicBool::new(false));
    lock.lock();

    let t = {
        let lock = Arc::clone(&lock);
        let entered = Arc::clone(&entered);
        thread::spawn(move || {
            lock.lock();
            entered.store(true, Ordering::SeqCst);
            lock.unlock();
        })
    };

    thread::sleep(Duration::from_millis(50));
    assert!(!entered.load(Ordering::SeqCst));
    lock.unlock();
    t.join().unwrap();
    assert!(entered.load(Ordering::SeqCst));
}

#[test]
fn scoped_lock_counts() {
    let lock = Arc::new(SpinLock::new());
    let counter = Arc::new(AtomicI32::new(0));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let lock = Arc::clone(&lock);
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                for _ in 0..500 {
                    let _g = ScopedLock::new(&*lock);
                    let v = counter.load(Ordering::Relaxed);
                    counter.store(v + 1, Ordering::Relaxed);
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(counter.load(Ordering::Relaxed), 2000);
    assert!(!lock.is_locked());
}

#[test]
fn mutual_exclusion() {
    let lock = Arc::new(SpinLock::new());
    let inside = Arc::new(AtomicI32::new(0));
    let violation = Arc::new(AtomicBool::new(false));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let lock = Arc::clone(&lock);
            let inside = Arc::clone(&inside);
            let violation = Arc::clone(&violation);
            thread::spawn(move || {
                for _ in 0..200 {
                    lock.lock();
                    if inside.fetch_add(1, Ordering::SeqCst) != 0 {
                        violation.store(true, Ordering::SeqCst);
                    }
                    thread::yield_now();
                    inside.fetch_sub(1, Ordering::SeqCst);
                    lock.unlock();
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    assert!(!violation.load(Ordering::SeqCst));
}

#[test]
fn try_lock_contention_never_double_acquires() {
    let lock = Arc::new(SpinLock::new());
    let acquired = Arc::new(AtomicI32::new(0));
    let holders = Arc::new(AtomicI32::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let lock = Arc::clone(&lock);
            let acquired = Arc::clone(&acquired);
            let holders = Arc::clone(&holders);
            thread::spawn(move || {
                for _ in 0..1000 {
                    if lock.try_lock() {
                        assert_eq!(holders.fetch_add(1, Ordering::SeqCst), 0);
                        acquired.fetch_add(1, Ordering::Relaxed);
                        holders.fetch_sub(1, Ordering::SeqCst);
                        lock.unlock();
                    }
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    assert!(acquired.load(Ordering::Relaxed) > 0);
    assert!(!lock.is_locked());
}
