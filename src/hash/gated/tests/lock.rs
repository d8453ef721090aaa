extern crate std;

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use std::thread;

use crate::hash::gated::MaybeLock;

#[test]
fn test_read_and_write() {
    let lock = MaybeLock::new(5);
    assert!(lock.is_locked());
    assert!(!lock.is_raw());
    {
        let guard = lock.read();
        assert_eq!(*guard, 5);
    }
    {
        let mut guard = lock.write();
        *guard += 1;
    }
    assert_eq!(*lock.read(), 6);
}

#[test]
fn test_concurrent_readers() {
    let lock = MaybeLock::new(7);
    let a = lock.read();
    let b = lock.read();
    assert_eq!(*a + *b, 14);
}

#[test]
fn test_into_inner() {
    let lock = MaybeLock::new(String::from("x"));
    assert_eq!(lock.into_inner(), "x");
}

#[test]
fn test_raw_mode_single_thread() {
    let lock = unsafe { MaybeLock::new_raw(0) };
    assert!(lock.is_raw());
    assert!(!lock.is_locked());
    for _ in 0..100 {
        *lock.write() += 1;
    }
    assert_eq!(*lock.read(), 100);
    assert_eq!(lock.into_inner(), 100);
}

#[test]
fn test_writer_exclusion() {
    let lock = Arc::new(MaybeLock::new(0u64));
    let mut handles = Vec::new();
    for _ in 0..4 {
        let lock = Arc::clone(&lock);
        handles.push(thread::spawn(move || {
            for _ in 0..1000 {
                *lock.write() += 1;
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(*lock.read(), 4000);
}

#[test]
fn test_guard_released_on_drop() {
    let lock = MaybeLock::new(1);
    drop(lock.write());
    // A second exclusive acquisition succeeds once the first guard is gone.
    drop(lock.write());
    assert_eq!(*lock.read(), 1);
}
