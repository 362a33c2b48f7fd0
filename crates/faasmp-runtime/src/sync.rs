//! Team synchronization primitives
//!
//! Guest `critical` regions open in one host call and close in another, so
//! the locks here cannot hand out RAII guards; acquisition and release are
//! explicit operations that may run on different stack frames of the same
//! thread.

use parking_lot::{Condvar, Mutex};

/// A condvar-backed binary semaphore.
///
/// `acquire` blocks until the lock is free and takes it; `release` frees it
/// and wakes one waiter. Unlike a `Mutex`, the holder is not tracked, which
/// is exactly what cross-call critical sections need. Releasing an
/// unacquired lock is a no-op rather than undefined behavior.
#[derive(Debug, Default)]
pub struct RegionLock {
    held: Mutex<bool>,
    available: Condvar,
}

impl RegionLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the lock is free, then take it.
    pub fn acquire(&self) {
        let mut held = self.held.lock();
        while *held {
            self.available.wait(&mut held);
        }
        *held = true;
    }

    /// Free the lock and wake one waiter.
    pub fn release(&self) {
        let mut held = self.held.lock();
        *held = false;
        self.available.notify_one();
    }

    /// Whether some thread currently holds the lock.
    pub fn is_held(&self) -> bool {
        *self.held.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn acquire_release_cycle() {
        let lock = RegionLock::new();
        lock.acquire();
        assert!(lock.is_held());
        lock.release();
        assert!(!lock.is_held());
    }

    #[test]
    fn release_without_acquire_is_harmless() {
        let lock = RegionLock::new();
        lock.release();
        assert!(!lock.is_held());
        lock.acquire();
        assert!(lock.is_held());
        lock.release();
    }

    #[test]
    fn contended_windows_are_disjoint() {
        let lock = Arc::new(RegionLock::new());
        let active = Arc::new(Mutex::new(0i32));
        let mut handles = Vec::new();

        for _ in 0..4 {
            let lock = lock.clone();
            let active = active.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..50 {
                    lock.acquire();
                    {
                        let mut count = active.lock();
                        assert_eq!(*count, 0, "two threads inside the critical window");
                        *count += 1;
                    }
                    thread::sleep(Duration::from_micros(10));
                    {
                        let mut count = active.lock();
                        *count -= 1;
                    }
                    lock.release();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
