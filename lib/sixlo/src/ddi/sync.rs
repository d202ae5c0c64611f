// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Safe abstractions for synchronization primitives.
//!
//! The stack runs both hosted (tests, simulators) and on bare-metal
//! nodes with no OS underneath. In a `std` environment the locks wrap
//! `std::sync`; otherwise they wrap the spinning locks of the `spin`
//! crate. Either way the API is the same, and neither flavor reports
//! poisoning: a panic while holding a lock is already fatal on a node.
use core::ops::Deref;
use core::ops::DerefMut;

cfg_if! {
    if #[cfg(all(not(feature = "std"), not(test)))] {
        use spin::Mutex;
        use spin::MutexGuard;
        use spin::RwLock;
        use spin::RwLockReadGuard;
        use spin::RwLockWriteGuard;
    } else {
        use std::sync::Mutex;
        use std::sync::MutexGuard;
        use std::sync::PoisonError;
        use std::sync::RwLock;
        use std::sync::RwLockReadGuard;
        use std::sync::RwLockWriteGuard;
    }
}

/// A mutual exclusion lock.
///
/// We name it `KMutex` on purpose: it is not `std`'s `Mutex`, and it
/// does not hand back a `Result` on acquisition.
pub struct KMutex<T> {
    inner: Mutex<T>,
}

pub struct KMutexGuard<'a, T: 'a> {
    guard: MutexGuard<'a, T>,
}

impl<T> Deref for KMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.guard.deref()
    }
}

impl<T> DerefMut for KMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.guard.deref_mut()
    }
}

impl<T> KMutex<T> {
    #[cfg(any(feature = "std", test))]
    pub fn into_inner(self) -> T {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(all(not(feature = "std"), not(test)))]
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }

    pub fn new(val: T) -> Self {
        KMutex { inner: Mutex::new(val) }
    }

    /// Acquire the lock, blocking (or spinning) until it's available.
    /// The lock is released when the guard is dropped.
    #[cfg(any(feature = "std", test))]
    pub fn lock(&self) -> KMutexGuard<'_, T> {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        KMutexGuard { guard }
    }

    #[cfg(all(not(feature = "std"), not(test)))]
    pub fn lock(&self) -> KMutexGuard<'_, T> {
        KMutexGuard { guard: self.inner.lock() }
    }
}

/// A reader-writer lock.
pub struct KRwLock<T> {
    inner: RwLock<T>,
}

pub struct KRwLockReadGuard<'a, T: 'a> {
    guard: RwLockReadGuard<'a, T>,
}

pub struct KRwLockWriteGuard<'a, T: 'a> {
    guard: RwLockWriteGuard<'a, T>,
}

impl<T> Deref for KRwLockReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.guard.deref()
    }
}

impl<T> Deref for KRwLockWriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.guard.deref()
    }
}

impl<T> DerefMut for KRwLockWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.guard.deref_mut()
    }
}

impl<T> KRwLock<T> {
    pub fn new(val: T) -> Self {
        KRwLock { inner: RwLock::new(val) }
    }

    #[cfg(any(feature = "std", test))]
    pub fn read(&self) -> KRwLockReadGuard<'_, T> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        KRwLockReadGuard { guard }
    }

    #[cfg(any(feature = "std", test))]
    pub fn write(&self) -> KRwLockWriteGuard<'_, T> {
        let guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        KRwLockWriteGuard { guard }
    }

    #[cfg(all(not(feature = "std"), not(test)))]
    pub fn read(&self) -> KRwLockReadGuard<'_, T> {
        KRwLockReadGuard { guard: self.inner.read() }
    }

    #[cfg(all(not(feature = "std"), not(test)))]
    pub fn write(&self) -> KRwLockWriteGuard<'_, T> {
        KRwLockWriteGuard { guard: self.inner.write() }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn mutex_serializes_writers() {
        let m = Arc::new(KMutex::new(0u32));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let m = Arc::clone(&m);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        *m.lock() += 1;
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        let m = Arc::into_inner(m).unwrap();
        assert_eq!(m.into_inner(), 4000);
    }

    #[test]
    fn rwlock_many_readers() {
        let l = KRwLock::new(7u8);
        let r1 = l.read();
        let r2 = l.read();
        assert_eq!(*r1 + *r2, 14);
        drop((r1, r2));
        *l.write() = 9;
        assert_eq!(*l.read(), 9);
    }
}
