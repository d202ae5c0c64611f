// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! A lock-based wrapper for values which may be replaced at runtime
//! (e.g., the routing provider) while readers continue to use the
//! value they loaded.

use crate::ddi::sync::KRwLock;
use alloc::sync::Arc;
use core::fmt::Debug;
use core::ops::Deref;
use core::sync::atomic::AtomicU64;
use core::sync::atomic::Ordering;
use core::write;

pub struct Dynamic<T: ?Sized>(Arc<InnerDynamic<T>>);

impl<T: ?Sized> Clone for Dynamic<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

struct InnerDynamic<T: ?Sized> {
    inner: KRwLock<Arc<T>>,
    epoch: AtomicU64,
}

#[derive(Debug)]
pub struct Snapshot<T: ?Sized> {
    pub value: Arc<T>,
    pub epoch: u64,
}

impl<T> From<T> for Dynamic<T> {
    fn from(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }
}

impl<T: ?Sized> Dynamic<T> {
    pub fn from_arc(value: Arc<T>) -> Self {
        let inner = KRwLock::new(value);
        Self(InnerDynamic { inner, epoch: AtomicU64::default() }.into())
    }

    /// Replace the value. Readers holding a [`Snapshot`] keep the old
    /// value alive until they drop it.
    pub fn store_arc(&self, value: Arc<T>) {
        let mut inner = self.0.inner.write();
        *inner = value;
        _ = self.0.epoch.fetch_add(1, Ordering::Relaxed);
    }

    pub fn load(&self) -> Snapshot<T> {
        let value_locked = self.0.inner.read();
        let value = Arc::clone(&*value_locked);
        let epoch = self.0.epoch.load(Ordering::Relaxed);

        Snapshot { epoch, value }
    }

    /// The number of times the value has been replaced.
    pub fn epoch(&self) -> u64 {
        self.0.epoch.load(Ordering::Relaxed)
    }
}

impl<T> Dynamic<T> {
    pub fn store(&self, value: T) {
        self.store_arc(Arc::new(value));
    }
}

impl<T: Debug + ?Sized> Debug for Dynamic<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let current_val = self.load();
        write!(f, "{current_val:?}")
    }
}

impl<T: ?Sized> Deref for Snapshot<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}
