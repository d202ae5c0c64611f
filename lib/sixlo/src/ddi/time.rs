// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Moments.
use core::ops::Add;
use core::time::Duration;

cfg_if! {
    if #[cfg(any(feature = "std", test))] {
        use std::time::Instant;
    }
}

/// The number of milliseconds in a second.
pub const MILLIS: u64 = 1_000;
/// The number of milliseconds in a minute.
pub const MINUTE_MILLIS: u64 = 60 * MILLIS;

/// A moment in time, read off a monotonic clock.
///
/// In a `std` environment this wraps [`Instant`]. On a bare-metal node
/// the platform supplies the millisecond count of its own monotonic
/// timer via [`Moment::from_raw_millis()`].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Moment {
    #[cfg(all(not(feature = "std"), not(test)))]
    inner: u64,

    #[cfg(any(feature = "std", test))]
    inner: Instant,
}

impl Add<Duration> for Moment {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        cfg_if! {
            if #[cfg(all(not(feature = "std"), not(test)))] {
                let ms = u64::try_from(rhs.as_millis()).unwrap_or(u64::MAX);
                Moment { inner: self.inner.saturating_add(ms) }
            } else {
                Moment { inner: self.inner + rhs }
            }
        }
    }
}

impl Moment {
    /// Compute the delta between `self` and `earlier` and return it as
    /// milliseconds. A moment which is actually later than `self`
    /// yields zero.
    pub fn delta_as_millis(&self, earlier: Moment) -> u64 {
        cfg_if! {
            if #[cfg(all(not(feature = "std"), not(test)))] {
                self.inner.saturating_sub(earlier.inner)
            } else {
                let delta = self.inner.saturating_duration_since(earlier.inner);
                delta.as_secs() * MILLIS + u64::from(delta.subsec_millis())
            }
        }
    }

    /// Has `ttl_ms` elapsed between `start` and `self`?
    pub fn is_past(&self, start: Moment, ttl_ms: u64) -> bool {
        self.delta_as_millis(start) >= ttl_ms
    }

    #[cfg(any(feature = "std", test))]
    pub fn now() -> Self {
        Self { inner: Instant::now() }
    }

    #[cfg(all(not(feature = "std"), not(test)))]
    pub const fn from_raw_millis(ms: u64) -> Self {
        Self { inner: ms }
    }

    #[cfg(all(not(feature = "std"), not(test)))]
    pub const fn raw_millis(&self) -> u64 {
        self.inner
    }
}
