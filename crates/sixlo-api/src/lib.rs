// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

#![no_std]
#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

#[cfg(any(feature = "std", test))]
#[macro_use]
extern crate std;

#[macro_use]
extern crate alloc;

pub mod cfg;
pub mod eui64;
pub mod iface;
pub mod ip;
pub mod lowpan;

pub use cfg::*;
pub use eui64::*;
pub use iface::*;
pub use ip::*;
pub use lowpan::*;

/// The overall version of the API. Anytime a type in this crate is
/// added, removed, or modified, this number should increment. We
/// attach no semantic meaning to the number other than as a means to
/// verify that a platform port and the stack agree on the layout of
/// the dump types.
pub const API_VERSION: u64 = 3;
