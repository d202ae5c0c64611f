// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The IPv6 layer of a 6LoWPAN node.
//!
//! The [`engine`] owns the interface address table, the protocol
//! handler registry, the routing hook and the 6LoWPAN context table,
//! and ties them together in [`engine::stack::Ipv6Stack`], which
//! dispatches received datagrams and builds outgoing ones.

#![cfg_attr(not(feature = "std"), no_std)]
#![allow(clippy::len_without_is_empty)]
#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

#[cfg_attr(feature = "engine", macro_use)]
extern crate alloc;

#[cfg(any(feature = "engine", test))]
#[macro_use]
extern crate cfg_if;

#[cfg(any(feature = "api", test))]
pub mod api;
#[cfg(any(feature = "engine", test))]
pub mod ddi;
#[cfg(any(feature = "engine", test))]
pub mod dynamic;
#[cfg(any(feature = "engine", test))]
pub mod engine;
#[cfg(all(any(feature = "std", test), any(feature = "engine", test)))]
pub mod print;
#[cfg(any(feature = "engine", test))]
pub mod provider;
