// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The IPv6 engine.
//!
//! All code under this namespace is guarded by the `engine` feature flag.
pub mod checksum;
pub mod handler;
pub mod iface;
pub mod ip6;
pub mod link;
pub mod lowpan;
pub mod route;
pub mod stack;

use link::LinkError;
use sixlo_api::Ipv6Addr;

/// Errors returned by the stack's table mutators and send path.
///
/// Per-datagram outcomes of receive processing are not errors; see
/// [`stack::ProcessResult`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    /// A bounded table or list is full. Nothing was changed.
    #[error("{table} is full ({limit} entries)")]
    Capacity { table: &'static str, limit: usize },

    #[error("no route to {0}")]
    NoRoute(Ipv6Addr),

    #[error("payload of {len} bytes exceeds maximum of {max}")]
    TooLarge { len: usize, max: usize },

    /// 6LoWPAN context ids are 4 bits wide.
    #[error("bad 6LoWPAN context id: {0}")]
    BadContext(u8),

    #[error("{0} is not a multicast group")]
    NotMulticast(Ipv6Addr),

    #[error("link layer refused frame: {0}")]
    Link(#[from] LinkError),
}

pub type Result<T> = core::result::Result<T, Error>;
