// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The boundary between the IPv6 layer and the radio below it.
//!
//! The stack never touches a transceiver. It hands finished datagrams
//! to a [`LinkLayer`], which is expected to compress, fragment and
//! transmit them, and it asks an [`Eui64Source`] for the hardware
//! address used to form interface identifiers.

use core::fmt;
use core::fmt::Display;
use sixlo_api::Eui64;
use sixlo_api::Ipv6Addr;

/// The link-layer destination of an outgoing datagram.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LinkTarget {
    /// Send to the neighbor owning this IPv6 address; the link layer
    /// resolves it to a hardware address.
    Unicast(Ipv6Addr),
    /// Send to every neighbor in radio range.
    Broadcast,
}

impl Display for LinkTarget {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Unicast(hop) => write!(f, "{hop}"),
            Self::Broadcast => write!(f, "broadcast"),
        }
    }
}

/// Why the link layer refused a frame.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum LinkError {
    #[error("transmit queue busy")]
    Busy,

    #[error("no link-layer address for neighbor")]
    NoNeighbor,

    #[error("frame too large for link")]
    TooLarge,

    #[error("link is down")]
    Down,
}

pub trait LinkLayer: Send + Sync {
    /// Queue `frame`, a complete IPv6 datagram, for transmission.
    ///
    /// Must not block.
    fn transmit(
        &self,
        target: LinkTarget,
        frame: &[u8],
    ) -> Result<(), LinkError>;
}

pub trait Eui64Source: Send + Sync {
    fn eui64(&self) -> Eui64;
}

impl Eui64Source for Eui64 {
    fn eui64(&self) -> Eui64 {
        *self
    }
}
