// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use serde::Deserialize;
use serde::Serialize;

/// The default hop limit placed in outgoing datagrams.
pub const DEFAULT_HOP_LIMIT: u8 = 64;

/// The largest IPv6 datagram, header included, the node will build.
pub const IPV6_MTU: u16 = 256;

/// The length of the fixed IPv6 header.
pub const IPV6_HDR_LEN: usize = 40;

/// Stack-wide configuration of the IPv6 layer.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Ipv6Cfg {
    /// Does this node forward datagrams not addressed to it?
    pub is_router: bool,
    /// The hop limit of datagrams this node originates.
    pub hop_limit: u8,
    /// The largest datagram, header included, this node will send.
    pub mtu: u16,
}

impl Default for Ipv6Cfg {
    fn default() -> Self {
        Self {
            is_router: false,
            hop_limit: DEFAULT_HOP_LIMIT,
            mtu: IPV6_MTU,
        }
    }
}

impl Ipv6Cfg {
    /// The largest upper-layer payload that fits in one datagram.
    pub fn max_payload(&self) -> usize {
        usize::from(self.mtu).saturating_sub(IPV6_HDR_LEN)
    }
}
