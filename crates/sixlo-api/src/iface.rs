// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Types describing the addresses assigned to the node's interface.

use super::ip::Ipv6Addr;
use alloc::vec::Vec;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

/// The number of addresses the interface address table can hold.
pub const IFACE_ADDR_LIST_LEN: usize = 10;

/// The lifetime value which, when carried in a Router Advertisement
/// Prefix Information option, means "infinite".
pub const LIFETIME_INFINITE_WIRE: u32 = 0xFFFF_FFFF;

/// How an interface address came to be assigned.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd,
    Serialize,
)]
pub enum AddrType {
    /// Configured by hand.
    UnicastManual,
    /// Derived from a prefix and the node's EUI-64.
    UnicastAuto,
    Anycast,
    Other,
}

impl AddrType {
    /// Can an address of this type be used as the source of an
    /// outgoing datagram?
    pub fn is_source_eligible(&self) -> bool {
        matches!(self, Self::UnicastManual | Self::UnicastAuto)
    }
}

impl Display for AddrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::UnicastManual => "manual",
            Self::UnicastAuto => "auto",
            Self::Anycast => "anycast",
            Self::Other => "other",
        };
        write!(f, "{s}")
    }
}

/// The lifecycle state of an interface address.
///
/// ```text
///   Tentative ──DAD ok──> Preferred ──preferred expiry──> Deprecated
///       │                     │                               │
///       └──DAD fail──> Invalid <──────── valid expiry ─────────┘
/// ```
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd,
    Serialize,
)]
pub enum AddrState {
    Tentative,
    Preferred,
    Deprecated,
    Invalid,
}

impl AddrState {
    /// Is the address assigned, i.e., usable for delivery?
    pub fn is_assigned(&self) -> bool {
        matches!(self, Self::Preferred | Self::Deprecated)
    }
}

impl Display for AddrState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Tentative => "TENTATIVE",
            Self::Preferred => "PREFERRED",
            Self::Deprecated => "DEPRECATED",
            Self::Invalid => "INVALID",
        };
        write!(f, "{s}")
    }
}

/// An address lifetime in seconds.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd,
    Serialize,
)]
pub enum Lifetime {
    Finite(u32),
    Infinite,
}

impl Lifetime {
    /// Return the lifetime in milliseconds, or `None` when infinite.
    pub fn as_millis(&self) -> Option<u64> {
        match self {
            Self::Finite(secs) => Some(u64::from(*secs) * 1_000),
            Self::Infinite => None,
        }
    }
}

impl From<u32> for Lifetime {
    fn from(secs: u32) -> Self {
        if secs == LIFETIME_INFINITE_WIRE {
            Self::Infinite
        } else {
            Self::Finite(secs)
        }
    }
}

impl From<Lifetime> for u32 {
    fn from(lt: Lifetime) -> u32 {
        match lt {
            Lifetime::Finite(secs) => secs,
            Lifetime::Infinite => LIFETIME_INFINITE_WIRE,
        }
    }
}

impl Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finite(secs) => write!(f, "{secs}s"),
            Self::Infinite => write!(f, "forever"),
        }
    }
}

/// A snapshot of a single interface address entry.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct IfaceAddrDump {
    pub addr: Ipv6Addr,
    pub ty: AddrType,
    pub state: AddrState,
    pub valid: Lifetime,
    pub preferred: Lifetime,
    /// Milliseconds since the entry was created or last updated.
    pub age_ms: u64,
}

/// A snapshot of the whole interface address table.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct DumpAddrsResp {
    pub limit: u32,
    pub addrs: Vec<IfaceAddrDump>,
}
