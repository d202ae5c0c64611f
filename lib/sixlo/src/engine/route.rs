// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Routing decisions and the pluggable next-hop lookup.
//!
//! The stack itself knows nothing about routing protocols. When a
//! router receives a datagram that isn't for it, it asks the installed
//! [`RoutingProvider`] for a next hop. A node running RPL installs a
//! provider backed by its DODAG; a simple mesh leaves the default
//! [`Neighborhood`] in place and lets the link layer reach the
//! destination directly.

use super::Error;
use super::Result;
use super::link::LinkError;
use crate::ddi::sync::KRwLock;
use core::fmt;
use heapless::Vec as BoundedVec;
use sixlo_api::Ipv6Addr;
use sixlo_api::Ipv6Cidr;

/// Resolve the next hop towards a destination.
///
/// Implementations are called on the receive path: they must not
/// block or perform I/O.
pub trait RoutingProvider: Send + Sync {
    fn next_hop(&self, dst: Ipv6Addr) -> Option<Ipv6Addr>;
}

/// The default provider: every destination is treated as a neighbor,
/// i.e. the destination is its own next hop.
#[derive(Clone, Copy, Debug, Default)]
pub struct Neighborhood;

impl RoutingProvider for Neighborhood {
    fn next_hop(&self, dst: Ipv6Addr) -> Option<Ipv6Addr> {
        Some(dst)
    }
}

/// A static route: destinations within `cidr` are sent via `via`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Route {
    pub cidr: Ipv6Cidr,
    pub via: Ipv6Addr,
}

/// A fixed-capacity table of static routes, resolved by longest
/// prefix match.
///
/// Routes may be added and removed while the table is installed as the
/// stack's provider.
pub struct StaticRoutes<const N: usize> {
    routes: KRwLock<BoundedVec<Route, N>>,
}

impl<const N: usize> StaticRoutes<N> {
    pub const NAME: &'static str = "static route table";

    pub fn new() -> Self {
        Self { routes: KRwLock::new(BoundedVec::new()) }
    }

    /// Add a route, replacing any route for the same CIDR. Returns the
    /// route replaced.
    pub fn add(&self, cidr: Ipv6Cidr, via: Ipv6Addr) -> Result<Option<Route>> {
        let mut routes = self.routes.write();
        let new = Route { cidr, via };

        if let Some(r) = routes.iter_mut().find(|r| r.cidr == cidr) {
            return Ok(Some(core::mem::replace(r, new)));
        }

        routes
            .push(new)
            .map_err(|_| Error::Capacity { table: Self::NAME, limit: N })?;
        Ok(None)
    }

    pub fn remove(&self, cidr: Ipv6Cidr) -> Option<Route> {
        let mut routes = self.routes.write();
        let idx = routes.iter().position(|r| r.cidr == cidr)?;
        Some(routes.remove(idx))
    }

    pub fn len(&self) -> usize {
        self.routes.read().len()
    }
}

impl<const N: usize> Default for StaticRoutes<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RoutingProvider for StaticRoutes<N> {
    fn next_hop(&self, dst: Ipv6Addr) -> Option<Ipv6Addr> {
        self.routes
            .read()
            .iter()
            .filter(|r| r.cidr.is_member(dst))
            .max_by_key(|r| r.cidr.prefix_len())
            .map(|r| r.via)
    }
}

/// Why a received datagram was not delivered or forwarded.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DropReason {
    /// Not a well-formed IPv6 datagram.
    Malformed,
    /// Not for us, and we can't (or won't) forward it.
    NoRoute,
    /// Sent to a link-scoped multicast group we haven't joined.
    NotMember,
    /// Forwarding would exhaust the hop limit.
    HopLimit,
    /// The link layer refused the forwarded frame.
    Link(LinkError),
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed"),
            Self::NoRoute => write!(f, "no route"),
            Self::NotMember => write!(f, "not a member"),
            Self::HopLimit => write!(f, "hop limit exceeded"),
            Self::Link(e) => write!(f, "link: {e}"),
        }
    }
}

/// What to do with a received datagram.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RouteDecision {
    DeliverLocal,
    Forward(Ipv6Addr),
    Drop(DropReason),
}
