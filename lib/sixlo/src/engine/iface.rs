// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The interface address table.
//!
//! Every address the node answers to is held here along with how it
//! was configured and where it is in its lifecycle. Lifetimes are
//! measured from the moment an entry was added (or last refreshed) and
//! are evaluated lazily on every read, so a lookup never reports an
//! address whose lifetime has run out even if [`AddrTable::expire()`]
//! hasn't swept it yet.

use super::Error;
use super::Result;
use crate::ddi::time::Moment;
use alloc::vec::Vec;
use heapless::Vec as BoundedVec;
use sixlo_api::AddrState;
use sixlo_api::AddrType;
use sixlo_api::DumpAddrsResp;
use sixlo_api::IFACE_ADDR_LIST_LEN;
use sixlo_api::IfaceAddrDump;
use sixlo_api::Ipv6Addr;
use sixlo_api::Lifetime;
use sixlo_api::Scope;

/// A single interface address.
#[derive(Clone, Copy, Debug)]
pub struct IfaceAddr {
    addr: Ipv6Addr,
    ty: AddrType,
    state: AddrState,
    valid: Lifetime,
    preferred: Lifetime,
    created: Moment,
}

impl IfaceAddr {
    pub fn addr(&self) -> Ipv6Addr {
        self.addr
    }

    pub fn ty(&self) -> AddrType {
        self.ty
    }

    /// The state as of the last sweep.
    pub fn state(&self) -> AddrState {
        self.state
    }

    pub fn valid(&self) -> Lifetime {
        self.valid
    }

    pub fn preferred(&self) -> Lifetime {
        self.preferred
    }

    fn lifetime_over(&self, lt: Lifetime, now: Moment) -> bool {
        match lt.as_millis() {
            Some(ms) => now.is_past(self.created, ms),
            None => false,
        }
    }

    /// The state this entry is in at `now`, taking lifetimes into
    /// account.
    pub fn state_at(&self, now: Moment) -> AddrState {
        match self.state {
            AddrState::Invalid => AddrState::Invalid,

            _ if self.lifetime_over(self.valid, now) => AddrState::Invalid,

            AddrState::Preferred if self.lifetime_over(self.preferred, now) => {
                AddrState::Deprecated
            }

            s => s,
        }
    }

    fn dump(&self, now: Moment) -> IfaceAddrDump {
        IfaceAddrDump {
            addr: self.addr,
            ty: self.ty,
            state: self.state_at(now),
            valid: self.valid,
            preferred: self.preferred,
            age_ms: now.delta_as_millis(self.created),
        }
    }
}

#[derive(Debug, Default)]
pub struct AddrTable {
    entries: BoundedVec<IfaceAddr, IFACE_ADDR_LIST_LEN>,
}

impl AddrTable {
    pub const NAME: &'static str = "interface address table";

    pub fn new() -> Self {
        Self::default()
    }

    /// Add `addr` to the table, or refresh it if it's already present.
    ///
    /// A preferred lifetime longer than the valid lifetime is cut down
    /// to the valid lifetime. Refreshing an existing entry replaces its
    /// type, state and lifetimes, and restarts its lifetimes at `now`.
    ///
    /// # Errors
    ///
    /// If the table is full and holds no invalid entry that can be
    /// evicted, [`Error::Capacity`] is returned and the table is left
    /// untouched.
    pub fn add_addr(
        &mut self,
        addr: Ipv6Addr,
        ty: AddrType,
        state: AddrState,
        valid: Lifetime,
        preferred: Lifetime,
        now: Moment,
    ) -> Result<()> {
        let entry = IfaceAddr {
            addr,
            ty,
            state,
            valid,
            preferred: preferred.min(valid),
            created: now,
        };

        if let Some(existing) = self.entries.iter_mut().find(|e| e.addr == addr)
        {
            *existing = entry;
            return Ok(());
        }

        if self.entries.is_full() {
            match self
                .entries
                .iter()
                .position(|e| e.state_at(now) == AddrState::Invalid)
            {
                Some(idx) => {
                    self.entries.remove(idx);
                }

                None => {
                    return Err(Error::Capacity {
                        table: Self::NAME,
                        limit: IFACE_ADDR_LIST_LEN,
                    });
                }
            }
        }

        self.entries.push(entry).map_err(|_| Error::Capacity {
            table: Self::NAME,
            limit: IFACE_ADDR_LIST_LEN,
        })
    }

    /// Select the source address to use when sending to `dst`.
    ///
    /// Only assigned (preferred or deprecated) unicast addresses of a
    /// matching scope are considered: a link-scoped destination gets a
    /// link-local source, anything else gets a non-link-local source.
    /// A preferred address beats a deprecated one; after that the
    /// address sharing the longest prefix with `dst` wins, and the
    /// earliest added breaks any remaining tie.
    ///
    /// Returns [`Ipv6Addr::ANY_ADDR`] if there is no suitable address.
    pub fn get_best_src_addr(&self, dst: Ipv6Addr, now: Moment) -> Ipv6Addr {
        let want_link_local = dst.scope() != Scope::Global;
        let mut best: Option<(bool, u8, Ipv6Addr)> = None;

        for e in &self.entries {
            if !e.ty.is_source_eligible()
                || e.addr.is_link_local() != want_link_local
            {
                continue;
            }

            let state = e.state_at(now);
            if !state.is_assigned() {
                continue;
            }

            let preferred = state == AddrState::Preferred;
            let plen = dst.common_prefix_len(&e.addr);
            let better = match best {
                Some((p, l, _)) => (preferred, plen) > (p, l),
                None => true,
            };

            if better {
                best = Some((preferred, plen, e.addr));
            }
        }

        best.map(|(_, _, a)| a).unwrap_or(Ipv6Addr::ANY_ADDR)
    }

    /// Sweep the table, moving entries whose lifetimes have run out to
    /// deprecated or invalid. Returns the number of entries changed.
    pub fn expire(&mut self, now: Moment) -> usize {
        let mut changed = 0;
        for e in self.entries.iter_mut() {
            let state = e.state_at(now);
            if state != e.state {
                e.state = state;
                changed += 1;
            }
        }
        changed
    }

    /// Record the outcome of Duplicate Address Detection for a
    /// tentative address. Returns `false` if `addr` isn't a tentative
    /// entry.
    pub fn dad_complete(&mut self, addr: Ipv6Addr, success: bool) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|e| e.addr == addr && e.state == AddrState::Tentative)
        {
            Some(e) => {
                e.state = if success {
                    AddrState::Preferred
                } else {
                    AddrState::Invalid
                };
                true
            }

            None => false,
        }
    }

    pub fn remove(&mut self, addr: Ipv6Addr) -> Option<IfaceAddr> {
        let idx = self.entries.iter().position(|e| e.addr == addr)?;
        Some(self.entries.remove(idx))
    }

    /// Is `addr` assigned to this interface, i.e., may datagrams sent
    /// to it be delivered locally? Tentative addresses are not.
    pub fn contains_assigned(&self, addr: Ipv6Addr, now: Moment) -> bool {
        self.entries
            .iter()
            .any(|e| e.addr == addr && e.state_at(now).is_assigned())
    }

    /// Is `addr` in use by this interface, including while it is still
    /// undergoing Duplicate Address Detection?
    pub fn is_tentative_or_assigned(
        &self,
        addr: Ipv6Addr,
        now: Moment,
    ) -> bool {
        self.entries
            .iter()
            .any(|e| e.addr == addr && e.state_at(now) != AddrState::Invalid)
    }

    /// Has the interface joined the solicited-node multicast group
    /// `group` by virtue of holding an address that maps to it?
    pub fn is_solicited_member(&self, group: Ipv6Addr, now: Moment) -> bool {
        group.is_solicited_node()
            && self.entries.iter().any(|e| {
                e.state_at(now) != AddrState::Invalid
                    && e.addr.solicited_node_multicast() == group
            })
    }

    pub fn get(&self, addr: Ipv6Addr) -> Option<&IfaceAddr> {
        self.entries.iter().find(|e| e.addr == addr)
    }

    pub fn iter(&self) -> impl Iterator<Item = &IfaceAddr> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn dump(&self, now: Moment) -> DumpAddrsResp {
        DumpAddrsResp {
            limit: IFACE_ADDR_LIST_LEN as u32,
            addrs: self.entries.iter().map(|e| e.dump(now)).collect::<Vec<_>>(),
        }
    }
}
