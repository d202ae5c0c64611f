// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The IPv6 stack: receive dispatch and the send path.
//!
//! An [`Ipv6Stack`] ties together the node's address table, handler
//! registry, routing provider and 6LoWPAN context table. The link
//! layer feeds it every reassembled, decompressed datagram via
//! [`Ipv6Stack::process_inbound()`]; upper layers send with
//! [`Ipv6Stack::sendto()`]; the platform's timer calls
//! [`Ipv6Stack::tick()`] to age addresses and contexts.
//!
//! No lock is held while a datagram is handed to a handler or to the
//! link layer.

use super::Error;
use super::Result;
use super::handler::Datagram;
use super::handler::DeliveryReport;
use super::handler::HandlerHandle;
use super::handler::HandlerRegistry;
use super::iface::AddrTable;
use super::ip6::Ipv6Meta;
use super::ip6::is_rpl_control;
use super::link::Eui64Source;
use super::link::LinkLayer;
use super::link::LinkTarget;
use super::lowpan::LowpanContext;
use super::lowpan::LowpanContextTable;
use super::route::DropReason;
use super::route::Neighborhood;
use super::route::RouteDecision;
use super::route::RoutingProvider;
use crate::api::DumpHandlersResp;
use crate::ddi::sync::KMutex;
use crate::ddi::sync::KRwLock;
use crate::ddi::time::Moment;
use crate::dynamic::Dynamic;
use crate::provider::LogLevel;
use crate::provider::Providers;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::AtomicBool;
use core::sync::atomic::Ordering;
use heapless::Vec as BoundedVec;
use sixlo_api::AddrState;
use sixlo_api::AddrType;
use sixlo_api::DumpAddrsResp;
use sixlo_api::DumpContextsResp;
use sixlo_api::IPV6_HDR_LEN;
use sixlo_api::Ipv6Addr;
use sixlo_api::Ipv6Cfg;
use sixlo_api::Lifetime;
use sixlo_api::Protocol;
use sixlo_api::Scope;

pub use super::ip6::ipv6_csum;

/// The number of multicast groups that may be joined explicitly, on
/// top of the all-nodes, all-routers and solicited-node groups the
/// stack joins on its own.
pub const MAX_JOINED_GROUPS: usize = 4;

/// The offset of the hop limit within the fixed header.
const HOP_LIMIT_OFFSET: usize = 7;

/// The outcome of processing one received datagram.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProcessResult {
    /// Delivered locally; the report says to whom.
    Delivered(DeliveryReport),
    /// Passed back to the link layer towards this next hop.
    Forwarded(Ipv6Addr),
    Drop { reason: DropReason },
}

impl ProcessResult {
    fn dropped(reason: DropReason) -> Self {
        Self::Drop { reason }
    }
}

/// Collects what an [`Ipv6Stack`] needs from its surroundings.
pub struct Ipv6StackBuilder {
    cfg: Ipv6Cfg,
    providers: Providers,
    link: Arc<dyn LinkLayer>,
    eui64: Arc<dyn Eui64Source>,
    routing: Option<Arc<dyn RoutingProvider>>,
}

impl Ipv6StackBuilder {
    pub fn new(
        cfg: Ipv6Cfg,
        providers: Providers,
        link: Arc<dyn LinkLayer>,
        eui64: Arc<dyn Eui64Source>,
    ) -> Self {
        Self { cfg, providers, link, eui64, routing: None }
    }

    /// Install a routing provider in place of [`Neighborhood`].
    pub fn routing_provider(
        mut self,
        provider: Arc<dyn RoutingProvider>,
    ) -> Self {
        self.routing = Some(provider);
        self
    }

    pub fn create(self) -> Ipv6Stack {
        let routing = self.routing.unwrap_or_else(|| Arc::new(Neighborhood));

        Ipv6Stack {
            is_router: AtomicBool::new(self.cfg.is_router),
            cfg: self.cfg,
            providers: self.providers,
            link: self.link,
            eui64: self.eui64,
            addrs: KMutex::new(AddrTable::new()),
            handlers: KRwLock::new(HandlerRegistry::new()),
            routing: Dynamic::from_arc(routing),
            contexts: KMutex::new(LowpanContextTable::new()),
            groups: KMutex::new(BoundedVec::new()),
        }
    }
}

pub struct Ipv6Stack {
    cfg: Ipv6Cfg,
    is_router: AtomicBool,
    providers: Providers,
    link: Arc<dyn LinkLayer>,
    eui64: Arc<dyn Eui64Source>,
    addrs: KMutex<AddrTable>,
    handlers: KRwLock<HandlerRegistry>,
    routing: Dynamic<dyn RoutingProvider>,
    contexts: KMutex<LowpanContextTable>,
    groups: KMutex<BoundedVec<Ipv6Addr, MAX_JOINED_GROUPS>>,
}

impl Ipv6Stack {
    pub const GROUPS: &'static str = "joined multicast group list";

    fn log(&self, level: LogLevel, msg: &str) {
        self.providers.log.log(level, msg);
    }

    pub fn cfg(&self) -> Ipv6Cfg {
        Ipv6Cfg { is_router: self.is_router(), ..self.cfg }
    }

    pub fn is_router(&self) -> bool {
        self.is_router.load(Ordering::Relaxed)
    }

    pub fn set_router(&self, is_router: bool) {
        self.is_router.store(is_router, Ordering::Relaxed);
    }

    // ================================================================
    // Routing
    // ================================================================

    /// Replace the routing provider. Datagrams already being routed
    /// finish with the provider they started with.
    pub fn set_routing_provider(&self, provider: Arc<dyn RoutingProvider>) {
        self.routing.store_arc(provider);
    }

    /// Go back to treating every destination as a neighbor.
    pub fn reset_routing_provider(&self) {
        self.routing.store_arc(Arc::new(Neighborhood));
    }

    /// The number of times the routing provider has been replaced.
    pub fn routing_epoch(&self) -> u64 {
        self.routing.epoch()
    }

    // ================================================================
    // Addresses
    // ================================================================

    /// Add or refresh an interface address. See [`AddrTable::add_addr()`].
    pub fn add_addr(
        &self,
        addr: Ipv6Addr,
        ty: AddrType,
        state: AddrState,
        valid: Lifetime,
        preferred: Lifetime,
        now: Moment,
    ) -> Result<()> {
        let res =
            self.addrs.lock().add_addr(addr, ty, state, valid, preferred, now);

        if let Err(e) = &res {
            self.log(LogLevel::Warn, &format!("add_addr {addr}: {e}"));
        }
        res
    }

    pub fn remove_addr(&self, addr: Ipv6Addr) -> bool {
        self.addrs.lock().remove(addr).is_some()
    }

    /// Choose the source address for a datagram to `dst`. The
    /// unspecified address means there is no suitable source.
    pub fn get_best_src_addr(&self, dst: Ipv6Addr, now: Moment) -> Ipv6Addr {
        self.addrs.lock().get_best_src_addr(dst, now)
    }

    /// Record the outcome of duplicate address detection on a
    /// tentative address. Returns false if `addr` was not tentative.
    pub fn dad_complete(&self, addr: Ipv6Addr, success: bool) -> bool {
        let changed = self.addrs.lock().dad_complete(addr, success);

        if changed && !success {
            self.log(
                LogLevel::Warn,
                &format!("duplicate address detected: {addr}"),
            );
        }
        changed
    }

    /// Is `addr` in use by this node, or about to be? Neighbor
    /// discovery answers solicitations for these.
    pub fn is_tentative_or_assigned(
        &self,
        addr: Ipv6Addr,
        now: Moment,
    ) -> bool {
        self.addrs.lock().is_tentative_or_assigned(addr, now)
    }

    /// Form an address from the first 64 bits of `prefix` and this
    /// node's EUI-64.
    pub fn addr_by_eui64(&self, prefix: Ipv6Addr) -> Ipv6Addr {
        Ipv6Addr::with_eui64(prefix, &self.eui64.eui64())
    }

    pub fn dump_addrs(&self, now: Moment) -> DumpAddrsResp {
        self.addrs.lock().dump(now)
    }

    #[cfg(feature = "std")]
    pub fn print_addrs(&self, now: Moment) -> std::io::Result<()> {
        crate::print::print_addrs(&self.dump_addrs(now))
    }

    // ================================================================
    // Multicast membership
    // ================================================================

    /// Join `group`. Joining a group twice is a no-op.
    ///
    /// # Errors
    ///
    /// [`Error::NotMulticast`] if `group` isn't a multicast address, or
    /// [`Error::Capacity`] if [`MAX_JOINED_GROUPS`] are already joined.
    pub fn join_group(&self, group: Ipv6Addr) -> Result<()> {
        if !group.is_multicast() {
            return Err(Error::NotMulticast(group));
        }

        let mut groups = self.groups.lock();
        if groups.contains(&group) {
            return Ok(());
        }

        groups.push(group).map_err(|_| Error::Capacity {
            table: Self::GROUPS,
            limit: MAX_JOINED_GROUPS,
        })
    }

    pub fn leave_group(&self, group: Ipv6Addr) -> bool {
        let mut groups = self.groups.lock();
        match groups.iter().position(|g| *g == group) {
            Some(idx) => {
                groups.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Does this node listen to `group`?
    pub fn is_member(&self, group: Ipv6Addr, now: Moment) -> bool {
        group == Ipv6Addr::ALL_NODES
            || (group == Ipv6Addr::ALL_ROUTERS && self.is_router())
            || self.groups.lock().contains(&group)
            || self.addrs.lock().is_solicited_member(group, now)
    }

    // ================================================================
    // Handlers
    // ================================================================

    pub fn register_packet_handler(&self, handle: HandlerHandle) -> Result<()> {
        let res = self.handlers.write().register_packet_handler(handle);

        if let Err(e) = &res {
            self.log(LogLevel::Warn, &format!("register_packet_handler: {e}"));
        }
        res
    }

    pub fn register_next_header_handler(
        &self,
        next_header: u8,
        handle: HandlerHandle,
    ) -> Option<HandlerHandle> {
        self.handlers.write().register_next_header_handler(next_header, handle)
    }

    pub fn unregister_next_header_handler(
        &self,
        next_header: u8,
    ) -> Option<HandlerHandle> {
        self.handlers.write().unregister_next_header_handler(next_header)
    }

    pub fn register_rpl_handler(
        &self,
        handle: HandlerHandle,
    ) -> Option<HandlerHandle> {
        self.handlers.write().register_rpl_handler(handle)
    }

    pub fn dump_handlers(&self) -> DumpHandlersResp {
        self.handlers.read().dump()
    }

    // ================================================================
    // 6LoWPAN contexts
    // ================================================================

    pub fn update_context(
        &self,
        num: u8,
        prefix: Ipv6Addr,
        length: u8,
        comp: bool,
        lifetime: u16,
        now: Moment,
    ) -> Result<Option<LowpanContext>> {
        self.contexts.lock().update(num, prefix, length, comp, lifetime, now)
    }

    pub fn context(&self, num: u8) -> Option<LowpanContext> {
        self.contexts.lock().get(num)
    }

    /// The context to compress `addr` with, if any.
    pub fn context_lookup(&self, addr: Ipv6Addr) -> Option<LowpanContext> {
        self.contexts.lock().lookup(addr)
    }

    pub fn dump_contexts(&self, now: Moment) -> DumpContextsResp {
        self.contexts.lock().contexts(now)
    }

    // ================================================================
    // Timer
    // ================================================================

    /// Age addresses and contexts. Addresses whose valid lifetime has
    /// run out become invalid; they stay in the table until an
    /// insertion needs their slot or they are removed explicitly.
    pub fn tick(&self, now: Moment) {
        let changed = self.addrs.lock().expire(now);
        if changed > 0 {
            self.log(
                LogLevel::Note,
                &format!("addresses: {changed} changed state"),
            );
        }

        let expired = self.contexts.lock().expire(now);
        if expired > 0 {
            self.log(
                LogLevel::Note,
                &format!("6LoWPAN contexts: {expired} expired"),
            );
        }
    }

    // ================================================================
    // Receive
    // ================================================================

    /// Decide what to do with a datagram for `dst` with `hop_limit`.
    pub fn route_decision(
        &self,
        dst: Ipv6Addr,
        hop_limit: u8,
        now: Moment,
    ) -> RouteDecision {
        if dst.is_loopback() || self.addrs.lock().contains_assigned(dst, now) {
            return RouteDecision::DeliverLocal;
        }

        if dst.is_multicast() {
            if self.is_member(dst, now) {
                return RouteDecision::DeliverLocal;
            }

            // Multicast is not forwarded.
            let reason = match dst.scope() {
                Scope::Global => DropReason::NoRoute,
                _ => DropReason::NotMember,
            };
            return RouteDecision::Drop(reason);
        }

        // The unspecified address is never a destination, and
        // link-local destinations never leave the link (RFC 4291 2.5).
        if !self.is_router() || dst.is_unspecified() || dst.is_link_local() {
            return RouteDecision::Drop(DropReason::NoRoute);
        }

        let Some(hop) = self.routing.load().next_hop(dst) else {
            return RouteDecision::Drop(DropReason::NoRoute);
        };

        if hop_limit <= 1 {
            return RouteDecision::Drop(DropReason::HopLimit);
        }

        RouteDecision::Forward(hop)
    }

    /// Process a datagram received from the link layer.
    ///
    /// `bytes` must start with the fixed IPv6 header; anything past the
    /// length it declares is ignored.
    pub fn process_inbound(&self, bytes: &[u8], now: Moment) -> ProcessResult {
        let (meta, payload) = match Ipv6Meta::parse(bytes) {
            Ok(v) => v,
            Err(e) => {
                self.log(LogLevel::Note, &format!("drop: {e}"));
                return ProcessResult::dropped(DropReason::Malformed);
            }
        };
        let frame = &bytes[..meta.total_len()];

        match self.route_decision(meta.dst, meta.hop_limit, now) {
            RouteDecision::DeliverLocal => {
                let rpl = is_rpl_control(meta.proto, payload);
                let delivery =
                    self.handlers.read().delivery(meta.proto.into(), rpl);
                let report = delivery.run(&Datagram::new(meta, frame));

                for fault in &report.faults {
                    self.log(
                        LogLevel::Note,
                        &format!("{} -> {}: {fault}", meta.src, meta.dst),
                    );
                }
                ProcessResult::Delivered(report)
            }

            RouteDecision::Forward(hop) => {
                let mut out: Vec<u8> = frame.to_vec();
                out[HOP_LIMIT_OFFSET] = meta.hop_limit - 1;

                match self.link.transmit(LinkTarget::Unicast(hop), &out) {
                    Ok(()) => ProcessResult::Forwarded(hop),
                    Err(e) => {
                        self.log(
                            LogLevel::Note,
                            &format!(
                                "drop: forward {} via {hop}: {e}",
                                meta.dst
                            ),
                        );
                        ProcessResult::dropped(DropReason::Link(e))
                    }
                }
            }

            RouteDecision::Drop(reason) => {
                self.log(
                    LogLevel::Note,
                    &format!("drop: {} -> {}: {reason}", meta.src, meta.dst),
                );
                ProcessResult::dropped(reason)
            }
        }
    }

    // ================================================================
    // Send
    // ================================================================

    /// Build a datagram carrying `payload` to `dst` and hand it to the
    /// link layer. Returns the length of the datagram sent.
    ///
    /// The source is the best source address for `dst`. A UDP or
    /// ICMPv6 payload has its checksum field filled in. Multicast goes
    /// to the link-layer broadcast address; unicast goes to the next
    /// hop named by the routing provider.
    pub fn sendto(
        &self,
        dst: Ipv6Addr,
        next_header: u8,
        payload: &[u8],
        now: Moment,
    ) -> Result<usize> {
        let max = self.cfg.max_payload();
        if payload.len() > max {
            return Err(Error::TooLarge { len: payload.len(), max });
        }

        let target = if dst.is_multicast() {
            LinkTarget::Broadcast
        } else {
            match self.routing.load().next_hop(dst) {
                Some(hop) => LinkTarget::Unicast(hop),
                None => return Err(Error::NoRoute(dst)),
            }
        };

        let meta = Ipv6Meta {
            src: self.get_best_src_addr(dst, now),
            dst,
            proto: Protocol::from(next_header),
            hop_limit: self.cfg.hop_limit,
            // Bounded by the MTU check above.
            pay_len: payload.len() as u16,
        };

        let mut frame = vec![0u8; meta.total_len()];
        meta.emit(&mut frame);
        let body = &mut frame[IPV6_HDR_LEN..];
        body.copy_from_slice(payload);
        fill_ulp_csum(&meta, body);

        if let Err(e) = self.link.transmit(target, &frame) {
            self.log(
                LogLevel::Note,
                &format!("sendto {dst} via {target}: {e}"),
            );
            return Err(e.into());
        }

        Ok(frame.len())
    }
}

/// Write the upper-layer checksum of `body` into its checksum field, if
/// the protocol is one we know the layout of.
fn fill_ulp_csum(meta: &Ipv6Meta, body: &mut [u8]) {
    let off = match meta.proto {
        Protocol::UDP => 6,
        Protocol::ICMPv6 => 2,
        _ => return,
    };

    if body.len() < off + 2 {
        return;
    }

    body[off..off + 2].copy_from_slice(&[0, 0]);
    let mut csum = ipv6_csum(meta, body, body.len(), meta.proto.into());
    // A computed UDP checksum of zero goes on the wire as all ones
    // (RFC 8200 §8.1).
    if csum == 0 && meta.proto == Protocol::UDP {
        csum = 0xffff;
    }
    body[off..off + 2].copy_from_slice(&csum.to_be_bytes());
}

impl core::fmt::Debug for Ipv6Stack {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Ipv6Stack")
            .field("cfg", &self.cfg())
            .field("addrs", &self.addrs.lock().len())
            .field("handlers", &self.handlers.read().handler_count())
            .field("contexts", &self.contexts.lock().len())
            .finish_non_exhaustive()
    }
}
