// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Common routines for integration tests.

// This type of pedantry is more trouble than it's worth here.
#![allow(dead_code)]

use smoltcp::wire::IpAddress;
use smoltcp::wire::IpProtocol;
use smoltcp::wire::Ipv6Packet;
use smoltcp::wire::Ipv6Repr;
use smoltcp::wire::UdpPacket;
use std::sync::Arc;

// Let's make our lives easier and pub use a bunch of stuff.
pub use sixlo::api::*;
pub use sixlo::ddi::sync::KMutex;
pub use sixlo::ddi::time::Moment;
pub use sixlo::engine::Error;
pub use sixlo::engine::handler::BoundedMailbox;
pub use sixlo::engine::handler::Datagram;
pub use sixlo::engine::handler::DeliveryFault;
pub use sixlo::engine::handler::DeliveryReport;
pub use sixlo::engine::handler::HandlerHandle;
pub use sixlo::engine::handler::Mailbox;
pub use sixlo::engine::handler::SIXLOWIP_MAX_REGISTERED;
pub use sixlo::engine::handler::SendError;
pub use sixlo::engine::ip6::ICMPV6_RPL_CONTROL;
pub use sixlo::engine::ip6::Ipv6Meta;
pub use sixlo::engine::link::LinkError;
pub use sixlo::engine::link::LinkLayer;
pub use sixlo::engine::link::LinkTarget;
pub use sixlo::engine::route::DropReason;
pub use sixlo::engine::route::Neighborhood;
pub use sixlo::engine::route::RouteDecision;
pub use sixlo::engine::route::RoutingProvider;
pub use sixlo::engine::route::StaticRoutes;
pub use sixlo::engine::stack::Ipv6Stack;
pub use sixlo::engine::stack::Ipv6StackBuilder;
pub use sixlo::engine::stack::MAX_JOINED_GROUPS;
pub use sixlo::engine::stack::ProcessResult;
pub use sixlo::engine::stack::ipv6_csum;
pub use sixlo::provider::PrintlnLog;
pub use sixlo::provider::Providers;

/// The hardware address of the node under test. Its link-local
/// address is [`node_link_local()`].
pub const NODE_EUI64: Eui64 =
    Eui64::from_const([0x02, 0x12, 0x4b, 0x00, 0x06, 0x0d, 0x9f, 0x3a]);

pub fn node_link_local() -> Ipv6Addr {
    ip("fe80::12:4b00:60d:9f3a")
}

pub fn ip(s: &str) -> Ipv6Addr {
    s.parse().unwrap()
}

/// A link layer which records every frame handed to it.
pub struct RecordingLink {
    frames: KMutex<Vec<(LinkTarget, Vec<u8>)>>,
    refuse: KMutex<Option<LinkError>>,
}

impl RecordingLink {
    pub fn new() -> Self {
        Self { frames: KMutex::new(Vec::new()), refuse: KMutex::new(None) }
    }

    /// Refuse every subsequent frame with `err`, or accept them again
    /// when `None`.
    pub fn refuse(&self, err: Option<LinkError>) {
        *self.refuse.lock() = err;
    }

    /// Remove and return every frame recorded so far.
    pub fn take(&self) -> Vec<(LinkTarget, Vec<u8>)> {
        std::mem::take(&mut *self.frames.lock())
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }
}

impl LinkLayer for RecordingLink {
    fn transmit(
        &self,
        target: LinkTarget,
        frame: &[u8],
    ) -> Result<(), LinkError> {
        if let Some(err) = *self.refuse.lock() {
            return Err(err);
        }
        self.frames.lock().push((target, frame.to_vec()));
        Ok(())
    }
}

/// A stack under test along with the link it sends on.
pub struct TestNode {
    pub stack: Ipv6Stack,
    pub link: Arc<RecordingLink>,
}

impl TestNode {
    pub fn new(cfg: Ipv6Cfg) -> Self {
        let link = Arc::new(RecordingLink::new());
        let providers = Providers { log: Box::new(PrintlnLog) };
        let stack = Ipv6StackBuilder::new(
            cfg,
            providers,
            link.clone(),
            Arc::new(NODE_EUI64),
        )
        .create();

        Self { stack, link }
    }

    pub fn host() -> Self {
        Self::new(Ipv6Cfg::default())
    }

    pub fn router() -> Self {
        Self::new(Ipv6Cfg { is_router: true, ..Default::default() })
    }

    /// Assign `addr` as a preferred address that never expires.
    pub fn assign(&self, addr: Ipv6Addr, now: Moment) {
        self.stack
            .add_addr(
                addr,
                AddrType::UnicastManual,
                AddrState::Preferred,
                Lifetime::Infinite,
                Lifetime::Infinite,
                now,
            )
            .unwrap();
    }
}

/// A handler's mailbox, along with the handle registering it.
pub fn mailbox<const N: usize>() -> (Arc<BoundedMailbox<N>>, HandlerHandle) {
    let mb = Arc::new(BoundedMailbox::new());
    let handle = HandlerHandle::new(&mb);
    (mb, handle)
}

/// Build an IPv6 datagram carrying `payload`.
pub fn ipv6_datagram(
    src: Ipv6Addr,
    dst: Ipv6Addr,
    next_header: u8,
    hop_limit: u8,
    payload: &[u8],
) -> Vec<u8> {
    let repr = Ipv6Repr {
        src_addr: src.into(),
        dst_addr: dst.into(),
        next_header: IpProtocol::from(next_header),
        payload_len: payload.len(),
        hop_limit,
    };

    let mut buf = vec![0u8; IPV6_HDR_LEN + payload.len()];
    let mut pkt = Ipv6Packet::new_unchecked(&mut buf);
    repr.emit(&mut pkt);
    pkt.payload_mut().copy_from_slice(payload);
    buf
}

/// Build a UDP segment from `src` to `dst` with a correct checksum.
pub fn udp_segment(
    src: Ipv6Addr,
    dst: Ipv6Addr,
    src_port: u16,
    dst_port: u16,
    body: &[u8],
) -> Vec<u8> {
    let mut buf = vec![0u8; 8 + body.len()];
    let mut udp = UdpPacket::new_unchecked(&mut buf);
    udp.set_src_port(src_port);
    udp.set_dst_port(dst_port);
    udp.set_len((8 + body.len()) as u16);
    udp.payload_mut().copy_from_slice(body);
    udp.fill_checksum(
        &IpAddress::Ipv6(src.into()),
        &IpAddress::Ipv6(dst.into()),
    );
    buf
}

/// Does the UDP segment carry a correct checksum for `src` and `dst`?
pub fn udp_checksum_ok(src: Ipv6Addr, dst: Ipv6Addr, segment: &[u8]) -> bool {
    UdpPacket::new_unchecked(segment)
        .verify_checksum(
            &IpAddress::Ipv6(src.into()),
            &IpAddress::Ipv6(dst.into()),
        )
}

/// Build a UDP datagram.
pub fn udp_datagram(
    src: Ipv6Addr,
    dst: Ipv6Addr,
    dst_port: u16,
    body: &[u8],
) -> Vec<u8> {
    let seg = udp_segment(src, dst, 49152, dst_port, body);
    ipv6_datagram(src, dst, PROTO_UDP, 64, &seg)
}

/// Build an RPL DODAG Information Solicitation (RFC 6550 §6.2), the
/// smallest RPL control message.
pub fn rpl_dis(src: Ipv6Addr, dst: Ipv6Addr) -> Vec<u8> {
    let mut msg = [ICMPV6_RPL_CONTROL, 0x00, 0, 0, 0, 0];
    let meta = Ipv6Meta {
        src,
        dst,
        proto: Protocol::ICMPv6,
        pay_len: msg.len() as u16,
        ..Default::default()
    };
    let csum = ipv6_csum(&meta, &msg, msg.len(), PROTO_ICMPV6);
    msg[2..4].copy_from_slice(&csum.to_be_bytes());
    ipv6_datagram(src, dst, PROTO_ICMPV6, 255, &msg)
}
