// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Receive-path tests: local delivery, handler faults, forwarding and
//! drops.

use sixlo_test_utils as common;

use common::*;
use std::sync::Arc;
use std::time::Duration;

fn delivered(res: ProcessResult) -> DeliveryReport {
    match res {
        ProcessResult::Delivered(report) => report,
        res => panic!("expected local delivery: {res:?}"),
    }
}

#[test]
fn udp_to_preferred_address() {
    let now = Moment::now();
    let node = TestNode::host();
    let me = ip("fd00::1");
    node.assign(me, now);

    let (obs, obs_h) = mailbox::<4>();
    let (udp, udp_h) = mailbox::<4>();
    node.stack.register_packet_handler(obs_h).unwrap();
    assert!(
        node.stack.register_next_header_handler(PROTO_UDP, udp_h).is_none()
    );

    let pkt = udp_datagram(ip("fd00::2"), me, 5683, b"hello");
    let report = delivered(node.stack.process_inbound(&pkt, now));
    assert_eq!(report.delivered, 2);
    assert!(report.faults.is_empty());

    let dgram = udp.recv().unwrap();
    assert_eq!(dgram.meta.src, ip("fd00::2"));
    assert_eq!(dgram.meta.proto, Protocol::UDP);
    assert_eq!(&dgram.payload()[8..], b"hello");
    assert_eq!(obs.recv().unwrap(), dgram);
    assert!(udp.is_empty());
}

#[test]
fn deprecated_delivers_expired_does_not() {
    let now = Moment::now();
    let node = TestNode::host();
    let me = ip("fd00::1");
    node.stack
        .add_addr(
            me,
            AddrType::UnicastAuto,
            AddrState::Preferred,
            Lifetime::Finite(20),
            Lifetime::Finite(10),
            now,
        )
        .unwrap();
    let pkt = ipv6_datagram(ip("fd00::2"), me, PROTO_NONE, 64, &[]);

    // Preferred lifetime over, valid lifetime not.
    let later = now + Duration::from_secs(15);
    assert_eq!(
        node.stack.route_decision(me, 64, later),
        RouteDecision::DeliverLocal
    );
    let report = delivered(node.stack.process_inbound(&pkt, later));
    assert!(report.faults.is_empty());

    // No sweep has run, but the entry is still not used.
    let later = now + Duration::from_secs(21);
    assert_eq!(
        node.stack.process_inbound(&pkt, later),
        ProcessResult::Drop { reason: DropReason::NoRoute }
    );
}

#[test]
fn observer_capacity() {
    let node = TestNode::host();
    let mut keep = Vec::new();

    for _ in 0..SIXLOWIP_MAX_REGISTERED {
        let (mb, h) = mailbox::<1>();
        node.stack.register_packet_handler(h.clone()).unwrap();
        // Registering the same handle again changes nothing.
        node.stack.register_packet_handler(h).unwrap();
        keep.push(mb);
    }

    let (_extra, h) = mailbox::<1>();
    assert!(matches!(
        node.stack.register_packet_handler(h),
        Err(Error::Capacity { limit: SIXLOWIP_MAX_REGISTERED, .. })
    ));
    assert_eq!(
        node.stack.dump_handlers().handlers.len(),
        SIXLOWIP_MAX_REGISTERED
    );
}

#[test]
fn next_header_binding_last_wins() {
    let now = Moment::now();
    let node = TestNode::host();
    node.assign(ip("fd00::1"), now);

    let (first, first_h) = mailbox::<2>();
    let (second, second_h) = mailbox::<2>();
    node.stack.register_next_header_handler(PROTO_UDP, first_h.clone());
    let old = node.stack.register_next_header_handler(PROTO_UDP, second_h);
    assert_eq!(old, Some(first_h));

    let pkt = udp_datagram(ip("fd00::2"), ip("fd00::1"), 9, &[]);
    delivered(node.stack.process_inbound(&pkt, now));
    assert!(first.is_empty());
    assert_eq!(second.len(), 1);

    node.stack.unregister_next_header_handler(PROTO_UDP);
    let report = delivered(node.stack.process_inbound(&pkt, now));
    assert_eq!(
        &report.faults[..],
        &[DeliveryFault::UnsupportedProtocol(PROTO_UDP)]
    );
}

#[test]
fn no_next_header_is_not_a_fault() {
    let now = Moment::now();
    let node = TestNode::host();
    node.assign(ip("fd00::1"), now);

    let pkt = ipv6_datagram(ip("fd00::2"), ip("fd00::1"), PROTO_NONE, 64, &[]);
    let report = delivered(node.stack.process_inbound(&pkt, now));
    assert_eq!(report.delivered, 0);
    assert!(report.faults.is_empty());
}

#[test]
fn rpl_control_reaches_rpl_handler() {
    let now = Moment::now();
    let node = TestNode::router();
    let all_rpl = ip("ff02::1a");
    node.stack.join_group(all_rpl).unwrap();

    let (icmp, icmp_h) = mailbox::<2>();
    let (rpl, rpl_h) = mailbox::<2>();
    node.stack.register_next_header_handler(PROTO_ICMPV6, icmp_h);
    assert!(node.stack.register_rpl_handler(rpl_h).is_none());

    let dis = rpl_dis(ip("fe80::2"), all_rpl);
    let report = delivered(node.stack.process_inbound(&dis, now));
    assert_eq!(report.delivered, 2);
    assert_eq!(icmp.len(), 1);
    let msg = rpl.recv().unwrap();
    assert_eq!(msg.payload()[0], ICMPV6_RPL_CONTROL);
    assert_eq!(
        ipv6_csum(&msg.meta, msg.payload(), msg.payload().len(), PROTO_ICMPV6),
        0
    );

    // Other ICMPv6 goes to the ICMPv6 handler only.
    let echo = ipv6_datagram(
        ip("fe80::2"),
        Ipv6Addr::ALL_NODES,
        PROTO_ICMPV6,
        255,
        &[128, 0, 0, 0, 0, 1, 0, 1],
    );
    let report = delivered(node.stack.process_inbound(&echo, now));
    assert_eq!(report.delivered, 1);
    assert!(rpl.is_empty());
}

#[test]
fn faults_are_reported_per_handler() {
    let now = Moment::now();
    let node = TestNode::host();
    node.assign(ip("fd00::1"), now);

    let (gone, gone_h) = mailbox::<1>();
    let (full, full_h) = mailbox::<1>();
    let (udp, udp_h) = mailbox::<4>();
    let gone_id = gone_h.id();
    let full_id = full_h.id();
    node.stack.register_packet_handler(gone_h).unwrap();
    node.stack.register_packet_handler(full_h).unwrap();
    node.stack.register_next_header_handler(PROTO_UDP, udp_h);
    drop(gone);

    let pkt = udp_datagram(ip("fd00::2"), ip("fd00::1"), 9, &[1]);
    let report = delivered(node.stack.process_inbound(&pkt, now));
    assert_eq!(report.delivered, 2);
    assert_eq!(&report.faults[..], &[DeliveryFault::HandlerGone(gone_id)]);

    // The one-slot observer is now full; the others keep receiving.
    let report = delivered(node.stack.process_inbound(&pkt, now));
    assert_eq!(report.delivered, 1);
    assert_eq!(
        &report.faults[..],
        &[
            DeliveryFault::HandlerGone(gone_id),
            DeliveryFault::QueueFull(full_id),
        ]
    );
    assert_eq!(full.len(), 1);
    assert_eq!(udp.len(), 2);

    let dump = node.stack.dump_handlers();
    assert!(dump.handlers.iter().any(|h| h.id == gone_id && !h.live));
}

#[test]
fn host_drops_what_is_not_for_it() {
    let now = Moment::now();
    let node = TestNode::host();
    let pkt = udp_datagram(ip("fd00::2"), ip("fd00::99"), 9, &[]);

    assert!(!node.stack.is_router());
    assert_eq!(
        node.stack.process_inbound(&pkt, now),
        ProcessResult::Drop { reason: DropReason::NoRoute }
    );
    assert_eq!(node.link.len(), 0);
}

#[test]
fn router_forwards_by_static_route() {
    let now = Moment::now();
    let node = TestNode::router();
    let routes = Arc::new(StaticRoutes::<4>::new());
    routes.add("fd00:1::/32".parse().unwrap(), ip("fe80::1")).unwrap();
    node.stack.set_routing_provider(routes.clone());

    let pkt = udp_datagram(ip("fd00::2"), ip("fd00:1::9"), 9, b"fwd");
    assert_eq!(
        node.stack.process_inbound(&pkt, now),
        ProcessResult::Forwarded(ip("fe80::1"))
    );

    let frames = node.link.take();
    assert_eq!(frames.len(), 1);
    let (target, frame) = &frames[0];
    assert_eq!(*target, LinkTarget::Unicast(ip("fe80::1")));
    let (meta, payload) = Ipv6Meta::parse(frame).unwrap();
    assert_eq!(meta.hop_limit, 63);
    assert_eq!(meta.dst, ip("fd00:1::9"));
    assert_eq!(payload, &pkt[IPV6_HDR_LEN..]);

    // Outside every route.
    let pkt = udp_datagram(ip("fd00::2"), ip("2001:db8::1"), 9, &[]);
    assert_eq!(
        node.stack.process_inbound(&pkt, now),
        ProcessResult::Drop { reason: DropReason::NoRoute }
    );

    // Routes may change while the table is installed.
    routes.add("::/0".parse().unwrap(), ip("fe80::2")).unwrap();
    assert_eq!(
        node.stack.process_inbound(&pkt, now),
        ProcessResult::Forwarded(ip("fe80::2"))
    );
}

#[test]
fn router_drops() {
    let now = Moment::now();
    let node = TestNode::router();

    let last_hop =
        ipv6_datagram(ip("fd00::2"), ip("fd00::9"), PROTO_UDP, 1, &[]);
    assert_eq!(
        node.stack.process_inbound(&last_hop, now),
        ProcessResult::Drop { reason: DropReason::HopLimit }
    );

    node.link.refuse(Some(LinkError::NoNeighbor));
    let pkt = ipv6_datagram(ip("fd00::2"), ip("fd00::9"), PROTO_UDP, 64, &[]);
    assert_eq!(
        node.stack.process_inbound(&pkt, now),
        ProcessResult::Drop { reason: DropReason::Link(LinkError::NoNeighbor) }
    );

    // A router still doesn't forward multicast.
    node.link.refuse(None);
    let pkt = ipv6_datagram(ip("fd00::2"), ip("ff05::fb"), PROTO_UDP, 64, &[]);
    assert_eq!(
        node.stack.process_inbound(&pkt, now),
        ProcessResult::Drop { reason: DropReason::NoRoute }
    );
    let pkt = ipv6_datagram(ip("fd00::2"), ip("ff02::fb"), PROTO_UDP, 64, &[]);
    assert_eq!(
        node.stack.process_inbound(&pkt, now),
        ProcessResult::Drop { reason: DropReason::NotMember }
    );

    // Nor the unspecified address, nor anything link-local that isn't
    // ours, even though the provider would hand back a next hop.
    let no_route = RouteDecision::Drop(DropReason::NoRoute);
    assert_eq!(
        node.stack.route_decision(Ipv6Addr::ANY_ADDR, 64, now),
        no_route
    );
    assert_eq!(node.stack.route_decision(ip("fe80::99"), 64, now), no_route);
    let pkt = ipv6_datagram(ip("fe80::2"), ip("fe80::99"), PROTO_UDP, 64, &[]);
    assert_eq!(
        node.stack.process_inbound(&pkt, now),
        ProcessResult::Drop { reason: DropReason::NoRoute }
    );
    assert_eq!(node.link.len(), 0);
}

#[test]
fn malformed_datagrams() {
    let now = Moment::now();
    let node = TestNode::router();
    let malformed = ProcessResult::Drop { reason: DropReason::Malformed };

    assert_eq!(node.stack.process_inbound(&[], now), malformed);

    let mut pkt = udp_datagram(ip("fd00::2"), ip("fd00::1"), 9, b"abc");
    pkt[0] = 0x40;
    assert_eq!(node.stack.process_inbound(&pkt, now), malformed);

    let pkt = udp_datagram(ip("fd00::2"), ip("fd00::1"), 9, b"abc");
    assert_eq!(
        node.stack.process_inbound(&pkt[..pkt.len() - 1], now),
        malformed
    );
}

#[test]
fn solicited_node_group_follows_table() {
    let now = Moment::now();
    let node = TestNode::host();
    let ll = node.stack.addr_by_eui64(Ipv6Cidr::LINK_LOCAL.ip());
    assert_eq!(ll, node_link_local());
    let group = ll.solicited_node_multicast();

    assert!(!node.stack.is_member(group, now));
    node.stack
        .add_addr(
            ll,
            AddrType::UnicastAuto,
            AddrState::Tentative,
            Lifetime::Infinite,
            Lifetime::Infinite,
            now,
        )
        .unwrap();
    assert!(node.stack.is_member(group, now));

    // DAD failed: the address is gone, and so is the group.
    assert!(node.stack.dad_complete(ll, false));
    assert!(!node.stack.is_member(group, now));
    let ns =
        ipv6_datagram(ip("fe80::2"), group, PROTO_ICMPV6, 255, &[135, 0, 0, 0]);
    assert_eq!(
        node.stack.process_inbound(&ns, now),
        ProcessResult::Drop { reason: DropReason::NotMember }
    );
}
