// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Send-path and 6LoWPAN context tests.

use sixlo_test_utils as common;

use common::*;
use sixlo::print::print_contexts_into;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn udp_header_and_checksum() {
    let now = Moment::now();
    let node = TestNode::host();
    let me = ip("fd00::1");
    let peer = ip("fd00::2");
    node.assign(me, now);

    // Built with a bogus source so the stack must redo the checksum.
    let seg = udp_segment(ip("fd00::bad"), peer, 5683, 5683, b"coap");
    let len = node.stack.sendto(peer, PROTO_UDP, &seg, now).unwrap();
    assert_eq!(len, IPV6_HDR_LEN + seg.len());

    let frames = node.link.take();
    let (target, frame) = &frames[0];
    assert_eq!(*target, LinkTarget::Unicast(peer));
    assert_eq!(frame[0] >> 4, 6);

    let (meta, payload) = Ipv6Meta::parse(frame).unwrap();
    assert_eq!(meta.src, me);
    assert_eq!(meta.dst, peer);
    assert_eq!(meta.proto, Protocol::UDP);
    assert_eq!(meta.hop_limit, DEFAULT_HOP_LIMIT);
    assert_eq!(usize::from(meta.pay_len), seg.len());
    assert!(udp_checksum_ok(me, peer, payload));
    assert_eq!(&payload[8..], b"coap");
}

#[test]
fn multicast_goes_to_broadcast() {
    let now = Moment::now();
    let node = TestNode::host();
    let ll = node_link_local();
    node.assign(ll, now);

    let rs = [133, 0, 0, 0, 0, 0, 0, 0];
    node.stack
        .sendto(Ipv6Addr::ALL_ROUTERS, PROTO_ICMPV6, &rs, now)
        .unwrap();

    let frames = node.link.take();
    let (target, frame) = &frames[0];
    assert_eq!(*target, LinkTarget::Broadcast);
    let (meta, payload) = Ipv6Meta::parse(frame).unwrap();
    assert_eq!(meta.src, ll);
    assert_eq!(ipv6_csum(&meta, payload, payload.len(), PROTO_ICMPV6), 0);
}

#[test]
fn routed_through_provider() {
    let now = Moment::now();
    let node = TestNode::host();
    let routes = Arc::new(StaticRoutes::<2>::new());
    routes.add("::/0".parse().unwrap(), ip("fe80::1")).unwrap();
    node.stack.set_routing_provider(routes);

    node.stack.sendto(ip("2001:db8::1"), PROTO_NONE, &[], now).unwrap();
    let frames = node.link.take();
    assert_eq!(frames[0].0, LinkTarget::Unicast(ip("fe80::1")));
    assert_eq!(frames[0].1.len(), IPV6_HDR_LEN);

    node.stack.set_routing_provider(Arc::new(StaticRoutes::<2>::new()));
    assert_eq!(
        node.stack.sendto(ip("2001:db8::1"), PROTO_NONE, &[], now),
        Err(Error::NoRoute(ip("2001:db8::1")))
    );

    node.stack.reset_routing_provider();
    assert_eq!(node.stack.routing_epoch(), 3);
    node.stack.sendto(ip("2001:db8::1"), PROTO_NONE, &[], now).unwrap();
    assert_eq!(node.link.take()[0].0, LinkTarget::Unicast(ip("2001:db8::1")));
}

#[test]
fn send_limits() {
    let now = Moment::now();
    let node = TestNode::new(Ipv6Cfg {
        mtu: 100,
        hop_limit: 3,
        ..Default::default()
    });

    let fits = vec![0u8; 60];
    assert_eq!(
        node.stack.sendto(ip("fd00::2"), 253, &fits, now),
        Ok(100)
    );
    assert_eq!(node.link.take()[0].1[7], 3);

    assert_eq!(
        node.stack.sendto(ip("fd00::2"), 253, &[0u8; 61], now),
        Err(Error::TooLarge { len: 61, max: 60 })
    );

    node.link.refuse(Some(LinkError::Down));
    assert_eq!(
        node.stack.sendto(ip("fd00::2"), 253, &fits, now),
        Err(Error::Link(LinkError::Down))
    );
}

#[test]
fn contexts() {
    let now = Moment::now();
    let node = TestNode::host();

    node.stack
        .update_context(0, ip("2001:db8:1::"), 48, true, 30, now)
        .unwrap();
    node.stack
        .update_context(1, ip("2001:db8:1:2::"), 64, true, 30, now)
        .unwrap();
    node.stack.update_context(2, ip("fd00::"), 8, false, 30, now).unwrap();
    assert_eq!(
        node.stack.update_context(16, ip("fd00::"), 8, true, 30, now),
        Err(Error::BadContext(16))
    );

    let lookup = |a: &str| node.stack.context_lookup(ip(a)).map(|c| c.num);
    assert_eq!(lookup("2001:db8:1:2::1"), Some(1));
    assert_eq!(lookup("2001:db8:1:3::1"), Some(0));
    assert_eq!(lookup("fd00::1"), None);
    assert_eq!(node.stack.context(2).unwrap().prefix, ip("fd00::"));

    // Withdrawn.
    node.stack
        .update_context(1, ip("2001:db8:1:2::"), 64, true, 0, now)
        .unwrap();
    assert_eq!(lookup("2001:db8:1:2::1"), Some(0));

    let t = now + Duration::from_secs(10 * 60);
    let mut out = Vec::new();
    print_contexts_into(&mut out, &node.stack.dump_contexts(t)).unwrap();
    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("2001:db8:1:0:0:0:0:0/48"));
    assert!(out.contains("20min"));

    node.stack.tick(now + Duration::from_secs(31 * 60));
    assert!(node.stack.dump_contexts(now).contexts.is_empty());
}
