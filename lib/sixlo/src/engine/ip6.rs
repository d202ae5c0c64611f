// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! IPv6 headers.

use super::checksum::Checksum;
use super::checksum::HeaderChecksum;
use sixlo_api::IPV6_HDR_LEN;
use sixlo_api::Ipv6Addr;
use sixlo_api::Protocol;
use smoltcp::wire::Ipv6Packet;

pub const IPV6_VERSION: u8 = 6;

/// The ICMPv6 type of RPL control messages (RFC 6550 §6).
pub const ICMPV6_RPL_CONTROL: u8 = 155;

#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Ipv6HdrError {
    #[error("datagram too short: {len} bytes")]
    Truncated { len: usize },

    #[error("bad IP version: {0}")]
    BadVersion(u8),

    #[error("payload length {declared} exceeds the {avail} bytes received")]
    BadLength { declared: usize, avail: usize },
}

/// The fields of the fixed IPv6 header the stack cares about.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Ipv6Meta {
    pub src: Ipv6Addr,
    pub dst: Ipv6Addr,
    /// The Next Header of the fixed header. Extension headers are not
    /// walked; a handler bound to them sees the datagram as is.
    pub proto: Protocol,
    pub hop_limit: u8,
    pub pay_len: u16,
}

impl Default for Ipv6Meta {
    fn default() -> Self {
        Self {
            src: Ipv6Addr::ANY_ADDR,
            dst: Ipv6Addr::ANY_ADDR,
            proto: Protocol::Unknown(255),
            hop_limit: sixlo_api::DEFAULT_HOP_LIMIT,
            pay_len: 0,
        }
    }
}

impl Ipv6Meta {
    /// Parse the fixed header at the front of `bytes`, returning it
    /// along with the payload it describes. Bytes past the declared
    /// payload length (link-layer padding) are ignored.
    pub fn parse(bytes: &[u8]) -> Result<(Self, &[u8]), Ipv6HdrError> {
        if bytes.len() < IPV6_HDR_LEN {
            return Err(Ipv6HdrError::Truncated { len: bytes.len() });
        }

        let pkt = Ipv6Packet::new_unchecked(bytes);
        if pkt.version() != IPV6_VERSION {
            return Err(Ipv6HdrError::BadVersion(pkt.version()));
        }

        let declared = usize::from(pkt.payload_len());
        let avail = bytes.len() - IPV6_HDR_LEN;
        if declared > avail {
            return Err(Ipv6HdrError::BadLength { declared, avail });
        }

        let meta = Self {
            src: Ipv6Addr::from(pkt.src_addr()),
            dst: Ipv6Addr::from(pkt.dst_addr()),
            proto: Protocol::from(pkt.next_header()),
            hop_limit: pkt.hop_limit(),
            pay_len: pkt.payload_len(),
        };

        Ok((meta, &bytes[IPV6_HDR_LEN..IPV6_HDR_LEN + declared]))
    }

    /// Write the fixed header into the first 40 bytes of `dst`.
    pub fn emit(&self, dst: &mut [u8]) {
        debug_assert!(dst.len() >= IPV6_HDR_LEN);
        let mut pkt = Ipv6Packet::new_unchecked(&mut dst[..IPV6_HDR_LEN]);
        pkt.set_version(IPV6_VERSION);
        // Nothing this stack sends is marked for QoS.
        pkt.set_traffic_class(0);
        pkt.set_flow_label(0);
        pkt.set_payload_len(self.pay_len);
        pkt.set_next_header(self.proto.into());
        pkt.set_hop_limit(self.hop_limit);
        pkt.set_src_addr(self.src.into());
        pkt.set_dst_addr(self.dst.into());
    }

    /// Fill in the RFC 2460 §8.1 pseudo-header for an upper-layer
    /// packet of `ulp_len` bytes of protocol `proto`.
    pub fn pseudo_bytes(&self, ulp_len: u32, proto: u8, bytes: &mut [u8; 40]) {
        bytes[0..16].copy_from_slice(&self.src.bytes());
        bytes[16..32].copy_from_slice(&self.dst.bytes());
        bytes[32..36].copy_from_slice(&ulp_len.to_be_bytes());
        bytes[36..40].copy_from_slice(&[0u8, 0u8, 0u8, proto]);
    }

    /// Return a [`Checksum`] of the pseudo-header, using this header's
    /// payload length and Next Header.
    pub fn pseudo_csum(&self) -> Checksum {
        let mut bytes = [0u8; 40];
        self.pseudo_bytes(
            u32::from(self.pay_len),
            self.proto.into(),
            &mut bytes,
        );
        Checksum::compute(&bytes)
    }

    /// Return the total length of the datagram, header included.
    pub fn total_len(&self) -> usize {
        IPV6_HDR_LEN + usize::from(self.pay_len)
    }
}

/// Compute the upper-layer checksum of `payload[..len]` carried with
/// protocol number `proto` between the addresses of `hdr`.
///
/// The result is a host integer whose big-endian bytes belong in the
/// checksum field. Run over a payload that already carries a correct
/// checksum, the result is zero. A `len` beyond the end of `payload`
/// only covers the bytes that exist.
pub fn ipv6_csum(hdr: &Ipv6Meta, payload: &[u8], len: usize, proto: u8) -> u16 {
    let len = len.min(payload.len());
    let mut pseudo = [0u8; 40];
    // Datagrams are bounded by the 16-bit payload length field.
    hdr.pseudo_bytes(len as u32, proto, &mut pseudo);
    let mut csum = Checksum::compute(&pseudo);
    csum.add_bytes(&payload[..len]);
    HeaderChecksum::from(csum).to_host()
}

/// Is this payload of `proto` an ICMPv6 RPL control message?
pub fn is_rpl_control(proto: Protocol, payload: &[u8]) -> bool {
    proto == Protocol::ICMPv6 && payload.first() == Some(&ICMPV6_RPL_CONTROL)
}
