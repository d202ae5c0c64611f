// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use super::eui64::Eui64;
use alloc::string::String;
use alloc::string::ToString;
use core::fmt;
use core::fmt::Debug;
use core::fmt::Display;
use core::fmt::Write;
use core::ops::Deref;
use core::result;
use core::str::FromStr;
use serde::Deserialize;
use serde::Serialize;

/// The maximum length of an IPv6 address rendered by
/// [`Ipv6Addr::write_full()`], including room for a trailing NUL
/// expected by C consumers of the buffer.
pub const IPV6_MAX_ADDR_STR_LEN: usize = 40;

pub const PROTO_HOPOPTS: u8 = 0;
pub const PROTO_TCP: u8 = 6;
pub const PROTO_UDP: u8 = 17;
pub const PROTO_ICMPV6: u8 = 58;
pub const PROTO_NONE: u8 = 59;
pub const PROTO_IPV6_OPTS: u8 = 60;

/// An IPv6 Next Header value.
#[repr(u8)]
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub enum Protocol {
    HopOpts,
    TCP,
    UDP,
    ICMPv6,
    NoNext,
    Ipv6Opts,
    Unknown(u8),
}

impl Default for Protocol {
    fn default() -> Self {
        Self::Unknown(255)
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::HopOpts => write!(f, "HOPOPT"),
            Self::TCP => write!(f, "TCP"),
            Self::UDP => write!(f, "UDP"),
            Self::ICMPv6 => write!(f, "ICMPv6"),
            Self::NoNext => write!(f, "NoNxt"),
            Self::Ipv6Opts => write!(f, "Opts"),
            Self::Unknown(v) => write!(f, "Unknown({v})"),
        }
    }
}

impl From<u8> for Protocol {
    fn from(proto: u8) -> Self {
        match proto {
            PROTO_HOPOPTS => Self::HopOpts,
            PROTO_TCP => Self::TCP,
            PROTO_UDP => Self::UDP,
            PROTO_ICMPV6 => Self::ICMPv6,
            PROTO_NONE => Self::NoNext,
            PROTO_IPV6_OPTS => Self::Ipv6Opts,
            _ => Self::Unknown(proto),
        }
    }
}

impl From<Protocol> for u8 {
    fn from(proto: Protocol) -> u8 {
        match proto {
            Protocol::HopOpts => PROTO_HOPOPTS,
            Protocol::TCP => PROTO_TCP,
            Protocol::UDP => PROTO_UDP,
            Protocol::ICMPv6 => PROTO_ICMPV6,
            Protocol::NoNext => PROTO_NONE,
            Protocol::Ipv6Opts => PROTO_IPV6_OPTS,
            Protocol::Unknown(v) => v,
        }
    }
}

impl From<smoltcp::wire::IpProtocol> for Protocol {
    fn from(proto: smoltcp::wire::IpProtocol) -> Self {
        Self::from(u8::from(proto))
    }
}

impl From<Protocol> for smoltcp::wire::IpProtocol {
    fn from(proto: Protocol) -> smoltcp::wire::IpProtocol {
        smoltcp::wire::IpProtocol::from(u8::from(proto))
    }
}

/// The reachability domain of an address, as used when choosing a
/// source address for a given destination.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub enum Scope {
    InterfaceLocal,
    LinkLocal,
    Global,
}

/// An IPv6 address.
#[derive(
    Clone,
    Copy,
    Default,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
    Deserialize,
)]
#[repr(C)]
pub struct Ipv6Addr {
    inner: [u8; 16],
}

impl Ipv6Addr {
    /// The unspecified IPv6 address, i.e., `::` or all zeros.
    pub const ANY_ADDR: Self = Self { inner: [0; 16] };

    /// The loopback address, `::1`.
    pub const LOOPBACK: Self = Self::from_const([0, 0, 0, 0, 0, 0, 0, 1]);

    /// The All-Routers multicast address, used in the Neighbor Discovery
    /// Protocol.
    pub const ALL_ROUTERS: Self =
        Self::from_const([0xff02, 0, 0, 0, 0, 0, 0, 2]);

    /// The All-Nodes multicast address, used in the Neighbor Discovery
    /// Protocol.
    pub const ALL_NODES: Self = Self::from_const([0xff02, 0, 0, 0, 0, 0, 0, 1]);

    /// The first 104 bits of every solicited-node multicast address.
    const SOLICITED_NODE_PREFIX: [u8; 13] =
        [0xff, 0x02, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x01, 0xff];

    pub const fn from_const(words: [u16; 8]) -> Self {
        let w0 = words[0].to_be_bytes();
        let w1 = words[1].to_be_bytes();
        let w2 = words[2].to_be_bytes();
        let w3 = words[3].to_be_bytes();
        let w4 = words[4].to_be_bytes();
        let w5 = words[5].to_be_bytes();
        let w6 = words[6].to_be_bytes();
        let w7 = words[7].to_be_bytes();
        Self {
            inner: [
                w0[0], w0[1], w1[0], w1[1], w2[0], w2[1], w3[0], w3[1], w4[0],
                w4[1], w5[0], w5[1], w6[0], w6[1], w7[0], w7[1],
            ],
        }
    }

    /// Return the bytes of the address.
    pub fn bytes(&self) -> [u8; 16] {
        self.inner
    }

    /// Return the eight 16-bit groups of the address, in host order.
    pub const fn segments(&self) -> [u16; 8] {
        let b = &self.inner;
        [
            u16::from_be_bytes([b[0], b[1]]),
            u16::from_be_bytes([b[2], b[3]]),
            u16::from_be_bytes([b[4], b[5]]),
            u16::from_be_bytes([b[6], b[7]]),
            u16::from_be_bytes([b[8], b[9]]),
            u16::from_be_bytes([b[10], b[11]]),
            u16::from_be_bytes([b[12], b[13]]),
            u16::from_be_bytes([b[14], b[15]]),
        ]
    }

    /// Return `true` if every bit of the address is zero.
    pub const fn is_unspecified(&self) -> bool {
        u128::from_be_bytes(self.inner) == 0
    }

    pub const fn is_loopback(&self) -> bool {
        u128::from_be_bytes(self.inner) == 1
    }

    /// Return `true` for the link-local unicast range, `fe80::/10`.
    pub const fn is_link_local(&self) -> bool {
        self.inner[0] == 0xfe && (self.inner[1] & 0xc0) == 0x80
    }

    /// Return `true` for the unique local unicast range, `fc00::/7`.
    ///
    /// See [RFC 4193].
    ///
    /// [RFC 4193]: https://www.rfc-editor.org/rfc/rfc4193
    pub const fn is_unique_local_unicast(&self) -> bool {
        (self.inner[0] & 0xfe) == 0xfc
    }

    /// Return `true` if this is a multicast IPv6 address, and `false` otherwise
    pub const fn is_multicast(&self) -> bool {
        self.inner[0] == 0xFF
    }

    /// Return `true` if this is a solicited node multicast address,
    /// i.e. a member of `ff02::1:ff00:0/104`.
    pub fn is_solicited_node(&self) -> bool {
        self.inner[..Self::SOLICITED_NODE_PREFIX.len()]
            == Self::SOLICITED_NODE_PREFIX
    }

    /// Return the solicited-node multicast IPv6 address corresponding to
    /// `self`.
    ///
    /// See [RFC 4291 §2.7.1] for details.
    ///
    /// [RFC 4291 §2.7.1]: https://www.rfc-editor.org/rfc/rfc4291#section-2.7.1
    pub const fn solicited_node_multicast(&self) -> Ipv6Addr {
        let bytes = &self.inner;
        let w0 = u16::from_be_bytes([0xff, bytes[13]]);
        let w1 = u16::from_be_bytes([bytes[14], bytes[15]]);
        Self::from_const([0xff02, 0, 0, 0, 0, 1, w0, w1])
    }

    /// Return the scope of this address.
    ///
    /// Multicast addresses report the scope encoded in their scope
    /// nibble; anything wider than link-local counts as global.
    pub const fn scope(&self) -> Scope {
        if self.is_multicast() {
            match self.inner[1] & 0x0F {
                0x1 => Scope::InterfaceLocal,
                0x2 => Scope::LinkLocal,
                _ => Scope::Global,
            }
        } else if self.is_loopback() {
            Scope::InterfaceLocal
        } else if self.is_link_local() {
            Scope::LinkLocal
        } else {
            Scope::Global
        }
    }

    /// Return a copy of `self` with the first 64 bits replaced by the
    /// link-local prefix, `fe80::/64`. The interface identifier is
    /// preserved.
    pub fn with_link_local_prefix(mut self) -> Self {
        self.inner[..8].copy_from_slice(&Ipv6Cidr::LINK_LOCAL.ip.inner[..8]);
        self
    }

    /// Build an address from the first `bits` bits of `prefix`, with
    /// every remaining bit set to zero. A `bits` value larger than 128
    /// is treated as 128.
    pub fn init_prefix(prefix: Ipv6Addr, bits: u8) -> Self {
        prefix.mask_clamped(bits.min(128))
    }

    /// Build an address from the first 64 bits of `prefix` and an
    /// interface identifier derived from `eui` via the modified EUI-64
    /// transform.
    ///
    /// See [RFC 4291 Appendix A] for details of the transformation.
    ///
    /// [RFC 4291 Appendix A]: https://www.rfc-editor.org/rfc/rfc4291#appendix-A
    pub fn with_eui64(prefix: Ipv6Addr, eui: &Eui64) -> Self {
        let mut inner = [0u8; 16];
        inner[..8].copy_from_slice(&prefix.inner[..8]);
        inner[8..].copy_from_slice(&eui.interface_id());
        Self { inner }
    }

    /// Generate a link-local address from an EUI-64.
    pub fn link_local_from_eui64(eui: &Eui64) -> Self {
        Self::with_eui64(Ipv6Cidr::LINK_LOCAL.ip, eui)
    }

    /// Return the address after applying the network mask.
    pub fn mask(self, mask: u8) -> Result<Self, String> {
        if mask > 128 {
            return Err(format!("bad mask: {mask}"));
        }

        Ok(self.mask_clamped(mask))
    }

    pub fn safe_mask(self, mask: Ipv6PrefixLen) -> Self {
        self.mask_clamped(mask.val())
    }

    // Callers guarantee `mask <= 128`.
    fn mask_clamped(mut self, mask: u8) -> Self {
        if mask >= 128 {
            return self;
        }

        if mask == 0 {
            self.inner.fill(0);
            return self;
        }

        // The mask is in bits and we want to determine which byte (of
        // the 16 that make up the address) to start with. A byte is 8
        // bits, if 8 goes into `mask` N times, then the first N bytes
        // stay as-is. However, byte N may need partial masking, and
        // bytes N+1..16 must be set to zero.
        let mut byte_idx = usize::from(mask / 8);
        let partial = mask % 8;

        if partial > 0 {
            let bits = i8::MIN >> (partial - 1);
            self.inner[byte_idx] &= bits as u8;
            byte_idx += 1;
        }
        self.inner[byte_idx..].fill(0);

        self
    }

    /// Return the number of leading bits `self` shares with `other`.
    pub fn common_prefix_len(&self, other: &Ipv6Addr) -> u8 {
        let diff = u128::from_be_bytes(self.inner)
            ^ u128::from_be_bytes(other.inner);
        diff.leading_zeros() as u8
    }

    /// Render the address in full, unabbreviated colon-hex notation
    /// (e.g. `fe80:0:0:0:0:0:0:1`) into `buf`.
    ///
    /// The buffer must hold at least [`IPV6_MAX_ADDR_STR_LEN`] bytes.
    /// If it does not, nothing is written and `None` is returned.
    pub fn write_full<'a>(&self, buf: &'a mut [u8]) -> Option<&'a str> {
        if buf.len() < IPV6_MAX_ADDR_STR_LEN {
            return None;
        }

        let mut cursor = ByteCursor { buf, pos: 0 };
        write!(cursor, "{self}").ok()?;
        let ByteCursor { buf, pos } = cursor;
        core::str::from_utf8(&buf[..pos]).ok()
    }
}

/// A `fmt::Write` sink over a fixed byte slice.
struct ByteCursor<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl Write for ByteCursor<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let end = self.pos + s.len();
        if end > self.buf.len() {
            return Err(fmt::Error);
        }
        self.buf[self.pos..end].copy_from_slice(s.as_bytes());
        self.pos = end;
        Ok(())
    }
}

// Addresses are always printed unabbreviated, the same form produced
// by `write_full()`, so that logs and diagnostic listings line up.
impl Display for Ipv6Addr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, seg) in self.segments().iter().enumerate() {
            if i > 0 {
                f.write_char(':')?;
            }
            write!(f, "{seg:x}")?;
        }
        Ok(())
    }
}

impl Debug for Ipv6Addr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Ipv6Addr {{ inner: {self} }}")
    }
}

impl From<core::net::Ipv6Addr> for Ipv6Addr {
    fn from(ip6: core::net::Ipv6Addr) -> Self {
        Self { inner: ip6.octets() }
    }
}

impl From<Ipv6Addr> for core::net::Ipv6Addr {
    fn from(ip6: Ipv6Addr) -> Self {
        Self::from(ip6.inner)
    }
}

impl From<smoltcp::wire::Ipv6Address> for Ipv6Addr {
    fn from(ip: smoltcp::wire::Ipv6Address) -> Self {
        Self { inner: ip.0 }
    }
}

impl From<Ipv6Addr> for smoltcp::wire::Ipv6Address {
    fn from(ip: Ipv6Addr) -> Self {
        Self(ip.inner)
    }
}

impl From<&[u8; 16]> for Ipv6Addr {
    fn from(bytes: &[u8; 16]) -> Ipv6Addr {
        Ipv6Addr { inner: *bytes }
    }
}

impl From<Ipv6Addr> for u128 {
    fn from(ip: Ipv6Addr) -> u128 {
        u128::from_be_bytes(ip.bytes())
    }
}

impl From<[u8; 16]> for Ipv6Addr {
    fn from(bytes: [u8; 16]) -> Ipv6Addr {
        Ipv6Addr { inner: bytes }
    }
}

impl From<[u16; 8]> for Ipv6Addr {
    fn from(words: [u16; 8]) -> Ipv6Addr {
        Self::from_const(words)
    }
}

impl From<u128> for Ipv6Addr {
    fn from(i: u128) -> Ipv6Addr {
        Self::from(i.to_be_bytes())
    }
}

impl FromStr for Ipv6Addr {
    type Err = String;

    fn from_str(val: &str) -> result::Result<Self, Self::Err> {
        let ip = val
            .parse::<smoltcp::wire::Ipv6Address>()
            .map_err(|_| String::from("Invalid IPv6 address"))?;
        Ok(ip.into())
    }
}

impl AsRef<[u8]> for Ipv6Addr {
    fn as_ref(&self) -> &[u8] {
        &self.inner
    }
}

impl Deref for Ipv6Addr {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// A valid IPv6 prefix length.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize, Ord, PartialOrd,
)]
pub struct Ipv6PrefixLen(u8);

impl TryFrom<u8> for Ipv6PrefixLen {
    type Error = String;

    fn try_from(p: u8) -> Result<Self, Self::Error> {
        Self::new(p)
    }
}

impl Ipv6PrefixLen {
    pub fn new(prefix_len: u8) -> result::Result<Self, String> {
        if prefix_len > 128 {
            return Err(format!("bad IPv6 prefix length: {prefix_len}"));
        }

        Ok(Self(prefix_len))
    }

    /// Build a prefix length, treating anything above 128 as 128.
    pub const fn clamped(prefix_len: u8) -> Self {
        if prefix_len > 128 { Self(128) } else { Self(prefix_len) }
    }

    pub fn val(&self) -> u8 {
        self.0
    }
}

/// An IPv6 CIDR.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Ipv6Cidr {
    ip: Ipv6Addr,
    prefix_len: Ipv6PrefixLen,
}

impl core::cmp::Ord for Ipv6Cidr {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        if self.ip != other.ip {
            self.ip.cmp(&other.ip)
        } else {
            self.prefix_len.cmp(&other.prefix_len)
        }
    }
}

impl core::cmp::PartialOrd for Ipv6Cidr {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Ipv6Cidr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (ip, prefix_len) = self.parts();
        write!(f, "{ip}/{}", prefix_len.val())
    }
}

impl FromStr for Ipv6Cidr {
    type Err = String;

    /// Convert a string like "fd00:dead:beef:cafe::/64" into an [`Ipv6Cidr`].
    fn from_str(val: &str) -> result::Result<Self, Self::Err> {
        let (ip_s, prefix_s) = match val.split_once('/') {
            Some(v) => v,
            None => return Err("no '/' found".to_string()),
        };

        let ip = match ip_s.parse::<Ipv6Addr>() {
            Ok(v) => v,
            Err(_) => {
                return Err(format!("Bad IP address component: '{ip_s}'"));
            }
        };

        let prefix_len = match prefix_s.parse::<u8>() {
            Ok(v) => v,
            Err(e) => {
                return Err(format!("bad prefix length: {e}"));
            }
        };

        Ipv6Cidr::new_checked(ip, prefix_len)
    }
}

impl Ipv6Cidr {
    /// The IPv6 link-local prefix, `fe80::/64`.
    pub const LINK_LOCAL: Self = Self {
        ip: Ipv6Addr::from_const([0xfe80, 0, 0, 0, 0, 0, 0, 0]),
        prefix_len: Ipv6PrefixLen(64),
    };

    /// The solicited-node multicast prefix, `ff02::1:ff00:0/104`.
    pub const SOLICITED_NODE: Self = Self {
        ip: Ipv6Addr::from_const([0xff02, 0, 0, 0, 0, 1, 0xff00, 0]),
        prefix_len: Ipv6PrefixLen(104),
    };

    pub fn new(ip: Ipv6Addr, prefix_len: Ipv6PrefixLen) -> Self {
        let ip = ip.safe_mask(prefix_len);
        Ipv6Cidr { ip, prefix_len }
    }

    pub fn new_checked(
        ip: Ipv6Addr,
        prefix_len: u8,
    ) -> result::Result<Self, String> {
        let pl = Ipv6PrefixLen::new(prefix_len)?;
        let ip = ip.safe_mask(pl);
        Ok(Ipv6Cidr { ip, prefix_len: pl })
    }

    pub fn parts(&self) -> (Ipv6Addr, Ipv6PrefixLen) {
        (self.ip, self.prefix_len)
    }

    /// Return the prefix length (netmask).
    pub fn prefix_len(self) -> u8 {
        self.prefix_len.0
    }

    /// Return the network address of this CIDR.
    pub fn ip(&self) -> Ipv6Addr {
        self.ip
    }

    /// Is this `ip` a member of the CIDR?
    pub fn is_member(&self, ip: Ipv6Addr) -> bool {
        ip.safe_mask(self.prefix_len) == self.ip
    }
}
