// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use alloc::str::FromStr;
use alloc::string::String;
use core::fmt;
use core::fmt::Debug;
use core::fmt::Display;
use core::ops::Deref;
use serde::Deserialize;
use serde::Serialize;

/// An IEEE EUI-64 hardware address, as carried by 802.15.4 radios.
#[derive(
    Clone,
    Copy,
    Default,
    Deserialize,
    Eq,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
    Hash,
)]
pub struct Eui64 {
    inner: [u8; 8],
}

impl Eui64 {
    pub const ZERO: Self = Self { inner: [0x00; 8] };

    /// The universal/local bit of the first octet.
    const UL_BIT: u8 = 0x02;

    /// Return the bytes of the EUI-64.
    #[inline]
    pub fn bytes(&self) -> [u8; 8] {
        self.inner
    }

    pub const fn from_const(bytes: [u8; 8]) -> Self {
        Self { inner: bytes }
    }

    /// Expand a 48-bit MAC into an EUI-64 by inserting `ff:fe` between
    /// the OUI and the device-specific half.
    pub const fn from_mac48(mac: [u8; 6]) -> Self {
        Self {
            inner: [mac[0], mac[1], mac[2], 0xff, 0xfe, mac[3], mac[4], mac[5]],
        }
    }

    /// Return the modified EUI-64 interface identifier: the address with
    /// its universal/local bit inverted.
    pub const fn interface_id(&self) -> [u8; 8] {
        let mut iid = self.inner;
        iid[0] ^= Self::UL_BIT;
        iid
    }
}

impl From<[u8; 8]> for Eui64 {
    fn from(bytes: [u8; 8]) -> Self {
        Self { inner: bytes }
    }
}

impl From<&[u8; 8]> for Eui64 {
    fn from(bytes: &[u8; 8]) -> Self {
        Self { inner: *bytes }
    }
}

impl From<smoltcp::wire::Ieee802154Address> for Eui64 {
    fn from(addr: smoltcp::wire::Ieee802154Address) -> Self {
        match addr {
            smoltcp::wire::Ieee802154Address::Extended(b) => Self::from(b),
            smoltcp::wire::Ieee802154Address::Short(s) => {
                // RFC 4944 §6: PAN id zeroed, then 0000:00ff:fe00:XXXX.
                Self::from_const([0, 0, 0, 0xff, 0xfe, 0, s[0], s[1]])
            }
            smoltcp::wire::Ieee802154Address::Absent => Self::ZERO,
        }
    }
}

impl AsRef<[u8]> for Eui64 {
    fn as_ref(&self) -> &[u8] {
        &self.inner
    }
}

impl Deref for Eui64 {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl FromStr for Eui64 {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 8];
        let mut count = 0;

        for octet in s.split(':') {
            if count == bytes.len() {
                return Err(format!("incorrect number of bytes: {}", count + 1));
            }
            bytes[count] = u8::from_str_radix(octet, 16)
                .map_err(|_| format!("bad octet: {octet}"))?;
            count += 1;
        }

        if count != bytes.len() {
            return Err(format!("incorrect number of bytes: {count}"));
        }

        Ok(Eui64 { inner: bytes })
    }
}

impl Display for Eui64 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let b = &self.inner;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]
        )
    }
}

impl Debug for Eui64 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Eui64 {{ inner: {self} }}")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::string::ToString;

    #[test]
    fn parse_and_print() {
        let eui: Eui64 = "00:12:4b:00:01:02:03:04".parse().unwrap();
        assert_eq!(
            eui.bytes(),
            [0x00, 0x12, 0x4b, 0x00, 0x01, 0x02, 0x03, 0x04]
        );
        assert_eq!(eui.to_string(), "00:12:4B:00:01:02:03:04");

        assert!("00:12:4b:00:01:02:03".parse::<Eui64>().is_err());
        assert!("00:12:4b:00:01:02:03:04:05".parse::<Eui64>().is_err());
        assert!("00:12:4b:00:01:02:03:zz".parse::<Eui64>().is_err());
    }

    #[test]
    fn interface_id_flips_ul_bit() {
        let eui = Eui64::from_const([0x02, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(eui.interface_id(), [0x00, 1, 2, 3, 4, 5, 6, 7]);
        let eui = Eui64::from_const([0x00, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(eui.interface_id(), [0x02, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn mac48_expansion() {
        let eui = Eui64::from_mac48([0xa8, 0x40, 0x25, 0x10, 0x20, 0x30]);
        assert_eq!(
            eui.bytes(),
            [0xa8, 0x40, 0x25, 0xff, 0xfe, 0x10, 0x20, 0x30]
        );
    }

    #[test]
    fn from_ieee802154() {
        use smoltcp::wire::Ieee802154Address;

        let ext = Ieee802154Address::Extended([1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(Eui64::from(ext).bytes(), [1, 2, 3, 4, 5, 6, 7, 8]);

        let short = Ieee802154Address::Short([0xbe, 0xef]);
        assert_eq!(
            Eui64::from(short).bytes(),
            [0, 0, 0, 0xff, 0xfe, 0, 0xbe, 0xef]
        );
    }
}
