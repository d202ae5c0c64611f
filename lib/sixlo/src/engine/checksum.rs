// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Types for calculating the internet checksum.
//!
//! [`Checksum`] is a rolling one's complement sum which can be built up
//! (or incrementally updated) piece by piece before being finalized
//! into a [`HeaderChecksum`], the complemented value stored in a
//! header.
//!
//! # Checksums and Endianness
//!
//! The checksum is not a logical integer; it is a pair of bytes. The
//! sum treats every pair of bytes being summed as a native 16-bit
//! integer and stores the result back the same way, so no byte-order
//! conversion ever happens on the checksum itself. On a little-endian
//! node each word is logically byte-swapped while summing, and the
//! result is swapped back when written to memory (RFC 1071 §1.B). In
//! Rust this means `{to,from}_ne_bytes()` throughout.
//!
//! # Relevant RFCs
//!
//! * 1071 Computing the Internet Checksum
//!
//! * 1624 Computation of the Internet Checksum via Incremental Update

/// The checksum value as it is contained in a network header, i.e.,
/// with one's complement applied.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HeaderChecksum {
    inner: [u8; 2],
}

impl HeaderChecksum {
    /// Return the bytes of this header checksum.
    pub fn bytes(&self) -> [u8; 2] {
        self.inner
    }

    /// Return the checksum as the host integer whose big-endian bytes
    /// go on the wire.
    pub fn to_host(&self) -> u16 {
        u16::from_be_bytes(self.inner)
    }
}

impl From<Checksum> for HeaderChecksum {
    /// Finalize the rolling checksum and put it into header form by
    /// performing one's complement.
    fn from(mut csum: Checksum) -> HeaderChecksum {
        Self { inner: (!csum.finalize()).to_ne_bytes() }
    }
}

/// A rolling one's complement checksum.
///
/// Carries are accumulated in the upper half of a `u32` and only folded
/// back in when the sum is finalized.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Checksum {
    inner: u32,
}

impl Checksum {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new rolling checksum, starting with `bytes`.
    pub fn compute(bytes: &[u8]) -> Self {
        let mut csum = Self::new();
        csum.add_bytes(bytes);
        csum
    }

    /// Add the contents of `bytes` to the sum. An odd trailing byte is
    /// summed as if padded with a zero byte.
    ///
    /// Only the last call may pass an odd number of bytes; the sum has
    /// no notion of a pending half-word.
    pub fn add_bytes(&mut self, bytes: &[u8]) {
        let mut words = bytes.chunks_exact(2);
        for w in &mut words {
            self.add_word(u16::from_ne_bytes([w[0], w[1]]));
        }
        if let [last] = words.remainder() {
            self.add_word(u16::from_ne_bytes([*last, 0]));
        }
    }

    /// Remove the contents of `bytes` from the sum, e.g. because that
    /// part of the header is about to be rewritten.
    pub fn sub_bytes(&mut self, bytes: &[u8]) {
        let mut words = bytes.chunks_exact(2);
        for w in &mut words {
            self.add_word(!u16::from_ne_bytes([w[0], w[1]]));
        }
        if let [last] = words.remainder() {
            self.add_word(!u16::from_ne_bytes([*last, 0]));
        }
    }

    fn add_word(&mut self, w: u16) {
        // Fold early so that arbitrarily long inputs cannot overflow.
        if self.inner >= 0xFFFF_0000 {
            self.fold();
        }
        self.inner += u32::from(w);
    }

    fn fold(&mut self) {
        while (self.inner >> 16) != 0 {
            self.inner = (self.inner >> 16) + (self.inner & 0xFFFF);
        }
    }

    /// Finalize the sum by adding up all the accumulated carries and
    /// returning the resulting value as a `u16`.
    pub fn finalize(&mut self) -> u16 {
        self.fold();
        (self.inner & 0xFFFF) as u16
    }
}

impl From<HeaderChecksum> for Checksum {
    /// Convert a header's checksum bytes back into a rolling checksum.
    fn from(hc: HeaderChecksum) -> Self {
        Self { inner: u32::from(!u16::from_ne_bytes(hc.bytes())) }
    }
}

impl core::ops::Add for Checksum {
    type Output = Self;

    fn add(mut self, mut other: Self) -> Self {
        self.add_word(other.finalize());
        self
    }
}

impl core::ops::AddAssign for Checksum {
    fn add_assign(&mut self, mut other: Self) {
        self.add_word(other.finalize());
    }
}

#[cfg(test)]
mod test {
    use super::*;

    // RFC 1071 §3 worked example.
    const RFC1071: [u8; 8] = [0x00, 0x01, 0xf2, 0x03, 0xf4, 0xf5, 0xf6, 0xf7];

    #[test]
    fn rfc1071_example() {
        let mut csum = Checksum::compute(&RFC1071);
        assert_eq!(u16::from_be_bytes(csum.finalize().to_ne_bytes()), 0xddf2);
        let hc = HeaderChecksum::from(Checksum::compute(&RFC1071));
        assert_eq!(hc.to_host(), !0xddf2);
    }

    #[test]
    fn odd_length_pads_with_zero() {
        let a = HeaderChecksum::from(Checksum::compute(&[0xab, 0xcd, 0xef]));
        let b =
            HeaderChecksum::from(Checksum::compute(&[0xab, 0xcd, 0xef, 0x00]));
        assert_eq!(a, b);
    }

    #[test]
    fn incremental_update() {
        let mut data = RFC1071;
        let mut csum = Checksum::compute(&data);

        csum.sub_bytes(&data[2..4]);
        data[2] = 0x12;
        data[3] = 0x34;
        csum.add_bytes(&data[2..4]);

        assert_eq!(
            HeaderChecksum::from(csum),
            HeaderChecksum::from(Checksum::compute(&data))
        );
    }

    #[test]
    fn verify_sums_to_zero() {
        let mut data = [0x45, 0x00, 0x00, 0x1c, 0x12, 0x34, 0x00, 0x00];
        let hc = HeaderChecksum::from(Checksum::compute(&data));
        data[6..8].copy_from_slice(&hc.bytes());
        let check = HeaderChecksum::from(Checksum::compute(&data));
        assert_eq!(check.to_host(), 0);
    }

    #[test]
    fn header_round_trip() {
        let mut csum = Checksum::compute(&RFC1071);
        let mut back = Checksum::from(HeaderChecksum::from(csum));
        assert_eq!(back.finalize(), csum.finalize());
    }

    #[test]
    fn add_partial_sums() {
        let whole = Checksum::compute(&RFC1071);
        let mut parts = Checksum::compute(&RFC1071[..4]);
        parts += Checksum::compute(&RFC1071[4..]);
        assert_eq!(HeaderChecksum::from(parts), HeaderChecksum::from(whole));
        let summed =
            Checksum::compute(&RFC1071[..2]) + Checksum::compute(&RFC1071[2..]);
        assert_eq!(HeaderChecksum::from(summed), HeaderChecksum::from(whole));
    }

    #[test]
    fn long_input_does_not_overflow() {
        let data = [0xffu8; 1 << 17];
        let mut csum = Checksum::compute(&data);
        assert_eq!(csum.finalize(), 0xFFFF);
    }
}
