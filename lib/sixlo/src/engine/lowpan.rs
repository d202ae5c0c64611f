// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The 6LoWPAN compression context table.
//!
//! A context is a prefix shared by the nodes of a 6LoWPAN network,
//! identified by a 4-bit id, which the header codec may elide from
//! addresses (RFC 6282 §3.1.2). Contexts are distributed by routers
//! (RFC 6775 6CO option) with a lifetime in minutes; this table holds
//! them for the codec to consult.

use super::Error;
use super::Result;
use crate::ddi::time::MINUTE_MILLIS;
use crate::ddi::time::Moment;
use heapless::Vec as BoundedVec;
use sixlo_api::DumpContextsResp;
use sixlo_api::Ipv6Addr;
use sixlo_api::LOWPAN_CONTEXT_MAX;
use sixlo_api::LowpanContextDump;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LowpanContext {
    pub num: u8,
    /// The prefix, with every bit past `length` zeroed.
    pub prefix: Ipv6Addr,
    pub length: u8,
    /// May the codec compress with this context, or only decompress?
    pub comp: bool,
    /// Lifetime in minutes, counted from `updated`.
    pub lifetime: u16,
    pub updated: Moment,
}

impl LowpanContext {
    pub fn covers(&self, addr: Ipv6Addr) -> bool {
        Ipv6Addr::init_prefix(addr, self.length) == self.prefix
    }

    fn is_expired(&self, now: Moment) -> bool {
        now.is_past(self.updated, u64::from(self.lifetime) * MINUTE_MILLIS)
    }

    fn dump(&self, now: Moment) -> LowpanContextDump {
        let elapsed = now.delta_as_millis(self.updated) / MINUTE_MILLIS;
        let remaining = u64::from(self.lifetime).saturating_sub(elapsed);

        LowpanContextDump {
            num: self.num,
            prefix: self.prefix,
            length: self.length,
            comp: self.comp,
            lifetime: remaining as u16,
        }
    }
}

#[derive(Debug, Default)]
pub struct LowpanContextTable {
    contexts: BoundedVec<LowpanContext, LOWPAN_CONTEXT_MAX>,
}

impl LowpanContextTable {
    pub const NAME: &'static str = "6LoWPAN context table";

    pub fn new() -> Self {
        Self::default()
    }

    /// Install or replace context `num`. A `length` over 128 is taken
    /// as 128. A `lifetime` of zero withdraws the context, and `None`
    /// is returned.
    ///
    /// # Errors
    ///
    /// [`Error::BadContext`] if `num` doesn't fit in 4 bits.
    pub fn update(
        &mut self,
        num: u8,
        prefix: Ipv6Addr,
        length: u8,
        comp: bool,
        lifetime: u16,
        now: Moment,
    ) -> Result<Option<LowpanContext>> {
        if usize::from(num) >= LOWPAN_CONTEXT_MAX {
            return Err(Error::BadContext(num));
        }

        if lifetime == 0 {
            self.remove(num);
            return Ok(None);
        }

        let length = length.min(128);
        let ctx = LowpanContext {
            num,
            prefix: Ipv6Addr::init_prefix(prefix, length),
            length,
            comp,
            lifetime,
            updated: now,
        };

        if let Some(existing) = self.contexts.iter_mut().find(|c| c.num == num)
        {
            *existing = ctx;
        } else {
            // One slot per id, so this only fails if ids were not
            // checked above.
            self.contexts.push(ctx).map_err(|_| Error::Capacity {
                table: Self::NAME,
                limit: LOWPAN_CONTEXT_MAX,
            })?;
        }

        Ok(Some(ctx))
    }

    pub fn remove(&mut self, num: u8) -> Option<LowpanContext> {
        let idx = self.contexts.iter().position(|c| c.num == num)?;
        Some(self.contexts.remove(idx))
    }

    pub fn get(&self, num: u8) -> Option<LowpanContext> {
        self.contexts.iter().find(|c| c.num == num).copied()
    }

    /// Find the compression context with the longest prefix covering
    /// `addr`.
    pub fn lookup(&self, addr: Ipv6Addr) -> Option<LowpanContext> {
        self.contexts
            .iter()
            .filter(|c| c.comp && c.covers(addr))
            .max_by_key(|c| c.length)
            .copied()
    }

    pub fn contexts(&self, now: Moment) -> DumpContextsResp {
        DumpContextsResp {
            contexts: self.contexts.iter().map(|c| c.dump(now)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Remove contexts whose lifetime has elapsed. Returns the number
    /// removed.
    pub fn expire(&mut self, now: Moment) -> usize {
        let before = self.contexts.len();
        self.contexts.retain(|c| !c.is_expired(now));
        before - self.contexts.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use core::time::Duration;

    fn ip(s: &str) -> Ipv6Addr {
        s.parse().unwrap()
    }

    #[test]
    fn bad_id() {
        let mut t = LowpanContextTable::new();
        assert_eq!(
            t.update(16, ip("fd00::"), 64, true, 10, Moment::now()),
            Err(Error::BadContext(16))
        );
        assert_eq!(t.len(), 0);
    }

    #[test]
    fn prefix_is_masked_and_length_clamped() {
        let now = Moment::now();
        let mut t = LowpanContextTable::new();
        let ctx = t.update(0, ip("fd00:1:2:3:4::1"), 48, true, 5, now).unwrap();
        assert_eq!(ctx.unwrap().prefix, ip("fd00:1:2::"));

        let ctx =
            t.update(1, ip("fd00::1"), 200, true, 5, now).unwrap().unwrap();
        assert_eq!(ctx.length, 128);
        assert_eq!(ctx.prefix, ip("fd00::1"));
    }

    #[test]
    fn zero_lifetime_removes() {
        let now = Moment::now();
        let mut t = LowpanContextTable::new();
        t.update(3, ip("fd00::"), 64, true, 5, now).unwrap();
        assert_eq!(t.update(3, ip("fd00::"), 64, true, 0, now), Ok(None));
        assert!(t.get(3).is_none());
    }

    #[test]
    fn replace_in_place() {
        let now = Moment::now();
        let mut t = LowpanContextTable::new();
        t.update(2, ip("fd00::"), 64, true, 5, now).unwrap();
        t.update(2, ip("fd01::"), 64, false, 5, now).unwrap();
        assert_eq!(t.len(), 1);
        let ctx = t.get(2).unwrap();
        assert_eq!(ctx.prefix, ip("fd01::"));
        assert!(!ctx.comp);
    }

    #[test]
    fn longest_compressible_match() {
        let now = Moment::now();
        let mut t = LowpanContextTable::new();
        t.update(0, ip("fd00::"), 16, true, 5, now).unwrap();
        t.update(1, ip("fd00:1::"), 32, true, 5, now).unwrap();
        // Longer still, but decompression only.
        t.update(2, ip("fd00:1:2::"), 48, false, 5, now).unwrap();

        assert_eq!(t.lookup(ip("fd00:1:2::9")).unwrap().num, 1);
        assert_eq!(t.lookup(ip("fd00:7::9")).unwrap().num, 0);
        assert!(t.lookup(ip("2001:db8::1")).is_none());
    }

    #[test]
    fn lifetimes_in_minutes() {
        let now = Moment::now();
        let mut t = LowpanContextTable::new();
        t.update(0, ip("fd00::"), 64, true, 2, now).unwrap();
        t.update(1, ip("fd01::"), 64, true, 10, now).unwrap();

        let later = now + Duration::from_secs(90);
        assert_eq!(t.contexts(later).contexts[0].lifetime, 1);
        assert_eq!(t.expire(later), 0);

        let later = now + Duration::from_secs(120);
        assert_eq!(t.expire(later), 1);
        assert!(t.get(0).is_none());
        assert_eq!(t.contexts(later).contexts[0].lifetime, 8);
    }
}
