// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use super::ip::Ipv6Addr;
use alloc::vec::Vec;
use serde::Deserialize;
use serde::Serialize;

/// The number of distinct 6LoWPAN compression contexts; context ids
/// are 4 bits wide.
pub const LOWPAN_CONTEXT_MAX: usize = 16;

/// A snapshot of one 6LoWPAN compression context.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct LowpanContextDump {
    pub num: u8,
    pub prefix: Ipv6Addr,
    /// Prefix length in bits.
    pub length: u8,
    /// May the codec use this context for compression, or only for
    /// decompression?
    pub comp: bool,
    /// Remaining lifetime in minutes.
    pub lifetime: u16,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct DumpContextsResp {
    pub contexts: Vec<LowpanContextDump>,
}
