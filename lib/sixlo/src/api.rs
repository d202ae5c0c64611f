// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

pub use sixlo_api::*;

use alloc::vec::Vec;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

/// An opaque identifier for a registered protocol handler.
///
/// Identifiers are handed out by the registry and are never reused
/// for the lifetime of a stack.
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
pub struct HandlerId(pub u32);

impl Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

/// Where a handler sits in the registry.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum HandlerSlot {
    /// Sees every locally delivered datagram.
    Observer,
    /// Bound to one Next Header value.
    NextHeader(u8),
    /// Sees ICMPv6 RPL control messages.
    Rpl,
}

impl Display for HandlerSlot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Observer => write!(f, "observer"),
            Self::NextHeader(nh) => write!(f, "{}", Protocol::from(*nh)),
            Self::Rpl => write!(f, "rpl"),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct HandlerDump {
    pub id: HandlerId,
    pub slot: HandlerSlot,
    /// Is the handler's mailbox still alive?
    pub live: bool,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct DumpHandlersResp {
    pub handlers: Vec<HandlerDump>,
}
