// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The protocol handler registry.
//!
//! Upper layers (UDP, ICMPv6, RPL, an application sniffing traffic)
//! receive datagrams by registering a [`HandlerHandle`] for the
//! traffic they want. A handle is an opaque id plus a weak reference to
//! the handler's [`Mailbox`]; the registry never keeps a handler alive,
//! and a handler that has gone away is reported, not delivered to.
//!
//! There are three kinds of registration:
//!
//! * Observers see every datagram delivered locally. There are at most
//!   [`SIXLOWIP_MAX_REGISTERED`] of them.
//!
//! * A next-header binding sees datagrams whose Next Header matches.
//!   There is one binding per value; the last registration wins.
//!
//! * The RPL handler sees ICMPv6 RPL control messages, in addition to
//!   whatever handler is bound to ICMPv6.

use super::Error;
use super::Result;
use super::ip6::Ipv6Meta;
use crate::api::DumpHandlersResp;
use crate::api::HandlerDump;
use crate::api::HandlerId;
use crate::api::HandlerSlot;
use crate::ddi::sync::KMutex;
use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::sync::Weak;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::AtomicU32;
use core::sync::atomic::Ordering;
use heapless::Deque;
use heapless::Vec as BoundedVec;
use sixlo_api::IPV6_HDR_LEN;
use sixlo_api::PROTO_NONE;

/// The number of packet observers that may be registered.
pub const SIXLOWIP_MAX_REGISTERED: usize = 4;

/// The most faults a single delivery can produce: one per observer,
/// one for the next-header binding, one for the RPL handler.
pub const MAX_DELIVERY_FAULTS: usize = SIXLOWIP_MAX_REGISTERED + 2;

static NEXT_HANDLER_ID: AtomicU32 = AtomicU32::new(1);

/// A datagram as handed to a handler: the parsed header and the
/// complete datagram bytes, shared between every handler it goes to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Datagram {
    pub meta: Ipv6Meta,
    frame: Arc<[u8]>,
}

impl Datagram {
    pub fn new(meta: Ipv6Meta, frame: &[u8]) -> Self {
        Self { meta, frame: Arc::from(frame) }
    }

    /// The whole datagram, header included.
    pub fn frame(&self) -> &[u8] {
        &self.frame
    }

    /// The bytes following the fixed header.
    pub fn payload(&self) -> &[u8] {
        let end = (IPV6_HDR_LEN + usize::from(self.meta.pay_len))
            .min(self.frame.len());
        self.frame.get(IPV6_HDR_LEN..end).unwrap_or(&[])
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum SendError {
    #[error("mailbox full")]
    Full,

    #[error("mailbox closed")]
    Closed,
}

/// The receiving end of a handler. Sends must never block.
pub trait Mailbox: Send + Sync {
    fn try_send(&self, dgram: Datagram) -> core::result::Result<(), SendError>;
}

/// Why a datagram did not reach one of its handlers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeliveryFault {
    /// Nothing is bound to this Next Header value.
    UnsupportedProtocol(u8),
    QueueFull(HandlerId),
    HandlerGone(HandlerId),
}

impl fmt::Display for DeliveryFault {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::UnsupportedProtocol(nh) => {
                write!(f, "no handler for next header {nh}")
            }
            Self::QueueFull(id) => write!(f, "handler {id} queue full"),
            Self::HandlerGone(id) => write!(f, "handler {id} gone"),
        }
    }
}

/// What happened to a locally delivered datagram.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DeliveryReport {
    /// The number of handlers the datagram was queued to.
    pub delivered: usize,
    pub faults: BoundedVec<DeliveryFault, MAX_DELIVERY_FAULTS>,
}

impl DeliveryReport {
    fn fault(&mut self, fault: DeliveryFault) {
        // A delivery visits at most `MAX_DELIVERY_FAULTS` handlers.
        let _ = self.faults.push(fault);
    }
}

/// A capability to deliver to a handler's mailbox.
#[derive(Clone)]
pub struct HandlerHandle {
    id: HandlerId,
    mailbox: Weak<dyn Mailbox>,
}

impl HandlerHandle {
    /// Create a handle for `mailbox`. The handle does not keep the
    /// mailbox alive.
    pub fn new<M: Mailbox + 'static>(mailbox: &Arc<M>) -> Self {
        let mailbox: Arc<dyn Mailbox> = mailbox.clone();
        let id = HandlerId(NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed));
        Self { id, mailbox: Arc::downgrade(&mailbox) }
    }

    pub fn id(&self) -> HandlerId {
        self.id
    }

    pub fn is_live(&self) -> bool {
        self.mailbox.strong_count() > 0
    }

    fn deliver(&self, dgram: &Datagram, report: &mut DeliveryReport) {
        let Some(mailbox) = self.mailbox.upgrade() else {
            report.fault(DeliveryFault::HandlerGone(self.id));
            return;
        };

        match mailbox.try_send(dgram.clone()) {
            Ok(()) => report.delivered += 1,
            Err(SendError::Full) => {
                report.fault(DeliveryFault::QueueFull(self.id))
            }
            Err(SendError::Closed) => {
                report.fault(DeliveryFault::HandlerGone(self.id))
            }
        }
    }
}

impl fmt::Debug for HandlerHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("HandlerHandle")
            .field("id", &self.id)
            .field("live", &self.is_live())
            .finish()
    }
}

impl PartialEq for HandlerHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for HandlerHandle {}

/// The handlers a single datagram is to be delivered to, taken from
/// the registry so that delivery happens without holding its lock.
#[derive(Debug, Default)]
pub struct Delivery {
    observers: BoundedVec<HandlerHandle, SIXLOWIP_MAX_REGISTERED>,
    bound: Option<HandlerHandle>,
    rpl: Option<HandlerHandle>,
    unsupported: Option<u8>,
}

impl Delivery {
    /// Deliver `dgram`: every observer in registration order, then the
    /// next-header binding, then the RPL handler.
    pub fn run(self, dgram: &Datagram) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        for obs in &self.observers {
            obs.deliver(dgram, &mut report);
        }

        match (&self.bound, self.unsupported) {
            (Some(h), _) => h.deliver(dgram, &mut report),
            (None, Some(nh)) => {
                report.fault(DeliveryFault::UnsupportedProtocol(nh))
            }
            (None, None) => {}
        }

        if let Some(rpl) = &self.rpl {
            rpl.deliver(dgram, &mut report);
        }

        report
    }
}

#[derive(Debug, Default)]
pub struct HandlerRegistry {
    observers: BoundedVec<HandlerHandle, SIXLOWIP_MAX_REGISTERED>,
    next_header: BTreeMap<u8, HandlerHandle>,
    rpl: Option<HandlerHandle>,
}

impl HandlerRegistry {
    pub const OBSERVERS: &'static str = "packet observer list";

    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer of every locally delivered datagram.
    /// Registering the same handle twice is a no-op.
    ///
    /// # Errors
    ///
    /// [`Error::Capacity`] if [`SIXLOWIP_MAX_REGISTERED`] observers are
    /// already registered.
    pub fn register_packet_handler(
        &mut self,
        handle: HandlerHandle,
    ) -> Result<()> {
        if self.observers.contains(&handle) {
            return Ok(());
        }

        self.observers.push(handle).map_err(|_| Error::Capacity {
            table: Self::OBSERVERS,
            limit: SIXLOWIP_MAX_REGISTERED,
        })
    }

    /// Bind `handle` to `next_header`, returning the handle it
    /// replaces.
    pub fn register_next_header_handler(
        &mut self,
        next_header: u8,
        handle: HandlerHandle,
    ) -> Option<HandlerHandle> {
        self.next_header.insert(next_header, handle)
    }

    pub fn unregister_next_header_handler(
        &mut self,
        next_header: u8,
    ) -> Option<HandlerHandle> {
        self.next_header.remove(&next_header)
    }

    /// Set the RPL handler, returning the handle it replaces.
    pub fn register_rpl_handler(
        &mut self,
        handle: HandlerHandle,
    ) -> Option<HandlerHandle> {
        self.rpl.replace(handle)
    }

    /// The total number of registrations of every kind.
    pub fn handler_count(&self) -> usize {
        self.observers.len()
            + self.next_header.len()
            + usize::from(self.rpl.is_some())
    }

    /// Work out who a datagram with Next Header `next_header` goes to.
    pub fn delivery(&self, next_header: u8, rpl_control: bool) -> Delivery {
        let bound = self.next_header.get(&next_header).cloned();
        let unsupported = (bound.is_none() && next_header != PROTO_NONE)
            .then_some(next_header);

        Delivery {
            observers: self.observers.clone(),
            bound,
            rpl: if rpl_control { self.rpl.clone() } else { None },
            unsupported,
        }
    }

    pub fn dump(&self) -> DumpHandlersResp {
        let mut handlers = Vec::with_capacity(self.handler_count());
        let mut push = |h: &HandlerHandle, slot| {
            handlers.push(HandlerDump { id: h.id, slot, live: h.is_live() })
        };

        for h in &self.observers {
            push(h, HandlerSlot::Observer);
        }
        for (nh, h) in &self.next_header {
            push(h, HandlerSlot::NextHeader(*nh));
        }
        if let Some(h) = &self.rpl {
            push(h, HandlerSlot::Rpl);
        }

        DumpHandlersResp { handlers }
    }
}

/// A fixed-capacity mailbox.
///
/// This is the reference [`Mailbox`]: a handler thread owns the
/// `Arc<BoundedMailbox<N>>`, registers a [`HandlerHandle`] made from
/// it, and drains it with [`BoundedMailbox::recv()`].
pub struct BoundedMailbox<const N: usize> {
    queue: KMutex<Deque<Datagram, N>>,
}

impl<const N: usize> BoundedMailbox<N> {
    pub fn new() -> Self {
        Self { queue: KMutex::new(Deque::new()) }
    }

    pub fn recv(&self) -> Option<Datagram> {
        self.queue.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

impl<const N: usize> Default for BoundedMailbox<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Mailbox for BoundedMailbox<N> {
    fn try_send(&self, dgram: Datagram) -> core::result::Result<(), SendError> {
        self.queue.lock().push_back(dgram).map_err(|_| SendError::Full)
    }
}
