// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Print stack state in a human-friendly manner.
//!
//! Each table has a `print_*` routine writing to stdout and a
//! `print_*_into` routine writing to any [`Write`], which is what the
//! integration tests use.

use crate::api::DumpHandlersResp;
use sixlo_api::DumpAddrsResp;
use sixlo_api::DumpContextsResp;
use sixlo_api::IPV6_MAX_ADDR_STR_LEN;
use sixlo_api::Ipv6Addr;
use std::io::Write;
use tabwriter::TabWriter;

/// Print a [`DumpAddrsResp`].
pub fn print_addrs(resp: &DumpAddrsResp) -> std::io::Result<()> {
    print_addrs_into(&mut std::io::stdout(), resp)
}

/// Print a [`DumpAddrsResp`].
pub fn print_addrs_into(
    writer: &mut impl Write,
    resp: &DumpAddrsResp,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);

    writeln!(t, "Interface Addresses ({}/{})", resp.addrs.len(), resp.limit)?;
    write_hrb(&mut t)?;
    writeln!(t, "ADDRESS\tTYPE\tSTATE\tVALID\tPREFERRED\tAGE")?;
    for a in &resp.addrs {
        writeln!(
            t,
            "{}\t{}\t{}\t{}\t{}\t{}ms",
            full(a.addr),
            a.ty,
            a.state,
            a.valid,
            a.preferred,
            a.age_ms,
        )?;
    }
    writeln!(t)?;
    t.flush()
}

/// Print a [`DumpHandlersResp`].
pub fn print_handlers(resp: &DumpHandlersResp) -> std::io::Result<()> {
    print_handlers_into(&mut std::io::stdout(), resp)
}

/// Print a [`DumpHandlersResp`].
pub fn print_handlers_into(
    writer: &mut impl Write,
    resp: &DumpHandlersResp,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);

    writeln!(t, "Protocol Handlers")?;
    write_hrb(&mut t)?;
    writeln!(t, "ID\tSLOT\tLIVE")?;
    for h in &resp.handlers {
        let live = if h.live { "yes" } else { "GONE" };
        writeln!(t, "{}\t{}\t{live}", h.id, h.slot)?;
    }
    writeln!(t)?;
    t.flush()
}

/// Print a [`DumpContextsResp`].
pub fn print_contexts(resp: &DumpContextsResp) -> std::io::Result<()> {
    print_contexts_into(&mut std::io::stdout(), resp)
}

/// Print a [`DumpContextsResp`].
pub fn print_contexts_into(
    writer: &mut impl Write,
    resp: &DumpContextsResp,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);

    writeln!(t, "6LoWPAN Contexts")?;
    write_hrb(&mut t)?;
    writeln!(t, "CID\tPREFIX\tCOMP\tLIFETIME")?;
    for c in &resp.contexts {
        writeln!(
            t,
            "{}\t{}/{}\t{}\t{}min",
            c.num,
            full(c.prefix),
            c.length,
            c.comp,
            c.lifetime,
        )?;
    }
    writeln!(t)?;
    t.flush()
}

fn full(addr: Ipv6Addr) -> String {
    let mut buf = [0u8; IPV6_MAX_ADDR_STR_LEN];
    addr.write_full(&mut buf).map(String::from).unwrap_or_default()
}

/// Output a horizontal rule in bold to the given writer.
pub fn write_hrb(t: &mut impl Write) -> std::io::Result<()> {
    writeln!(t, "{:=<70}", "=")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::HandlerDump;
    use crate::api::HandlerId;
    use crate::api::HandlerSlot;
    use sixlo_api::AddrState;
    use sixlo_api::AddrType;
    use sixlo_api::IfaceAddrDump;
    use sixlo_api::Lifetime;
    use sixlo_api::LowpanContextDump;

    fn render(f: impl FnOnce(&mut Vec<u8>) -> std::io::Result<()>) -> String {
        let mut out = Vec::new();
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn addrs_table() {
        let resp = DumpAddrsResp {
            limit: 10,
            addrs: vec![IfaceAddrDump {
                addr: "fe80::1".parse().unwrap(),
                ty: AddrType::UnicastAuto,
                state: AddrState::Preferred,
                valid: Lifetime::Infinite,
                preferred: Lifetime::Finite(30),
                age_ms: 12,
            }],
        };
        let out = render(|w| print_addrs_into(w, &resp));
        assert!(out.starts_with("Interface Addresses (1/10)\n"));
        let row = out.lines().nth(3).unwrap();
        let cols: Vec<&str> = row.split_whitespace().collect();
        assert_eq!(
            cols,
            [
                "fe80:0:0:0:0:0:0:1",
                "auto",
                "PREFERRED",
                "forever",
                "30s",
                "12ms",
            ]
        );
    }

    #[test]
    fn handlers_and_contexts() {
        let handlers = DumpHandlersResp {
            handlers: vec![
                HandlerDump {
                    id: HandlerId(3),
                    slot: HandlerSlot::Observer,
                    live: true,
                },
                HandlerDump {
                    id: HandlerId(4),
                    slot: HandlerSlot::Rpl,
                    live: false,
                },
            ],
        };
        let out = render(|w| print_handlers_into(w, &handlers));
        assert!(out.contains("h3"));
        assert!(
            out.lines().any(|l| l.starts_with("h4") && l.ends_with("GONE"))
        );

        let contexts = DumpContextsResp {
            contexts: vec![LowpanContextDump {
                num: 1,
                prefix: "fd00::".parse().unwrap(),
                length: 64,
                comp: true,
                lifetime: 9,
            }],
        };
        let out = render(|w| print_contexts_into(w, &contexts));
        assert!(out.contains("fd00:0:0:0:0:0:0:0/64"));
        assert!(out.contains("9min"));
    }
}
