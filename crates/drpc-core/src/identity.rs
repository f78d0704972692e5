// Copyright 2026 The dRPC Project
//
// Redistribution and use in source and binary forms, with or without modification, are permitted provided that the
// following conditions are met:
//
// 1. Redistributions of source code must retain the above copyright notice, this list of conditions and the following
// disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright notice, this list of conditions and the
// following disclaimer in the documentation and/or other materials provided with the distribution.
//
// 3. Neither the name of the copyright holder nor the names of its contributors may be used to endorse or promote
// products derived from this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES,
// INCLUDING, BUT NOT LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
// DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
// SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY,
// WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE
// USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

//! Peer identity and addressing types.
//!
//! `PeerId` and `Multiaddr` are not reinvented here: they are the same types
//! `libp2p` already provides (opaque, comparable, derived from a public key
//! for `PeerId`; an ordered sequence of typed components for `Multiaddr`).
//! Re-exporting them under `drpc_core::identity` keeps the rest of the
//! workspace from depending on `libp2p` directly for the data model alone.

use std::fmt;

pub use libp2p::core::multiaddr::Protocol as MultiaddrProtocol;
pub use libp2p::{Multiaddr, PeerId};

use crate::error::DrpcError;

/// A libp2p protocol identifier, e.g. `/drpc-webstream/1.0.0`.
///
/// libp2p's own `StreamProtocol` requires a `'static` string; our protocol
/// ids are always compile-time constants, so we keep the same restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamProtocol(&'static str);

impl StreamProtocol {
    pub const fn new(name: &'static str) -> Self {
        StreamProtocol(name)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for StreamProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// The core peer protocol identifier. Opaque; must match exactly on both peers.
pub const DRPC_WEBSTREAM_PROTOCOL: StreamProtocol = StreamProtocol::new("/drpc-webstream/1.0.0");

/// Result of resolving a discoverer input string.
pub struct ParsedTarget {
    pub peer_id: PeerId,
    /// Present only when the original input was a multi-address (as opposed
    /// to a bare peer id).
    pub multiaddr: Option<Multiaddr>,
}

/// Parse a discoverer input: a bare peer id, or a multi-address with an
/// embedded `/p2p/<peer-id>` component.
///
/// Per spec §4.E "Input resolution": try bare peer id first, then fall back
/// to multi-address parsing. Failure of both is a user error
/// (`InvalidArgument`).
pub fn parse_target(input: &str) -> Result<ParsedTarget, DrpcError> {
    let trimmed = input.trim();
    if let Ok(peer_id) = trimmed.parse::<PeerId>() {
        return Ok(ParsedTarget {
            peer_id,
            multiaddr: None,
        });
    }

    let addr: Multiaddr = trimmed
        .parse()
        .map_err(|_| DrpcError::invalid_argument(format!("not a peer id or multi-address: {trimmed}")))?;
    let peer_id = peer_id_of(&addr)
        .ok_or_else(|| DrpcError::invalid_argument(format!("multi-address has no embedded peer id: {trimmed}")))?;
    Ok(ParsedTarget {
        peer_id,
        multiaddr: Some(addr),
    })
}

/// Split a comma-separated bundle of multi-addresses (spec §4.E point 3 of
/// "Input resolution"). Each entry is parsed independently; a bundle is
/// considered a multi-address input as a whole, so the peer id is taken from
/// whichever entry carries one.
pub fn parse_target_bundle(input: &str) -> Result<ParsedTarget, DrpcError> {
    let mut peer_id = None;
    let mut first_addr = None;
    for part in input.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let addr: Multiaddr = part
            .parse()
            .map_err(|_| DrpcError::invalid_argument(format!("invalid multi-address: {part}")))?;
        if let Some(pid) = peer_id_of(&addr) {
            peer_id.get_or_insert(pid);
        }
        first_addr.get_or_insert_with(|| addr.clone());
    }
    let peer_id = peer_id.ok_or_else(|| DrpcError::invalid_argument("no embedded peer id in address bundle"))?;
    Ok(ParsedTarget {
        peer_id,
        multiaddr: first_addr,
    })
}

/// Extract the trailing `/p2p/<peer-id>` component, if any. For a
/// circuit-relay address (`.../p2p/<relayId>/p2p-circuit/p2p/<targetId>`)
/// this is the last `/p2p/` component — the target, not the relay.
pub fn peer_id_of(addr: &Multiaddr) -> Option<PeerId> {
    addr.iter()
        .filter_map(|proto| match proto {
            MultiaddrProtocol::P2p(peer_id) => Some(peer_id),
            _ => None,
        })
        .last()
}

/// Whether the address routes through a multi-hop circuit relay
/// (`/p2p-circuit/`).
pub fn is_circuit_relay(addr: &Multiaddr) -> bool {
    addr.iter().any(|p| matches!(p, MultiaddrProtocol::P2pCircuit))
}

/// Whether the address resolves to a loopback endpoint (`127.0.0.1`, `::1`).
/// Used to prefer local candidates when sorting (spec §4.E strategy 3 and
/// §4.G `/p2pinfo` address selection).
pub fn is_loopback(addr: &Multiaddr) -> bool {
    addr.iter().any(|p| match p {
        MultiaddrProtocol::Ip4(ip) => ip.is_loopback(),
        MultiaddrProtocol::Ip6(ip) => ip.is_loopback(),
        _ => false,
    })
}
