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

//! Conversions between multi-addresses and classical network addresses.
//!
//! Per spec §4.A, conversion failures must not be surfaced as errors to
//! callers that only log an address: they fall back to `127.0.0.1:0`.

use std::net::{IpAddr, SocketAddr};

use libp2p::core::multiaddr::Protocol;

use crate::identity::Multiaddr;

/// The address reported when a multi-address cannot be expressed as a
/// classical socket address (spec §4.A, §4.B).
pub const FALLBACK_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(std::net::Ipv4Addr::LOCALHOST), 0);

/// Best-effort conversion of a multi-address's leading IP+transport-port
/// components to a `SocketAddr`. Never fails: falls back to
/// [`FALLBACK_ADDR`].
pub fn to_socket_addr(addr: &Multiaddr) -> SocketAddr {
    try_to_socket_addr(addr).unwrap_or(FALLBACK_ADDR)
}

fn try_to_socket_addr(addr: &Multiaddr) -> Option<SocketAddr> {
    let mut ip = None;
    let mut port = None;
    for proto in addr.iter() {
        match proto {
            Protocol::Ip4(v4) => ip = Some(IpAddr::V4(v4)),
            Protocol::Ip6(v6) => ip = Some(IpAddr::V6(v6)),
            Protocol::Tcp(p) | Protocol::Udp(p) => port = Some(p),
            _ => {}
        }
        if ip.is_some() && port.is_some() {
            break;
        }
    }
    Some(SocketAddr::new(ip?, port?))
}

/// Select the first entry among candidate multi-addresses that converts
/// cleanly to a socket address, falling back to [`FALLBACK_ADDR`] — used by
/// the listener adapter (§4.B) to report a local address.
pub fn first_translatable_or_fallback<'a>(addrs: impl IntoIterator<Item = &'a Multiaddr>) -> SocketAddr {
    addrs
        .into_iter()
        .find_map(try_to_socket_addr)
        .unwrap_or(FALLBACK_ADDR)
}
