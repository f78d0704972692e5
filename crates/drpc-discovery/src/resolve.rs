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

//! Ordered multi-strategy peer-path discovery (spec §4.E), grounded on
//! `comms/core`'s connectivity-manager mock: a single-threaded strategy loop
//! fed by a peer-store read and an event subscription, the way the teacher's
//! mock is driven by a `broadcast` event channel plus request channel.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use drpc_core::identity::{is_circuit_relay, is_loopback, parse_target, parse_target_bundle, MultiaddrProtocol};
use drpc_core::shutdown::ShutdownSignal;
use drpc_core::{DiscoveredPeer, DrpcError, Host, Multiaddr, PeerId};
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, instrument, warn};

use crate::config::DiscoveryConfig;

/// Which of the five ordered strategies produced a reachable path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiscoveryMethod {
    AlreadyConnected,
    DirectMultiaddr,
    DiscoveredAddress,
    DirectPeerId,
    AmbientDiscovery,
}

impl DiscoveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyConnected => "already-connected",
            Self::DirectMultiaddr => "direct-multiaddr",
            Self::DiscoveredAddress => "discovered-address",
            Self::DirectPeerId => "direct-peer-id",
            Self::AmbientDiscovery => "ambient-discovery",
        }
    }
}

/// Outcome of [`resolve`]. Per spec §4.E, errors are always soft: the only
/// hard error `resolve` itself returns is an unparseable input.
#[derive(Debug, Clone)]
pub struct DiscoveryResult {
    pub success: bool,
    pub method: Option<DiscoveryMethod>,
    pub peer_id: PeerId,
    pub multiaddr: Option<Multiaddr>,
    pub total_time: Duration,
    pub error: Option<String>,
}

struct Success {
    method: DiscoveryMethod,
    multiaddr: Option<Multiaddr>,
}

fn parse_input(input: &str) -> Result<drpc_core::identity::ParsedTarget, DrpcError> {
    if input.contains(',') {
        parse_target_bundle(input)
    } else {
        parse_target(input)
    }
}

fn encapsulate(addr: &Multiaddr, peer_id: PeerId) -> Multiaddr {
    if drpc_core::identity::peer_id_of(addr).is_some() {
        addr.clone()
    } else {
        addr.clone().with(MultiaddrProtocol::P2p(peer_id))
    }
}

async fn attempt_dial(host: &dyn Host, peer: PeerId, addr: Option<Multiaddr>, dial_timeout: Duration) -> bool {
    matches!(tokio::time::timeout(dial_timeout, host.dial(peer, addr)).await, Ok(Ok(_)))
}

/// Strategy 1: already connected, zero-cost.
fn try_already_connected(host: &dyn Host, peer: PeerId) -> Option<Success> {
    let link = host.connected_link(&peer)?;
    if link.is_closed() {
        return None;
    }
    Some(Success {
        method: DiscoveryMethod::AlreadyConnected,
        multiaddr: link.remote_address(),
    })
}

/// Strategy 2: the original input was itself a dialable, non-relay
/// multi-address.
async fn try_direct_multiaddr(host: &dyn Host, peer: PeerId, addr: &Multiaddr, dial_timeout: Duration) -> Option<Success> {
    if is_circuit_relay(addr) || !host.is_dialable(addr) {
        return None;
    }
    attempt_dial(host, peer, Some(addr.clone()), dial_timeout)
        .await
        .then_some(Success {
            method: DiscoveryMethod::DirectMultiaddr,
            multiaddr: Some(addr.clone()),
        })
}

/// Strategy 3: addresses already on record in the host's peer store, dialed
/// in parallel with loopback candidates preferred.
async fn try_discovered_address(host: &dyn Host, peer: PeerId, dial_timeout: Duration, attempted: &mut HashSet<Multiaddr>) -> Option<Success> {
    let mut candidates: Vec<Multiaddr> = host
        .peer_store()
        .addresses_of(&peer)
        .await
        .into_iter()
        .map(|addr| encapsulate(&addr, peer))
        .filter(|addr| attempted.insert(addr.clone()))
        .collect();
    if candidates.is_empty() {
        return None;
    }
    candidates.sort_by_key(|addr| !is_loopback(addr));

    let mut dials = FuturesUnordered::new();
    for addr in candidates {
        let host_ref = host;
        dials.push(async move {
            let ok = attempt_dial(host_ref, peer, Some(addr.clone()), dial_timeout).await;
            (ok, addr)
        });
    }

    while let Some((ok, addr)) = dials.next().await {
        if ok {
            return Some(Success {
                method: DiscoveryMethod::DiscoveredAddress,
                multiaddr: Some(addr),
            });
        }
    }
    None
}

/// Strategy 4: dial the bare peer id and let the host's own ambient
/// discovery (DHT/mDNS/relay) resolve an address.
async fn try_direct_peer_id(host: &dyn Host, peer: PeerId, dial_timeout: Duration) -> Option<Success> {
    attempt_dial(host, peer, None, dial_timeout).await.then_some(Success {
        method: DiscoveryMethod::DirectPeerId,
        multiaddr: None,
    })
}

/// Run strategies 1-4 in order, returning the first success (spec §4.E
/// "Ordered strategy set").
async fn try_direct_strategies(
    host: &dyn Host,
    peer: PeerId,
    original_addr: Option<&Multiaddr>,
    dial_timeout: Duration,
    attempted: &mut HashSet<Multiaddr>,
) -> Option<Success> {
    if let Some(success) = try_already_connected(host, peer) {
        return Some(success);
    }
    if let Some(addr) = original_addr {
        if let Some(success) = try_direct_multiaddr(host, peer, addr, dial_timeout).await {
            return Some(success);
        }
    }
    if let Some(success) = try_discovered_address(host, peer, dial_timeout, attempted).await {
        return Some(success);
    }
    try_direct_peer_id(host, peer, dial_timeout).await
}

/// Resolves when `signal` is triggered; never resolves if there is none, so
/// it can sit as an extra `tokio::select!` arm unconditionally.
async fn wait_for_cancellation(signal: &mut Option<ShutdownSignal>) {
    match signal {
        Some(signal) => signal.wait().await,
        None => futures::future::pending().await,
    }
}

/// Strategy 5: subscribe to the host's ambient discovery events and re-run
/// strategies 1-4 on every matching event, polling on `connect_interval` in
/// between (spec §4.E "Ambient discovery loop"). Returns `None` if `signal`
/// is triggered first; per spec §5, cancellation unsubscribes from the
/// event stream and clears the ticker before resolving — both happen here
/// for free, since returning drops `events` and `ticker` immediately.
async fn try_ambient_discovery(
    host: &dyn Host,
    peer: PeerId,
    original_addr: Option<&Multiaddr>,
    config: &DiscoveryConfig,
    attempted: &mut HashSet<Multiaddr>,
    signal: &mut Option<ShutdownSignal>,
) -> Option<Success> {
    let mut events = host.subscribe_discovered();
    let mut ticker = tokio::time::interval(config.connect_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await; // first tick fires immediately; consume it

    loop {
        tokio::select! {
            _ = wait_for_cancellation(signal) => {
                return None;
            }
            event = events.recv() => {
                let Ok(DiscoveredPeer { peer_id, addresses }) = event else { continue };
                if peer_id == peer {
                    host.peer_store().add_addresses(&peer, addresses).await;
                    if let Some(success) = try_direct_strategies(host, peer, original_addr, config.dial_timeout(), attempted).await {
                        return Some(success);
                    }
                } else {
                    // Best-effort relay candidate; failure is silently ignored.
                    let addr = addresses.first().cloned();
                    let _ = tokio::time::timeout(config.dial_timeout(), host.dial(peer_id, addr)).await;
                }
            }
            _ = ticker.tick() => {
                debug!(peer = %peer, "ambient discovery poll");
                if let Some(success) = try_direct_strategies(host, peer, original_addr, config.dial_timeout(), attempted).await {
                    return Some(success);
                }
            }
        }
    }
}

/// Resolve a reachable path to `input` — a bare peer id, a single
/// multi-address with an embedded peer id, or a comma-separated bundle of
/// multi-addresses (spec §4.E "Responsibilities"). The only hard error is an
/// unparseable input or `signal` being triggered; every other failure mode
/// is reported inside the returned [`DiscoveryResult`] (spec §5: "every
/// public operation takes a cancellation signal").
#[instrument(skip(host, config, signal), fields(input = %input))]
pub async fn resolve(host: Arc<dyn Host>, input: &str, config: DiscoveryConfig, mut signal: Option<ShutdownSignal>) -> Result<DiscoveryResult, DrpcError> {
    if signal.as_ref().is_some_and(ShutdownSignal::is_triggered) {
        return Err(DrpcError::Cancelled);
    }

    let target = parse_input(input)?;
    let started = Instant::now();
    let mut attempted = HashSet::new();

    let direct = try_direct_strategies(host.as_ref(), target.peer_id, target.multiaddr.as_ref(), config.dial_timeout(), &mut attempted).await;

    let success = match direct {
        Some(success) => Some(success),
        None => {
            match tokio::time::timeout(
                config.timeout(),
                try_ambient_discovery(host.as_ref(), target.peer_id, target.multiaddr.as_ref(), &config, &mut attempted, &mut signal),
            )
            .await
            {
                Ok(Some(success)) => Some(success),
                Ok(None) => return Err(DrpcError::Cancelled),
                Err(_) => {
                    warn!(peer = %target.peer_id, "discovery timed out");
                    None
                }
            }
        }
    };

    let total_time = started.elapsed();
    Ok(match success {
        Some(success) => DiscoveryResult {
            success: true,
            method: Some(success.method),
            peer_id: target.peer_id,
            multiaddr: success.multiaddr,
            total_time,
            error: None,
        },
        None => DiscoveryResult {
            success: false,
            method: None,
            peer_id: target.peer_id,
            multiaddr: None,
            total_time,
            error: Some(format!("could not resolve a reachable path to {}", target.peer_id)),
        },
    })
}
