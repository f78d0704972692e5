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

//! The `Host` / `Link` / `PeerStore` trait boundary.
//!
//! Everything on the other side of these traits — the actual libp2p swarm,
//! its noise/yamux/relay/quic transports, and its mDNS/DHT/pubsub discovery
//! behaviours — is an external collaborator per spec §1/§2. The rest of this
//! workspace (pool, discoverer, bridge, transports, gateway) is written
//! entirely against this boundary, the same way `comms/core`'s
//! `ConnectionManagerRequester`/mock split lets the rest of `tari_comms` stay
//! decoupled from the concrete transport.

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use crate::error::DrpcError;
use crate::identity::{Multiaddr, PeerId, StreamProtocol};
use crate::stream::PeerStream;

/// A peer discovered by the host's ambient discovery machinery (mDNS/DHT/
/// pubsub), surfaced to the discoverer's strategy 5 (spec §4.E).
#[derive(Debug, Clone)]
pub struct DiscoveredPeer {
    pub peer_id: PeerId,
    pub addresses: Vec<Multiaddr>,
}

/// One inbound stream accepted for a registered protocol (spec §4.B).
pub struct InboundStream {
    pub peer_id: PeerId,
    pub stream: PeerStream,
}

/// A live, authenticated, multiplexed connection to one peer (spec §3
/// "Peer link"). Dropping the last handle does not necessarily close the
/// underlying connection — `close` is explicit, matching the teacher's
/// `PeerConnection` (closing happens on request or on disconnect detection,
/// not on `Drop`).
#[async_trait]
pub trait Link: Send + Sync {
    fn remote_peer_id(&self) -> PeerId;

    fn remote_address(&self) -> Option<Multiaddr>;

    fn is_closed(&self) -> bool;

    async fn open_stream(&self, protocol: StreamProtocol) -> Result<PeerStream, DrpcError>;

    async fn close(&self);
}

/// Read access to the host's peer address book (spec §3 "ownership", §4.E
/// strategy 3). Mutations made by one discovery strategy must be visible to
/// later strategies within the same call and across calls.
#[async_trait]
pub trait PeerStore: Send + Sync {
    async fn addresses_of(&self, peer: &PeerId) -> Vec<Multiaddr>;

    async fn add_addresses(&self, peer: &PeerId, addresses: Vec<Multiaddr>);
}

/// The full host abstraction: identity, dialing, protocol registration, peer
/// store access, and ambient discovery events.
#[async_trait]
pub trait Host: Send + Sync {
    fn local_peer_id(&self) -> PeerId;

    fn listen_addresses(&self) -> Vec<Multiaddr>;

    /// An existing connection to `peer`, if any (spec §4.E strategy 1,
    /// "already-connected").
    fn connected_link(&self, peer: &PeerId) -> Option<std::sync::Arc<dyn Link>>;

    /// Whether the host's registered transports could plausibly dial this
    /// address at all (cheap structural/transport check, not a live probe).
    fn is_dialable(&self, addr: &Multiaddr) -> bool;

    /// Dial a peer, optionally at a specific address. A successful dial
    /// yields a `Link` whether or not one already existed; repeated dials to
    /// an already-connected peer are expected to reuse the connection
    /// transparently the way libp2p's own swarm does.
    async fn dial(&self, peer: PeerId, addr: Option<Multiaddr>) -> Result<std::sync::Arc<dyn Link>, DrpcError>;

    /// Convenience combining `connected_link`/`dial`/`open_stream`, used by
    /// the connection pool (spec §4.D "Get" algorithm: "dial a fresh stream
    /// via the host with the requested protocol").
    async fn new_stream(&self, peer: PeerId, protocol: StreamProtocol) -> Result<PeerStream, DrpcError> {
        let link = match self.connected_link(&peer) {
            Some(link) if !link.is_closed() => link,
            _ => self.dial(peer, None).await?,
        };
        link.open_stream(protocol).await
    }

    fn peer_store(&self) -> std::sync::Arc<dyn PeerStore>;

    /// Register a handler for protocol `P` (spec §4.B). Each inbound stream
    /// for `P` is pushed on a buffered-length-1 channel; the caller's
    /// listener adapter wraps the receiver half.
    fn register_protocol(&self, protocol: StreamProtocol) -> mpsc::Receiver<InboundStream>;

    /// Subscribe to the host's "peer discovered" event stream (spec §4.E
    /// strategy 5). Each subscriber gets its own receiver; dropping it
    /// unsubscribes.
    fn subscribe_discovered(&self) -> broadcast::Receiver<DiscoveredPeer>;
}
