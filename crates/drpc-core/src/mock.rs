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

//! An in-memory `Host` for tests, grounded on `comms/core`'s
//! `ConnectionManagerMock`/`ConnectivityManagerMock` pattern: shared state
//! behind an `Arc`, a call log callers can inspect, and explicit wiring
//! between peers instead of a real transport.
//!
//! Enabled by the `test-support` feature; every downstream crate's
//! `dev-dependencies` turns it on.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};

use crate::error::DrpcError;
use crate::host::{DiscoveredPeer, Host, InboundStream, Link, PeerStore};
use crate::identity::{Multiaddr, PeerId, StreamProtocol};
use crate::stream::{PeerStream, StreamDirection};

struct Inner {
    peer_id: PeerId,
    listen_addrs: Vec<Multiaddr>,
    peer_store: Arc<MockPeerStore>,
    protocol_senders: Mutex<HashMap<&'static str, mpsc::Sender<InboundStream>>>,
    discovered_tx: broadcast::Sender<DiscoveredPeer>,
}

/// A host with no real networking: dialing only succeeds between hosts that
/// have been explicitly wired together with [`MockHost::connect`].
pub struct MockHost {
    inner: Arc<Inner>,
    links: Mutex<HashMap<PeerId, Arc<MockLink>>>,
    reachable: Mutex<HashMap<PeerId, Arc<Inner>>>,
    dial_failures: Mutex<HashSet<PeerId>>,
    dial_log: Mutex<Vec<PeerId>>,
}

impl MockHost {
    pub fn new(peer_id: PeerId) -> Arc<Self> {
        Self::with_listen_addrs(peer_id, Vec::new())
    }

    pub fn with_listen_addrs(peer_id: PeerId, listen_addrs: Vec<Multiaddr>) -> Arc<Self> {
        let (discovered_tx, _) = broadcast::channel(32);
        Arc::new(Self {
            inner: Arc::new(Inner {
                peer_id,
                listen_addrs,
                peer_store: Arc::new(MockPeerStore::default()),
                protocol_senders: Mutex::new(HashMap::new()),
                discovered_tx,
            }),
            links: Mutex::new(HashMap::new()),
            reachable: Mutex::new(HashMap::new()),
            dial_failures: Mutex::new(HashSet::new()),
            dial_log: Mutex::new(Vec::new()),
        })
    }

    /// Make `self` and `other` mutually dialable, as if a real transport
    /// connected them. Does not itself create a `Link`; `dial` still has to
    /// be called (or `connected_link` checked) the normal way.
    pub fn connect(self: &Arc<Self>, other: &Arc<Self>) {
        self.reachable.lock().insert(other.inner.peer_id, other.inner.clone());
        other.reachable.lock().insert(self.inner.peer_id, self.inner.clone());
    }

    /// Simulate every dial to `peer` failing until this is undone.
    pub fn fail_dials_to(&self, peer: PeerId) {
        self.dial_failures.lock().insert(peer);
    }

    pub fn allow_dials_to(&self, peer: PeerId) {
        self.dial_failures.lock().remove(&peer);
    }

    pub fn dial_count(&self) -> usize {
        self.dial_log.lock().len()
    }

    pub fn publish_discovered(&self, peer: DiscoveredPeer) {
        let _ = self.inner.discovered_tx.send(peer);
    }

    /// Drop the link to `peer`, as a real connection dropping would (used to
    /// simulate mid-test disconnects).
    pub fn disconnect(&self, peer: &PeerId) {
        self.links.lock().remove(peer);
    }
}

#[async_trait]
impl Host for MockHost {
    fn local_peer_id(&self) -> PeerId {
        self.inner.peer_id
    }

    fn listen_addresses(&self) -> Vec<Multiaddr> {
        self.inner.listen_addrs.clone()
    }

    fn connected_link(&self, peer: &PeerId) -> Option<Arc<dyn Link>> {
        self.links
            .lock()
            .get(peer)
            .filter(|link| !link.is_closed())
            .map(|link| link.clone() as Arc<dyn Link>)
    }

    fn is_dialable(&self, _addr: &Multiaddr) -> bool {
        true
    }

    async fn dial(&self, peer: PeerId, _addr: Option<Multiaddr>) -> Result<Arc<dyn Link>, DrpcError> {
        self.dial_log.lock().push(peer);

        if self.dial_failures.lock().contains(&peer) {
            return Err(DrpcError::unavailable(format!("simulated dial failure to {peer}")));
        }

        if let Some(link) = self.connected_link(&peer) {
            return Ok(link);
        }

        let remote = self
            .reachable
            .lock()
            .get(&peer)
            .cloned()
            .ok_or_else(|| DrpcError::unavailable(format!("no route to peer {peer}")))?;

        let link = Arc::new(MockLink {
            local_peer_id: self.inner.peer_id,
            remote,
            closed: AtomicBool::new(false),
        });
        self.links.lock().insert(peer, link.clone());
        Ok(link)
    }

    fn peer_store(&self) -> Arc<dyn PeerStore> {
        self.inner.peer_store.clone()
    }

    fn register_protocol(&self, protocol: StreamProtocol) -> mpsc::Receiver<InboundStream> {
        let (tx, rx) = mpsc::channel(1);
        self.inner.protocol_senders.lock().insert(protocol.as_str(), tx);
        rx
    }

    fn subscribe_discovered(&self) -> broadcast::Receiver<DiscoveredPeer> {
        self.inner.discovered_tx.subscribe()
    }
}

struct MockLink {
    local_peer_id: PeerId,
    remote: Arc<Inner>,
    closed: AtomicBool,
}

#[async_trait]
impl Link for MockLink {
    fn remote_peer_id(&self) -> PeerId {
        self.remote.peer_id
    }

    fn remote_address(&self) -> Option<Multiaddr> {
        self.remote.listen_addrs.first().cloned()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    async fn open_stream(&self, protocol: StreamProtocol) -> Result<PeerStream, DrpcError> {
        if self.is_closed() {
            return Err(DrpcError::unavailable("link is closed"));
        }

        let sender = self
            .remote
            .protocol_senders
            .lock()
            .get(protocol.as_str())
            .cloned()
            .ok_or_else(|| DrpcError::unavailable(format!("peer does not support protocol {protocol}")))?;

        let (ours, theirs) = tokio::io::duplex(64 * 1024);
        let inbound = InboundStream {
            peer_id: self.local_peer_id,
            stream: PeerStream::new(Box::pin(theirs), StreamDirection::Inbound, self.local_peer_id, None, None),
        };
        sender
            .send(inbound)
            .await
            .map_err(|_| DrpcError::unavailable("peer protocol listener is closed"))?;

        Ok(PeerStream::new(
            Box::pin(ours),
            StreamDirection::Outbound,
            self.remote.peer_id,
            self.remote.listen_addrs.first().cloned(),
            None,
        ))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

#[derive(Default)]
pub struct MockPeerStore {
    addresses: Mutex<HashMap<PeerId, Vec<Multiaddr>>>,
}

#[async_trait]
impl PeerStore for MockPeerStore {
    async fn addresses_of(&self, peer: &PeerId) -> Vec<Multiaddr> {
        self.addresses.lock().get(peer).cloned().unwrap_or_default()
    }

    async fn add_addresses(&self, peer: &PeerId, addresses: Vec<Multiaddr>) {
        let mut guard = self.addresses.lock();
        let entry = guard.entry(*peer).or_default();
        for addr in addresses {
            if !entry.contains(&addr) {
                entry.push(addr);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dial_fails_without_connect() {
        let a = MockHost::new(PeerId::random());
        let b_id = PeerId::random();
        let err = a.dial(b_id, None).await.unwrap_err();
        assert!(matches!(err, DrpcError::Unavailable(_)));
    }

    #[tokio::test]
    async fn dial_succeeds_after_connect_and_reuses_link() {
        let a = MockHost::new(PeerId::random());
        let b = MockHost::new(PeerId::random());
        a.connect(&b);

        let link1 = a.dial(b.local_peer_id(), None).await.unwrap();
        let link2 = a.dial(b.local_peer_id(), None).await.unwrap();
        assert_eq!(link1.remote_peer_id(), link2.remote_peer_id());
        assert_eq!(a.dial_count(), 2);
    }

    #[tokio::test]
    async fn open_stream_delivers_inbound_on_remote() {
        let a = MockHost::new(PeerId::random());
        let b = MockHost::new(PeerId::random());
        a.connect(&b);

        let protocol = StreamProtocol::new("/test/1.0.0");
        let mut inbound_rx = b.register_protocol(protocol);

        let link = a.dial(b.local_peer_id(), None).await.unwrap();
        let _outbound = link.open_stream(protocol).await.unwrap();

        let inbound = inbound_rx.recv().await.expect("no inbound stream delivered");
        assert_eq!(inbound.peer_id, a.local_peer_id());
    }

    #[tokio::test]
    async fn fail_dials_to_simulates_unreachable_peer() {
        let a = MockHost::new(PeerId::random());
        let b = MockHost::new(PeerId::random());
        a.connect(&b);
        a.fail_dials_to(b.local_peer_id());

        assert!(a.dial(b.local_peer_id(), None).await.is_err());
    }
}
