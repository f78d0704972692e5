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

//! Scenario 4 (spec §8): Smart HTTP falls back to the native peer-stream
//! transport for a bidi call, fetching `/p2pinfo` at most once per URL per
//! cache window.

mod support;

use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use drpc_core::mock::MockHost;
use drpc_core::PeerId;
use drpc_discovery::DiscoveryConfig;
use drpc_transport::{CallOptions, ClientTransport, PeerAddrCache, SmartHttpTransport, StreamKind};
use support::{spawn_h2_server_counting_p2pinfo, spawn_peer_echo_server};

#[tokio::test]
async fn smart_http_falls_back_to_native_bidi_and_caches_p2pinfo() -> Result<()> {
    let client = MockHost::new(PeerId::random());
    let server = MockHost::new(PeerId::random());
    client.connect(&server);
    spawn_peer_echo_server(server.clone()).await;

    let p2pinfo_body = serde_json::to_vec(&serde_json::json!({
        "ID": server.local_peer_id().to_string(),
        "Addrs": [format!("/ip4/127.0.0.1/tcp/9000/p2p/{}", server.local_peer_id())],
    }))?;
    let (addr, p2pinfo_hits) = spawn_h2_server_counting_p2pinfo(Some(Bytes::from(p2pinfo_body))).await;

    let cache = std::sync::Arc::new(PeerAddrCache::new(8, Duration::from_secs(60)));
    let transport = SmartHttpTransport::with_cache(&format!("http://{addr}"), client.clone(), DiscoveryConfig::default(), cache)?;

    for _ in 0..2 {
        let mut call = transport.stream("/test.Chat/Bidi", "application/connect+json", StreamKind::Bidi, CallOptions::default()).await?;
        call.outbound.send(Bytes::from_static(b"hi")).await?;
        drop(call.outbound);
        let message = call.inbound.recv().await.context("stream ended before the echoed message")??;
        assert_eq!(&message.body[..], b"hi");
        assert!(call.inbound.recv().await.is_none());
    }

    assert_eq!(p2pinfo_hits.load(Ordering::SeqCst), 1, "/p2pinfo should be fetched at most once per URL per cache window");
    Ok(())
}
