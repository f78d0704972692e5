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

//! Scenario 6 (spec §8): the discoverer given only a circuit-relay
//! multi-address must skip strategy 2 (direct-multiaddr) and resolve through
//! one of strategies 3-5.

mod support;

use anyhow::Result;
use drpc_core::mock::MockHost;
use drpc_core::PeerId;
use drpc_discovery::{resolve, DiscoveryConfig, DiscoveryMethod};

fn fast_config() -> DiscoveryConfig {
    DiscoveryConfig {
        timeout_ms: 500,
        dial_timeout_ms: 100,
        connect_interval_ms: 20,
    }
}

#[tokio::test]
async fn circuit_relay_only_input_falls_through_to_a_later_strategy() -> Result<()> {
    let client = MockHost::new(PeerId::random());
    let server = MockHost::new(PeerId::random());
    let relay = PeerId::random();
    client.connect(&server);

    let addr = format!("/ip4/1.2.3.4/tcp/4/p2p/{relay}/p2p-circuit/p2p/{}", server.local_peer_id());
    let result = resolve(client.clone(), &addr, fast_config(), None).await?;

    assert!(result.success);
    assert_eq!(result.peer_id, server.local_peer_id());
    assert!(
        matches!(
            result.method,
            Some(DiscoveryMethod::DiscoveredAddress) | Some(DiscoveryMethod::DirectPeerId) | Some(DiscoveryMethod::AmbientDiscovery)
        ),
        "circuit-relay input must not resolve via already-connected or direct-multiaddr, got {:?}",
        result.method
    );
    Ok(())
}
