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

//! Scenario 3 (spec §8): a bidi stream over a native peer stream, three
//! ordered messages, end-stream signaled after the third.

mod support;

use anyhow::{Context, Result};
use bytes::Bytes;
use drpc_core::mock::MockHost;
use drpc_core::PeerId;
use drpc_transport::{CallOptions, ClientTransport, NativeTransport, StreamKind};
use support::spawn_peer_echo_server;

#[tokio::test]
async fn bidi_stream_delivers_three_messages_in_order_then_ends() -> Result<()> {
    let client = MockHost::new(PeerId::random());
    let server = MockHost::new(PeerId::random());
    client.connect(&server);
    spawn_peer_echo_server(server.clone()).await;

    let transport = NativeTransport::new(client.clone(), server.local_peer_id());
    let mut call = transport.stream("/test.Chat/Bidi", "application/connect+json", StreamKind::Bidi, CallOptions::default()).await?;

    for msg in ["Msg1", "Msg2", "Msg3"] {
        call.outbound.send(Bytes::copy_from_slice(msg.as_bytes())).await?;
    }
    drop(call.outbound);

    for expected in ["Msg1", "Msg2", "Msg3"] {
        let message = call.inbound.recv().await.context("stream ended before the expected message")??;
        assert_eq!(&message.body[..], expected.as_bytes());
    }
    assert!(call.inbound.recv().await.is_none(), "stream must end after the third message");
    Ok(())
}
