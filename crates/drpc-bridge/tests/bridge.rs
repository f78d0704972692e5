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

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use drpc_bridge::{serve, RpcHandler};
use drpc_core::{PeerId, PeerStream, StreamDirection};
use drpc_envelope::{read_payload, write_header, write_payload, StreamConn, FLAG_END_STREAM};
use h2::server::SendResponse;
use h2::RecvStream;
use http::{Request, Response, StatusCode};
use tokio::io::AsyncWriteExt;

/// Reads the whole request body, then writes it straight back as the
/// response body with a 200 status.
struct EchoHandler;

#[async_trait]
impl RpcHandler for EchoHandler {
    async fn handle(&self, request: Request<RecvStream>, mut respond: SendResponse<Bytes>) {
        let mut body = request.into_body();
        let mut collected = Vec::new();
        while let Some(chunk) = body.data().await {
            let chunk = chunk.expect("echo handler test body read");
            let _ = body.flow_control().release_capacity(chunk.len());
            collected.extend_from_slice(&chunk);
        }

        let response = Response::builder().status(StatusCode::OK).body(()).unwrap();
        let mut send_stream = respond.send_response(response, false).expect("echo handler test send_response");
        send_stream.send_data(Bytes::from(collected), true).expect("echo handler test send_data");
    }
}

fn test_stream_pair() -> (StreamConn, tokio::io::DuplexStream) {
    let (server_side, client_side) = tokio::io::duplex(64 * 1024);
    let peer_stream = PeerStream::new(Box::pin(server_side), StreamDirection::Inbound, PeerId::random(), None, None);
    (StreamConn::new(peer_stream), client_side)
}

#[tokio::test]
async fn echoes_a_single_unary_call() -> Result<()> {
    let (server_conn, mut client) = test_stream_pair();

    let serving = tokio::spawn(serve(Arc::new(EchoHandler), server_conn));

    write_header(&mut client, "/test.Echo/Call", "application/proto").await?;
    write_payload(&mut client, FLAG_END_STREAM, b"hello dRPC").await?;

    let payload = tokio::time::timeout(Duration::from_secs(5), read_payload(&mut client)).await??;
    assert_eq!(&payload.data[..], b"hello dRPC");
    assert!(payload.is_end_stream());

    tokio::time::timeout(Duration::from_secs(5), serving).await??;
    Ok(())
}

#[tokio::test]
async fn malformed_header_resets_rather_than_hangs() -> Result<()> {
    let (server_conn, mut client) = test_stream_pair();

    let serving = tokio::spawn(serve(Arc::new(EchoHandler), server_conn));

    // A path length prefix claiming more bytes than ever arrive; the
    // header read fails and the bridge must reset instead of blocking
    // forever waiting for more input.
    client.write_all(&u32::to_be_bytes(4096)).await?;
    client.write_all(b"nope").await?;
    drop(client);

    tokio::time::timeout(Duration::from_secs(5), serving).await??;
    Ok(())
}
