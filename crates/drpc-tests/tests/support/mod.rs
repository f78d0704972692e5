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

//! Shared fixtures for the end-to-end scenarios: a bare h2c server for the
//! HTTP-facing transports, and the peer-stream echo server already proven out
//! in `drpc-transport`'s and `drpc-gateway`'s own unit tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use drpc_bridge::RpcHandler;
use drpc_core::identity::DRPC_WEBSTREAM_PROTOCOL;
use drpc_core::mock::MockHost;
use drpc_envelope::{read_payload, write_payload, HeaderReader, StreamConn, FLAG_END_STREAM};
use http::{Request, Response};
use tokio::net::{TcpListener, TcpStream};

/// An `RpcHandler` that reads the full request body and sends it straight
/// back, preserving the request's content type.
pub struct EchoHandler;

#[async_trait]
impl RpcHandler for EchoHandler {
    async fn handle(&self, request: Request<h2::RecvStream>, mut respond: h2::server::SendResponse<Bytes>) {
        let content_type = request
            .headers()
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_owned();

        let mut body = request.into_body();
        let mut collected = Vec::new();
        while let Some(chunk) = body.data().await {
            let chunk = chunk.expect("echo handler: request body read failed");
            let _ = body.flow_control().release_capacity(chunk.len());
            collected.extend_from_slice(&chunk);
        }

        let response = Response::builder().status(200).header(http::header::CONTENT_TYPE, content_type).body(()).unwrap();
        if let Ok(mut send_stream) = respond.send_response(response, false) {
            let _ = send_stream.send_data(Bytes::from(collected), true);
        }
    }
}

/// Wire every inbound stream `host` receives on the core protocol through
/// the server bridge to `handler`, the way a real libp2p-backed host would
/// dispatch into business logic (spec §4.F).
pub fn spawn_peer_bridge_server(host: Arc<MockHost>, handler: Arc<dyn RpcHandler>) {
    let mut rx = host.register_protocol(DRPC_WEBSTREAM_PROTOCOL);
    tokio::spawn(async move {
        while let Some(inbound) = rx.recv().await {
            let conn = StreamConn::new(inbound.stream);
            let handler = handler.clone();
            tokio::spawn(async move {
                drpc_bridge::serve(handler, conn).await;
            });
        }
    });
}

/// Wire an echo responder onto `host`'s core protocol: reads the header, then
/// bounces every payload straight back until (and including) end-stream. The
/// same shape as `drpc-transport`'s and `drpc-gateway`'s own test servers.
pub async fn spawn_peer_echo_server(host: Arc<MockHost>) {
    let mut rx = host.register_protocol(DRPC_WEBSTREAM_PROTOCOL);
    tokio::spawn(async move {
        while let Some(inbound) = rx.recv().await {
            let mut conn = StreamConn::new(inbound.stream);
            tokio::spawn(async move {
                let mut header_reader = HeaderReader::new();
                let (_path, _content_type) = header_reader.read_header(&mut conn).await.unwrap();
                loop {
                    let payload = read_payload(&mut conn).await.unwrap();
                    let end = payload.is_end_stream();
                    write_payload(&mut conn, if end { FLAG_END_STREAM } else { 0 }, &payload.data).await.unwrap();
                    if end {
                        break;
                    }
                }
                let _ = tokio::io::AsyncWriteExt::shutdown(&mut conn).await;
            });
        }
    });
}

/// A bare h2c TCP server (no TLS, matching `HttpDirectTransport`'s wire
/// model). Requests to `/p2pinfo` get `p2pinfo_body` back verbatim with a
/// `application/json` content type, when set; every other request has its
/// body echoed back unchanged with the request's own content type.
pub async fn spawn_h2_server(p2pinfo_body: Option<Bytes>) -> SocketAddr {
    spawn_h2_server_counting_p2pinfo(p2pinfo_body).await.0
}

/// Same as [`spawn_h2_server`], plus a counter incremented on every `/p2pinfo`
/// hit, so a test can assert the Smart HTTP cache actually suppressed repeat
/// fetches (spec §4.G "Smart HTTP": "caches the result").
pub async fn spawn_h2_server_counting_p2pinfo(p2pinfo_body: Option<Bytes>) -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind h2 test server");
    let addr = listener.local_addr().expect("local_addr of a bound listener");
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_for_task = hits.clone();

    tokio::spawn(async move {
        loop {
            let (socket, _) = match listener.accept().await {
                Ok(pair) => pair,
                Err(_) => return,
            };
            let p2pinfo_body = p2pinfo_body.clone();
            tokio::spawn(serve_h2_connection(socket, p2pinfo_body, hits_for_task.clone()));
        }
    });

    (addr, hits)
}

async fn serve_h2_connection(socket: TcpStream, p2pinfo_body: Option<Bytes>, hits: Arc<AtomicUsize>) {
    let mut connection = match h2::server::handshake(socket).await {
        Ok(connection) => connection,
        Err(_) => return,
    };

    while let Some(result) = connection.accept().await {
        let (request, respond) = match result {
            Ok(pair) => pair,
            Err(_) => continue,
        };
        let p2pinfo_body = p2pinfo_body.clone();
        tokio::spawn(serve_h2_request(request, respond, p2pinfo_body, hits.clone()));
    }
}

async fn serve_h2_request(request: Request<h2::RecvStream>, mut respond: h2::server::SendResponse<Bytes>, p2pinfo_body: Option<Bytes>, hits: Arc<AtomicUsize>) {
    if request.uri().path() == "/p2pinfo" {
        if let Some(body) = p2pinfo_body {
            hits.fetch_add(1, Ordering::SeqCst);
            let response = Response::builder().status(200).header(http::header::CONTENT_TYPE, "application/json").body(()).unwrap();
            if let Ok(mut send_stream) = respond.send_response(response, false) {
                let _ = send_stream.send_data(body, true);
            }
            return;
        }
    }

    let content_type = request
        .headers()
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_owned();

    let mut body = request.into_body();
    let mut collected = Vec::new();
    while let Some(chunk) = body.data().await {
        let chunk = chunk.expect("h2 test server: request body read failed");
        let _ = body.flow_control().release_capacity(chunk.len());
        collected.extend_from_slice(&chunk);
    }

    let response = Response::builder().status(200).header(http::header::CONTENT_TYPE, content_type).body(()).unwrap();
    if let Ok(mut send_stream) = respond.send_response(response, false) {
        let _ = send_stream.send_data(Bytes::from(collected), true);
    }
}
