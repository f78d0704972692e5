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

//! The server bridge (spec §4.F): for one inbound peer stream, parse the
//! envelope header, then speak HTTP/2 to the caller's handler over an
//! in-memory pipe pair while forwarding the peer stream's bytes in and the
//! response bytes back out.
//!
//! The two `h2::client`/`h2::server` halves are driven exactly as described
//! in `h2::client`'s module docs: a `Connection` polled to completion on its
//! own task, a `SendRequest` handle used to issue one request, response body
//! streamed back in bounded chunks with explicit flow-control capacity
//! release.

use std::sync::{Arc, Mutex as StdMutex};

use bytes::Bytes;
use drpc_core::DrpcError;
use drpc_envelope::{HeaderReader, StreamConn};
use futures::future::poll_fn;
use tokio::io::{split, unsplit, AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tracing::warn;

use crate::handler::RpcHandler;

/// Chunk size for both the response body forwarded to the peer stream and
/// the request body read from the forwarder pipe (spec §4.F step 6, "32 KiB
/// buffer").
const CHUNK_SIZE: usize = 32 * 1024;

fn h2_err(err: h2::Error) -> DrpcError {
    DrpcError::internal(format!("h2 error: {err}"))
}

/// Process exactly one inbound peer stream. Closes the stream gracefully on
/// return; resets it (an abrupt drop, no final flush) on envelope parse
/// failure, transport error, or handler panic — a panic inside the spawned
/// task is caught by `tokio::spawn` itself and surfaces here as a `JoinError`
/// (spec §7 "transport panics in the bridge are caught, logged, and
/// converted into stream resets").
#[tracing::instrument(skip(handler, stream), fields(remote = %stream.remote_peer()))]
pub async fn serve(handler: Arc<dyn RpcHandler>, stream: StreamConn) {
    let outcome = tokio::spawn(async move {
        let mut stream = stream;
        let header = HeaderReader::new().read_header(&mut stream).await;
        let (path, content_type) = match header {
            Ok(pair) => pair,
            Err(err) => return (stream, Err(err)),
        };

        let (peer_read, peer_write) = split(stream);
        match run_bridge(handler, path, content_type, peer_read, peer_write).await {
            Ok((peer_read, peer_write)) => (unsplit(peer_read, peer_write), Ok(())),
            Err((peer_read, peer_write, err)) => (unsplit(peer_read, peer_write), Err(err)),
        }
    })
    .await;

    match outcome {
        Ok((mut stream, Ok(()))) => {
            if let Err(err) = stream.shutdown().await {
                warn!(error = %err, "bridge: error closing stream after successful call");
            }
        }
        Ok((_stream, Err(err))) => {
            warn!(error = %err, "bridge: resetting stream after error");
        }
        Err(join_err) => {
            warn!(error = %join_err, "bridge: handler task panicked; stream reset");
        }
    }
}

type Halves = (ReadHalf<StreamConn>, WriteHalf<StreamConn>);
type BridgeError = (ReadHalf<StreamConn>, WriteHalf<StreamConn>, DrpcError);

async fn run_bridge(
    handler: Arc<dyn RpcHandler>,
    path: String,
    content_type: String,
    mut peer_read: ReadHalf<StreamConn>,
    mut peer_write: WriteHalf<StreamConn>,
) -> Result<Halves, BridgeError> {
    let (link_client_io, link_server_io) = tokio::io::duplex(CHUNK_SIZE * 2);
    let (req_write, mut req_read) = tokio::io::duplex(CHUNK_SIZE * 2);

    let forward_error: Arc<StdMutex<Option<DrpcError>>> = Arc::new(StdMutex::new(None));
    let forwarder_error = forward_error.clone();
    let forward_task = tokio::spawn(async move {
        let mut req_write = req_write;
        if let Err(err) = tokio::io::copy(&mut peer_read, &mut req_write).await {
            *forwarder_error.lock().unwrap() = Some(err.into());
        }
        let _ = req_write.shutdown().await;
        peer_read
    });

    macro_rules! fail {
        ($err:expr) => {{
            let peer_read = forward_task.await.unwrap_or_else(|_| {
                // The forwarder task itself can only panic on an I/O future
                // panicking, which tokio::spawn would have already logged;
                // there is no stream half left to recover in that case, so
                // this arm is unreachable in practice.
                unreachable!("forwarder task panicked")
            });
            return Err((peer_read, peer_write, $err));
        }};
    }

    let mut server_conn = match h2::server::handshake(link_server_io).await {
        Ok(conn) => conn,
        Err(err) => fail!(h2_err(err)),
    };
    let server_task = tokio::spawn(async move {
        loop {
            match server_conn.accept().await {
                Some(Ok((request, respond))) => {
                    let handler = handler.clone();
                    tokio::spawn(async move { handler.handle(request, respond).await });
                }
                Some(Err(err)) => {
                    warn!(error = %err, "bridge: h2 server connection error");
                    break;
                }
                None => break,
            }
        }
    });

    let (mut send_request, connection) = match h2::client::handshake(link_client_io).await {
        Ok(pair) => pair,
        Err(err) => fail!(h2_err(err)),
    };
    tokio::spawn(async move {
        if let Err(err) = connection.await {
            warn!(error = %err, "bridge: h2 client connection error");
        }
    });

    if let Err(err) = send_request.ready().await {
        fail!(h2_err(err));
    }

    let request = http::Request::builder()
        .method(http::Method::POST)
        .uri(format!("http://drpc-webstream{path}"))
        .header(http::header::CONTENT_TYPE, content_type.clone())
        .header(http::header::ACCEPT, content_type)
        .header("connect-protocol-version", "1")
        .body(())
        .expect("request parts are all valid ASCII/known headers");

    let (response_fut, mut send_stream) = match send_request.send_request(request, false) {
        Ok(pair) => pair,
        Err(err) => fail!(h2_err(err)),
    };

    let request_body_task = tokio::spawn(async move {
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            match req_read.read(&mut buf).await {
                Ok(0) => {
                    let _ = send_chunk(&mut send_stream, Bytes::new(), true).await;
                    break;
                }
                Ok(n) => {
                    if send_chunk(&mut send_stream, Bytes::copy_from_slice(&buf[..n]), false).await.is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    let response = match response_fut.await {
        Ok(response) => response,
        Err(err) => {
            let _ = request_body_task.await;
            let _ = server_task.await;
            fail!(h2_err(err));
        }
    };

    let (_, mut body) = response.into_parts();
    loop {
        match body.data().await {
            Some(Ok(chunk)) => {
                let _ = body.flow_control().release_capacity(chunk.len());
                if let Err(err) = peer_write.write_all(&chunk).await {
                    let _ = request_body_task.await;
                    let _ = server_task.await;
                    fail!(err.into());
                }
            }
            Some(Err(err)) => {
                let _ = request_body_task.await;
                let _ = server_task.await;
                fail!(h2_err(err));
            }
            None => {
                let _ = peer_write.flush().await;
                break;
            }
        }
    }

    let _ = request_body_task.await;
    let _ = server_task.await;

    let peer_read = match forward_task.await {
        Ok(peer_read) => peer_read,
        Err(_) => fail!(DrpcError::internal("forwarder task panicked")),
    };

    if let Some(err) = forward_error.lock().unwrap().take() {
        return Err((peer_read, peer_write, err));
    }

    Ok((peer_read, peer_write))
}

async fn send_chunk(send_stream: &mut h2::SendStream<Bytes>, data: Bytes, end_of_stream: bool) -> Result<(), DrpcError> {
    if !data.is_empty() {
        send_stream.reserve_capacity(data.len());
        if let Some(result) = poll_fn(|cx| send_stream.poll_capacity(cx)).await {
            result.map_err(h2_err)?;
        }
    }
    send_stream.send_data(data, end_of_stream).map_err(h2_err)
}
