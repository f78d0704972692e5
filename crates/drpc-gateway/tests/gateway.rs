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

use axum::body::Body;
use axum::http::{Request, StatusCode};
use drpc_core::identity::DRPC_WEBSTREAM_PROTOCOL;
use drpc_core::mock::MockHost;
use drpc_core::PeerId;
use drpc_envelope::{read_payload, write_payload, HeaderReader, StreamConn, FLAG_END_STREAM};
use drpc_gateway::{build_router, GatewayState};
use http_body_util::BodyExt;
use tower::ServiceExt;

async fn echo_server(host: Arc<MockHost>) {
    let mut rx = host.register_protocol(DRPC_WEBSTREAM_PROTOCOL);
    tokio::spawn(async move {
        while let Some(inbound) = rx.recv().await {
            let mut conn = StreamConn::new(inbound.stream);
            tokio::spawn(async move {
                let mut header_reader = HeaderReader::new();
                let (_path, _ct) = header_reader.read_header(&mut conn).await.unwrap();
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

#[tokio::test]
async fn echoes_a_unary_call_through_the_gateway() {
    let client = MockHost::new(PeerId::random());
    let server = MockHost::new(PeerId::random());
    client.connect(&server);
    echo_server(server.clone()).await;

    let router = build_router(GatewayState::new(client.clone()));
    let uri = format!("/ip4/127.0.0.1/tcp/9000/p2p/{}/test.Echo/Call", server.local_peer_id());
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/proto")
        .body(Body::from("hello"))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"hello");
}

#[tokio::test]
async fn malformed_path_is_rejected_with_bad_request() {
    let client = MockHost::new(PeerId::random());
    let router = build_router(GatewayState::new(client));

    let request = Request::builder()
        .method("POST")
        .uri("/only-two/segments")
        .header("content-type", "application/proto")
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unreachable_peer_surfaces_service_unavailable() {
    let client = MockHost::new(PeerId::random());
    let router = build_router(GatewayState::new(client));

    let uri = format!("/ip4/127.0.0.1/tcp/9000/p2p/{}/test.Echo/Call", PeerId::random());
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/proto")
        .body(Body::from("hello"))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn p2pinfo_reports_local_identity_and_listen_addresses() {
    let host = MockHost::new(PeerId::random());
    let router = build_router(GatewayState::new(host.clone()));

    let request = Request::builder().method("GET").uri("/p2pinfo").body(Body::empty()).unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["ID"], host.local_peer_id().to_string());
}
