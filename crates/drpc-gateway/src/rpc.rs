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

//! `/{peer-multi-addr}/{service}/{method}` (spec §4.I): parses the embedded
//! multi-address, leases a stream via the pool, and copies bytes in both
//! directions between the HTTP body and the peer stream's envelope framing.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use drpc_core::identity::{parse_target_bundle, DRPC_WEBSTREAM_PROTOCOL};
use drpc_core::DrpcError;
use drpc_envelope::{read_payload, write_header, write_payload, FLAG_END_STREAM};
use drpc_pool::ManagedStream;
use http_body_util::BodyExt;
use tokio::io::AsyncWriteExt;

use crate::error::error_response;
use crate::state::GatewayState;

/// Split the wildcard tail into `(multi-addr string, service, method)`. The
/// last two path segments are always the service and method, matching the
/// two-segment shape of a Connect RPC path; everything before that is the
/// multi-address (which itself is a sequence of `/`-separated components).
fn split_path(rest: &str) -> Result<(String, &str, &str), DrpcError> {
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() < 3 {
        return Err(DrpcError::invalid_argument(format!(
            "path must be /{{multi-addr}}/{{service}}/{{method}}, got /{rest}"
        )));
    }
    let (addr_segments, tail) = segments.split_at(segments.len() - 2);
    let addr = format!("/{}", addr_segments.join("/"));
    Ok((addr, tail[0], tail[1]))
}

async fn copy_request_body(lease: &mut ManagedStream, body: Body) -> Result<(), DrpcError> {
    let mut body = body;
    let mut pending: Option<Bytes> = None;
    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|err| DrpcError::data_loss(err.to_string()))?;
        if let Ok(data) = frame.into_data() {
            if let Some(prev) = pending.replace(data) {
                write_payload(lease, 0, &prev).await?;
            }
        }
    }
    write_payload(lease, FLAG_END_STREAM, &pending.unwrap_or_default()).await?;
    Ok(())
}

pub(crate) async fn handle_rpc(State(state): State<Arc<GatewayState>>, Path(rest): Path<String>, headers: HeaderMap, body: Body) -> Response {
    let (addr_str, service, method) = match split_path(&rest) {
        Ok(parsed) => parsed,
        Err(err) => return error_response(err),
    };

    let parsed = match parse_target_bundle(&addr_str) {
        Ok(parsed) => parsed,
        Err(err) => return error_response(err),
    };

    let content_type = match headers.get(http::header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
        Some(content_type) => content_type.to_owned(),
        None => return error_response(DrpcError::invalid_argument("missing content-type header")),
    };

    if let Some(addr) = &parsed.multiaddr {
        state.host.peer_store().add_addresses(&parsed.peer_id, vec![addr.clone()]).await;
    }

    let mut lease = match state.pool.get_stream(parsed.peer_id, DRPC_WEBSTREAM_PROTOCOL).await {
        Ok(lease) => lease,
        Err(err) => return error_response(err),
    };

    let method_path = format!("/{service}/{method}");
    if let Err(err) = write_header(&mut lease, &method_path, &content_type).await {
        return error_response(err);
    }
    if let Err(err) = copy_request_body(&mut lease, body).await {
        lease.reset();
        return error_response(err);
    }
    if let Err(err) = lease.shutdown().await {
        lease.reset();
        return error_response(DrpcError::from(err));
    }

    let response_body = Body::from_stream(futures::stream::unfold(Some(lease), |state| async move {
        let mut lease = state?;
        match read_payload(&mut lease).await {
            Ok(payload) if payload.is_end_stream() => {
                lease.close();
                None
            }
            Ok(payload) => Some((Ok::<Bytes, std::io::Error>(payload.data), Some(lease))),
            Err(err) => {
                lease.reset();
                Some((Err(std::io::Error::new(std::io::ErrorKind::Other, err.to_string())), None))
            }
        }
    }));

    Response::builder()
        .status(StatusCode::OK)
        .header(http::header::CONTENT_TYPE, content_type)
        .body(response_body)
        .unwrap_or_else(|err| error_response(DrpcError::internal(err.to_string())))
}
