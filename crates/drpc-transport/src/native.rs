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

//! Native peer-stream transport (spec §4.G): obtains a reachable peer through
//! the discoverer, leases a stream from the pool, and speaks the envelope
//! protocol directly over it.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use drpc_core::shutdown::ShutdownSignal;
use drpc_core::{DrpcError, Host, PeerId, StreamProtocol};
use drpc_discovery::DiscoveryConfig;
use drpc_envelope::{read_payload, write_header, write_payload, FLAG_END_STREAM};
use drpc_pool::Pool;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::content_type::MessageFormat;
use crate::transport::{CallOptions, ClientTransport, StreamKind, StreamMessage, StreamResponse, UnaryResponse};

/// Length of the hex prefix surfaced in a decode failure's error message
/// (spec §4.G "Unary call algorithm" step 4: "a hex prefix of the first 16
/// bytes").
const DATA_LOSS_HEX_PREFIX: usize = 16;

pub struct NativeTransport {
    host: Arc<dyn Host>,
    pool: Arc<Pool>,
    peer: PeerId,
    protocol: StreamProtocol,
}

impl NativeTransport {
    pub fn new(host: Arc<dyn Host>, peer: PeerId) -> Self {
        Self::with_protocol(host, peer, drpc_core::identity::DRPC_WEBSTREAM_PROTOCOL)
    }

    pub fn with_protocol(host: Arc<dyn Host>, peer: PeerId, protocol: StreamProtocol) -> Self {
        let pool = Pool::for_host(host.clone());
        Self { host, pool, peer, protocol }
    }

    /// Resolve `target` via the discoverer (§4.E) and bind a transport to
    /// whichever peer it finds (spec §4.H "resolve a reachable peer via
    /// 4.E"). `signal` is forwarded to the discoverer so a caller's
    /// cancellation aborts discovery rather than just the transport call
    /// that follows it.
    pub async fn resolve(host: Arc<dyn Host>, target: &str, config: DiscoveryConfig, signal: Option<ShutdownSignal>) -> Result<Self, DrpcError> {
        let result = drpc_discovery::resolve(host.clone(), target, config, signal).await?;
        if !result.success {
            return Err(DrpcError::unavailable(result.error.unwrap_or_else(|| "discovery failed".to_owned())));
        }
        Ok(Self::new(host, result.peer_id))
    }

    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    pub fn peer(&self) -> PeerId {
        self.peer
    }
}

fn hex_prefix(data: &[u8]) -> String {
    hex::encode(&data[..data.len().min(DATA_LOSS_HEX_PREFIX)])
}

/// Connect JSON error body, per spec §4.G decode strategies (d) and (e).
#[derive(serde::Deserialize)]
struct ConnectErrorBody {
    code: String,
    message: Option<String>,
}

fn as_connect_error(raw: &[u8]) -> Option<DrpcError> {
    let body: ConnectErrorBody = serde_json::from_slice(raw).ok()?;
    let code = drpc_core::ConnectCode::from_wire_name(&body.code);
    Some(DrpcError::status(code, body.message.unwrap_or_default()))
}

/// Attempt the five decode strategies from spec §4.G in order, returning the
/// first one that succeeds.
fn decode_unary_response(raw: &[u8], content_type: &str, format: Option<MessageFormat>) -> Result<UnaryResponse, DrpcError> {
    // (c)/(d): payload-envelope framing, recognized by a well-formed 5-byte
    // header whose declared length matches exactly what followed it.
    if raw.len() >= 5 {
        let declared_len = u32::from_be_bytes([raw[1], raw[2], raw[3], raw[4]]) as usize;
        let flags = raw[0];
        if flags & !FLAG_END_STREAM == 0 && raw.len() == 5 + declared_len {
            let inner = &raw[5..];
            if let Some(err) = as_connect_error(inner) {
                return Err(err);
            }
            return Ok(UnaryResponse {
                content_type: content_type.to_owned(),
                body: Bytes::copy_from_slice(inner),
            });
        }
    }

    // (e): a bare Connect error JSON body.
    if let Some(err) = as_connect_error(raw) {
        return Err(err);
    }

    // (a)/(b): raw message bytes matching the requested format. There is no
    // application schema at this layer to validate structurally against, so
    // any non-empty buffer under a recognized format is accepted as-is.
    if !raw.is_empty() && format.is_some() {
        return Ok(UnaryResponse {
            content_type: content_type.to_owned(),
            body: Bytes::copy_from_slice(raw),
        });
    }

    Err(DrpcError::data_loss(format!(
        "unrecognized response encoding, first {DATA_LOSS_HEX_PREFIX} bytes: {}",
        hex_prefix(raw)
    )))
}

#[async_trait]
impl ClientTransport for NativeTransport {
    async fn unary(&self, method: &str, content_type: &str, input: Bytes, options: CallOptions) -> Result<UnaryResponse, DrpcError> {
        let format = MessageFormat::from_content_type(content_type);
        options
            .race(async {
                let mut lease = self.pool.get_stream(self.peer, self.protocol).await?;
                write_header(&mut lease, method, content_type).await?;
                write_payload(&mut lease, FLAG_END_STREAM, &input).await?;
                lease.shutdown().await?;

                let mut collected = Vec::new();
                loop {
                    let payload = read_payload(&mut lease).await?;
                    collected.extend_from_slice(&payload.data);
                    if payload.is_end_stream() {
                        break;
                    }
                }
                lease.close();

                decode_unary_response(&collected, content_type, format)
            })
            .await
    }

    async fn stream(&self, method: &str, content_type: &str, _kind: StreamKind, options: CallOptions) -> Result<StreamResponse, DrpcError> {
        let mut lease = options.race(self.pool.get_stream(self.peer, self.protocol)).await?;
        write_header(&mut lease, method, content_type).await?;

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Bytes>(16);
        let (inbound_tx, inbound_rx) = mpsc::channel(16);
        let content_type = content_type.to_owned();

        tokio::spawn(async move {
            while let Some(chunk) = outbound_rx.recv().await {
                if write_payload(&mut lease, 0, &chunk).await.is_err() {
                    lease.reset();
                    return;
                }
            }
            if write_payload(&mut lease, FLAG_END_STREAM, &[]).await.is_err() {
                lease.reset();
                return;
            }

            loop {
                match read_payload(&mut lease).await {
                    Ok(payload) if payload.is_end_stream() => {
                        lease.close();
                        return;
                    }
                    Ok(payload) => {
                        let message = StreamMessage {
                            content_type: content_type.clone(),
                            body: payload.data,
                        };
                        if inbound_tx.send(Ok(message)).await.is_err() {
                            lease.reset();
                            return;
                        }
                    }
                    Err(err) => {
                        let _ = inbound_tx.send(Err(err)).await;
                        lease.reset();
                        return;
                    }
                }
            }
        });

        Ok(StreamResponse {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drpc_core::identity::DRPC_WEBSTREAM_PROTOCOL;
    use drpc_core::mock::MockHost;
    use drpc_envelope::StreamConn;

    async fn echo_server(host: Arc<MockHost>) {
        let mut rx = host.register_protocol(DRPC_WEBSTREAM_PROTOCOL);
        tokio::spawn(async move {
            while let Some(inbound) = rx.recv().await {
                let mut conn = StreamConn::new(inbound.stream);
                tokio::spawn(async move {
                    let mut header_reader = drpc_envelope::HeaderReader::new();
                    let (_path, _ct) = header_reader.read_header(&mut conn).await.unwrap();
                    loop {
                        let payload = read_payload(&mut conn).await.unwrap();
                        let end = payload.is_end_stream();
                        write_payload(&mut conn, if end { FLAG_END_STREAM } else { 0 }, &payload.data).await.unwrap();
                        if end {
                            break;
                        }
                    }
                    let _ = conn.shutdown().await;
                });
            }
        });
    }

    #[tokio::test]
    async fn unary_round_trips_proto_payload() {
        let client = MockHost::new(PeerId::random());
        let server = MockHost::new(PeerId::random());
        client.connect(&server);
        echo_server(server.clone()).await;

        let transport = NativeTransport::new(client.clone(), server.local_peer_id());
        let response = transport
            .unary("/test.Echo/Call", "application/proto", Bytes::from_static(b"hello"), CallOptions::default())
            .await
            .unwrap();
        assert_eq!(&response.body[..], b"hello");
    }

    #[tokio::test]
    async fn bidi_stream_echoes_three_messages_in_order() {
        let client = MockHost::new(PeerId::random());
        let server = MockHost::new(PeerId::random());
        client.connect(&server);
        echo_server(server.clone()).await;

        let transport = NativeTransport::new(client.clone(), server.local_peer_id());
        let mut call = transport.stream("/test.Echo/Bidi", "application/connect+json", StreamKind::Bidi, CallOptions::default()).await.unwrap();

        for msg in ["Msg1", "Msg2", "Msg3"] {
            call.outbound.send(Bytes::copy_from_slice(msg.as_bytes())).await.unwrap();
        }
        drop(call.outbound);

        for expected in ["Msg1", "Msg2", "Msg3"] {
            let message = call.inbound.recv().await.unwrap().unwrap();
            assert_eq!(&message.body[..], expected.as_bytes());
        }
        assert!(call.inbound.recv().await.is_none());
    }

    #[test]
    fn decode_error_surfaces_hex_prefix() {
        let err = decode_unary_response(&[], "application/proto", Some(MessageFormat::Proto)).unwrap_err();
        assert!(matches!(err, DrpcError::DataLoss(_)));
    }

    #[test]
    fn decode_envelope_wrapped_connect_error() {
        let body = br#"{"code":"not_found","message":"missing"}"#;
        let mut framed = Vec::new();
        framed.push(0u8);
        framed.extend_from_slice(&(body.len() as u32).to_be_bytes());
        framed.extend_from_slice(body);

        let err = decode_unary_response(&framed, "application/json", Some(MessageFormat::Json)).unwrap_err();
        assert_eq!(err.connect_code(), drpc_core::ConnectCode::NotFound);
    }
}
