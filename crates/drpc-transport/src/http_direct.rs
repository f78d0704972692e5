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

//! HTTP-direct transport (spec §4.G): a thin wrapper over a standard HTTP/2
//! client. TLS termination (session resumption, minimum version, cipher
//! suite selection) is expected to happen in whatever connector the caller
//! hands in — this transport drives the HTTP/2 layer only.

use std::str::FromStr;

use async_trait::async_trait;
use bytes::Bytes;
use drpc_core::DrpcError;
use h2::client::SendRequest;
use http::uri::Authority;
use http::Uri;
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::warn;

use crate::transport::{CallOptions, ClientTransport, StreamKind, StreamMessage, StreamResponse, UnaryResponse};

/// TLS knobs a caller's connector is expected to honor (spec §6
/// `tls.sessionCacheSize`); HTTP-direct itself never terminates TLS.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub session_cache_size: usize,
    pub min_version_tls_1_2: bool,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            session_cache_size: 256,
            min_version_tls_1_2: true,
        }
    }
}

/// Maximum size of an HTTP/2 `HEADERS` frame's header list, applied as an
/// initial setting on every connection this transport opens (spec §4.G "32
/// KiB max header list").
const MAX_HEADER_LIST_SIZE: u32 = 32 * 1024;

/// An HTTP/2 client bound to one base URL (`scheme://host[:port]`).
pub struct HttpDirectTransport {
    authority: Authority,
    tls: TlsConfig,
}

impl HttpDirectTransport {
    pub fn new(base_url: &str) -> Result<Self, DrpcError> {
        Self::with_tls_config(base_url, TlsConfig::default())
    }

    pub fn with_tls_config(base_url: &str, tls: TlsConfig) -> Result<Self, DrpcError> {
        let uri = Uri::from_str(base_url).map_err(|err| DrpcError::invalid_argument(format!("invalid base url {base_url}: {err}")))?;
        let authority = uri
            .authority()
            .cloned()
            .ok_or_else(|| DrpcError::invalid_argument(format!("base url has no authority: {base_url}")))?;
        Ok(Self { authority, tls })
    }

    pub fn tls_config(&self) -> TlsConfig {
        self.tls
    }

    async fn connect(&self) -> Result<SendRequest<Bytes>, DrpcError> {
        let host = self.authority.host();
        let port = self.authority.port_u16().unwrap_or(80);
        let tcp = TcpStream::connect((host, port)).await.map_err(DrpcError::from)?;

        let (send_request, connection) = h2::client::Builder::new()
            .max_header_list_size(MAX_HEADER_LIST_SIZE)
            .handshake(tcp)
            .await
            .map_err(|err| DrpcError::unavailable(format!("h2 handshake with {} failed: {err}", self.authority)))?;

        tokio::spawn(async move {
            if let Err(err) = connection.await {
                warn!(error = %err, "http-direct: connection error");
            }
        });

        Ok(send_request)
    }

    fn request(&self, method: &str, content_type: &str) -> http::Request<()> {
        http::Request::builder()
            .method(http::Method::POST)
            .uri(format!("http://{}{method}", self.authority))
            .header(http::header::CONTENT_TYPE, content_type)
            .header(http::header::ACCEPT, content_type)
            .body(())
            .expect("method path and content-type are always valid header values")
    }
}

#[async_trait]
impl ClientTransport for HttpDirectTransport {
    async fn unary(&self, method: &str, content_type: &str, input: Bytes, options: CallOptions) -> Result<UnaryResponse, DrpcError> {
        options
            .race(async {
                let mut send_request = self.connect().await?;
                send_request.ready().await.map_err(|err| DrpcError::unavailable(err.to_string()))?;

                let (response_fut, mut send_stream) = send_request
                    .send_request(self.request(method, content_type), false)
                    .map_err(|err| DrpcError::unavailable(err.to_string()))?;
                send_stream.send_data(input, true).map_err(|err| DrpcError::internal(err.to_string()))?;

                let response = response_fut.await.map_err(|err| DrpcError::unavailable(err.to_string()))?;
                let response_content_type = response
                    .headers()
                    .get(http::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or(content_type)
                    .to_owned();

                let (_, mut body) = response.into_parts();
                let mut collected = Vec::new();
                while let Some(chunk) = body.data().await {
                    let chunk = chunk.map_err(|err| DrpcError::data_loss(err.to_string()))?;
                    let _ = body.flow_control().release_capacity(chunk.len());
                    collected.extend_from_slice(&chunk);
                }

                Ok(UnaryResponse {
                    content_type: response_content_type,
                    body: Bytes::from(collected),
                })
            })
            .await
    }

    async fn stream(&self, method: &str, content_type: &str, _kind: StreamKind, options: CallOptions) -> Result<StreamResponse, DrpcError> {
        let mut send_request = options.race(self.connect()).await?;
        send_request.ready().await.map_err(|err| DrpcError::unavailable(err.to_string()))?;

        let (response_fut, mut send_stream) = send_request
            .send_request(self.request(method, content_type), false)
            .map_err(|err| DrpcError::unavailable(err.to_string()))?;

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Bytes>(16);
        tokio::spawn(async move {
            while let Some(chunk) = outbound_rx.recv().await {
                send_stream.reserve_capacity(chunk.len());
                if send_stream.send_data(chunk, false).is_err() {
                    return;
                }
            }
            let _ = send_stream.send_data(Bytes::new(), true);
        });

        let (inbound_tx, inbound_rx) = mpsc::channel(16);
        let content_type = content_type.to_owned();
        tokio::spawn(async move {
            let response = match response_fut.await {
                Ok(response) => response,
                Err(err) => {
                    let _ = inbound_tx.send(Err(DrpcError::unavailable(err.to_string()))).await;
                    return;
                }
            };
            let (_, mut body) = response.into_parts();
            loop {
                match body.data().await {
                    Some(Ok(chunk)) => {
                        let _ = body.flow_control().release_capacity(chunk.len());
                        let message = StreamMessage {
                            content_type: content_type.clone(),
                            body: chunk,
                        };
                        if inbound_tx.send(Ok(message)).await.is_err() {
                            return;
                        }
                    }
                    Some(Err(err)) => {
                        let _ = inbound_tx.send(Err(DrpcError::data_loss(err.to_string()))).await;
                        return;
                    }
                    None => return,
                }
            }
        });

        Ok(StreamResponse {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}
