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

//! Smart HTTP transport (spec §4.G): delegates unary and server-streaming to
//! HTTP-direct unchanged; for client- and bidi-streaming, resolves a peer
//! multi-address via `/p2pinfo` and falls back to the native peer-stream
//! transport.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use drpc_core::identity::{is_loopback, peer_id_of};
use drpc_core::{DrpcError, Host, Multiaddr};
use drpc_discovery::DiscoveryConfig;
use serde::Deserialize;

use crate::cache::{self, PeerAddrCache};
use crate::config::TransportConfig;
use crate::http_direct::HttpDirectTransport;
use crate::native::NativeTransport;
use crate::transport::{CallOptions, ClientTransport, StreamKind, StreamResponse, UnaryResponse};

/// The `/p2pinfo` admin endpoint's JSON body (spec §6 "HTTP gateway URL
/// shape": "`/p2pinfo` returns a JSON object `{ ID, Addrs }`").
#[derive(Deserialize)]
struct P2pInfo {
    #[serde(rename = "ID")]
    #[allow(dead_code)]
    id: String,
    #[serde(rename = "Addrs")]
    addrs: Vec<String>,
}

pub struct SmartHttpTransport {
    base_url: String,
    http: HttpDirectTransport,
    host: Arc<dyn Host>,
    discovery_config: DiscoveryConfig,
    cache: Arc<PeerAddrCache>,
}

impl SmartHttpTransport {
    pub fn new(base_url: &str, host: Arc<dyn Host>) -> Result<Self, DrpcError> {
        Self::with_cache(base_url, host, DiscoveryConfig::default(), cache::process_cache())
    }

    /// Build from a deserialized [`TransportConfig`], with its own
    /// size/TTL-bounded cache rather than the process-wide default.
    pub fn with_config(base_url: &str, host: Arc<dyn Host>, config: TransportConfig) -> Result<Self, DrpcError> {
        let cache = Arc::new(PeerAddrCache::new(config.cache_capacity, config.cache_ttl()));
        Ok(Self {
            base_url: base_url.to_owned(),
            http: HttpDirectTransport::with_tls_config(base_url, config.tls)?,
            host,
            discovery_config: config.discovery,
            cache,
        })
    }

    pub fn with_cache(base_url: &str, host: Arc<dyn Host>, discovery_config: DiscoveryConfig, cache: Arc<PeerAddrCache>) -> Result<Self, DrpcError> {
        Ok(Self {
            base_url: base_url.to_owned(),
            http: HttpDirectTransport::new(base_url)?,
            host,
            discovery_config,
            cache,
        })
    }

    /// Resolve `base_url` to a peer multi-address, preferring the cache,
    /// falling back to a `/p2pinfo` fetch (spec §4.G "Smart HTTP": "caches
    /// the result").
    async fn resolve_peer_addr(&self) -> Result<Multiaddr, DrpcError> {
        if let Some(addr) = self.cache.get(&self.base_url) {
            return Ok(addr);
        }

        let info = self
            .http
            .unary("/p2pinfo", "application/json", Bytes::new(), CallOptions::default())
            .await?;
        let info: P2pInfo = serde_json::from_slice(&info.body).map_err(|err| DrpcError::data_loss(format!("malformed /p2pinfo body: {err}")))?;

        let mut addrs: Vec<Multiaddr> = info.addrs.iter().filter_map(|addr| addr.parse().ok()).filter(|addr| peer_id_of(addr).is_some()).collect();
        addrs.sort_by_key(|addr| !is_loopback(addr));

        let chosen = addrs
            .into_iter()
            .next()
            .ok_or_else(|| DrpcError::unavailable(format!("/p2pinfo for {} returned no usable address", self.base_url)))?;

        self.cache.insert(self.base_url.clone(), chosen.clone());
        Ok(chosen)
    }

    async fn native_transport(&self, options: &CallOptions) -> Result<NativeTransport, DrpcError> {
        let addr = self.resolve_peer_addr().await?;
        NativeTransport::resolve(self.host.clone(), &addr.to_string(), self.discovery_config, options.signal.clone()).await
    }
}

#[async_trait]
impl ClientTransport for SmartHttpTransport {
    async fn unary(&self, method: &str, content_type: &str, input: Bytes, options: CallOptions) -> Result<UnaryResponse, DrpcError> {
        self.http.unary(method, content_type, input, options).await
    }

    /// Server-streaming stays on HTTP-direct unchanged; client-streaming and
    /// bidi streaming fall back to the native peer-stream transport (spec
    /// §4.G).
    async fn stream(&self, method: &str, content_type: &str, kind: StreamKind, options: CallOptions) -> Result<StreamResponse, DrpcError> {
        match kind {
            StreamKind::ServerStreaming => self.http.stream(method, content_type, kind, options).await,
            StreamKind::ClientStreaming | StreamKind::Bidi => {
                let native = self.native_transport(&options).await?;
                native.stream(method, content_type, kind, options).await
            }
        }
    }
}
