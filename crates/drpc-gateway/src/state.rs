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

use drpc_core::Host;
use drpc_pool::{Pool, PoolConfig};
use serde::Deserialize;

/// Config for the gateway's share of the stack: just the pool it leases
/// outbound streams from (spec §6 config surface).
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub pool: PoolConfig,
}

/// Shared state behind every route: the host identity and the pool every
/// RPC leases a stream from.
pub struct GatewayState {
    pub(crate) host: Arc<dyn Host>,
    pub(crate) pool: Arc<Pool>,
}

impl GatewayState {
    pub fn new(host: Arc<dyn Host>) -> Arc<Self> {
        Self::with_config(host, GatewayConfig::default())
    }

    pub fn with_config(host: Arc<dyn Host>, config: GatewayConfig) -> Arc<Self> {
        let pool = Pool::for_host_with_config(host.clone(), config.pool);
        Arc::new(Self { host, pool })
    }
}
