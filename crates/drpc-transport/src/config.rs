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

//! Top-level config for the client transports: TLS knobs, ambient discovery
//! timing, and the URL→peer-addr cache's size and TTL, all loadable from one
//! deserialized blob (spec §6 config surface).

use std::time::Duration;

use drpc_discovery::DiscoveryConfig;
use serde::Deserialize;

use crate::cache::{DEFAULT_MAX_SIZE, DEFAULT_TTL};
use crate::http_direct::TlsConfig;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub tls: TlsConfig,
    pub discovery: DiscoveryConfig,
    #[serde(default = "TransportConfig::default_cache_capacity")]
    pub cache_capacity: usize,
    #[serde(default = "TransportConfig::default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,
}

impl TransportConfig {
    fn default_cache_capacity() -> usize {
        DEFAULT_MAX_SIZE
    }

    fn default_cache_ttl_ms() -> u64 {
        DEFAULT_TTL.as_millis() as u64
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsConfig::default(),
            discovery: DiscoveryConfig::default(),
            cache_capacity: Self::default_cache_capacity(),
            cache_ttl_ms: Self::default_cache_ttl_ms(),
        }
    }
}
