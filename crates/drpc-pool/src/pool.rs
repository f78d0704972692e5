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

//! The connection pool itself (spec §4.D): sharded per-peer reuse of
//! outbound streams, with a background eviction worker.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use ahash::AHasher;
use drpc_core::shutdown::Shutdown;
use drpc_core::{DrpcError, Host, PeerId, StreamProtocol};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};

use crate::entry::{now_nanos, ManagedStream, PeerConnEntry};

/// Power-of-two shard count (spec §3 "Pool shard").
const SHARD_COUNT: usize = 16;

pub const DEFAULT_MAX_STREAMS: usize = 10;
pub const DEFAULT_MAX_IDLE_TIME: Duration = Duration::from_secs(5 * 60);
const EVICTION_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, serde::Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Cap on idle streams per peer (spec §6 `maxStreams`).
    pub max_streams: usize,
    /// Duration before an idle `PeerConn` is evicted (spec §6 `maxIdleTime`).
    pub max_idle_time: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_streams: DEFAULT_MAX_STREAMS,
            max_idle_time: DEFAULT_MAX_IDLE_TIME,
        }
    }
}

#[derive(Default)]
struct Shard {
    entries: RwLock<HashMap<PeerId, Arc<PeerConnEntry>>>,
}

fn shard_index(peer: &PeerId) -> usize {
    let mut hasher = AHasher::default();
    peer.to_bytes().hash(&mut hasher);
    (hasher.finish() as usize) & (SHARD_COUNT - 1)
}

/// Sharded, per-host stream pool. Obtained through [`Pool::for_host`], which
/// maintains one instance per host identity (spec §4.D "the pool is
/// per-host; one pool instance per peer host, obtained from a process-wide
/// singleton keyed by host identity").
pub struct Pool {
    host: Arc<dyn Host>,
    shards: Vec<Shard>,
    config: PoolConfig,
    shutdown: Shutdown,
}

static REGISTRY: Lazy<Mutex<HashMap<PeerId, Arc<Pool>>>> = Lazy::new(|| Mutex::new(HashMap::new()));

impl Pool {
    pub fn for_host(host: Arc<dyn Host>) -> Arc<Pool> {
        Self::for_host_with_config(host, PoolConfig::default())
    }

    pub fn for_host_with_config(host: Arc<dyn Host>, config: PoolConfig) -> Arc<Pool> {
        let mut registry = REGISTRY.lock();
        registry
            .entry(host.local_peer_id())
            .or_insert_with(|| Pool::spawn(host, config))
            .clone()
    }

    /// Drop the process-wide singleton for a host, so a later `for_host`
    /// call builds a fresh pool. Exposed for tests that reuse a host
    /// identity across cases.
    pub fn forget_host(peer: &PeerId) {
        REGISTRY.lock().remove(peer);
    }

    fn spawn(host: Arc<dyn Host>, config: PoolConfig) -> Arc<Pool> {
        let pool = Arc::new(Pool {
            host,
            shards: (0..SHARD_COUNT).map(|_| Shard::default()).collect(),
            config,
            shutdown: Shutdown::new(),
        });

        let worker = pool.clone();
        tokio::spawn(async move { worker.run_eviction_loop().await });
        pool
    }

    /// Standalone constructor bypassing the process-wide singleton, for
    /// tests that want an isolated pool without touching the registry.
    pub fn standalone(host: Arc<dyn Host>, config: PoolConfig) -> Arc<Pool> {
        Pool::spawn(host, config)
    }

    pub async fn get_stream(&self, peer: PeerId, protocol: StreamProtocol) -> Result<ManagedStream, DrpcError> {
        let shard = &self.shards[shard_index(&peer)];

        let entry = {
            let guard = shard.entries.read();
            guard.get(&peer).cloned()
        };
        let entry = match entry {
            Some(entry) => entry,
            None => {
                let mut guard = shard.entries.write();
                guard.entry(peer).or_insert_with(|| Arc::new(PeerConnEntry::new(peer))).clone()
            }
        };

        let stream = entry.get_stream(self.host.as_ref(), protocol).await?;
        Ok(ManagedStream::new(stream, entry, peer, protocol, self.config.max_streams))
    }

    /// Number of idle streams currently held for `peer`, for test
    /// introspection (spec §8 scenario 5).
    pub fn idle_count(&self, peer: &PeerId) -> usize {
        let shard = &self.shards[shard_index(peer)];
        shard.entries.read().get(peer).map(|entry| entry.idle_len()).unwrap_or(0)
    }

    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    async fn run_eviction_loop(self: Arc<Self>) {
        let mut signal = self.shutdown.to_signal();
        let mut ticker = tokio::time::interval(EVICTION_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = signal.wait() => return,
                _ = ticker.tick() => self.evict_once(),
            }
        }
    }

    fn evict_once(&self) {
        let now = now_nanos();
        let max_idle_nanos = self.config.max_idle_time.as_nanos() as u64;

        for shard in &self.shards {
            let stale: Vec<PeerId> = {
                let guard = shard.entries.read();
                guard
                    .iter()
                    .filter(|(_, entry)| now.saturating_sub(entry.last_accessed_nanos()) > max_idle_nanos)
                    .map(|(peer, _)| *peer)
                    .collect()
            };
            if stale.is_empty() {
                continue;
            }

            let mut removed = Vec::with_capacity(stale.len());
            {
                let mut guard = shard.entries.write();
                for peer in &stale {
                    // Re-check staleness under the write lock: a concurrent
                    // get/release may have refreshed it since the read pass.
                    if guard
                        .get(peer)
                        .map(|entry| now.saturating_sub(entry.last_accessed_nanos()) > max_idle_nanos)
                        .unwrap_or(false)
                    {
                        if let Some(entry) = guard.remove(peer) {
                            removed.push(entry);
                        }
                    }
                }
            }

            for entry in removed {
                let _closed = entry.take_idle_streams();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drpc_core::identity::DRPC_WEBSTREAM_PROTOCOL;
    use drpc_core::mock::MockHost;

    #[tokio::test]
    async fn get_stream_dials_and_reuses_on_release() {
        let server = MockHost::new(PeerId::random());
        let client = MockHost::new(PeerId::random());
        client.connect(&server);
        let _server_rx = server.register_protocol(DRPC_WEBSTREAM_PROTOCOL);

        let pool = Pool::standalone(client.clone(), PoolConfig::default());
        assert_eq!(pool.idle_count(&server.local_peer_id()), 0);

        let mut lease = pool.get_stream(server.local_peer_id(), DRPC_WEBSTREAM_PROTOCOL).await.unwrap();
        assert_eq!(pool.idle_count(&server.local_peer_id()), 0);

        lease.close();
        assert_eq!(pool.idle_count(&server.local_peer_id()), 1);

        let lease2 = pool.get_stream(server.local_peer_id(), DRPC_WEBSTREAM_PROTOCOL).await.unwrap();
        assert_eq!(pool.idle_count(&server.local_peer_id()), 0);
        drop(lease2);
    }

    #[tokio::test]
    async fn reset_does_not_return_stream_to_idle_stack() {
        let server = MockHost::new(PeerId::random());
        let client = MockHost::new(PeerId::random());
        client.connect(&server);
        let _server_rx = server.register_protocol(DRPC_WEBSTREAM_PROTOCOL);

        let pool = Pool::standalone(client.clone(), PoolConfig::default());
        let mut lease = pool.get_stream(server.local_peer_id(), DRPC_WEBSTREAM_PROTOCOL).await.unwrap();
        lease.reset();
        assert_eq!(pool.idle_count(&server.local_peer_id()), 0);
    }

    #[tokio::test]
    async fn double_close_is_idempotent() {
        let server = MockHost::new(PeerId::random());
        let client = MockHost::new(PeerId::random());
        client.connect(&server);
        let _server_rx = server.register_protocol(DRPC_WEBSTREAM_PROTOCOL);

        let pool = Pool::standalone(client.clone(), PoolConfig::default());
        let mut lease = pool.get_stream(server.local_peer_id(), DRPC_WEBSTREAM_PROTOCOL).await.unwrap();
        lease.close();
        lease.close();
        assert_eq!(pool.idle_count(&server.local_peer_id()), 1);
    }

    #[tokio::test]
    async fn idle_stack_respects_max_streams() {
        let server = MockHost::new(PeerId::random());
        let client = MockHost::new(PeerId::random());
        client.connect(&server);
        let _server_rx = server.register_protocol(DRPC_WEBSTREAM_PROTOCOL);

        let pool = Pool::standalone(
            client.clone(),
            PoolConfig {
                max_streams: 1,
                max_idle_time: DEFAULT_MAX_IDLE_TIME,
            },
        );

        let mut lease1 = pool.get_stream(server.local_peer_id(), DRPC_WEBSTREAM_PROTOCOL).await.unwrap();
        let mut lease2 = pool.get_stream(server.local_peer_id(), DRPC_WEBSTREAM_PROTOCOL).await.unwrap();
        lease1.close();
        assert_eq!(pool.idle_count(&server.local_peer_id()), 1);
        lease2.close();
        assert_eq!(pool.idle_count(&server.local_peer_id()), 1);
    }
}
