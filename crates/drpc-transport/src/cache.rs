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

//! The URL→peer-address cache Smart HTTP uses to remember a `/p2pinfo`
//! lookup (spec §3 "TTL-LRU", §5 "URL→peer-addr cache": "process-wide lock on
//! the TTL-LRU").

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use drpc_core::Multiaddr;
use lru::LruCache;
use once_cell::sync::Lazy;
use parking_lot::Mutex;

pub const DEFAULT_MAX_SIZE: usize = 256;
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

struct Entry {
    addr: Multiaddr,
    inserted_at: Instant,
}

/// A size-bounded, time-bounded cache. Entries past `ttl` are treated as
/// absent rather than evicted eagerly — the next lookup miss naturally
/// replaces them.
pub struct PeerAddrCache {
    ttl: Duration,
    inner: Mutex<LruCache<String, Entry>>,
}

impl PeerAddrCache {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_size.max(1)).expect("max_size.max(1) is never zero");
        Self {
            ttl,
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, url: &str) -> Option<Multiaddr> {
        let mut guard = self.inner.lock();
        let entry = guard.get(url)?;
        if entry.inserted_at.elapsed() > self.ttl {
            guard.pop(url);
            return None;
        }
        Some(entry.addr.clone())
    }

    pub fn insert(&self, url: String, addr: Multiaddr) {
        self.inner.lock().put(
            url,
            Entry {
                addr,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PeerAddrCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE, DEFAULT_TTL)
    }
}

static PROCESS_CACHE: Lazy<Mutex<Arc<PeerAddrCache>>> = Lazy::new(|| Mutex::new(Arc::new(PeerAddrCache::default())));

/// The process-wide cache every Smart HTTP transport shares by default (spec
/// §5 "the URL→peer-addr cache is process-wide").
pub fn process_cache() -> Arc<PeerAddrCache> {
    PROCESS_CACHE.lock().clone()
}

/// Replace the process-wide cache with a fresh instance, so tests don't leak
/// entries across cases (spec §9 "Global mutable state": "tests MUST be able
/// to inject a fresh cache per test").
pub fn reset_process_cache() {
    *PROCESS_CACHE.lock() = Arc::new(PeerAddrCache::default());
}
