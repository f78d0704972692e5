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

//! `PeerConn` entries and the leases (`ManagedStream`) the pool hands out
//! (spec §3 "Peer-connection entry", §4.D "Release"/"State machine per
//! lease").

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use drpc_core::{DrpcError, Host, Link, PeerId, StreamProtocol};
use drpc_envelope::StreamConn;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Monotonic nanosecond counter for `last-accessed`. Readers use
/// `Ordering::Relaxed`: a stale value only delays eviction, never falsely
/// triggers it (spec §5).
pub(crate) fn now_nanos() -> u64 {
    EPOCH.elapsed().as_nanos() as u64
}

pub(crate) struct PeerConnEntry {
    peer: PeerId,
    link: Mutex<Option<Arc<dyn Link>>>,
    idle: Mutex<Vec<(StreamProtocol, StreamConn)>>,
    last_accessed_nanos: AtomicU64,
}

impl PeerConnEntry {
    pub(crate) fn new(peer: PeerId) -> Self {
        Self {
            peer,
            link: Mutex::new(None),
            idle: Mutex::new(Vec::new()),
            last_accessed_nanos: AtomicU64::new(now_nanos()),
        }
    }

    pub(crate) fn touch(&self) {
        self.last_accessed_nanos.store(now_nanos(), Ordering::Relaxed);
    }

    pub(crate) fn last_accessed_nanos(&self) -> u64 {
        self.last_accessed_nanos.load(Ordering::Relaxed)
    }

    pub(crate) fn idle_len(&self) -> usize {
        self.idle.lock().len()
    }

    /// Remove and discard every idle stream, closing them (spec §4.D
    /// eviction phase 3, "close collected streams outside any lock" — here
    /// the lock is already released by the time the caller drops the
    /// returned vec).
    pub(crate) fn take_idle_streams(&self) -> Vec<(StreamProtocol, StreamConn)> {
        std::mem::take(&mut *self.idle.lock())
    }

    /// Pop the most recently idled stream for `protocol`, if any (LIFO for
    /// hot-cache locality, spec §4.D "Get").
    fn pop_idle(&self, protocol: StreamProtocol) -> Option<StreamConn> {
        let mut idle = self.idle.lock();
        let pos = idle.iter().rposition(|(p, _)| *p == protocol)?;
        Some(idle.remove(pos).1)
    }

    /// Returns an existing non-closed link, or dials a fresh one via the
    /// host (spec §4.D "Get": "unlock and dial a fresh stream via the host
    /// with the requested protocol").
    async fn live_link(&self, host: &dyn Host) -> Result<Arc<dyn Link>, DrpcError> {
        if let Some(link) = self.link.lock().clone() {
            if !link.is_closed() {
                return Ok(link);
            }
        }

        let link = match host.connected_link(&self.peer) {
            Some(link) if !link.is_closed() => link,
            _ => host.dial(self.peer, None).await?,
        };
        *self.link.lock() = Some(link.clone());
        Ok(link)
    }

    pub(crate) async fn get_stream(&self, host: &dyn Host, protocol: StreamProtocol) -> Result<StreamConn, DrpcError> {
        self.touch();
        if let Some(stream) = self.pop_idle(protocol) {
            return Ok(stream);
        }
        let link = self.live_link(host).await?;
        let peer_stream = link.open_stream(protocol).await?;
        Ok(StreamConn::new(peer_stream))
    }

    /// Non-lock fast check first: a closed link drops the stream outright.
    /// Otherwise push it back if there's room, else drop it (spec §4.D
    /// "Release").
    pub(crate) fn release(&self, stream: StreamConn, protocol: StreamProtocol, max_streams: usize) {
        let link_closed = match self.link.lock().as_ref() {
            Some(link) => link.is_closed(),
            None => true,
        };
        if link_closed {
            return;
        }

        let mut idle = self.idle.lock();
        if idle.len() < max_streams {
            idle.push((protocol, stream));
            drop(idle);
            self.touch();
        }
    }
}

fn lease_closed_error() -> DrpcError {
    DrpcError::internal("lease used after close/reset")
}

/// A pool-issued, exclusive handle to a stream (spec §3 "Stream lease").
/// Exactly one lease exists per underlying stream at a time; `close`/`reset`
/// are idempotent against `closed`, so whichever of an explicit call or the
/// `Drop` fallback runs first performs the transition (spec §4.D "State
/// machine per lease").
pub struct ManagedStream {
    stream: Option<StreamConn>,
    entry: Arc<PeerConnEntry>,
    peer: PeerId,
    protocol: StreamProtocol,
    max_streams: usize,
    closed: AtomicBool,
}

impl ManagedStream {
    pub(crate) fn new(stream: StreamConn, entry: Arc<PeerConnEntry>, peer: PeerId, protocol: StreamProtocol, max_streams: usize) -> Self {
        Self {
            stream: Some(stream),
            entry,
            peer,
            protocol,
            max_streams,
            closed: AtomicBool::new(false),
        }
    }

    pub fn peer(&self) -> PeerId {
        self.peer
    }

    pub fn protocol(&self) -> StreamProtocol {
        self.protocol
    }

    /// Return the stream to the owning `PeerConn`'s idle stack, subject to
    /// the capacity and link-liveness checks in `PeerConnEntry::release`.
    pub fn close(&mut self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(stream) = self.stream.take() {
            self.entry.release(stream, self.protocol, self.max_streams);
        }
    }

    /// Discard the stream unconditionally rather than returning it to the
    /// pool.
    pub fn reset(&mut self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.stream.take();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Drop for ManagedStream {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::Acquire) {
            self.reset();
        }
    }
}

impl AsyncRead for ManagedStream {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        match this.stream.as_mut() {
            Some(stream) => Pin::new(stream).poll_read(cx, buf),
            None => Poll::Ready(Err(io::Error::new(io::ErrorKind::NotConnected, lease_closed_error().to_string()))),
        }
    }
}

impl AsyncWrite for ManagedStream {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        match this.stream.as_mut() {
            Some(stream) => Pin::new(stream).poll_write(cx, buf),
            None => Poll::Ready(Err(io::Error::new(io::ErrorKind::NotConnected, lease_closed_error().to_string()))),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().stream.as_mut() {
            Some(stream) => Pin::new(stream).poll_flush(cx),
            None => Poll::Ready(Ok(())),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().stream.as_mut() {
            Some(stream) => Pin::new(stream).poll_shutdown(cx),
            None => Poll::Ready(Ok(())),
        }
    }
}
