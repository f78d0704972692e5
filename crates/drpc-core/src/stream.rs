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

//! The byte-oriented stream abstraction a `Host` hands back (spec §3
//! "Stream").

use std::pin::Pin;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::identity::{Multiaddr, PeerId};

/// Anything that is a reliable, full-duplex, byte-oriented channel. Blanket
/// implemented for every type that already satisfies the bounds so adapters
/// never need a bespoke wrapper just to produce a trait object.
pub trait RawStream: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin + ?Sized> RawStream for T {}

pub type BoxedStream = Pin<Box<dyn RawStream>>;

/// Whether a stream was opened by us (`Outbound`) or accepted from a peer
/// (`Inbound`). Observable per spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamDirection {
    Inbound,
    Outbound,
}

/// A raw peer stream plus the metadata the adapters in `drpc-envelope` need
/// (remote identity, direction, and the addresses used to synthesize
/// classical socket addresses for logging).
pub struct PeerStream {
    pub inner: BoxedStream,
    pub direction: StreamDirection,
    pub remote_peer: PeerId,
    pub remote_addr: Option<Multiaddr>,
    pub local_addr: Option<Multiaddr>,
}

impl PeerStream {
    pub fn new(
        inner: BoxedStream,
        direction: StreamDirection,
        remote_peer: PeerId,
        remote_addr: Option<Multiaddr>,
        local_addr: Option<Multiaddr>,
    ) -> Self {
        Self {
            inner,
            direction,
            remote_peer,
            remote_addr,
            local_addr,
        }
    }
}
