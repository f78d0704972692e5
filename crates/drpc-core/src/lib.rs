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

//! Shared foundation for the dRPC workspace.
//!
//! This crate owns nothing that touches the network directly. It defines the
//! data model from the dRPC wire specification (peer identity, multi-address,
//! link, stream) and the `Host`/`PeerStore`/`Link` trait boundary that the
//! rest of the workspace is built against. A concrete implementation of that
//! boundary (a real libp2p swarm wired up with noise/yamux/relay/quic/mdns/
//! kad/gossipsub) is an external collaborator, consumed as-is through these
//! traits.

pub mod error;
pub mod host;
pub mod identity;
#[cfg(feature = "test-support")]
pub mod mock;
pub mod multiaddr;
pub mod shutdown;
pub mod stream;

pub use error::{ConnectCode, DrpcError, Result};
pub use host::{DiscoveredPeer, Host, Link, PeerStore};
pub use identity::{Multiaddr, PeerId, StreamProtocol};
pub use stream::{BoxedStream, PeerStream, RawStream, StreamDirection};
