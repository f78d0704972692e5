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

//! Smart router (spec §4.H): picks a transport from a destination string
//! without the caller needing to know which kind of address it is.

use std::sync::Arc;

use drpc_core::shutdown::ShutdownSignal;
use drpc_core::{DrpcError, Host};
use drpc_discovery::DiscoveryConfig;

use crate::native::NativeTransport;
use crate::smart_http::SmartHttpTransport;
use crate::transport::ClientTransport;

/// Route a destination string to the transport that can reach it (spec
/// §4.H): an `http://`/`https://` prefix selects Smart HTTP; anything else is
/// parsed as a comma-separated multi-address bundle for the native
/// peer-stream transport. `signal` is forwarded into the discoverer when the
/// destination needs resolving (spec §5 cancellation).
///
/// The spec's "create a client-mode host if one is not supplied" falls to
/// the caller here: constructing a live host means wiring up a concrete
/// libp2p swarm, which is outside this workspace's `Host` trait boundary
/// (spec §1/§2) — there is no default this crate could fabricate that would
/// actually be dialable.
pub async fn route(destination: &str, host: Arc<dyn Host>, config: DiscoveryConfig, signal: Option<ShutdownSignal>) -> Result<Arc<dyn ClientTransport>, DrpcError> {
    if destination.starts_with("http://") || destination.starts_with("https://") {
        return Ok(Arc::new(SmartHttpTransport::new(destination, host)?));
    }

    let transport = NativeTransport::resolve(host, destination, config, signal).await?;
    Ok(Arc::new(transport))
}
