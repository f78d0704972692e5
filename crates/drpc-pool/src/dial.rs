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

//! Best-first multi-peer dial (spec §4.D "Best-first multi-peer dial").

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use drpc_core::shutdown::Shutdown;
use drpc_core::{DrpcError, Host, Multiaddr, PeerId};
use tokio::sync::mpsc;

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(2);
const OVERALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Fan out one worker per candidate peer; return the first to connect
/// successfully, cancelling the rest. An empty candidate map is an immediate
/// `Unavailable` error (spec §8 "Zero candidates to best-first-dial:
/// immediate Unavailable").
pub async fn connect_first_available(host: Arc<dyn Host>, candidates: HashMap<PeerId, Vec<Multiaddr>>) -> Result<PeerId, DrpcError> {
    if candidates.is_empty() {
        return Err(DrpcError::unavailable("no candidates"));
    }

    let (tx, mut rx) = mpsc::channel::<PeerId>(1);
    let cancel = Shutdown::new();
    let last_error: Arc<StdMutex<Option<DrpcError>>> = Arc::new(StdMutex::new(None));
    let mut handles = Vec::with_capacity(candidates.len());

    for (peer, addrs) in candidates {
        let host = host.clone();
        let tx = tx.clone();
        let last_error = last_error.clone();
        let mut signal = cancel.to_signal();

        handles.push(tokio::spawn(async move {
            if let Some(link) = host.connected_link(&peer) {
                if !link.is_closed() {
                    let _ = tx.send(peer).await;
                    return;
                }
            }

            let addr = addrs.first().cloned();
            match host.dial(peer, addr.clone()).await {
                Ok(_) => {
                    let _ = tx.send(peer).await;
                    return;
                }
                Err(err) => *last_error.lock().unwrap() = Some(err),
            }

            let mut backoff = INITIAL_BACKOFF;
            loop {
                tokio::select! {
                    _ = signal.wait() => return,
                    _ = tokio::time::sleep(backoff) => {}
                }

                match host.dial(peer, addr.clone()).await {
                    Ok(_) => {
                        let _ = tx.send(peer).await;
                        return;
                    }
                    Err(err) => *last_error.lock().unwrap() = Some(err),
                }
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }));
    }
    drop(tx);

    let result = tokio::time::timeout(OVERALL_TIMEOUT, rx.recv()).await;
    cancel.trigger();
    for handle in &handles {
        handle.abort();
    }

    match result {
        Ok(Some(peer)) => Ok(peer),
        Ok(None) => Err(last_error
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| DrpcError::unavailable("all candidates failed"))),
        Err(_) => Err(last_error.lock().unwrap().take().unwrap_or(DrpcError::DeadlineExceeded)),
    }
}
