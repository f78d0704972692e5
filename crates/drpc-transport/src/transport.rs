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

//! The shared client-transport interface (spec §4.G): two operations, `unary`
//! and `stream`, implemented identically in shape by all three transports.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use drpc_core::shutdown::ShutdownSignal;
use drpc_core::DrpcError;
use http::HeaderMap;
use tokio::sync::mpsc;

/// Caller-supplied knobs common to `unary` and `stream` (spec §4.G operation
/// signatures: "signal, timeoutMs, headers, ctxValues").
#[derive(Clone)]
pub struct CallOptions {
    pub signal: Option<ShutdownSignal>,
    pub timeout: Option<Duration>,
    pub headers: HeaderMap,
    pub ctx_values: HashMap<String, String>,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            signal: None,
            timeout: None,
            headers: HeaderMap::new(),
            ctx_values: HashMap::new(),
        }
    }
}

impl CallOptions {
    /// Run `fut` honoring both the caller's `signal` and `timeout` (spec
    /// §4.G "Common error handling": "composing caller signal with an inner
    /// abort controller").
    pub async fn race<F, T>(&self, fut: F) -> Result<T, DrpcError>
    where
        F: std::future::Future<Output = Result<T, DrpcError>>,
    {
        let mut signal = self.signal.clone();
        let guarded = async move {
            match &mut signal {
                Some(signal) => {
                    tokio::select! {
                        result = fut => result,
                        _ = signal.wait() => Err(DrpcError::Cancelled),
                    }
                }
                None => fut.await,
            }
        };

        match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, guarded).await.unwrap_or(Err(DrpcError::DeadlineExceeded)),
            None => guarded.await,
        }
    }
}

/// Result of a `unary` call: the raw response bytes plus the content-type
/// they were decoded under.
#[derive(Debug, Clone)]
pub struct UnaryResponse {
    pub content_type: String,
    pub body: Bytes,
}

/// One message out of a `stream` call's response iterator.
#[derive(Debug, Clone)]
pub struct StreamMessage {
    pub content_type: String,
    pub body: Bytes,
}

/// Result of a `stream` call: an input sink plus an output source, so
/// callers can interleave sends and receives for true bidi streaming.
pub struct StreamResponse {
    pub outbound: mpsc::Sender<Bytes>,
    pub inbound: mpsc::Receiver<Result<StreamMessage, DrpcError>>,
}

/// Which of the three streaming call shapes `stream` is being asked for
/// (spec §4.G: "server-streaming stays on HTTP-direct unchanged, falling
/// back to native only for client-streaming/bidi-streaming"). HTTP-direct
/// and the native transport don't care — they speak the same shape either
/// way — but Smart HTTP needs this to decide whether to fall back at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    ClientStreaming,
    ServerStreaming,
    Bidi,
}

#[async_trait]
pub trait ClientTransport: Send + Sync {
    async fn unary(&self, method: &str, content_type: &str, input: Bytes, options: CallOptions) -> Result<UnaryResponse, DrpcError>;

    async fn stream(&self, method: &str, content_type: &str, kind: StreamKind, options: CallOptions) -> Result<StreamResponse, DrpcError>;
}
