//! The Listener adapter (spec §4.B): presents a registered protocol's
//! inbound streams as an accept-loop.

use std::net::SocketAddr;

use drpc_core::multiaddr::first_translatable_or_fallback;
use drpc_core::shutdown::Shutdown;
use drpc_core::{DrpcError, Host, Multiaddr, StreamProtocol};
use tokio::sync::{mpsc, Mutex};

use crate::stream_conn::StreamConn;

fn listener_closed() -> DrpcError {
    DrpcError::unavailable("listener closed")
}

/// Wraps a `Host`'s registered-protocol channel. `accept()` blocks until an
/// inbound stream arrives; `close()` makes all pending and future `accept()`
/// calls return deterministically with an end-of-stream error.
pub struct Listener {
    protocol: StreamProtocol,
    listen_addrs: Vec<Multiaddr>,
    inbound: Mutex<mpsc::Receiver<drpc_core::host::InboundStream>>,
    shutdown: Shutdown,
}

impl Listener {
    pub fn bind(host: &dyn Host, protocol: StreamProtocol) -> Self {
        let listen_addrs = host.listen_addresses();
        let inbound = host.register_protocol(protocol);
        Self {
            protocol,
            listen_addrs,
            inbound: Mutex::new(inbound),
            shutdown: Shutdown::new(),
        }
    }

    pub fn protocol(&self) -> StreamProtocol {
        self.protocol
    }

    /// First translatable listen multi-address, or the fallback (spec
    /// §4.B).
    pub fn local_addr(&self) -> SocketAddr {
        first_translatable_or_fallback(&self.listen_addrs)
    }

    pub async fn accept(&self) -> Result<StreamConn, DrpcError> {
        let mut signal = self.shutdown.to_signal();
        let mut rx = self.inbound.lock().await;
        tokio::select! {
            _ = signal.wait() => Err(listener_closed()),
            item = rx.recv() => item.map(|inbound| StreamConn::new(inbound.stream)).ok_or_else(listener_closed),
        }
    }

    pub fn close(&self) {
        self.shutdown.trigger();
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_triggered()
    }
}
