//! The Stream-Conn adapter (spec §4.A): presents a peer stream as a
//! byte-oriented connection with `read`/`write`/`close`, deadlines, and
//! address getters that never fail.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll};
use std::time::Instant;

use drpc_core::multiaddr::to_socket_addr;
use drpc_core::{BoxedStream, PeerId, PeerStream, StreamDirection};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// A peer stream wrapped as a classical byte connection.
pub struct StreamConn {
    inner: BoxedStream,
    direction: StreamDirection,
    remote_peer: PeerId,
    local_addr: SocketAddr,
    remote_addr: SocketAddr,
    read_deadline: Mutex<Option<Instant>>,
    write_deadline: Mutex<Option<Instant>>,
}

impl StreamConn {
    pub fn new(stream: PeerStream) -> Self {
        let local_addr = stream.local_addr.as_ref().map(to_socket_addr).unwrap_or(drpc_core::multiaddr::FALLBACK_ADDR);
        let remote_addr = stream
            .remote_addr
            .as_ref()
            .map(to_socket_addr)
            .unwrap_or(drpc_core::multiaddr::FALLBACK_ADDR);
        Self {
            inner: stream.inner,
            direction: stream.direction,
            remote_peer: stream.remote_peer,
            local_addr,
            remote_addr,
            read_deadline: Mutex::new(None),
            write_deadline: Mutex::new(None),
        }
    }

    pub fn direction(&self) -> StreamDirection {
        self.direction
    }

    pub fn remote_peer(&self) -> PeerId {
        self.remote_peer
    }

    /// Always succeeds, falling back to `127.0.0.1:0` per spec §4.A.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Always succeeds, falling back to `127.0.0.1:0` per spec §4.A.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn set_read_deadline(&self, deadline: Option<Instant>) {
        *self.read_deadline.lock().unwrap() = deadline;
    }

    pub fn set_write_deadline(&self, deadline: Option<Instant>) {
        *self.write_deadline.lock().unwrap() = deadline;
    }
}

impl AsyncRead for StreamConn {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if let Some(deadline) = *this.read_deadline.lock().unwrap() {
            if Instant::now() >= deadline {
                return Poll::Ready(Err(io::Error::new(io::ErrorKind::TimedOut, "read deadline exceeded")));
            }
        }
        this.inner.as_mut().poll_read(cx, buf)
    }
}

impl AsyncWrite for StreamConn {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if let Some(deadline) = *this.write_deadline.lock().unwrap() {
            if Instant::now() >= deadline {
                return Poll::Ready(Err(io::Error::new(io::ErrorKind::TimedOut, "write deadline exceeded")));
            }
        }
        this.inner.as_mut().poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().inner.as_mut().poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().inner.as_mut().poll_shutdown(cx)
    }
}
