//! Reliable byte-range transfer over one stream.
//!
//! Production nodes use a TCP socket; tests plug in `tokio::io::duplex`.
//!
//! # Example
//!
//! ```ignore
//! use skyalt_node::transport::Connection;
//!
//! let mut conn = Connection::connect("127.0.0.1", 8080, None).await?;
//! conn.send(b"hello").await?;
//! let reply = conn.receive(5).await?;
//! conn.close().await;
//! ```

use std::future::Future;
use std::io::ErrorKind;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{NodeError, Result};

/// Lifecycle of a connection. There is no transition back to `Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No stream has been attached yet.
    Disconnected,
    /// Stream is open and usable.
    Connected,
    /// Peer closed, an I/O error occurred, or `close()` was called.
    Closed,
}

/// Outcome of a full-length read loop.
#[derive(Debug)]
enum Transfer {
    /// Every requested byte was moved.
    Complete,
    /// The peer performed an orderly close (zero-byte read).
    PeerClosed,
    /// The stream reported an unrecoverable error.
    Failed(NodeError),
}

/// A single stream owned by one client.
pub struct Connection<S> {
    stream: Option<S>,
    state: ConnectionState,
    io_timeout: Option<Duration>,
}

impl Connection<TcpStream> {
    /// Connect to `host:port` over TCP.
    ///
    /// `io_timeout` bounds the connect attempt and every later partial read
    /// or write. `None` blocks indefinitely.
    pub async fn connect(host: &str, port: u16, io_timeout: Option<Duration>) -> Result<Self> {
        let stream = bounded(io_timeout, TcpStream::connect((host, port))).await?;
        stream.set_nodelay(true)?;
        tracing::debug!("Connected to {}:{}", host, port);

        Ok(Self::from_stream(stream).with_io_timeout(io_timeout))
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a connection with no stream attached.
    pub fn new() -> Self {
        Self {
            stream: None,
            state: ConnectionState::Disconnected,
            io_timeout: None,
        }
    }

    /// Wrap an already-connected stream.
    pub fn from_stream(stream: S) -> Self {
        Self {
            stream: Some(stream),
            state: ConnectionState::Connected,
            io_timeout: None,
        }
    }

    /// Set the per-operation timeout.
    pub fn with_io_timeout(mut self, io_timeout: Option<Duration>) -> Self {
        self.io_timeout = io_timeout;
        self
    }

    /// Current lifecycle state.
    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Check if the connection can still carry I/O.
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Send all of `data`, retrying partial writes.
    ///
    /// Any hard error closes the connection; nothing is retried after it.
    pub async fn send(&mut self, data: &[u8]) -> Result<()> {
        let limit = self.io_timeout;
        let stream = self.usable_stream()?;

        if let Err(e) = write_fully(stream, data, limit).await {
            tracing::error!("send() failed: {}", e);
            self.state = ConnectionState::Closed;
            return Err(e);
        }
        Ok(())
    }

    /// Receive exactly `count` bytes.
    ///
    /// A zero-byte read from the peer tears the stream down immediately and
    /// reports [`NodeError::ConnectionClosed`]. A read error marks the
    /// connection closed; the stream itself is released by `close()` or drop.
    pub async fn receive(&mut self, count: usize) -> Result<Bytes> {
        let limit = self.io_timeout;
        let stream = self.usable_stream()?;

        let mut buf = BytesMut::zeroed(count);
        match read_fully(stream, &mut buf, limit).await {
            Transfer::Complete => Ok(buf.freeze()),
            Transfer::PeerClosed => {
                tracing::debug!("Peer closed the connection");
                self.teardown().await;
                Err(NodeError::ConnectionClosed)
            }
            Transfer::Failed(e) => {
                tracing::error!("recv() failed: {}", e);
                self.state = ConnectionState::Closed;
                Err(e)
            }
        }
    }

    /// Shut the stream down and release it. Calling this again is a no-op.
    pub async fn close(&mut self) {
        self.teardown().await;
    }

    fn usable_stream(&mut self) -> Result<&mut S> {
        if self.state != ConnectionState::Connected {
            return Err(NodeError::NotConnected);
        }
        self.stream.as_mut().ok_or(NodeError::NotConnected)
    }

    async fn teardown(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            // The peer may already be gone; shutdown errors carry no information.
            let _ = stream.shutdown().await;
            tracing::debug!("Connection released");
        }
        self.state = ConnectionState::Closed;
    }
}

impl<S> Default for Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Run an I/O future, optionally bounded by a timeout.
async fn bounded<F, T>(limit: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = std::io::Result<T>>,
{
    match limit {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(res) => res.map_err(NodeError::Io),
            Err(_) => Err(NodeError::Timeout),
        },
        None => fut.await.map_err(NodeError::Io),
    }
}

fn is_interrupted(err: &NodeError) -> bool {
    matches!(err, NodeError::Io(e) if e.kind() == ErrorKind::Interrupted)
}

async fn write_fully<S>(stream: &mut S, data: &[u8], limit: Option<Duration>) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let mut offset = 0;

    while offset < data.len() {
        match bounded(limit, stream.write(&data[offset..])).await {
            Ok(0) => {
                return Err(NodeError::Io(std::io::Error::new(
                    ErrorKind::WriteZero,
                    "write returned 0",
                )))
            }
            Ok(n) => offset += n,
            Err(e) if is_interrupted(&e) => continue,
            Err(e) => return Err(e),
        }
    }

    bounded(limit, stream.flush()).await
}

async fn read_fully<S>(stream: &mut S, buf: &mut [u8], limit: Option<Duration>) -> Transfer
where
    S: AsyncRead + Unpin,
{
    let mut offset = 0;

    while offset < buf.len() {
        match bounded(limit, stream.read(&mut buf[offset..])).await {
            Ok(0) => return Transfer::PeerClosed,
            Ok(n) => offset += n,
            Err(e) if is_interrupted(&e) => continue,
            Err(e) => return Transfer::Failed(e),
        }
    }

    Transfer::Complete
}
