//! Client builder and request/response state machine.
//!
//! The [`ClientBuilder`] configures connection settings. The [`NodeClient`]
//! manages the lifecycle:
//! 1. Register attributes
//! 2. Connect and send the handshake (`uid` + full snapshot)
//! 3. Wait for an attrs update from the host and apply it
//! 4. Send outputs and progress, then go back to 3
//!
//! ```text
//! Idle ─start─► Started ─receive─► AwaitingInput ─update─► Processing
//!                  ▲                     │                     │
//!                  └──────finalize───────┼─────────────────────┘
//!                                        └─peer close / error─► Closed
//! ```
//!
//! # Example
//!
//! ```ignore
//! use skyalt_node::NodeClient;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> skyalt_node::Result<()> {
//!     let mut client: NodeClient = NodeClient::new();
//!     let file = client.add_attr("file", "");
//!     let rows = client.add_output("rows", "[]");
//!
//!     client.start("uid-1", "4040").await?;
//!     while client.next_request().await {
//!         if !client.registry_mut().require_filled(file, "empty") {
//!             client.finalize().await?;
//!             continue;
//!         }
//!         client.attr_mut(rows).value = "[{}]".to_string();
//!         client.finalize().await?;
//!     }
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::attribute::{AttrId, Attribute, AttributeRegistry, UpdateOutcome};
use crate::error::{NodeError, Result};
use crate::handler::{NodeHandler, EMPTY_INPUT_ERROR};
use crate::protocol::{
    encode_attrs, encode_handshake, encode_progress, parse_number, read_message, Message,
    DEFAULT_MAX_FIELD_SIZE, PROGRESS_DONE,
};
use crate::transport::Connection;

/// Default host address the node connects to.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Connection settings for a node client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Host address; the port comes from `start()`.
    pub host: String,
    /// Bound on connect and on each partial read/write. `None` waits forever.
    pub io_timeout: Option<Duration>,
    /// Largest name or value accepted from the host.
    pub max_field_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            io_timeout: None,
            max_field_size: DEFAULT_MAX_FIELD_SIZE,
        }
    }
}

/// Builder for configuring and creating a node client.
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    /// Create a new client builder.
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    /// Set the host address.
    ///
    /// Default: `127.0.0.1`
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the I/O timeout.
    ///
    /// Default: none (block until the host answers or closes)
    pub fn io_timeout(mut self, timeout: Duration) -> Self {
        self.config.io_timeout = Some(timeout);
        self
    }

    /// Set the maximum accepted name/value size.
    ///
    /// Default: 64 MB
    pub fn max_field_size(mut self, limit: usize) -> Self {
        self.config.max_field_size = limit;
        self
    }

    /// Build the client. No connection is made until `start()`.
    pub fn build<S>(self) -> NodeClient<S>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        NodeClient::with_config(self.config)
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Where the client is in its request cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Not connected yet; attributes may be registered.
    Idle,
    /// Handshake done, or the last request was answered.
    Started,
    /// Blocked waiting for the host's next update.
    AwaitingInput,
    /// An update was applied; the node is computing.
    Processing,
    /// The session ended. The client cannot be restarted.
    Closed,
}

/// What one inbound update did to the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Attribute entries in the message.
    pub attributes: usize,
    /// Field items written to the registry.
    pub applied: usize,
    /// Entries naming an attribute not in the registry.
    pub unknown_attributes: usize,
    /// Items with an unrecognised field tag.
    pub unknown_fields: usize,
}

/// A node client.
///
/// Owns the attribute registry and the connection to the host. All methods
/// take `&mut self`; the only suspension points are socket reads and writes.
pub struct NodeClient<S = TcpStream> {
    registry: AttributeRegistry,
    conn: Connection<S>,
    config: ClientConfig,
    state: ClientState,
}

impl NodeClient<TcpStream> {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Connect to the host on `port` and send the handshake.
    ///
    /// `port` is parsed permissively; a value of 0 (including unparsable
    /// text) is rejected. On failure the client is left closed.
    pub async fn start(&mut self, identity: &str, port: &str) -> Result<()> {
        self.ensure_idle()?;

        let port = match u16::try_from(parse_number(port.as_bytes())) {
            Ok(p) if p != 0 => p,
            _ => {
                self.state = ClientState::Closed;
                return Err(NodeError::InvalidPort(port.to_string()));
            }
        };

        match Connection::connect(&self.config.host, port, self.config.io_timeout).await {
            Ok(conn) => self.conn = conn,
            Err(e) => {
                tracing::error!("connect() to {}:{} failed: {}", self.config.host, port, e);
                self.state = ClientState::Closed;
                return Err(e);
            }
        }

        self.handshake(identity).await
    }
}

impl<S> NodeClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a client with default configuration.
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// Create a client with the given configuration.
    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            registry: AttributeRegistry::new(),
            conn: Connection::new(),
            config,
            state: ClientState::Idle,
        }
    }

    /// Register an input attribute.
    pub fn add_attr(&mut self, name: impl Into<String>, value: impl Into<String>) -> AttrId {
        self.registry.add(name, value)
    }

    /// Register an output (read-only) attribute.
    pub fn add_output(&mut self, name: impl Into<String>, value: impl Into<String>) -> AttrId {
        self.registry.add_output(name, value)
    }

    /// The attribute registry.
    pub fn registry(&self) -> &AttributeRegistry {
        &self.registry
    }

    /// The attribute registry, for modification.
    pub fn registry_mut(&mut self) -> &mut AttributeRegistry {
        &mut self.registry
    }

    /// An attribute by handle.
    pub fn attr(&self, id: AttrId) -> &Attribute {
        &self.registry[id]
    }

    /// An attribute by handle, for modification.
    pub fn attr_mut(&mut self, id: AttrId) -> &mut Attribute {
        &mut self.registry[id]
    }

    /// The active configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Current state.
    #[inline]
    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Check if the session is still open.
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    /// Send the handshake over an already-connected stream.
    pub async fn start_with_stream(&mut self, identity: &str, stream: S) -> Result<()> {
        self.ensure_idle()?;
        self.conn = Connection::from_stream(stream).with_io_timeout(self.config.io_timeout);
        self.handshake(identity).await
    }

    async fn handshake(&mut self, identity: &str) -> Result<()> {
        let mut buf = BytesMut::new();
        encode_handshake(&mut buf, identity, &self.registry);

        self.state = ClientState::Started;
        self.send_message(&buf).await?;
        tracing::debug!(
            "Handshake sent for {} with {} attributes",
            identity,
            self.registry.len()
        );
        Ok(())
    }

    /// Wait for the host's next attrs update and apply it.
    ///
    /// Returns `Ok(None)` when the host closed the connection. Errors are
    /// session-ending: the connection is closed and further calls fail with
    /// [`NodeError::NotConnected`] without blocking.
    pub async fn receive_request(&mut self) -> Result<Option<UpdateSummary>> {
        if !self.conn.is_connected() {
            if self.state != ClientState::Idle {
                self.state = ClientState::Closed;
            }
            return Err(NodeError::NotConnected);
        }
        self.state = ClientState::AwaitingInput;

        let entries = match read_message(&mut self.conn, self.config.max_field_size).await {
            Ok(Message::Attrs(entries)) => entries,
            Ok(other) => {
                let err = NodeError::Protocol(format!("Unknown message type({})", other.kind()));
                self.shutdown().await;
                return Err(err);
            }
            Err(NodeError::ConnectionClosed) => {
                self.shutdown().await;
                return Ok(None);
            }
            Err(e) => {
                self.shutdown().await;
                return Err(e);
            }
        };

        let mut summary = UpdateSummary {
            attributes: entries.len(),
            ..UpdateSummary::default()
        };

        for entry in entries {
            if self.registry.find(&entry.name).is_none() {
                tracing::warn!(
                    "Attribute({}) not found, skipping {} items",
                    entry.name,
                    entry.items.len()
                );
                summary.unknown_attributes += 1;
                continue;
            }

            for item in entry.items {
                match self.registry.apply_update(&entry.name, &item.field, item.value) {
                    UpdateOutcome::Applied => summary.applied += 1,
                    UpdateOutcome::UnknownField => summary.unknown_fields += 1,
                    UpdateOutcome::UnknownAttribute => {}
                }
            }
        }

        self.state = ClientState::Processing;
        tracing::trace!("Request applied: {}", self.registry.to_json());
        Ok(Some(summary))
    }

    /// Wait for the next request; `false` means the session is over.
    ///
    /// The reason is logged: host close at debug level, failures at error.
    pub async fn next_request(&mut self) -> bool {
        match self.receive_request().await {
            Ok(Some(_)) => true,
            Ok(None) => {
                tracing::debug!("Host closed the session");
                false
            }
            Err(e) => {
                tracing::error!("Session ended: {}", e);
                false
            }
        }
    }

    /// Report progress, optionally preceded by a full attribute snapshot.
    pub async fn report_progress(
        &mut self,
        fraction: f64,
        description: &str,
        error: &str,
        include_snapshot: bool,
    ) -> Result<()> {
        let mut buf = BytesMut::new();
        if include_snapshot {
            encode_attrs(&mut buf, &self.registry);
        }
        encode_progress(&mut buf, fraction, description, error);
        self.send_message(&buf).await
    }

    /// Send all outputs and mark the request finished.
    pub async fn finalize(&mut self) -> Result<()> {
        self.report_progress(PROGRESS_DONE, "", "", true).await?;
        if self.state == ClientState::Processing {
            self.state = ClientState::Started;
        }
        Ok(())
    }

    /// Report a request-level error without sending attributes.
    pub async fn report_error(&mut self, message: &str) -> Result<()> {
        self.report_progress(0.0, "", message, false).await?;
        if self.state == ClientState::Processing {
            self.state = ClientState::Started;
        }
        Ok(())
    }

    /// Drive the request loop with a handler until the host closes.
    ///
    /// For every request: required inputs are checked first (an empty one gets
    /// its error set and is reported back without calling the handler), then
    /// the handler computes outputs and the result is finalized. Handler
    /// errors that do not end the session are sent as a progress error.
    pub async fn run<H: NodeHandler>(&mut self, handler: &mut H) -> Result<()> {
        loop {
            // Only errors set by the previous answer; host errors arrive below.
            self.registry.clear_errors();
            if self.receive_request().await?.is_none() {
                break;
            }

            let registry = &mut self.registry;
            let missing = handler
                .required_inputs()
                .into_iter()
                .find(|&id| !registry.require_filled(id, EMPTY_INPUT_ERROR));
            if let Some(id) = missing {
                tracing::debug!("Required input({}) is empty", self.registry[id].name());
                self.finalize().await?;
                continue;
            }

            match handler.process(&mut self.registry) {
                Ok(()) => self.finalize().await?,
                Err(NodeError::Handler(message)) => {
                    tracing::warn!("Request failed: {}", message);
                    self.report_error(&message).await?;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    /// Close the connection. Calling this again is a no-op.
    pub async fn close(&mut self) {
        self.shutdown().await;
    }

    fn ensure_idle(&self) -> Result<()> {
        match self.state {
            ClientState::Idle => Ok(()),
            _ => Err(NodeError::Protocol("Client already started".to_string())),
        }
    }

    async fn send_message(&mut self, buf: &[u8]) -> Result<()> {
        if self.state == ClientState::Idle {
            return Err(NodeError::NotConnected);
        }
        if let Err(e) = self.conn.send(buf).await {
            self.shutdown().await;
            return Err(e);
        }
        Ok(())
    }

    async fn shutdown(&mut self) {
        self.conn.close().await;
        self.state = ClientState::Closed;
    }
}

impl<S> Default for NodeClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn default() -> Self {
        Self::new()
    }
}
