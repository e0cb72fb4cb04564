//! # skyalt-node
//!
//! Rust client SDK for SkyAlt nodes.
//!
//! A node is a child process that connects to its host over TCP, announces
//! itself with a `uid` and a snapshot of its attributes, then answers one
//! request at a time: the host pushes input attribute values, the node
//! computes, and sends its attributes back together with a progress record.
//!
//! ## Architecture
//!
//! - **Wire codec** ([`protocol`]): length-prefixed name/value pairs
//! - **Transport** ([`transport`]): one stream, whole-range send/receive
//! - **Attributes** ([`attribute`]): ordered registry of named fields
//! - **Client** ([`NodeClient`]): handshake and request/response cycle
//!
//! ## Example
//!
//! ```ignore
//! use skyalt_node::NodeClient;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> skyalt_node::Result<()> {
//!     let mut client: NodeClient = NodeClient::new();
//!     let rows = client.add_output("rows", "[]");
//!
//!     client.start("uid-1", "4040").await?;
//!     while client.next_request().await {
//!         client.attr_mut(rows).value = "[{}]".to_string();
//!         client.finalize().await?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod attribute;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod runtime;
pub mod transport;

mod client;

pub use attribute::{AttrId, Attribute, AttributeRegistry};
pub use client::{
    ClientBuilder, ClientConfig, ClientState, NodeClient, UpdateSummary, DEFAULT_HOST,
};
pub use error::{NodeError, Result};
pub use handler::{HandlerResult, NodeHandler};
