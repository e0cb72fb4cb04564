//! Transport module - the single byte stream between node and host.
//!
//! Provides [`Connection`], which turns the stream's partial reads and
//! writes into whole byte-range transfers and tracks the
//! `Disconnected → Connected → Closed` lifecycle.

mod connection;

pub use connection::{Connection, ConnectionState};
