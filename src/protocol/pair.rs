//! Pair frames read off a connection.

use std::borrow::Cow;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};

use super::wire_format::{decode_length, encode_pair, parse_number, LENGTH_PREFIX_SIZE};
use crate::error::{NodeError, Result};
use crate::transport::Connection;

/// One decoded name/value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    /// Raw name bytes.
    pub name: Bytes,
    /// Raw value bytes.
    pub value: Bytes,
}

impl Pair {
    /// Create a pair from anything convertible to bytes.
    pub fn new(name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Name as text (lossy for invalid UTF-8).
    pub fn name_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    /// Value as an owned string (lossy for invalid UTF-8).
    pub fn value_string(&self) -> String {
        match std::str::from_utf8(&self.value) {
            Ok(s) => s.to_owned(),
            Err(_) => {
                tracing::debug!("Pair({}) value is not valid UTF-8", self.name_str());
                String::from_utf8_lossy(&self.value).into_owned()
            }
        }
    }

    /// Value decoded with the permissive numeric parse.
    pub fn number(&self) -> i64 {
        parse_number(&self.value)
    }

    /// Append this pair's wire encoding to `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        encode_pair(buf, &self.name, &self.value);
    }
}

/// Read one pair.
///
/// Each length prefix is checked against `max_field_size` before any payload
/// buffer is allocated.
pub async fn read_pair<S>(conn: &mut Connection<S>, max_field_size: usize) -> Result<Pair>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let name = read_field(conn, max_field_size).await?;
    let value = read_field(conn, max_field_size).await?;
    Ok(Pair { name, value })
}

/// Read a numeric pair, returning its name and parsed value.
pub async fn read_number_pair<S>(
    conn: &mut Connection<S>,
    max_field_size: usize,
) -> Result<(String, i64)>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let pair = read_pair(conn, max_field_size).await?;
    Ok((pair.name_str().into_owned(), pair.number()))
}

async fn read_field<S>(conn: &mut Connection<S>, max_field_size: usize) -> Result<Bytes>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let prefix = conn.receive(LENGTH_PREFIX_SIZE).await?;
    let len = decode_length(&prefix)
        .ok_or_else(|| NodeError::Protocol("Truncated length prefix".to_string()))?;

    let len = match usize::try_from(len) {
        Ok(len) if len <= max_field_size => len,
        _ => {
            return Err(NodeError::FieldTooLarge {
                len,
                max: max_field_size,
            })
        }
    };

    conn.receive(len).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{encode_length, encode_number_pair, DEFAULT_MAX_FIELD_SIZE};
    use tokio::io::{duplex, AsyncWriteExt, DuplexStream};

    /// Connection preloaded with `bytes`; keep the returned peer alive.
    async fn feed(bytes: &[u8]) -> (Connection<DuplexStream>, DuplexStream) {
        let (client, mut server) = duplex(64 * 1024);
        server.write_all(bytes).await.unwrap();
        (Connection::from_stream(client), server)
    }

    #[tokio::test]
    async fn test_read_pair() {
        let mut buf = BytesMut::new();
        encode_pair(&mut buf, b"uid", b"node-1");
        let (mut conn, _peer) = feed(&buf).await;

        let pair = read_pair(&mut conn, DEFAULT_MAX_FIELD_SIZE).await.unwrap();
        assert_eq!(pair, Pair::new(&b"uid"[..], &b"node-1"[..]));
    }

    #[tokio::test]
    async fn test_read_pair_preserves_nul_and_empty() {
        let mut buf = BytesMut::new();
        encode_pair(&mut buf, b"value", b"a\0b\0");
        encode_pair(&mut buf, b"error", b"");
        let (mut conn, _peer) = feed(&buf).await;

        let first = read_pair(&mut conn, DEFAULT_MAX_FIELD_SIZE).await.unwrap();
        assert_eq!(first.value.len(), 4);
        assert_eq!(first.value_string(), "a\0b\0");

        let second = read_pair(&mut conn, DEFAULT_MAX_FIELD_SIZE).await.unwrap();
        assert!(second.value.is_empty());
        assert_eq!(second.value_string(), "");
    }

    #[tokio::test]
    async fn test_read_number_pair() {
        let mut buf = BytesMut::new();
        encode_number_pair(&mut buf, b"attrs", 3);
        let (mut conn, _peer) = feed(&buf).await;

        let (name, n) = read_number_pair(&mut conn, DEFAULT_MAX_FIELD_SIZE).await.unwrap();
        assert_eq!(name, "attrs");
        assert_eq!(n, 3);
    }

    #[tokio::test]
    async fn test_oversized_length_rejected() {
        let mut bytes = encode_length(1_000_000).to_vec();
        bytes.extend_from_slice(b"partial");
        let (mut conn, _peer) = feed(&bytes).await;

        let result = read_pair(&mut conn, 1024).await;
        assert!(matches!(
            result,
            Err(NodeError::FieldTooLarge {
                len: 1_000_000,
                max: 1024,
            })
        ));
    }

    #[tokio::test]
    async fn test_peer_close_mid_pair() {
        let (client, mut server) = duplex(1024);
        server.write_all(&encode_length(10)).await.unwrap();
        server.write_all(b"name").await.unwrap();
        drop(server);

        let mut conn = Connection::from_stream(client);
        let result = read_pair(&mut conn, DEFAULT_MAX_FIELD_SIZE).await;
        assert!(matches!(result, Err(NodeError::ConnectionClosed)));
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let pair = Pair::new(Bytes::from_static(b"value"), Bytes::from_static(b"f\xFFo"));
        assert_eq!(pair.value_string(), "f\u{FFFD}o");
    }

    #[test]
    fn test_pair_encode_matches_encode_pair() {
        let pair = Pair::new(&b"desc"[..], &b"halfway"[..]);
        let mut a = BytesMut::new();
        let mut b = BytesMut::new();
        pair.encode(&mut a);
        encode_pair(&mut b, b"desc", b"halfway");
        assert_eq!(a, b);
    }
}
