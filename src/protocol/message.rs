//! Message builders and the inbound message decoder.
//!
//! Outbound messages are assembled into one buffer so a whole message goes
//! out through a single `send`:
//!
//! - handshake: `("uid", id)` followed by an attrs snapshot
//! - attrs: `("attrs", N)`, then per attribute `(name, 5)` and the five fields
//! - progress: `("progress", 3)`, `("proc", f)`, `("desc", d)`, `("error", e)`
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use skyalt_node::attribute::AttributeRegistry;
//! use skyalt_node::protocol::{encode_attrs, encode_progress};
//!
//! let mut registry = AttributeRegistry::new();
//! registry.add("file", "a.db");
//!
//! let mut buf = BytesMut::new();
//! encode_attrs(&mut buf, &registry);
//! encode_progress(&mut buf, 0.5, "halfway", "");
//! assert!(!buf.is_empty());
//! ```

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncWrite};

use super::pair::{read_number_pair, read_pair, Pair};
use super::wire_format::{
    encode_number_pair, encode_pair, format_fraction, kinds, progress_fields, ATTR_ITEM_COUNT,
    PROGRESS_ITEM_COUNT,
};
use crate::attribute::{AttrField, Attribute};
use crate::error::{NodeError, Result};
use crate::transport::Connection;

/// One field item of an attrs message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldItem {
    /// Wire field tag (`value`, `gui_type`, ...). Unknown tags are kept as-is.
    pub field: String,
    /// Field value.
    pub value: String,
}

/// All items sent for one attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrEntry {
    /// Attribute name.
    pub name: String,
    /// Items in wire order.
    pub items: Vec<FieldItem>,
}

/// A decoded progress record.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressRecord {
    /// Completion fraction, or the "done" sentinel.
    pub proc: f64,
    /// Description of the current step.
    pub description: String,
    /// Error text; empty for none.
    pub error: String,
}

impl ProgressRecord {
    /// Whether the record signals completion rather than partial progress.
    pub fn is_done(&self) -> bool {
        self.proc > 1.0
    }
}

/// A decoded message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Handshake identity.
    Uid(String),
    /// Attribute snapshot or update.
    Attrs(Vec<AttrEntry>),
    /// Progress record.
    Progress(ProgressRecord),
}

impl Message {
    /// The message kind tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Uid(_) => kinds::UID,
            Message::Attrs(_) => kinds::ATTRS,
            Message::Progress(_) => kinds::PROGRESS,
        }
    }
}

/// Append the handshake: identity pair plus a full snapshot.
pub fn encode_handshake<'a, I>(buf: &mut BytesMut, identity: &str, attrs: I)
where
    I: IntoIterator<Item = &'a Attribute>,
    I::IntoIter: ExactSizeIterator,
{
    encode_pair(buf, kinds::UID.as_bytes(), identity.as_bytes());
    encode_attrs(buf, attrs);
}

/// Append a full attribute snapshot in iteration order.
pub fn encode_attrs<'a, I>(buf: &mut BytesMut, attrs: I)
where
    I: IntoIterator<Item = &'a Attribute>,
    I::IntoIter: ExactSizeIterator,
{
    let attrs = attrs.into_iter();
    encode_number_pair(buf, kinds::ATTRS.as_bytes(), attrs.len() as i64);

    for attr in attrs {
        encode_number_pair(buf, attr.name().as_bytes(), ATTR_ITEM_COUNT);

        for field in AttrField::ALL {
            let tag = field.wire_name().as_bytes();
            match field {
                AttrField::Value => encode_pair(buf, tag, attr.value.as_bytes()),
                AttrField::GuiType => encode_pair(buf, tag, attr.gui_type.as_bytes()),
                AttrField::GuiOptions => encode_pair(buf, tag, attr.gui_options.as_bytes()),
                AttrField::Error => encode_pair(buf, tag, attr.error.as_bytes()),
                AttrField::GuiReadOnly => encode_number_pair(buf, tag, i64::from(attr.read_only)),
            }
        }
    }
}

/// Append an attrs message built from explicit entries.
///
/// This is the host → node direction, where each attribute may carry any
/// number of items.
pub fn encode_attr_entries(buf: &mut BytesMut, entries: &[AttrEntry]) {
    encode_number_pair(buf, kinds::ATTRS.as_bytes(), entries.len() as i64);

    for entry in entries {
        encode_number_pair(buf, entry.name.as_bytes(), entry.items.len() as i64);
        for item in &entry.items {
            encode_pair(buf, item.field.as_bytes(), item.value.as_bytes());
        }
    }
}

/// Append a progress record.
pub fn encode_progress(buf: &mut BytesMut, fraction: f64, description: &str, error: &str) {
    encode_number_pair(buf, kinds::PROGRESS.as_bytes(), PROGRESS_ITEM_COUNT);
    encode_pair(
        buf,
        progress_fields::PROC.as_bytes(),
        format_fraction(fraction).as_bytes(),
    );
    encode_pair(buf, progress_fields::DESC.as_bytes(), description.as_bytes());
    encode_pair(buf, progress_fields::ERROR.as_bytes(), error.as_bytes());
}

/// Read one complete message.
///
/// Items of every attribute entry are consumed even when the caller will
/// ignore them, so framing stays aligned. Negative counts read as zero.
pub async fn read_message<S>(conn: &mut Connection<S>, max_field_size: usize) -> Result<Message>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let head = read_pair(conn, max_field_size).await?;

    match head.name_str().as_ref() {
        kinds::UID => Ok(Message::Uid(head.value_string())),
        kinds::ATTRS => {
            let count = item_count(&head);
            let mut entries = Vec::new();

            for _ in 0..count {
                let (name, n_items) = read_number_pair(conn, max_field_size).await?;
                let mut items = Vec::new();
                for _ in 0..n_items.max(0) {
                    let pair = read_pair(conn, max_field_size).await?;
                    items.push(FieldItem {
                        field: pair.name_str().into_owned(),
                        value: pair.value_string(),
                    });
                }
                entries.push(AttrEntry { name, items });
            }

            Ok(Message::Attrs(entries))
        }
        kinds::PROGRESS => {
            let mut record = ProgressRecord {
                proc: 0.0,
                description: String::new(),
                error: String::new(),
            };

            for _ in 0..item_count(&head) {
                let pair = read_pair(conn, max_field_size).await?;
                match pair.name_str().as_ref() {
                    progress_fields::PROC => {
                        record.proc = pair.value_string().trim().parse().unwrap_or(0.0)
                    }
                    progress_fields::DESC => record.description = pair.value_string(),
                    progress_fields::ERROR => record.error = pair.value_string(),
                    other => tracing::warn!("Unknown progress item({})", other),
                }
            }

            Ok(Message::Progress(record))
        }
        other => Err(NodeError::Protocol(format!("Unknown message type({})", other))),
    }
}

fn item_count(head: &Pair) -> u64 {
    u64::try_from(head.number()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeRegistry;
    use crate::protocol::DEFAULT_MAX_FIELD_SIZE;
    use tokio::io::{duplex, AsyncWriteExt, DuplexStream};

    async fn decode_all(bytes: &[u8]) -> (Connection<DuplexStream>, DuplexStream) {
        let (client, mut server) = duplex(64 * 1024);
        server.write_all(bytes).await.unwrap();
        (Connection::from_stream(client), server)
    }

    fn sample_registry() -> AttributeRegistry {
        let mut registry = AttributeRegistry::new();
        let file = registry.add("file", "a.db");
        registry.add("query", "");
        registry.add_output("rows", "[]");
        registry[file].gui_type = "file_picker".to_string();
        registry[file].gui_options = "*.db;*.sqlite".to_string();
        registry[file].error = "locked".to_string();
        registry
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let registry = sample_registry();
        let mut buf = BytesMut::new();
        encode_attrs(&mut buf, &registry);

        let (mut conn, _peer) = decode_all(&buf).await;
        let message = read_message(&mut conn, DEFAULT_MAX_FIELD_SIZE).await.unwrap();

        // Feed the decoded snapshot back in as an update
        let Message::Attrs(entries) = message else {
            panic!("expected attrs message");
        };
        let mut target = AttributeRegistry::new();
        target.add("file", "");
        target.add("query", "x");
        target.add("rows", "");
        for entry in &entries {
            assert_eq!(entry.items.len(), 5);
            for item in &entry.items {
                target.apply_update(&entry.name, &item.field, item.value.clone());
            }
        }

        let expected: Vec<_> = registry.snapshot().cloned().collect();
        let actual: Vec<_> = target.snapshot().cloned().collect();
        assert_eq!(expected, actual);
    }

    #[tokio::test]
    async fn test_snapshot_item_order() {
        let registry = sample_registry();
        let mut buf = BytesMut::new();
        encode_attrs(&mut buf, &registry);

        let (mut conn, _peer) = decode_all(&buf).await;
        let Message::Attrs(entries) = read_message(&mut conn, DEFAULT_MAX_FIELD_SIZE)
            .await
            .unwrap()
        else {
            panic!("expected attrs message");
        };

        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["file", "query", "rows"]);

        let tags: Vec<_> = entries[2].items.iter().map(|i| i.field.as_str()).collect();
        assert_eq!(
            tags,
            ["value", "gui_type", "gui_options", "error", "gui_read_only"]
        );
        assert_eq!(entries[2].items[4].value, "1");
        assert_eq!(entries[0].items[4].value, "0");
    }

    #[tokio::test]
    async fn test_handshake_layout() {
        let registry = sample_registry();
        let mut buf = BytesMut::new();
        encode_handshake(&mut buf, "node-7", &registry);

        let (mut conn, _peer) = decode_all(&buf).await;
        let first = read_message(&mut conn, DEFAULT_MAX_FIELD_SIZE).await.unwrap();
        assert_eq!(first, Message::Uid("node-7".to_string()));

        let second = read_message(&mut conn, DEFAULT_MAX_FIELD_SIZE).await.unwrap();
        assert_eq!(second.kind(), "attrs");
    }

    #[tokio::test]
    async fn test_progress_round_trip() {
        let mut buf = BytesMut::new();
        encode_progress(&mut buf, 0.25, "loading", "bad row");

        let (mut conn, _peer) = decode_all(&buf).await;
        let message = read_message(&mut conn, DEFAULT_MAX_FIELD_SIZE).await.unwrap();

        assert_eq!(
            message,
            Message::Progress(ProgressRecord {
                proc: 0.25,
                description: "loading".to_string(),
                error: "bad row".to_string(),
            })
        );
    }

    #[test]
    fn test_progress_done_sentinel() {
        let done = ProgressRecord {
            proc: crate::protocol::PROGRESS_DONE,
            description: String::new(),
            error: String::new(),
        };
        assert!(done.is_done());

        let half = ProgressRecord { proc: 0.5, ..done };
        assert!(!half.is_done());
    }

    #[tokio::test]
    async fn test_unknown_message_kind() {
        let mut buf = BytesMut::new();
        encode_number_pair(&mut buf, b"shutdown", 0);

        let (mut conn, _peer) = decode_all(&buf).await;
        let result = read_message(&mut conn, DEFAULT_MAX_FIELD_SIZE).await;

        match result {
            Err(NodeError::Protocol(msg)) => assert!(msg.contains("shutdown")),
            other => panic!("expected protocol error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_entries_with_variable_item_counts() {
        let entries = vec![
            AttrEntry {
                name: "bogus".to_string(),
                items: vec![
                    FieldItem {
                        field: "value".into(),
                        value: "x".into(),
                    },
                    FieldItem {
                        field: "error".into(),
                        value: "y".into(),
                    },
                ],
            },
            AttrEntry {
                name: "file".to_string(),
                items: vec![],
            },
        ];
        let mut buf = BytesMut::new();
        encode_attr_entries(&mut buf, &entries);

        let (mut conn, _peer) = decode_all(&buf).await;
        let message = read_message(&mut conn, DEFAULT_MAX_FIELD_SIZE).await.unwrap();
        assert_eq!(message, Message::Attrs(entries));
    }

    #[tokio::test]
    async fn test_negative_count_reads_nothing() {
        let mut buf = BytesMut::new();
        encode_number_pair(&mut buf, b"attrs", -4);
        encode_pair(&mut buf, b"uid", b"next");

        let (mut conn, _peer) = decode_all(&buf).await;
        let first = read_message(&mut conn, DEFAULT_MAX_FIELD_SIZE).await.unwrap();
        assert_eq!(first, Message::Attrs(vec![]));

        // The following message is still aligned
        let second = read_message(&mut conn, DEFAULT_MAX_FIELD_SIZE).await.unwrap();
        assert_eq!(second, Message::Uid("next".to_string()));
    }
}
