//! Attribute record and its wire field tags.

use serde::{Deserialize, Serialize};

/// One of the five per-attribute fields carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrField {
    /// The payload domain logic reads and writes.
    Value,
    /// Opaque rendering hint for the host.
    GuiType,
    /// Opaque rendering options for the host.
    GuiOptions,
    /// Per-field error message; empty means no error.
    Error,
    /// Whether the attribute only flows node → host.
    GuiReadOnly,
}

impl AttrField {
    /// All fields, in the order a snapshot transmits them.
    pub const ALL: [AttrField; 5] = [
        AttrField::Value,
        AttrField::GuiType,
        AttrField::GuiOptions,
        AttrField::Error,
        AttrField::GuiReadOnly,
    ];

    /// Parse a wire field tag.
    pub fn from_wire(tag: &str) -> Option<Self> {
        match tag {
            "value" => Some(AttrField::Value),
            "gui_type" => Some(AttrField::GuiType),
            "gui_options" => Some(AttrField::GuiOptions),
            "error" => Some(AttrField::Error),
            "gui_read_only" => Some(AttrField::GuiReadOnly),
            _ => None,
        }
    }

    /// The tag used on the wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            AttrField::Value => "value",
            AttrField::GuiType => "gui_type",
            AttrField::GuiOptions => "gui_options",
            AttrField::Error => "error",
            AttrField::GuiReadOnly => "gui_read_only",
        }
    }
}

/// A named, mutable field exchanged between node and host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    name: String,
    /// Current value.
    pub value: String,
    /// Host-side rendering hint (never interpreted here).
    pub gui_type: String,
    /// Host-side rendering options (never interpreted here).
    pub gui_options: String,
    /// Output-only flag.
    #[serde(rename = "gui_read_only")]
    pub read_only: bool,
    /// Error shown by the host next to this field; empty for none.
    pub error: String,
}

impl Attribute {
    /// Create an attribute with empty metadata.
    pub fn new(name: impl Into<String>, value: impl Into<String>, read_only: bool) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            read_only,
            ..Self::default()
        }
    }

    /// The immutable attribute name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether an error message is attached.
    #[inline]
    pub fn has_error(&self) -> bool {
        !self.error.is_empty()
    }

    /// Attach an error message.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = message.into();
    }

    /// Remove any attached error message.
    pub fn clear_error(&mut self) {
        self.error.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_round_trip() {
        for field in AttrField::ALL {
            assert_eq!(AttrField::from_wire(field.wire_name()), Some(field));
        }
        assert_eq!(AttrField::from_wire("bogus"), None);
        assert_eq!(AttrField::from_wire("Value"), None);
    }

    #[test]
    fn test_snapshot_field_order() {
        let tags: Vec<_> = AttrField::ALL.iter().map(|f| f.wire_name()).collect();
        assert_eq!(
            tags,
            ["value", "gui_type", "gui_options", "error", "gui_read_only"]
        );
    }

    #[test]
    fn test_new_attribute_defaults() {
        let attr = Attribute::new("query", "select 1", false);
        assert_eq!(attr.name(), "query");
        assert_eq!(attr.value, "select 1");
        assert!(attr.gui_type.is_empty());
        assert!(attr.gui_options.is_empty());
        assert!(!attr.read_only);
        assert!(!attr.has_error());
    }

    #[test]
    fn test_error_set_and_clear() {
        let mut attr = Attribute::new("file", "", false);
        attr.set_error("empty");
        assert!(attr.has_error());
        assert_eq!(attr.error, "empty");

        attr.clear_error();
        assert!(!attr.has_error());
    }

    #[test]
    fn test_serializes_with_wire_field_names() {
        let attr = Attribute::new("rows", "[]", true);
        let json = serde_json::to_value(&attr).unwrap();

        assert_eq!(json["name"], "rows");
        assert_eq!(json["value"], "[]");
        assert_eq!(json["gui_read_only"], true);
        assert_eq!(
            serde_json::to_value(AttrField::GuiReadOnly).unwrap(),
            "gui_read_only"
        );
    }
}
