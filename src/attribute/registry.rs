//! Ordered attribute registry.
//!
//! Attributes are declared once at startup and never removed, so the
//! index returned by registration stays valid for the registry's lifetime.
//! Insertion order is the transmission order of every snapshot.
//!
//! # Example
//!
//! ```
//! use skyalt_node::attribute::{AttributeRegistry, UpdateOutcome};
//!
//! let mut registry = AttributeRegistry::new();
//! let query = registry.add("query", "");
//!
//! assert_eq!(
//!     registry.apply_update("bogus", "value", "x".to_string()),
//!     UpdateOutcome::UnknownAttribute
//! );
//! assert!(!registry.require_filled(query, "empty"));
//! assert_eq!(registry[query].error, "empty");
//! ```

use std::ops::{Index, IndexMut};

use serde::Serialize;

use super::{AttrField, Attribute};
use crate::protocol::parse_number;

/// Handle to a registered attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttrId(usize);

impl AttrId {
    /// Position of the attribute in registry order.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Result of applying one inbound field update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The field was written.
    Applied,
    /// No attribute carries that name; the update was dropped.
    UnknownAttribute,
    /// The field tag is not one of the five known fields; the update was dropped.
    UnknownField,
}

/// Ordered, append-only collection of attributes.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct AttributeRegistry {
    attrs: Vec<Attribute>,
}

impl AttributeRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an attribute.
    ///
    /// Names must be unique. A duplicate is not rejected, but it is logged and
    /// [`find`](Self::find) keeps resolving to the first attribute with that name.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        read_only: bool,
    ) -> AttrId {
        let attr = Attribute::new(name, value, read_only);
        if self.position(attr.name()).is_some() {
            tracing::warn!("Attribute({}) registered twice", attr.name());
        }

        self.attrs.push(attr);
        AttrId(self.attrs.len() - 1)
    }

    /// Append an input attribute (host may edit it).
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) -> AttrId {
        self.register(name, value, false)
    }

    /// Append an output attribute (node → host only).
    pub fn add_output(&mut self, name: impl Into<String>, value: impl Into<String>) -> AttrId {
        self.register(name, value, true)
    }

    /// Look up an attribute by name.
    pub fn find(&self, name: &str) -> Option<&Attribute> {
        self.attrs.iter().find(|a| a.name() == name)
    }

    /// Look up an attribute by name for modification.
    pub fn find_mut(&mut self, name: &str) -> Option<&mut Attribute> {
        self.attrs.iter_mut().find(|a| a.name() == name)
    }

    /// Get the handle of the attribute with this name.
    pub fn id_of(&self, name: &str) -> Option<AttrId> {
        self.position(name).map(AttrId)
    }

    /// Get an attribute by handle.
    pub fn get(&self, id: AttrId) -> Option<&Attribute> {
        self.attrs.get(id.0)
    }

    /// Get an attribute by handle for modification.
    pub fn get_mut(&mut self, id: AttrId) -> Option<&mut Attribute> {
        self.attrs.get_mut(id.0)
    }

    /// Iterate attributes in registry (transmission) order.
    pub fn snapshot(&self) -> std::slice::Iter<'_, Attribute> {
        self.attrs.iter()
    }

    /// Number of registered attributes.
    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    /// Check if no attributes are registered.
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    /// Apply one inbound update by attribute name and wire field tag.
    ///
    /// Unknown names and unknown tags are dropped with a warning; neither is
    /// an error.
    pub fn apply_update(&mut self, name: &str, field: &str, value: String) -> UpdateOutcome {
        let Some(index) = self.position(name) else {
            tracing::warn!("Attribute({}) not found", name);
            return UpdateOutcome::UnknownAttribute;
        };

        let Some(field) = AttrField::from_wire(field) else {
            tracing::warn!("Unknown attribute field({}) for {}", field, name);
            return UpdateOutcome::UnknownField;
        };

        set_field(&mut self.attrs[index], field, value);
        UpdateOutcome::Applied
    }

    /// Set a field on the attribute behind `id`.
    pub fn set(&mut self, id: AttrId, field: AttrField, value: String) {
        if let Some(attr) = self.attrs.get_mut(id.0) {
            set_field(attr, field, value);
        }
    }

    /// Check a required input.
    ///
    /// Returns `true` when the value is non-empty. Otherwise attaches
    /// `message` as the attribute's error and returns `false`.
    pub fn require_filled(&mut self, id: AttrId, message: &str) -> bool {
        match self.attrs.get_mut(id.0) {
            Some(attr) if attr.value.is_empty() => {
                attr.set_error(message);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Remove the error message from every attribute.
    pub fn clear_errors(&mut self) {
        for attr in &mut self.attrs {
            attr.clear_error();
        }
    }

    /// Render the registry as JSON (for diagnostics).
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.attrs.iter().position(|a| a.name() == name)
    }
}

fn set_field(attr: &mut Attribute, field: AttrField, value: String) {
    match field {
        AttrField::Value => attr.value = value,
        AttrField::GuiType => attr.gui_type = value,
        AttrField::GuiOptions => attr.gui_options = value,
        AttrField::Error => attr.error = value,
        AttrField::GuiReadOnly => attr.read_only = parse_number(value.as_bytes()) != 0,
    }
}

impl Index<AttrId> for AttributeRegistry {
    type Output = Attribute;

    fn index(&self, id: AttrId) -> &Attribute {
        &self.attrs[id.0]
    }
}

impl IndexMut<AttrId> for AttributeRegistry {
    fn index_mut(&mut self, id: AttrId) -> &mut Attribute {
        &mut self.attrs[id.0]
    }
}

impl<'a> IntoIterator for &'a AttributeRegistry {
    type Item = &'a Attribute;
    type IntoIter = std::slice::Iter<'a, Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.snapshot()
    }
}
