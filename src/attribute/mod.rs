//! Attribute module - the named fields a node exchanges with its host.
//!
//! Provides:
//! - [`Attribute`] - one named field with value and GUI/error metadata
//! - [`AttributeRegistry`] - ordered, append-only collection of attributes
//! - [`AttrId`] - stable handle returned at registration
//!
//! # Example
//!
//! ```
//! use skyalt_node::attribute::AttributeRegistry;
//!
//! let mut registry = AttributeRegistry::new();
//! let file = registry.add("file", "");
//! let rows = registry.add_output("rows", "[]");
//!
//! registry.apply_update("file", "value", "a.db".to_string());
//! assert_eq!(registry[file].value, "a.db");
//! assert!(registry[rows].read_only);
//! ```

mod field;
mod registry;

pub use field::{AttrField, Attribute};
pub use registry::{AttrId, AttributeRegistry, UpdateOutcome};
