//! Node logic seam for [`NodeClient::run`](crate::NodeClient::run).
//!
//! A handler declares which inputs must be non-empty and turns the current
//! attribute values into outputs. The client owns the request loop.
//!
//! # Example
//!
//! ```ignore
//! use skyalt_node::attribute::{AttrId, AttributeRegistry};
//! use skyalt_node::handler::{HandlerResult, NodeHandler};
//!
//! struct Upper { input: AttrId, output: AttrId }
//!
//! impl NodeHandler for Upper {
//!     fn required_inputs(&self) -> Vec<AttrId> {
//!         vec![self.input]
//!     }
//!
//!     fn process(&mut self, attrs: &mut AttributeRegistry) -> HandlerResult {
//!         attrs[self.output].value = attrs[self.input].value.to_uppercase();
//!         Ok(())
//!     }
//! }
//! ```

use crate::attribute::{AttrId, AttributeRegistry};
use crate::error::Result;

/// Error text attached to a required input that arrived empty.
pub const EMPTY_INPUT_ERROR: &str = "empty";

/// Result type for handler functions.
///
/// Return [`NodeError::Handler`](crate::NodeError::Handler) for failures the
/// host should see as a progress error; any other error ends the session.
pub type HandlerResult = Result<()>;

/// Computation performed for each request.
pub trait NodeHandler {
    /// Inputs that must be non-empty before `process` is called, checked in order.
    fn required_inputs(&self) -> Vec<AttrId> {
        Vec::new()
    }

    /// Compute outputs from the current attribute values.
    fn process(&mut self, attrs: &mut AttributeRegistry) -> HandlerResult;
}

impl<F> NodeHandler for F
where
    F: FnMut(&mut AttributeRegistry) -> HandlerResult,
{
    fn process(&mut self, attrs: &mut AttributeRegistry) -> HandlerResult {
        self(attrs)
    }
}
