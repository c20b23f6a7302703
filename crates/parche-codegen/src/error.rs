//! Code-generation errors.

use thiserror::Error;

/// A single generation finding.
///
/// Collected into a list: a failure aborts the offending object's fragment
/// only, and generation continues for independent objects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodegenError {
    /// An attribute value cannot be serialized into a source literal.
    #[error("invalid attribute value: '{attribute}' of '{object}': {reason}")]
    InvalidAttributeValue {
        /// Owning instance name.
        object: String,
        /// Attribute name.
        attribute: String,
        /// Underlying validation failure, rendered.
        reason: String,
    },

    /// Two or more instance names legalize to the same identifier.
    ///
    /// Colliding objects are skipped, never silently merged.
    #[error("symbol collision: '{symbol}' generated by {}", objects.join(", "))]
    SymbolCollision {
        /// The contested identifier.
        symbol: String,
        /// Instance names that map to it, in authoring order.
        objects: Vec<String>,
    },
}
