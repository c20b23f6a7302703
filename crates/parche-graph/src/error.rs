//! Validation errors reported by the resolver.

use thiserror::Error;

/// A single validation finding.
///
/// Findings are always collected into a list — the resolver keeps going
/// after the first problem so the editor can show all of them at once.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The dependency graph contains a cycle.
    ///
    /// `cycle` names a minimal cycle in traversal order; the first instance
    /// is repeated implicitly (A → B → A is reported as `["A", "B"]`).
    #[error("cyclic dependency: {}", cycle.join(" -> "))]
    CyclicDependency {
        /// Instance names forming the cycle.
        cycle: Vec<String>,
    },

    /// A required inlet is not fed by any net.
    #[error("unresolved input: inlet '{inlet}' of '{object}' is not connected")]
    UnresolvedInput {
        /// Owning instance name.
        object: String,
        /// Inlet name.
        inlet: String,
    },

    /// An object-reference attribute names a missing or type-incompatible
    /// instance.
    #[error("dangling reference: attribute '{attribute}' of '{object}' points at '{target}'")]
    DanglingReference {
        /// Owning instance name.
        object: String,
        /// Attribute name.
        attribute: String,
        /// The name the attribute points at.
        target: String,
    },
}
