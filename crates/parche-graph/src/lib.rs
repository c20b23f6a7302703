//! Dependency resolver for parche patches.
//!
//! The resolver turns a [`Patch`] into a deterministic linear object ordering
//! the code generator can walk: every net's producing object precedes its
//! consuming objects, and object-reference attributes order the referencing
//! object before its target. Ties are broken by original authoring order
//! (arena slot index) so repeated edits produce diffable generated code.
//!
//! Validation is exhaustive: cycles, unconnected required inlets, and
//! dangling object references are all collected into one error list so the
//! editor can surface every problem in a single pass, never abort-on-first.

pub mod error;
mod resolver;

pub use error::GraphError;
pub use resolver::{ResolvedOrder, resolve, validate};
