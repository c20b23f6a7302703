//! Incremental C code generator for parche patches.
//!
//! Walks the resolver's object ordering and emits, per object: a constant
//! attribute struct baked from attribute literals, an addressable runtime
//! parameter array, persistent state storage, net buffers for its outlets,
//! and a run function wiring its inlets to the producing outlets' storage.
//!
//! Every [`ParameterInstance`](parche_model::ParameterInstance) gets a stable
//! runtime index — its position in global emission order (resolver order
//! crossed with the object's declared parameter order). The device session
//! addresses parameters by that index, so the [`Manifest`] records it and the
//! incremental cache invalidates an object whenever its index base moves,
//! not just when its own content changes.
//!
//! Fingerprints are SHA-256 digests over each instance's semantic fields.
//! Regenerating an unchanged patch is idempotent: byte-identical source,
//! unchanged fingerprint table.

pub mod error;
mod fingerprint;
mod generate;
pub mod manifest;

pub use error::CodegenError;
pub use fingerprint::Fingerprint;
pub use generate::{GenCache, GenResult, generate};
pub use manifest::{Manifest, ManifestObject, ManifestParam};
