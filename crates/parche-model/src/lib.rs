//! Patch entity model for the parche patcher core.
//!
//! This crate is the pure-data foundation of parche: object definitions and
//! instances, compile-time attributes, runtime-tunable parameters, typed nets,
//! and the patch aggregate that owns them. It performs no I/O besides the
//! explicit [`file`] save/load helpers and holds no threads — the editor
//! collaborator serializes mutations against resolver and generator runs.
//!
//! # Architecture
//!
//! - [`ObjectDefinition`] — immutable template loaded once from an
//!   [`ObjectLibrary`]; identity is the globally unique type name.
//! - [`ObjectInstance`] — one placement of a definition inside a [`Patch`].
//!   Instantiation deep-copies attribute and parameter state; instances never
//!   share mutable state with their definition.
//! - [`AttributeInstance`] — compile-time-only configuration, a closed tagged
//!   variant ([`AttributeVariant`]) with per-variant validation and
//!   source-literal serialization. Changing one requires regeneration.
//! - [`ParameterInstance`] — runtime-tunable value over a raw `i32` coded
//!   storage with typed fixed-point / integer / boolean views, a `frozen`
//!   flag (exempt from bulk randomization) and a `needs_transmit` dirty flag
//!   consumed by the device session.
//! - [`Net`] — one outlet fanning out to one or more signal-compatible
//!   inlets; the only legal way two instances communicate in generated code.
//! - [`Patch`] — arena of instance slots plus nets referencing them by index.
//!   Removal tombstones the slot and cascades net cleanup by index lookup,
//!   never by pointer traversal.
//!
//! Every definition and instance exposes a stable content-hash contribution
//! (`hash_into`) feeding a SHA-256 digest in fixed field order; the code
//! generator builds its per-object fingerprints from these.

pub mod attribute;
pub mod error;
pub mod file;
pub mod library;
pub mod net;
pub mod object;
pub mod parameter;
pub mod patch;
pub mod signal;
pub mod symbol;

pub use attribute::{AttributeDef, AttributeInstance, AttributeValue, AttributeVariant, ComboEntry};
pub use error::ModelError;
pub use file::{load_patch, save_patch};
pub use library::ObjectLibrary;
pub use net::{InletRef, Net, OutletRef};
pub use object::{IoletDef, ObjectDefinition, ObjectInstance};
pub use parameter::{FRAC_ONE, ParamKind, ParameterDef, ParameterInstance};
pub use patch::{ObjectId, Patch, PatchEvent};
pub use signal::SignalType;
pub use symbol::instance_symbol;
