//! Nets: typed connections fanning one outlet to one or more inlets.
//!
//! Nets reference iolet endpoints by arena index, never by pointer — removal
//! of an instance tombstones its slot and cascades net cleanup via index
//! lookup in [`Patch`](crate::Patch).

use serde::{Deserialize, Serialize};

use crate::patch::ObjectId;
use crate::signal::SignalType;

/// An outlet endpoint: object slot plus outlet index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutletRef {
    /// Owning object instance.
    pub object: ObjectId,
    /// Index into the instance's outlet list.
    pub outlet: usize,
}

/// An inlet endpoint: object slot plus inlet index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InletRef {
    /// Owning object instance.
    pub object: ObjectId,
    /// Index into the instance's inlet list.
    pub inlet: usize,
}

/// A typed connection from one outlet to one-or-more inlets.
///
/// Invariants maintained by [`Patch`](crate::Patch): all sinks are
/// signal-compatible with the source, an inlet belongs to at most one net,
/// and a net always has at least one sink (it is removed when the last sink
/// disconnects).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Net {
    /// The single producing outlet.
    pub source: OutletRef,
    /// Consuming inlets, in connection order.
    pub sinks: Vec<InletRef>,
    /// Signal type of the source outlet.
    pub signal: SignalType,
}

impl Net {
    /// Whether this net touches the given object, as source or sink.
    pub fn touches(&self, id: ObjectId) -> bool {
        self.source.object == id || self.sinks.iter().any(|s| s.object == id)
    }

    /// Whether this net feeds the given inlet.
    pub fn feeds(&self, inlet: InletRef) -> bool {
        self.sinks.contains(&inlet)
    }
}
