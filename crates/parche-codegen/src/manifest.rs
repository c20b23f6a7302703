//! Build manifest: the compiled-artifact contract.
//!
//! Written next to the generated source, consumed by the external native
//! compiler, and re-consumed by the device session to address parameters by
//! runtime index after flashing.

use serde::{Deserialize, Serialize};

/// One parameter's runtime addressing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestParam {
    /// Parameter name within its object.
    pub name: String,
    /// Stable runtime index (position in global emission order).
    pub index: u32,
}

/// One emitted object instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestObject {
    /// Patch-unique instance name.
    pub instance: String,
    /// Definition type name.
    pub type_name: String,
    /// Legalized identifier all of the object's symbols derive from.
    pub symbol: String,
    /// Runtime parameter entries, in declared order.
    pub params: Vec<ManifestParam>,
}

/// Mapping from instances to symbols and parameters to runtime indices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Emitted objects, in emission order.
    pub objects: Vec<ManifestObject>,
    /// Total number of addressable parameters.
    pub param_count: u32,
}

impl Manifest {
    /// Find an object's entry by instance name.
    pub fn object(&self, instance: &str) -> Option<&ManifestObject> {
        self.objects.iter().find(|o| o.instance == instance)
    }

    /// Runtime index of a named parameter on a named instance.
    pub fn param_index(&self, instance: &str, parameter: &str) -> Option<u32> {
        self.object(instance)?
            .params
            .iter()
            .find(|p| p.name == parameter)
            .map(|p| p.index)
    }
}
