//! Object definitions and instances.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::attribute::{AttributeDef, AttributeInstance, hash_str};
use crate::parameter::{ParameterDef, ParameterInstance};
use crate::signal::SignalType;

/// An inlet or outlet declaration on an object definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoletDef {
    /// Iolet name, unique among the definition's inlets (resp. outlets).
    pub name: String,
    /// Signal type carried by this iolet.
    pub signal: SignalType,
    /// Whether the iolet must be connected for the patch to be valid.
    /// Only meaningful for inlets; outlets may always dangle.
    pub required: bool,
}

impl IoletDef {
    /// Required iolet.
    pub fn required(name: impl Into<String>, signal: SignalType) -> Self {
        Self {
            name: name.into(),
            signal,
            required: true,
        }
    }

    /// Optional iolet.
    pub fn optional(name: impl Into<String>, signal: SignalType) -> Self {
        Self {
            name: name.into(),
            signal,
            required: false,
        }
    }

    fn hash_into(&self, hasher: &mut Sha256) {
        hash_str(hasher, &self.name);
        self.signal.hash_into(hasher);
        hasher.update([u8::from(self.required)]);
    }
}

/// Immutable object template.
///
/// Loaded once from an [`ObjectLibrary`](crate::ObjectLibrary) and never
/// mutated thereafter. Identity is the type name, globally unique within a
/// library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDefinition {
    /// Globally unique type name, e.g. `"osc/sine"`.
    pub type_name: String,
    /// Attribute templates, in declaration order.
    pub attributes: Vec<AttributeDef>,
    /// Parameter templates, in declaration order. This order, combined with
    /// the resolver's object ordering, fixes runtime parameter indices.
    pub parameters: Vec<ParameterDef>,
    /// Inlet declarations, in declaration order.
    pub inlets: Vec<IoletDef>,
    /// Outlet declarations, in declaration order.
    pub outlets: Vec<IoletDef>,
}

impl ObjectDefinition {
    /// Create an empty definition with the given type name.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            attributes: Vec::new(),
            parameters: Vec::new(),
            inlets: Vec::new(),
            outlets: Vec::new(),
        }
    }

    /// Builder-style attribute declaration.
    pub fn with_attribute(mut self, attr: AttributeDef) -> Self {
        self.attributes.push(attr);
        self
    }

    /// Builder-style parameter declaration.
    pub fn with_parameter(mut self, param: ParameterDef) -> Self {
        self.parameters.push(param);
        self
    }

    /// Builder-style inlet declaration.
    pub fn with_inlet(mut self, inlet: IoletDef) -> Self {
        self.inlets.push(inlet);
        self
    }

    /// Builder-style outlet declaration.
    pub fn with_outlet(mut self, outlet: IoletDef) -> Self {
        self.outlets.push(outlet);
        self
    }

    /// Deep-copy this definition into a named instance.
    ///
    /// Attribute and parameter instances get independent value storage; the
    /// instance never shares mutable state with the definition.
    pub fn instantiate(&self, name: impl Into<String>) -> ObjectInstance {
        ObjectInstance {
            type_name: self.type_name.clone(),
            name: name.into(),
            attributes: self.attributes.iter().map(AttributeDef::instantiate).collect(),
            parameters: self
                .parameters
                .iter()
                .map(ParameterDef::instantiate)
                .collect(),
            inlets: self.inlets.clone(),
            outlets: self.outlets.clone(),
        }
    }
}

/// One placement of an [`ObjectDefinition`] inside a patch.
///
/// Owns its attribute and parameter instances exclusively — they are
/// destroyed with the instance. The patch-unique instance name derives the
/// generated-code symbols via [`instance_symbol`](crate::instance_symbol).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectInstance {
    /// Type name of the definition this was instantiated from.
    pub type_name: String,
    /// Patch-unique instance name.
    pub name: String,
    /// Owned attribute instances, definition order.
    pub attributes: Vec<AttributeInstance>,
    /// Owned parameter instances, definition order.
    pub parameters: Vec<ParameterInstance>,
    /// Inlet declarations (copied from the definition).
    pub inlets: Vec<IoletDef>,
    /// Outlet declarations (copied from the definition).
    pub outlets: Vec<IoletDef>,
}

impl ObjectInstance {
    /// Find an owned attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&AttributeInstance> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Find an owned attribute by name, mutably.
    pub fn attribute_mut(&mut self, name: &str) -> Option<&mut AttributeInstance> {
        self.attributes.iter_mut().find(|a| a.name == name)
    }

    /// Find an owned parameter by name.
    pub fn parameter(&self, name: &str) -> Option<&ParameterInstance> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Find an owned parameter by name, mutably.
    pub fn parameter_mut(&mut self, name: &str) -> Option<&mut ParameterInstance> {
        self.parameters.iter_mut().find(|p| p.name == name)
    }

    /// Instance names referenced by object-reference attributes, non-empty only.
    pub fn object_refs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .filter_map(|a| a.object_ref_target().map(|t| (a.name.as_str(), t)))
    }

    /// Feed semantically significant fields into a running digest, in fixed
    /// field order: type name, instance name, iolets, attributes, parameters.
    pub fn hash_into(&self, hasher: &mut Sha256) {
        hash_str(hasher, &self.type_name);
        hash_str(hasher, &self.name);
        hasher.update((self.inlets.len() as u64).to_le_bytes());
        for inlet in &self.inlets {
            inlet.hash_into(hasher);
        }
        hasher.update((self.outlets.len() as u64).to_le_bytes());
        for outlet in &self.outlets {
            outlet.hash_into(hasher);
        }
        hasher.update((self.attributes.len() as u64).to_le_bytes());
        for attr in &self.attributes {
            attr.hash_into(hasher);
        }
        hasher.update((self.parameters.len() as u64).to_le_bytes());
        for param in &self.parameters {
            param.hash_into(hasher);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeVariant;
    use crate::parameter::ParameterDef;

    fn osc_def() -> ObjectDefinition {
        ObjectDefinition::new("osc/sine")
            .with_attribute(AttributeDef::new(
                "stages",
                AttributeVariant::Spinner {
                    min: 1,
                    max: 8,
                    default: 2,
                },
            ))
            .with_parameter(ParameterDef::frac("freq", 0.0, 64.0, 1.0))
            .with_inlet(IoletDef::optional("pitch", SignalType::Frac))
            .with_outlet(IoletDef::optional("out", SignalType::FracBuffer))
    }

    #[test]
    fn instantiate_deep_copies_state() {
        let def = osc_def();
        let mut a = def.instantiate("Osc 1");
        let b = def.instantiate("Osc 2");

        a.parameter_mut("freq").unwrap().set_frac(4.0);
        a.attribute_mut("stages")
            .unwrap()
            .set_value(crate::AttributeValue::Int(7))
            .unwrap();

        // Sibling instance and definition are untouched.
        assert!((b.parameter("freq").unwrap().as_frac() - 1.0).abs() < 1e-6);
        assert_eq!(def.parameters[0].default_raw, crate::FRAC_ONE);
        assert_eq!(def.attributes[0].variant.default_value(), crate::AttributeValue::Int(2));
    }

    #[test]
    fn hash_differs_between_named_instances() {
        use sha2::{Digest, Sha256};
        let def = osc_def();
        let a = def.instantiate("Osc 1");
        let b = def.instantiate("Osc 2");
        let mut ha = Sha256::new();
        let mut hb = Sha256::new();
        a.hash_into(&mut ha);
        b.hash_into(&mut hb);
        assert_ne!(ha.finalize(), hb.finalize());
    }

    #[test]
    fn object_refs_skips_empty_targets() {
        let def = ObjectDefinition::new("table/read")
            .with_attribute(AttributeDef::new(
                "table",
                AttributeVariant::ObjectRef {
                    expected_type: None,
                },
            ));
        let mut inst = def.instantiate("read1");
        assert_eq!(inst.object_refs().count(), 0);
        inst.attribute_mut("table")
            .unwrap()
            .set_value(crate::AttributeValue::ObjectRef("Table 1".to_string()))
            .unwrap();
        let refs: Vec<_> = inst.object_refs().collect();
        assert_eq!(refs, vec![("table", "Table 1")]);
    }
}
