//! Object library: registry and factory for object definitions.
//!
//! Definitions are registered once (from the built-in set or an external
//! library file) and are immutable thereafter. The library is the only
//! source of fresh [`ObjectInstance`](crate::ObjectInstance)s.

use crate::attribute::{AttributeDef, AttributeVariant, ComboEntry};
use crate::error::ModelError;
use crate::object::{IoletDef, ObjectDefinition, ObjectInstance};
use crate::parameter::ParameterDef;
use crate::signal::SignalType;

/// Registry of object definitions, keyed by globally unique type name.
pub struct ObjectLibrary {
    entries: Vec<ObjectDefinition>,
}

impl Default for ObjectLibrary {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ObjectLibrary {
    /// Create an empty library.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Create a library pre-populated with the built-in object set.
    pub fn with_builtins() -> Self {
        let mut library = Self::new();
        library.register_builtin_objects();
        library
    }

    /// Register a definition.
    ///
    /// Fails with [`ModelError::DuplicateName`] if the type name is taken —
    /// type names are the definition's identity and must stay unique.
    pub fn register(&mut self, def: ObjectDefinition) -> Result<(), ModelError> {
        if self.get(&def.type_name).is_some() {
            return Err(ModelError::DuplicateName(def.type_name));
        }
        self.entries.push(def);
        Ok(())
    }

    /// Look up a definition by type name.
    pub fn get(&self, type_name: &str) -> Option<&ObjectDefinition> {
        self.entries.iter().find(|d| d.type_name == type_name)
    }

    /// All registered definitions, in registration order.
    pub fn all_objects(&self) -> &[ObjectDefinition] {
        &self.entries
    }

    /// Instantiate a definition under the given instance name.
    pub fn instantiate(
        &self,
        type_name: &str,
        instance_name: impl Into<String>,
    ) -> Result<ObjectInstance, ModelError> {
        self.get(type_name)
            .map(|def| def.instantiate(instance_name))
            .ok_or_else(|| ModelError::UnknownType(type_name.to_string()))
    }

    /// Number of registered definitions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the library is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn register_builtin_objects(&mut self) {
        // Control dial: a front-panel value source.
        self.entries.push(
            ObjectDefinition::new("ctrl/dial")
                .with_parameter(ParameterDef::frac("value", 0.0, 1.0, 0.5))
                .with_outlet(IoletDef::optional("out", SignalType::Frac)),
        );

        // Sine oscillator.
        self.entries.push(
            ObjectDefinition::new("osc/sine")
                .with_attribute(AttributeDef::new(
                    "interpolation",
                    AttributeVariant::Combo {
                        entries: vec![
                            ComboEntry {
                                label: "Linear".to_string(),
                                cname: "INTERP_LINEAR".to_string(),
                            },
                            ComboEntry {
                                label: "Cubic".to_string(),
                                cname: "INTERP_CUBIC".to_string(),
                            },
                        ],
                        default_index: 0,
                    },
                ))
                .with_parameter(ParameterDef::frac("freq", 0.0, 64.0, 1.0))
                .with_parameter(ParameterDef::frac("amp", 0.0, 1.0, 1.0))
                .with_inlet(IoletDef::optional("pitch", SignalType::Frac))
                .with_outlet(IoletDef::optional("out", SignalType::FracBuffer)),
        );

        // Gain stage.
        self.entries.push(
            ObjectDefinition::new("mix/gain")
                .with_parameter(ParameterDef::frac("gain", 0.0, 1.0, 0.5))
                .with_inlet(IoletDef::required("in", SignalType::FracBuffer))
                .with_outlet(IoletDef::optional("out", SignalType::FracBuffer)),
        );

        // Audio output. Its inlet is mandatory: a patch that produces no
        // sound is almost always an authoring mistake.
        self.entries.push(
            ObjectDefinition::new("io/dac")
                .with_inlet(IoletDef::required("in", SignalType::FracBuffer)),
        );

        // Shared sample table.
        self.entries.push(
            ObjectDefinition::new("table/alloc").with_attribute(AttributeDef::new(
                "size_exp",
                AttributeVariant::Spinner {
                    min: 4,
                    max: 16,
                    default: 9,
                },
            )),
        );

        // Table reader, wired to its table by object reference.
        self.entries.push(
            ObjectDefinition::new("table/read")
                .with_attribute(AttributeDef::new(
                    "table",
                    AttributeVariant::ObjectRef {
                        expected_type: Some("table/alloc".to_string()),
                    },
                ))
                .with_inlet(IoletDef::required("index", SignalType::Frac))
                .with_outlet(IoletDef::optional("out", SignalType::Frac)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered() {
        let lib = ObjectLibrary::with_builtins();
        assert_eq!(lib.len(), 6);
        assert!(lib.get("osc/sine").is_some());
        assert!(lib.get("nonexistent").is_none());
    }

    #[test]
    fn duplicate_type_name_is_rejected() {
        let mut lib = ObjectLibrary::with_builtins();
        let err = lib
            .register(ObjectDefinition::new("osc/sine"))
            .unwrap_err();
        assert!(matches!(err, ModelError::DuplicateName(_)));
    }

    #[test]
    fn instantiate_unknown_type_fails() {
        let lib = ObjectLibrary::with_builtins();
        assert!(matches!(
            lib.instantiate("osc/triangle", "t1"),
            Err(ModelError::UnknownType(_))
        ));
    }

    #[test]
    fn all_builtins_instantiate() {
        let lib = ObjectLibrary::with_builtins();
        for def in lib.all_objects() {
            let inst = def.instantiate("x");
            assert_eq!(inst.type_name, def.type_name);
            assert_eq!(inst.parameters.len(), def.parameters.len());
            assert_eq!(inst.attributes.len(), def.attributes.len());
        }
    }
}
