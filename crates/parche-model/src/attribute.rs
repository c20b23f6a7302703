//! Compile-time attribute definitions and instances.
//!
//! An attribute is a configuration value baked into generated code — it has
//! no live representation on the device, so changing one requires
//! regeneration and redeployment. Attributes are a closed tagged variant:
//! each [`AttributeVariant`] defines its own default, validation rule, and
//! serialization into a source-code literal.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ModelError;
use crate::symbol::instance_symbol;

/// One selectable entry of a combo-box attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComboEntry {
    /// Human-readable label shown by the editor.
    pub label: String,
    /// Identifier emitted into generated code when this entry is selected.
    pub cname: String,
}

/// The closed set of attribute variants.
///
/// Dispatch is by match, not by a trait-object hierarchy: the set is closed
/// and every variant needs the same three capabilities (default, validate,
/// serialize-to-literal).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeVariant {
    /// Bounded integer chosen with a spinner control.
    Spinner {
        /// Lower bound (inclusive).
        min: i32,
        /// Upper bound (inclusive).
        max: i32,
        /// Default value.
        default: i32,
    },
    /// Enumerated choice from a fixed entry list.
    Combo {
        /// Selectable entries, in display order.
        entries: Vec<ComboEntry>,
        /// Index of the default entry.
        default_index: usize,
    },
    /// Reference to another object instance in the same patch, by name.
    ObjectRef {
        /// Type name the referenced instance must have, when constrained.
        expected_type: Option<String>,
    },
    /// Path of a file shipped alongside the patch.
    Filename,
    /// Name of a table object providing shared sample storage.
    TableName,
    /// Free-form text spliced into generated code verbatim as a string.
    Text,
}

impl AttributeVariant {
    /// The default value for a freshly instantiated attribute.
    pub fn default_value(&self) -> AttributeValue {
        match self {
            AttributeVariant::Spinner { default, .. } => AttributeValue::Int(*default),
            AttributeVariant::Combo { default_index, .. } => {
                AttributeValue::Choice(*default_index)
            }
            AttributeVariant::ObjectRef { .. } => AttributeValue::ObjectRef(String::new()),
            AttributeVariant::Filename => AttributeValue::Filename(String::new()),
            AttributeVariant::TableName => AttributeValue::TableName(String::new()),
            AttributeVariant::Text => AttributeValue::Text(String::new()),
        }
    }

    /// Whether `value` is of this variant's value shape.
    pub fn matches(&self, value: &AttributeValue) -> bool {
        matches!(
            (self, value),
            (AttributeVariant::Spinner { .. }, AttributeValue::Int(_))
                | (AttributeVariant::Combo { .. }, AttributeValue::Choice(_))
                | (AttributeVariant::ObjectRef { .. }, AttributeValue::ObjectRef(_))
                | (AttributeVariant::Filename, AttributeValue::Filename(_))
                | (AttributeVariant::TableName, AttributeValue::TableName(_))
                | (AttributeVariant::Text, AttributeValue::Text(_))
        )
    }

    /// Short name of the variant for diagnostics.
    pub const fn name(&self) -> &'static str {
        match self {
            AttributeVariant::Spinner { .. } => "spinner",
            AttributeVariant::Combo { .. } => "combo",
            AttributeVariant::ObjectRef { .. } => "object-ref",
            AttributeVariant::Filename => "filename",
            AttributeVariant::TableName => "table-name",
            AttributeVariant::Text => "text",
        }
    }

    fn hash_into(&self, hasher: &mut Sha256) {
        match self {
            AttributeVariant::Spinner { min, max, default } => {
                hasher.update([0u8]);
                hasher.update(min.to_le_bytes());
                hasher.update(max.to_le_bytes());
                hasher.update(default.to_le_bytes());
            }
            AttributeVariant::Combo {
                entries,
                default_index,
            } => {
                hasher.update([1u8]);
                hasher.update((entries.len() as u64).to_le_bytes());
                for entry in entries {
                    hash_str(hasher, &entry.label);
                    hash_str(hasher, &entry.cname);
                }
                hasher.update((*default_index as u64).to_le_bytes());
            }
            AttributeVariant::ObjectRef { expected_type } => {
                hasher.update([2u8]);
                match expected_type {
                    Some(t) => {
                        hasher.update([1u8]);
                        hash_str(hasher, t);
                    }
                    None => hasher.update([0u8]),
                }
            }
            AttributeVariant::Filename => hasher.update([3u8]),
            AttributeVariant::TableName => hasher.update([4u8]),
            AttributeVariant::Text => hasher.update([5u8]),
        }
    }
}

/// The current value of an attribute instance, mirroring [`AttributeVariant`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// Spinner value.
    Int(i32),
    /// Selected combo entry index.
    Choice(usize),
    /// Referenced instance name (empty = unset).
    ObjectRef(String),
    /// File path.
    Filename(String),
    /// Table object name.
    TableName(String),
    /// Free text.
    Text(String),
}

impl AttributeValue {
    /// Short name of the value's variant for diagnostics.
    pub const fn variant_name(&self) -> &'static str {
        match self {
            AttributeValue::Int(_) => "spinner",
            AttributeValue::Choice(_) => "combo",
            AttributeValue::ObjectRef(_) => "object-ref",
            AttributeValue::Filename(_) => "filename",
            AttributeValue::TableName(_) => "table-name",
            AttributeValue::Text(_) => "text",
        }
    }

    fn hash_into(&self, hasher: &mut Sha256) {
        match self {
            AttributeValue::Int(v) => {
                hasher.update([0u8]);
                hasher.update(v.to_le_bytes());
            }
            AttributeValue::Choice(i) => {
                hasher.update([1u8]);
                hasher.update((*i as u64).to_le_bytes());
            }
            AttributeValue::ObjectRef(s) => {
                hasher.update([2u8]);
                hash_str(hasher, s);
            }
            AttributeValue::Filename(s) => {
                hasher.update([3u8]);
                hash_str(hasher, s);
            }
            AttributeValue::TableName(s) => {
                hasher.update([4u8]);
                hash_str(hasher, s);
            }
            AttributeValue::Text(s) => {
                hasher.update([5u8]);
                hash_str(hasher, s);
            }
        }
    }
}

/// Attribute template inside an [`ObjectDefinition`](crate::ObjectDefinition).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDef {
    /// Attribute name, unique within its object definition.
    pub name: String,
    /// The variant with its bounds / choices.
    pub variant: AttributeVariant,
}

impl AttributeDef {
    /// Create a definition.
    pub fn new(name: impl Into<String>, variant: AttributeVariant) -> Self {
        Self {
            name: name.into(),
            variant,
        }
    }

    /// Deep-copy this definition into a fresh instance carrying the default value.
    pub fn instantiate(&self) -> AttributeInstance {
        AttributeInstance {
            name: self.name.clone(),
            variant: self.variant.clone(),
            value: self.variant.default_value(),
        }
    }
}

/// One attribute on an [`ObjectInstance`](crate::ObjectInstance).
///
/// Owns an independent copy of the variant bounds and the current value —
/// never shares mutable state with the definition it was copied from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeInstance {
    /// Attribute name (copied from the definition).
    pub name: String,
    /// Variant with bounds / choices (copied from the definition).
    pub variant: AttributeVariant,
    /// Current value.
    pub value: AttributeValue,
}

impl AttributeInstance {
    /// Validate `value` against this attribute's variant and assign it.
    pub fn set_value(&mut self, value: AttributeValue) -> Result<(), ModelError> {
        if !self.variant.matches(&value) {
            return Err(ModelError::TypeMismatch {
                expected: self.variant.name(),
                found: value.variant_name(),
            });
        }
        self.validate(&value)?;
        self.value = value;
        Ok(())
    }

    /// Copy value state (never identity) from another instance.
    ///
    /// Fails with [`ModelError::TypeMismatch`] when the variants differ.
    pub fn copy_value_from(&mut self, other: &AttributeInstance) -> Result<(), ModelError> {
        if core::mem::discriminant(&self.variant) != core::mem::discriminant(&other.variant) {
            return Err(ModelError::TypeMismatch {
                expected: self.variant.name(),
                found: other.variant.name(),
            });
        }
        self.value = other.value.clone();
        Ok(())
    }

    /// Check a candidate value against the variant's declared bounds.
    fn validate(&self, value: &AttributeValue) -> Result<(), ModelError> {
        match (&self.variant, value) {
            (AttributeVariant::Spinner { min, max, .. }, AttributeValue::Int(v)) => {
                if v < min || v > max {
                    return Err(ModelError::ValueOutOfRange {
                        name: self.name.clone(),
                        value: i64::from(*v),
                        min: i64::from(*min),
                        max: i64::from(*max),
                    });
                }
                Ok(())
            }
            (AttributeVariant::Combo { entries, .. }, AttributeValue::Choice(i)) => {
                if *i >= entries.len() {
                    return Err(ModelError::ValueOutOfRange {
                        name: self.name.clone(),
                        value: *i as i64,
                        min: 0,
                        max: entries.len() as i64 - 1,
                    });
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Serialize the current value into a source-code literal.
    ///
    /// Fails when the value violates its declared bound (the generator maps
    /// this into an `InvalidAttributeValue` for the offending object only).
    pub fn to_literal(&self) -> Result<String, ModelError> {
        self.validate(&self.value)?;
        match (&self.variant, &self.value) {
            (AttributeVariant::Spinner { .. }, AttributeValue::Int(v)) => Ok(v.to_string()),
            (AttributeVariant::Combo { entries, .. }, AttributeValue::Choice(i)) => {
                Ok(entries[*i].cname.clone())
            }
            (AttributeVariant::ObjectRef { .. }, AttributeValue::ObjectRef(target)) => {
                Ok(format!("&instance_{}", instance_symbol(target)))
            }
            (AttributeVariant::Filename, AttributeValue::Filename(s))
            | (AttributeVariant::TableName, AttributeValue::TableName(s))
            | (AttributeVariant::Text, AttributeValue::Text(s)) => Ok(c_string_literal(s)),
            _ => Err(ModelError::TypeMismatch {
                expected: self.variant.name(),
                found: self.value.variant_name(),
            }),
        }
    }

    /// If this is an object-reference attribute with a non-empty target,
    /// return the referenced instance name.
    pub fn object_ref_target(&self) -> Option<&str> {
        match (&self.variant, &self.value) {
            (AttributeVariant::ObjectRef { .. }, AttributeValue::ObjectRef(t)) if !t.is_empty() => {
                Some(t)
            }
            _ => None,
        }
    }

    /// Feed semantically significant fields into a running digest, in fixed
    /// field order: name, variant bounds/choices, current value.
    pub fn hash_into(&self, hasher: &mut Sha256) {
        hash_str(hasher, &self.name);
        self.variant.hash_into(hasher);
        self.value.hash_into(hasher);
    }
}

/// Length-prefixed string framing keeps adjacent fields unambiguous.
pub(crate) fn hash_str(hasher: &mut Sha256, s: &str) {
    hasher.update((s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

/// Quote a string as a C literal, escaping backslashes and quotes.
fn c_string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}
