//! Runtime-tunable parameter definitions and instances.
//!
//! A parameter lives in a raw `i32` coded storage form on the device and is
//! addressed there by its runtime index (assigned by the code generator in
//! global emission order). The typed views convert between the raw coding and
//! fixed-point fractions, signed integers, or booleans.
//!
//! Two flags ride along with every instance:
//!
//! - `frozen` excludes the parameter from bulk randomization / automation;
//! - `needs_transmit` marks a locally changed value for the device session's
//!   next coalesced batch. Values *reported by* the device are applied via
//!   [`ParameterInstance::apply_device_value`], which deliberately does not
//!   set the flag — retransmitting a value the device just told us about
//!   would echo forever.

use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::attribute::hash_str;
use crate::error::ModelError;

/// Fixed-point scale: raw value of `1 << 21` represents 1.0.
pub const FRAC_ONE: i32 = 1 << 21;

/// The typed view over a parameter's raw `i32` storage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ParamKind {
    /// Fixed-point fraction with unit bounds, e.g. `-64.0..=64.0` or `0.0..=1.0`.
    Frac {
        /// Lower bound in fractional units.
        min: f32,
        /// Upper bound in fractional units.
        max: f32,
    },
    /// Signed integer.
    Int {
        /// Lower bound (inclusive).
        min: i32,
        /// Upper bound (inclusive).
        max: i32,
    },
    /// Boolean toggle (raw 0 or 1).
    Bool,
}

impl ParamKind {
    /// Inclusive raw storage bounds for this kind, in ascending order.
    ///
    /// A hand-edited patch file can declare inverted bounds; they are
    /// normalized here so clamping and randomization never see `lo > hi`.
    pub fn raw_bounds(self) -> (i32, i32) {
        let (a, b) = match self {
            ParamKind::Frac { min, max } => (
                (min * FRAC_ONE as f32) as i32,
                (max * FRAC_ONE as f32) as i32,
            ),
            ParamKind::Int { min, max } => (min, max),
            ParamKind::Bool => (0, 1),
        };
        (a.min(b), a.max(b))
    }

    /// Short name of the kind for diagnostics.
    pub const fn name(self) -> &'static str {
        match self {
            ParamKind::Frac { .. } => "frac",
            ParamKind::Int { .. } => "int",
            ParamKind::Bool => "bool",
        }
    }

    fn hash_into(self, hasher: &mut Sha256) {
        match self {
            ParamKind::Frac { min, max } => {
                hasher.update([0u8]);
                hasher.update(min.to_le_bytes());
                hasher.update(max.to_le_bytes());
            }
            ParamKind::Int { min, max } => {
                hasher.update([1u8]);
                hasher.update(min.to_le_bytes());
                hasher.update(max.to_le_bytes());
            }
            ParamKind::Bool => hasher.update([2u8]),
        }
    }
}

/// Parameter template inside an [`ObjectDefinition`](crate::ObjectDefinition).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    /// Parameter name, unique within its object definition.
    pub name: String,
    /// Typed view over the raw storage.
    pub kind: ParamKind,
    /// Default raw value.
    pub default_raw: i32,
}

impl ParameterDef {
    /// Create a definition. The default is clamped to the kind's raw bounds.
    pub fn new(name: impl Into<String>, kind: ParamKind, default_raw: i32) -> Self {
        let (lo, hi) = kind.raw_bounds();
        Self {
            name: name.into(),
            kind,
            default_raw: default_raw.clamp(lo, hi),
        }
    }

    /// Frac parameter with the given fractional bounds and default.
    pub fn frac(name: impl Into<String>, min: f32, max: f32, default: f32) -> Self {
        Self::new(
            name,
            ParamKind::Frac { min, max },
            (default * FRAC_ONE as f32) as i32,
        )
    }

    /// Integer parameter.
    pub fn int(name: impl Into<String>, min: i32, max: i32, default: i32) -> Self {
        Self::new(name, ParamKind::Int { min, max }, default)
    }

    /// Boolean parameter.
    pub fn boolean(name: impl Into<String>, default: bool) -> Self {
        Self::new(name, ParamKind::Bool, i32::from(default))
    }

    /// Deep-copy this definition into a fresh instance at the default value.
    pub fn instantiate(&self) -> ParameterInstance {
        ParameterInstance {
            name: self.name.clone(),
            kind: self.kind,
            raw: self.default_raw,
            frozen: false,
            needs_transmit: false,
        }
    }
}

/// One parameter on an [`ObjectInstance`](crate::ObjectInstance).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterInstance {
    /// Parameter name (copied from the definition).
    pub name: String,
    /// Typed view (copied from the definition).
    pub kind: ParamKind,
    /// Current raw coded value.
    raw: i32,
    /// Excluded from bulk randomization / automation.
    pub frozen: bool,
    /// Pending transmission to the device.
    #[serde(skip)]
    pub needs_transmit: bool,
}

impl ParameterInstance {
    /// Current raw coded value.
    pub fn raw(&self) -> i32 {
        self.raw
    }

    /// Set the raw value from the editor side.
    ///
    /// Clamps to the kind's bounds and marks the instance for transmission.
    pub fn set_raw(&mut self, raw: i32) {
        let (lo, hi) = self.kind.raw_bounds();
        self.raw = raw.clamp(lo, hi);
        self.needs_transmit = true;
    }

    /// Apply a value reported by the device itself.
    ///
    /// Updates storage without marking `needs_transmit`, so the session never
    /// echoes a device-originated change back at the board.
    pub fn apply_device_value(&mut self, raw: i32) {
        let (lo, hi) = self.kind.raw_bounds();
        self.raw = raw.clamp(lo, hi);
    }

    /// Fractional view of the raw value.
    pub fn as_frac(&self) -> f32 {
        self.raw as f32 / FRAC_ONE as f32
    }

    /// Set from a fractional value.
    pub fn set_frac(&mut self, value: f32) {
        self.set_raw((value * FRAC_ONE as f32) as i32);
    }

    /// Integer view of the raw value.
    pub fn as_int(&self) -> i32 {
        self.raw
    }

    /// Set from an integer value.
    pub fn set_int(&mut self, value: i32) {
        self.set_raw(value);
    }

    /// Boolean view of the raw value.
    pub fn as_bool(&self) -> bool {
        self.raw != 0
    }

    /// Set from a boolean value.
    pub fn set_bool(&mut self, value: bool) {
        self.set_raw(i32::from(value));
    }

    /// Draw a fresh uniform value across the full representable raw range.
    ///
    /// Frozen parameters are left untouched. Returns whether the value was
    /// replaced.
    pub fn randomize<R: Rng>(&mut self, rng: &mut R) -> bool {
        if self.frozen {
            return false;
        }
        let (lo, hi) = self.kind.raw_bounds();
        self.raw = rng.gen_range(lo..=hi);
        self.needs_transmit = true;
        true
    }

    /// Copy value state (never identity) from another instance.
    ///
    /// Fails with [`ModelError::TypeMismatch`] when the kinds differ.
    pub fn copy_value_from(&mut self, other: &ParameterInstance) -> Result<(), ModelError> {
        if core::mem::discriminant(&self.kind) != core::mem::discriminant(&other.kind) {
            return Err(ModelError::TypeMismatch {
                expected: self.kind.name(),
                found: other.kind.name(),
            });
        }
        self.set_raw(other.raw);
        Ok(())
    }

    /// Feed semantically significant fields into a running digest, in fixed
    /// field order: name, kind bounds, current raw value.
    pub fn hash_into(&self, hasher: &mut Sha256) {
        hash_str(hasher, &self.name);
        self.kind.hash_into(hasher);
        hasher.update(self.raw.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn frac_round_trips_through_raw() {
        let mut p = ParameterDef::frac("level", 0.0, 1.0, 0.5).instantiate();
        assert!((p.as_frac() - 0.5).abs() < 1e-6);
        p.set_frac(0.25);
        assert!((p.as_frac() - 0.25).abs() < 1e-6);
        assert_eq!(p.raw(), FRAC_ONE / 4);
    }

    #[test]
    fn set_raw_clamps_and_marks_dirty() {
        let mut p = ParameterDef::int("count", 0, 10, 5).instantiate();
        assert!(!p.needs_transmit);
        p.set_raw(99);
        assert_eq!(p.raw(), 10);
        assert!(p.needs_transmit);
    }

    #[test]
    fn device_value_does_not_mark_dirty() {
        let mut p = ParameterDef::frac("level", 0.0, 1.0, 0.5).instantiate();
        p.apply_device_value(FRAC_ONE / 8);
        assert_eq!(p.raw(), FRAC_ONE / 8);
        assert!(!p.needs_transmit, "device echo must not re-transmit");
    }

    #[test]
    fn frozen_parameter_survives_randomize() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut p = ParameterDef::frac("level", 0.0, 1.0, 0.5).instantiate();
        p.frozen = true;
        let before = p.raw();
        assert!(!p.randomize(&mut rng));
        assert_eq!(p.raw(), before);
    }

    #[test]
    fn randomize_stays_within_raw_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut p = ParameterDef::int("semi", -12, 12, 0).instantiate();
        for _ in 0..100 {
            p.randomize(&mut rng);
            assert!((-12..=12).contains(&p.raw()));
        }
    }

    #[test]
    fn copy_value_from_rejects_kind_mismatch() {
        let mut a = ParameterDef::boolean("mute", false).instantiate();
        let b = ParameterDef::int("count", 0, 4, 1).instantiate();
        assert!(matches!(
            a.copy_value_from(&b),
            Err(ModelError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn bool_view() {
        let mut p = ParameterDef::boolean("mute", false).instantiate();
        assert!(!p.as_bool());
        p.set_bool(true);
        assert!(p.as_bool());
        assert_eq!(p.raw(), 1);
    }

    #[test]
    fn inverted_bounds_are_normalized() {
        assert_eq!(ParamKind::Int { min: 10, max: 0 }.raw_bounds(), (0, 10));
        let inverted = ParamKind::Frac {
            min: 1.0,
            max: 0.0,
        };
        assert_eq!(inverted.raw_bounds(), (0, FRAC_ONE));
    }

    #[test]
    fn hand_edited_file_with_inverted_bounds_cannot_panic() {
        // load_patch trusts the file, so the instance arrives as-is.
        let json = r#"{
            "name": "level",
            "kind": { "Frac": { "min": 1.0, "max": 0.0 } },
            "raw": 0,
            "frozen": false
        }"#;
        let mut p: ParameterInstance = serde_json::from_str(json).unwrap();
        p.set_raw(i32::MAX);
        assert_eq!(p.raw(), FRAC_ONE);
        let mut rng = StdRng::seed_from_u64(3);
        assert!(p.randomize(&mut rng));
        assert!((0..=FRAC_ONE).contains(&p.raw()));
    }

    mod properties {
        use proptest::prelude::*;

        use super::*;

        fn any_kind() -> impl Strategy<Value = ParamKind> {
            prop_oneof![
                (-64.0f32..=64.0, -64.0f32..=64.0)
                    .prop_map(|(min, max)| ParamKind::Frac { min, max }),
                (-100_000i32..=100_000, -100_000i32..=100_000)
                    .prop_map(|(min, max)| ParamKind::Int { min, max }),
                Just(ParamKind::Bool),
            ]
        }

        proptest! {
            #[test]
            fn set_raw_always_lands_within_bounds(kind in any_kind(), raw in any::<i32>()) {
                let mut p = ParameterDef::new("p", kind, 0).instantiate();
                p.set_raw(raw);
                let (lo, hi) = kind.raw_bounds();
                prop_assert!((lo..=hi).contains(&p.raw()));
            }

            #[test]
            fn randomize_always_lands_within_bounds(kind in any_kind(), seed in any::<u64>()) {
                let mut rng = StdRng::seed_from_u64(seed);
                let mut p = ParameterDef::new("p", kind, 0).instantiate();
                prop_assert!(p.randomize(&mut rng));
                let (lo, hi) = kind.raw_bounds();
                prop_assert!((lo..=hi).contains(&p.raw()));
            }
        }
    }
}
