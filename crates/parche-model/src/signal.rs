//! Signal types carried by iolets and nets.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The signal type of an iolet endpoint.
///
/// A net is only legal between an outlet and inlets of compatible types.
/// `Frac` and `Int` are control-rate scalars, `FracBuffer` is an audio-rate
/// block, `Bool` is a gate/trigger line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalType {
    /// Control-rate fixed-point fraction.
    Frac,
    /// Audio-rate buffer of fixed-point fractions.
    FracBuffer,
    /// Control-rate signed integer.
    Int,
    /// Boolean gate / trigger.
    Bool,
}

impl SignalType {
    /// Whether an outlet of type `self` may legally feed an inlet of type `other`.
    ///
    /// Types must match exactly, except that an `Int` outlet may feed a `Frac`
    /// inlet (integer values promote losslessly into the fixed-point range).
    pub fn is_compatible(self, other: SignalType) -> bool {
        self == other || (self == SignalType::Int && other == SignalType::Frac)
    }

    /// Short lowercase name used in diagnostics and generated comments.
    pub const fn name(self) -> &'static str {
        match self {
            SignalType::Frac => "frac",
            SignalType::FracBuffer => "frac_buffer",
            SignalType::Int => "int",
            SignalType::Bool => "bool",
        }
    }

    pub(crate) fn hash_into(self, hasher: &mut Sha256) {
        hasher.update([match self {
            SignalType::Frac => 0u8,
            SignalType::FracBuffer => 1,
            SignalType::Int => 2,
            SignalType::Bool => 3,
        }]);
    }
}

impl core::fmt::Display for SignalType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_is_compatible() {
        assert!(SignalType::Frac.is_compatible(SignalType::Frac));
        assert!(SignalType::FracBuffer.is_compatible(SignalType::FracBuffer));
    }

    #[test]
    fn int_promotes_to_frac() {
        assert!(SignalType::Int.is_compatible(SignalType::Frac));
        assert!(!SignalType::Frac.is_compatible(SignalType::Int));
    }

    #[test]
    fn buffer_never_mixes_with_scalar() {
        assert!(!SignalType::FracBuffer.is_compatible(SignalType::Frac));
        assert!(!SignalType::Frac.is_compatible(SignalType::FracBuffer));
        assert!(!SignalType::Bool.is_compatible(SignalType::Frac));
    }
}
