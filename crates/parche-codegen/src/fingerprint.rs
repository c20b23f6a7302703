//! Content fingerprints for change detection.

use core::fmt;

use sha2::{Digest, Sha256};

use parche_model::ObjectInstance;

/// SHA-256 digest over an object instance's semantic fields.
///
/// Two instances fingerprint equal exactly when their generated fragments
/// would be identical at the same parameter index base.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Fingerprint an instance.
    pub fn of(instance: &ObjectInstance) -> Self {
        let mut hasher = Sha256::new();
        instance.hash_into(&mut hasher);
        Self(hasher.finalize().into())
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Finalize a running digest the generator has fed extra context into
    /// (inlet wiring, which the instance hash alone does not cover).
    pub(crate) fn finish(hasher: Sha256) -> Self {
        Self(hasher.finalize().into())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First six bytes are plenty for log correlation.
        write!(f, "Fingerprint(")?;
        for byte in &self.0[..6] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parche_model::ObjectLibrary;

    #[test]
    fn equal_instances_fingerprint_equal() {
        let lib = ObjectLibrary::with_builtins();
        let a = lib.instantiate("osc/sine", "Osc 1").unwrap();
        let b = lib.instantiate("osc/sine", "Osc 1").unwrap();
        assert_eq!(Fingerprint::of(&a), Fingerprint::of(&b));
    }

    #[test]
    fn parameter_change_alters_fingerprint() {
        let lib = ObjectLibrary::with_builtins();
        let before = lib.instantiate("osc/sine", "Osc 1").unwrap();
        let mut after = lib.instantiate("osc/sine", "Osc 1").unwrap();
        after.parameter_mut("freq").unwrap().set_frac(7.0);
        assert_ne!(Fingerprint::of(&before), Fingerprint::of(&after));
    }

    #[test]
    fn display_is_full_hex() {
        let lib = ObjectLibrary::with_builtins();
        let fp = Fingerprint::of(&lib.instantiate("io/dac", "Out").unwrap());
        let hex = fp.to_string();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
