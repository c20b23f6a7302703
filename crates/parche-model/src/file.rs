//! Patch file persistence (JSON).

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::ModelError;
use crate::patch::Patch;

/// Load a patch from a JSON file.
///
/// The loaded patch starts clean; the dirty flag tracks edits since load.
pub fn load_patch(path: impl AsRef<Path>) -> Result<Patch, ModelError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| ModelError::read_file(path, e))?;
    let patch: Patch = serde_json::from_str(&text)?;
    debug!(path = %path.display(), objects = patch.object_count(), "loaded patch");
    Ok(patch)
}

/// Save a patch to a JSON file and clear its dirty flag.
pub fn save_patch(patch: &mut Patch, path: impl AsRef<Path>) -> Result<(), ModelError> {
    let path = path.as_ref();
    let text = serde_json::to_string_pretty(patch)?;
    fs::write(path, text).map_err(|e| ModelError::write_file(path, e))?;
    patch.mark_clean();
    debug!(path = %path.display(), "saved patch");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::ObjectLibrary;
    use crate::net::{InletRef, OutletRef};

    #[test]
    fn save_load_round_trip_preserves_topology() {
        let lib = ObjectLibrary::with_builtins();
        let mut patch = Patch::new();
        let osc = patch
            .add_instance(lib.instantiate("osc/sine", "Osc 1").unwrap())
            .unwrap();
        let dac = patch
            .add_instance(lib.instantiate("io/dac", "Out").unwrap())
            .unwrap();
        patch
            .connect(
                OutletRef {
                    object: osc,
                    outlet: 0,
                },
                InletRef {
                    object: dac,
                    inlet: 0,
                },
            )
            .unwrap();
        patch.set_parameter_raw(osc, "freq", 12345).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patch.json");
        save_patch(&mut patch, &path).unwrap();
        assert!(!patch.is_dirty(), "save clears the dirty flag");

        let loaded = load_patch(&path).unwrap();
        assert_eq!(loaded.object_count(), 2);
        assert_eq!(loaded.nets().len(), 1);
        let osc_id = loaded.find("Osc 1").unwrap();
        assert_eq!(
            loaded
                .object(osc_id)
                .unwrap()
                .parameter("freq")
                .unwrap()
                .raw(),
            12345
        );
        assert!(!loaded.is_dirty());
    }

    #[test]
    fn load_missing_file_reports_path() {
        let err = load_patch("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ModelError::ReadFile { .. }));
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }
}
