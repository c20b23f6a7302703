//! Error types for entity-model operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while mutating or persisting a patch.
#[derive(Debug, Error)]
pub enum ModelError {
    /// An instance with this name already exists in the patch.
    #[error("instance name '{0}' is already taken")]
    DuplicateName(String),

    /// The referenced object slot does not exist or was removed.
    #[error("no object instance '{0}' in patch")]
    UnknownObject(String),

    /// The referenced iolet index is out of range for the instance.
    #[error("object '{object}' has no {direction} #{iolet}")]
    UnknownIolet {
        /// Owning instance name.
        object: String,
        /// "inlet" or "outlet".
        direction: &'static str,
        /// Iolet index that was requested.
        iolet: usize,
    },

    /// No attribute with this name on the instance.
    #[error("object '{object}' has no attribute '{attribute}'")]
    UnknownAttribute {
        /// Owning instance name.
        object: String,
        /// Attribute name that was requested.
        attribute: String,
    },

    /// No parameter with this name on the instance.
    #[error("object '{object}' has no parameter '{parameter}'")]
    UnknownParameter {
        /// Owning instance name.
        object: String,
        /// Parameter name that was requested.
        parameter: String,
    },

    /// No object type with this name in the library.
    #[error("unknown object type: {0}")]
    UnknownType(String),

    /// Value copy or assignment between mismatched variants.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Variant the target expects.
        expected: &'static str,
        /// Variant that was supplied.
        found: &'static str,
    },

    /// Attempt to connect signal-incompatible iolets.
    #[error("cannot connect {from} outlet to {to} inlet")]
    SignalMismatch {
        /// Signal type of the source outlet.
        from: &'static str,
        /// Signal type of the destination inlet.
        to: &'static str,
    },

    /// The inlet already belongs to a net.
    #[error("inlet '{inlet}' of '{object}' is already connected")]
    InletOccupied {
        /// Owning instance name.
        object: String,
        /// Inlet name.
        inlet: String,
    },

    /// Disconnect of an inlet that is not connected to any net.
    #[error("inlet '{inlet}' of '{object}' is not connected")]
    NotConnected {
        /// Owning instance name.
        object: String,
        /// Inlet name.
        inlet: String,
    },

    /// A value violates its variant's declared bounds.
    #[error("value {value} for '{name}' out of range [{min}, {max}]")]
    ValueOutOfRange {
        /// Attribute or parameter name.
        name: String,
        /// Offending value.
        value: i64,
        /// Lower bound (inclusive).
        min: i64,
        /// Upper bound (inclusive).
        max: i64,
    },

    /// Failed to read a patch file.
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a patch file.
    #[error("failed to write file '{path}': {source}")]
    WriteFile {
        /// Path of the file that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse or serialize patch JSON.
    #[error("failed to parse patch JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl ModelError {
    /// Create a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ModelError::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Create a write file error.
    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ModelError::WriteFile {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_display_names_offender() {
        let err = ModelError::ValueOutOfRange {
            name: "depth".to_string(),
            value: 99,
            min: 0,
            max: 16,
        };
        assert_eq!(err.to_string(), "value 99 for 'depth' out of range [0, 16]");
    }

    #[test]
    fn read_file_exposes_io_source() {
        use std::error::Error;
        let err = ModelError::read_file(
            "/tmp/p.json",
            std::io::Error::new(std::io::ErrorKind::NotFound, "mock"),
        );
        assert!(err.source().is_some());
        assert!(err.to_string().contains("/tmp/p.json"));
    }
}
