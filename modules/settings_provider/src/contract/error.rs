//! Contract error types for the settings provider

use super::model::{ConversionError, SettingsKind};

/// Settings provider errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// A stored value could not be converted to the property type
    #[error("invalid stored value for '{key}': {source}")]
    Conversion {
        /// Persisted key or connection string name
        key: String,
        #[source]
        source: ConversionError,
    },

    /// A property resolved to an unusable key while writing
    #[error("property '{field}' of {settings_type} resolved to an empty key")]
    EmptyKey {
        settings_type: &'static str,
        field: &'static str,
    },

    /// Type tag not present in the settings catalog
    #[error("settings type not registered: {type_name}")]
    UnknownType { type_name: String },

    /// Erased instance did not match the handler it was dispatched to
    #[error("settings type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// No binding registered for the requested type
    #[error("no binding registered for settings type {type_name}")]
    NotBound { type_name: String },

    /// Production binding requested without a binder for the settings kind
    #[error("no {kind} settings binder available for {type_name}")]
    MissingBinder {
        kind: SettingsKind,
        type_name: &'static str,
    },

    /// Configuration store failure (I/O, malformed XML, unavailable section)
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl SettingsError {
    pub fn conversion(key: impl Into<String>, source: ConversionError) -> Self {
        Self::Conversion {
            key: key.into(),
            source,
        }
    }
}
