//! Persisted key resolution for settings properties

use crate::contract::SettingsField;

/// Key a property is stored under.
///
/// An explicit app setting name is used verbatim; otherwise the key is
/// `<owning type name>.<property name>`.
pub fn resolve_key<T>(type_name: &str, field: &SettingsField<T>) -> String {
    match field.explicit_key() {
        Some(key) => key.to_string(),
        None => format!("{}.{}", type_name, field.name()),
    }
}

/// Storage form of a key: trimmed and lowercased
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}
