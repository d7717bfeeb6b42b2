//! Classification of properties persisted as named connection strings

use crate::contract::SettingsField;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStringCheck {
    pub is_connection_string: bool,
    /// Logical connection string name when `is_connection_string` is set
    pub name: Option<&'static str>,
}

/// Whether `field` is stored in the connection strings section
pub fn detect<T>(field: &SettingsField<T>) -> ConnectionStringCheck {
    match field.connection_string_name() {
        Some(name) => ConnectionStringCheck {
            is_connection_string: true,
            name: Some(name),
        },
        None => ConnectionStringCheck::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Db {
        connection: String,
    }

    #[test]
    fn test_plain_property_is_not_a_connection_string() {
        let field = SettingsField::new("Connection", |s: &Db| &s.connection, |s: &mut Db| &mut s.connection);
        assert_eq!(detect(&field), ConnectionStringCheck::default());
    }

    #[test]
    fn test_annotated_property_carries_its_name() {
        let field = SettingsField::new("Connection", |s: &Db| &s.connection, |s: &mut Db| &mut s.connection)
            .connection_string("reporting");
        let check = detect(&field);
        assert!(check.is_connection_string);
        assert_eq!(check.name, Some("reporting"));
    }
}
