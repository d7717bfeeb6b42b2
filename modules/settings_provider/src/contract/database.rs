//! Built-in database settings

use super::model::{Settings, SettingsField, SettingsKind};
use crate::domain::registry::{SettingsRegistration, SettingsType};

/// Name of the connection string holding the database connection
pub const DATABASE_CONNECTION_STRING: &str = "cms";

/// Explicit key of the database provider setting
pub const DATABASE_PROVIDER_KEY: &str = "cms-database-provider";

/// Connection information written during installation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseSettings {
    pub connection_string: String,
    pub database_provider_type: String,
}

impl Settings for DatabaseSettings {
    const TYPE_NAME: &'static str = "settings_provider.contract.DatabaseSettings";
    const KIND: SettingsKind = SettingsKind::System;

    fn fields() -> Vec<SettingsField<Self>> {
        vec![
            SettingsField::new(
                "ConnectionString",
                |s: &Self| &s.connection_string,
                |s: &mut Self| &mut s.connection_string,
            )
            .connection_string(DATABASE_CONNECTION_STRING),
            SettingsField::new(
                "DatabaseProviderType",
                |s: &Self| &s.database_provider_type,
                |s: &mut Self| &mut s.database_provider_type,
            )
            .app_setting_name(DATABASE_PROVIDER_KEY),
        ]
    }
}

inventory::submit! {
    SettingsRegistration::new(SettingsType::of::<DatabaseSettings>)
}
