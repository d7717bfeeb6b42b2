//! Native client trait for in-process callers
//!
//! Works on erased settings so it can be used as a trait object; typed access
//! goes through [`crate::domain::Service`] or a request scope.

use super::{
    database::DatabaseSettings,
    error::SettingsError,
    model::ErasedSettings,
};
use async_trait::async_trait;

/// Settings provider API for inter-module communication
#[async_trait]
pub trait SettingsApi: Send + Sync {
    /// Read the system settings registered under `type_name`
    async fn get_settings(&self, type_name: &str) -> Result<Box<dyn ErasedSettings>, SettingsError>;

    /// Read every registered system settings type
    async fn get_all_system_settings(&self) -> Result<Vec<Box<dyn ErasedSettings>>, SettingsError>;

    /// Persist a settings instance of any registered system type
    async fn save_settings(&self, settings: &dyn ErasedSettings) -> Result<(), SettingsError>;

    /// Write the database settings during installation
    async fn initialize(&self, settings: &DatabaseSettings) -> Result<(), SettingsError>;

    /// Forget which configuration sections were already verified
    fn clear_cache(&self);
}
