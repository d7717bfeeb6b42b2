//! Native client implementation - wraps domain service for in-process calls

use crate::contract::{DatabaseSettings, ErasedSettings, SettingsApi, SettingsError};
use crate::domain::Service;
use async_trait::async_trait;
use std::sync::Arc;

/// Native client implementation that directly calls the domain service
#[derive(Clone)]
pub struct NativeClient {
    service: Arc<Service>,
}

impl NativeClient {
    pub fn new(service: Arc<Service>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl SettingsApi for NativeClient {
    async fn get_settings(&self, type_name: &str) -> Result<Box<dyn ErasedSettings>, SettingsError> {
        self.service.get_settings_by_name(type_name).await
    }

    async fn get_all_system_settings(&self) -> Result<Vec<Box<dyn ErasedSettings>>, SettingsError> {
        self.service.get_all_system_settings().await
    }

    async fn save_settings(&self, settings: &dyn ErasedSettings) -> Result<(), SettingsError> {
        self.service.save_any(settings).await
    }

    async fn initialize(&self, settings: &DatabaseSettings) -> Result<(), SettingsError> {
        self.service.initialize(settings).await
    }

    fn clear_cache(&self) {
        self.service.clear_cache();
    }
}
