//! Domain service - settings provider orchestration

use super::configuration::{ConfigSection, Configuration, CONNECTION_STRINGS_SECTION};
use super::connection_string;
use super::events::{EventBus, SettingsSaved};
use super::key_resolver::{normalize_key, resolve_key};
use super::registry::{SettingsCatalog, SettingsType};
use super::repository::ConfigurationStore;
use super::sections::SectionEnsurer;
use crate::contract::{DatabaseSettings, ErasedSettings, Settings, SettingsError, SettingsField, SettingsKind};
use std::sync::Arc;
use tracing::Instrument;

/// Reads and writes typed settings against a configuration store
pub struct Service {
    store: Arc<dyn ConfigurationStore>,
    sections: Arc<SectionEnsurer>,
    events: Arc<EventBus>,
    catalog: Arc<SettingsCatalog>,
    /// Name of the app settings section
    settings_section: String,
    /// Held across every open..save of the store
    edits: tokio::sync::Mutex<()>,
}

/// Runtime views loaded on first use during one read
#[derive(Default)]
struct StoredSections {
    app_settings: Option<ConfigSection>,
    connection_strings: Option<ConfigSection>,
}

impl Service {
    pub fn new(
        store: Arc<dyn ConfigurationStore>,
        sections: Arc<SectionEnsurer>,
        events: Arc<EventBus>,
        catalog: Arc<SettingsCatalog>,
        settings_section: impl Into<String>,
    ) -> Self {
        Self {
            store,
            sections,
            events,
            catalog,
            settings_section: settings_section.into(),
            edits: tokio::sync::Mutex::new(()),
        }
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn catalog(&self) -> &Arc<SettingsCatalog> {
        &self.catalog
    }

    pub fn settings_section(&self) -> &str {
        &self.settings_section
    }

    // ===== Read path =====

    /// Hydrate `T` from the store.
    ///
    /// Properties without a stored value keep their default, and those defaults
    /// are written back with a single save before returning.
    pub async fn get_system_settings<T: Settings>(&self) -> Result<T, SettingsError> {
        let span = tracing::debug_span!("get_system_settings", settings_type = T::TYPE_NAME);
        async move {
            let mut settings = T::default();
            let fields = T::fields();
            let mut stored = StoredSections::default();
            let mut missing = Vec::new();

            for field in fields.iter().filter(|f| f.is_read_write()) {
                match self.stored_value::<T>(&mut stored, field).await? {
                    Some((key, raw)) => field
                        .assign(&mut settings, &raw)
                        .map_err(|e| SettingsError::conversion(key, e))?,
                    None => missing.push((field, field.read(&settings))),
                }
            }

            if !missing.is_empty() {
                self.sections
                    .ensure_exists(self.store.as_ref(), &self.settings_section)
                    .await?;
                if missing
                    .iter()
                    .any(|(field, _)| field.connection_string_name().is_some())
                {
                    self.sections
                        .ensure_exists(self.store.as_ref(), CONNECTION_STRINGS_SECTION)
                        .await?;
                }

                let edit = self.edits.lock().await;
                let mut config = self.store.open().await?;
                for (field, value) in &missing {
                    self.set_setting::<T>(&mut config, field, value.as_deref().unwrap_or_default())?;
                }
                self.store.save(&config).await?;
                drop(edit);
                tracing::info!(
                    settings_type = T::TYPE_NAME,
                    count = missing.len(),
                    "persisted default values for missing settings"
                );
            }

            Ok(settings)
        }
        .instrument(span)
        .await
    }

    /// Every system settings type in the catalog, read in catalog order
    pub async fn get_all_system_settings(&self) -> Result<Vec<Box<dyn ErasedSettings>>, SettingsError> {
        let mut all = Vec::new();
        for ty in self.catalog.of_kind(SettingsKind::System) {
            all.push(ty.handler().load(self).await?);
        }
        Ok(all)
    }

    /// Read the system settings type registered under `type_name`
    pub async fn get_settings_by_name(
        &self,
        type_name: &str,
    ) -> Result<Box<dyn ErasedSettings>, SettingsError> {
        let ty = self.system_type(type_name)?;
        ty.handler().load(self).await
    }

    // ===== Write path =====

    /// Persist every read/write property of `settings` and notify listeners
    pub async fn save_settings<T: Settings>(&self, settings: &T) -> Result<(), SettingsError> {
        let span = tracing::debug_span!("save_settings", settings_type = T::TYPE_NAME);
        async move {
            let previous = self.get_system_settings::<T>().await?;

            let edit = self.edits.lock().await;
            let mut config = self.store.open().await?;
            self.write_all(&mut config, settings)?;
            self.store.save(&config).await?;
            drop(edit);
            tracing::debug!(settings_type = T::TYPE_NAME, "settings saved");

            self.events
                .publish(SettingsSaved::new(previous, settings.clone()))
                .await;
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Save an erased instance by dispatching on its type tag
    pub async fn save_any(&self, settings: &dyn ErasedSettings) -> Result<(), SettingsError> {
        let ty = self.system_type(settings.type_name())?;
        ty.handler().save(self, settings).await
    }

    /// Write the installation database settings.
    ///
    /// Both sections are ensured first; no save notification is published.
    pub async fn initialize(&self, settings: &DatabaseSettings) -> Result<(), SettingsError> {
        let span = tracing::info_span!("initialize_database_settings");
        async move {
            self.sections
                .ensure_exists(self.store.as_ref(), CONNECTION_STRINGS_SECTION)
                .await?;
            self.sections
                .ensure_exists(self.store.as_ref(), &self.settings_section)
                .await?;

            let edit = self.edits.lock().await;
            let mut config = self.store.open().await?;
            self.write_all(&mut config, settings)?;
            self.store.save(&config).await?;
            drop(edit);
            tracing::info!("database settings initialized");
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Forget which sections were verified so the next access re-checks them
    pub fn clear_cache(&self) {
        self.sections.reset();
    }

    // ===== Helper Methods =====

    fn system_type(&self, type_name: &str) -> Result<&SettingsType, SettingsError> {
        self.catalog
            .get(type_name)
            .filter(|ty| ty.kind() == SettingsKind::System)
            .ok_or_else(|| SettingsError::UnknownType {
                type_name: type_name.to_string(),
            })
    }

    fn write_all<T: Settings>(&self, config: &mut Configuration, settings: &T) -> Result<(), SettingsError> {
        for field in T::fields().iter().filter(|f| f.is_read_write()) {
            let value = field.read(settings).unwrap_or_default();
            self.set_setting::<T>(config, field, &value)?;
        }
        Ok(())
    }

    /// Stored raw value of `field` with the key it was found under
    async fn stored_value<T: Settings>(
        &self,
        stored: &mut StoredSections,
        field: &SettingsField<T>,
    ) -> Result<Option<(String, String)>, SettingsError> {
        let check = connection_string::detect(field);
        if let (true, Some(name)) = (check.is_connection_string, check.name) {
            if stored.connection_strings.is_none() {
                stored.connection_strings = Some(self.runtime_section(CONNECTION_STRINGS_SECTION).await?);
            }
            let value = stored
                .connection_strings
                .as_ref()
                .and_then(|section| section.get(name))
                .map(|raw| (name.to_string(), raw.to_string()));
            return Ok(value);
        }

        let key = resolve_key(T::TYPE_NAME, field);
        if key.trim().is_empty() {
            return Ok(None);
        }
        let key = normalize_key(&key);
        if stored.app_settings.is_none() {
            let section = self.runtime_section(&self.settings_section).await?;
            stored.app_settings = Some(section);
        }
        Ok(stored
            .app_settings
            .as_ref()
            .and_then(|section| section.get(&key))
            .map(|raw| (key.clone(), raw.to_string())))
    }

    /// Runtime view of `section`; on failure the section is ensured and the
    /// lookup is retried once
    async fn runtime_section(&self, section: &str) -> Result<ConfigSection, SettingsError> {
        match self.store.read_section(section).await {
            Ok(found) => Ok(found),
            Err(e) => {
                tracing::debug!(section, error = %e, "section lookup failed, ensuring it exists");
                self.sections.ensure_exists(self.store.as_ref(), section).await?;
                Ok(self.store.read_section(section).await?)
            }
        }
    }

    fn set_setting<T: Settings>(
        &self,
        config: &mut Configuration,
        field: &SettingsField<T>,
        value: &str,
    ) -> Result<(), SettingsError> {
        let check = connection_string::detect(field);
        if let (true, Some(name)) = (check.is_connection_string, check.name) {
            if name.trim().is_empty() {
                return Err(SettingsError::EmptyKey {
                    settings_type: T::TYPE_NAME,
                    field: field.name(),
                });
            }
            config.section_mut(CONNECTION_STRINGS_SECTION).set(name, value);
            return Ok(());
        }

        let key = resolve_key(T::TYPE_NAME, field);
        if key.trim().is_empty() {
            return Err(SettingsError::EmptyKey {
                settings_type: T::TYPE_NAME,
                field: field.name(),
            });
        }
        config
            .section_mut(&self.settings_section)
            .set(&normalize_key(&key), value);
        Ok(())
    }
}
