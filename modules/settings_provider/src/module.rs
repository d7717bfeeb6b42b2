//! Module assembly and lifecycle

use crate::api::native::NativeClient;
use crate::config::Config;
use crate::contract::{RequestContext, SettingsApi};
use crate::domain::culture::{CurrentUserCulture, DefaultUserCultureResolver, UserCultureResolver};
use crate::domain::{
    ConfigurationStore, EventBus, EventPublisher, RequestScope, SectionEnsurer, Service,
    SettingsBinder, SettingsBindings, SettingsCatalog, SystemSettingsBinder,
};
use crate::infra::storage::XmlConfigurationStore;
use anyhow::Result;
use std::sync::Arc;

/// Settings provider module
pub struct SettingsProviderModule {
    config: Config,
    service: Arc<Service>,
    client: Arc<NativeClient>,
    bindings: Arc<SettingsBindings>,
    culture: CurrentUserCulture,
}

impl SettingsProviderModule {
    /// Module over the XML file named by `config`, with every registered
    /// settings type bound by convention
    pub fn init(config: Config, site_binder: Option<Arc<dyn SettingsBinder>>) -> Result<Self> {
        let mut builder = Self::builder(config);
        if let Some(binder) = site_binder {
            builder = builder.site_binder(binder);
        }
        builder.build()
    }

    pub fn builder(config: Config) -> SettingsProviderModuleBuilder {
        SettingsProviderModuleBuilder {
            config,
            store: None,
            catalog: None,
            bindings: None,
            site_binder: None,
            culture_resolver: None,
            publishers: Vec::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn service(&self) -> &Arc<Service> {
        &self.service
    }

    /// Client for in-process callers
    pub fn client(&self) -> Arc<dyn SettingsApi> {
        self.client.clone()
    }

    pub fn bindings(&self) -> &Arc<SettingsBindings> {
        &self.bindings
    }

    pub fn culture(&self) -> &CurrentUserCulture {
        &self.culture
    }

    /// Scope resolving bound settings for one request
    pub fn begin_request(&self, ctx: RequestContext) -> RequestScope {
        self.bindings.begin_request(ctx)
    }
}

/// Overrides for the parts [`SettingsProviderModule::init`] builds itself
pub struct SettingsProviderModuleBuilder {
    config: Config,
    store: Option<Arc<dyn ConfigurationStore>>,
    catalog: Option<SettingsCatalog>,
    bindings: Option<Arc<SettingsBindings>>,
    site_binder: Option<Arc<dyn SettingsBinder>>,
    culture_resolver: Option<Arc<dyn UserCultureResolver>>,
    publishers: Vec<Arc<dyn EventPublisher>>,
}

impl SettingsProviderModuleBuilder {
    pub fn store(mut self, store: Arc<dyn ConfigurationStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replace the link-time discovered catalog
    pub fn catalog(mut self, catalog: SettingsCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Bindings registered before conventions are applied; they are kept
    pub fn bindings(mut self, bindings: Arc<SettingsBindings>) -> Self {
        self.bindings = Some(bindings);
        self
    }

    pub fn site_binder(mut self, binder: Arc<dyn SettingsBinder>) -> Self {
        self.site_binder = Some(binder);
        self
    }

    pub fn culture_resolver(mut self, resolver: Arc<dyn UserCultureResolver>) -> Self {
        self.culture_resolver = Some(resolver);
        self
    }

    pub fn publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publishers.push(publisher);
        self
    }

    pub fn build(self) -> Result<SettingsProviderModule> {
        let config = self.config;

        // Build store
        let store = self.store.unwrap_or_else(|| {
            Arc::new(XmlConfigurationStore::new(
                config.config_path.clone(),
                config.base_dir.clone(),
                config.settings_section.clone(),
            ))
        });

        let events = Arc::new(EventBus::new());
        for publisher in self.publishers {
            events.add_publisher(publisher);
        }

        // Build domain service
        let catalog = Arc::new(self.catalog.unwrap_or_else(SettingsCatalog::discover));
        let service = Arc::new(Service::new(
            store,
            Arc::new(SectionEnsurer::new(config.section_check)),
            events,
            catalog.clone(),
            config.settings_section.clone(),
        ));

        let bindings = self.bindings.unwrap_or_default();
        let system_binder = Arc::new(SystemSettingsBinder::new(service.clone()));
        bindings.bind_conventions(&catalog, config.binding_mode, system_binder, self.site_binder)?;

        let resolver = self
            .culture_resolver
            .unwrap_or_else(|| Arc::new(DefaultUserCultureResolver::new(config.default_ui_culture.clone())));

        let client = Arc::new(NativeClient::new(service.clone()));

        tracing::info!(
            config_path = %config.config_path.display(),
            settings_types = catalog.len(),
            "Settings provider initialized with native client"
        );
        Ok(SettingsProviderModule {
            config,
            service,
            client,
            bindings,
            culture: CurrentUserCulture::new(resolver),
        })
    }
}
