//! Common test utilities: settings types, configuration fixtures and a
//! counting store

#![allow(dead_code)]

use async_trait::async_trait;
use settings_provider::config::Config;
use settings_provider::domain::{
    Configuration, ConfigSection, ConfigurationStore, SectionDeclaration, SectionEnsurer, Service,
    SettingsCatalog, SettingsType,
};
use settings_provider::domain::events::EventBus;
use settings_provider::{Settings, SettingsField, SettingsKind, XmlConfigurationStore};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tempfile::TempDir;

pub const SETTINGS_SECTION: &str = "cmsSettings";

/// General site-wide settings with derived keys
#[derive(Debug, Clone, PartialEq)]
pub struct GeneralSettings {
    pub site_title: String,
    pub page_size: i32,
    pub comments_enabled: bool,
    pub footer_note: Option<String>,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            site_title: "My Site".to_string(),
            page_size: 20,
            comments_enabled: true,
            footer_note: None,
        }
    }
}

impl Settings for GeneralSettings {
    const TYPE_NAME: &'static str = "tests.GeneralSettings";
    const KIND: SettingsKind = SettingsKind::System;

    fn fields() -> Vec<SettingsField<Self>> {
        vec![
            SettingsField::new("SiteTitle", |s: &Self| &s.site_title, |s: &mut Self| &mut s.site_title),
            SettingsField::new("PageSize", |s: &Self| &s.page_size, |s: &mut Self| &mut s.page_size),
            SettingsField::new(
                "CommentsEnabled",
                |s: &Self| &s.comments_enabled,
                |s: &mut Self| &mut s.comments_enabled,
            ),
            SettingsField::new("FooterNote", |s: &Self| &s.footer_note, |s: &mut Self| &mut s.footer_note),
        ]
    }
}

/// Mail settings with an explicit key, a connection string and skipped fields
#[derive(Debug, Clone, PartialEq)]
pub struct MailSettings {
    pub smtp_host: String,
    pub port: u16,
    pub queue_connection: String,
    pub computed_banner: String,
    pub secret_sink: String,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            smtp_host: "localhost".to_string(),
            port: 25,
            queue_connection: "Data Source=mail.db".to_string(),
            computed_banner: "banner".to_string(),
            secret_sink: String::new(),
        }
    }
}

impl Settings for MailSettings {
    const TYPE_NAME: &'static str = "tests.MailSettings";
    const KIND: SettingsKind = SettingsKind::System;

    fn fields() -> Vec<SettingsField<Self>> {
        vec![
            SettingsField::new("SmtpHost", |s: &Self| &s.smtp_host, |s: &mut Self| &mut s.smtp_host)
                .app_setting_name("Mail-SMTP-Host"),
            SettingsField::new("Port", |s: &Self| &s.port, |s: &mut Self| &mut s.port),
            SettingsField::new(
                "QueueConnection",
                |s: &Self| &s.queue_connection,
                |s: &mut Self| &mut s.queue_connection,
            )
            .connection_string("mailQueue"),
            SettingsField::read_only("ComputedBanner", |s: &Self| &s.computed_banner),
            SettingsField::write_only("SecretSink", |s: &mut Self| &mut s.secret_sink),
        ]
    }
}

/// Per-site theme settings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThemeSettings {
    pub theme: String,
}

impl Settings for ThemeSettings {
    const TYPE_NAME: &'static str = "tests.ThemeSettings";
    const KIND: SettingsKind = SettingsKind::Site;

    fn fields() -> Vec<SettingsField<Self>> {
        vec![SettingsField::new("Theme", |s: &Self| &s.theme, |s: &mut Self| &mut s.theme)]
    }
}

/// Settings whose only property resolves to a blank key
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlankKeySettings {
    pub value: String,
}

impl Settings for BlankKeySettings {
    const TYPE_NAME: &'static str = "tests.BlankKeySettings";
    const KIND: SettingsKind = SettingsKind::System;

    fn fields() -> Vec<SettingsField<Self>> {
        vec![SettingsField::new("Value", |s: &Self| &s.value, |s: &mut Self| &mut s.value).app_setting_name("  ")]
    }
}

/// Catalog of the test settings types
pub fn test_catalog() -> SettingsCatalog {
    SettingsCatalog::from_types(vec![
        SettingsType::of::<GeneralSettings>(),
        SettingsType::of::<MailSettings>(),
        SettingsType::of::<ThemeSettings>(),
    ])
}

/// Temporary directory holding a root configuration file
pub struct ConfigFixture {
    pub dir: TempDir,
}

impl ConfigFixture {
    /// No root file on disk yet
    pub fn empty() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn with_root(contents: &str) -> Self {
        let fixture = Self::empty();
        fixture.write_root(contents);
        fixture
    }

    pub fn root_path(&self) -> PathBuf {
        self.dir.path().join("web.config")
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn write_root(&self, contents: &str) {
        std::fs::write(self.root_path(), contents).unwrap();
    }

    pub fn read_root(&self) -> String {
        std::fs::read_to_string(self.root_path()).unwrap()
    }

    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.path(relative)).unwrap()
    }

    pub fn config(&self) -> Config {
        Config {
            config_path: self.root_path(),
            ..Config::default()
        }
    }

    pub fn xml_store(&self) -> XmlConfigurationStore {
        XmlConfigurationStore::new(self.root_path(), None, SETTINGS_SECTION)
    }

    pub fn counting_store(&self) -> Arc<CountingStore> {
        Arc::new(CountingStore::new(self.xml_store()))
    }

    /// Service over a counting store with the test catalog
    pub fn service(&self) -> (Arc<Service>, Arc<CountingStore>) {
        let store = self.counting_store();
        let service = Service::new(
            store.clone(),
            Arc::new(SectionEnsurer::default()),
            Arc::new(EventBus::new()),
            Arc::new(test_catalog()),
            SETTINGS_SECTION,
        );
        (Arc::new(service), store)
    }

    /// Section as the runtime sees it
    pub async fn section(&self, name: &str) -> ConfigSection {
        self.xml_store().read_section(name).await.unwrap()
    }
}

/// Store wrapper counting calls to the inner XML store
pub struct CountingStore {
    inner: XmlConfigurationStore,
    pub saves: AtomicUsize,
    pub opens: AtomicUsize,
    pub declarations: AtomicUsize,
    pub stubs: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: XmlConfigurationStore) -> Self {
        Self {
            inner,
            saves: AtomicUsize::new(0),
            opens: AtomicUsize::new(0),
            declarations: AtomicUsize::new(0),
            stubs: AtomicUsize::new(0),
        }
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn declarations(&self) -> usize {
        self.declarations.load(Ordering::SeqCst)
    }

    pub fn stubs(&self) -> usize {
        self.stubs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfigurationStore for CountingStore {
    async fn read_section(&self, section: &str) -> anyhow::Result<ConfigSection> {
        self.inner.read_section(section).await
    }

    async fn open(&self) -> anyhow::Result<Configuration> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.inner.open().await
    }

    async fn save(&self, configuration: &Configuration) -> anyhow::Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(configuration).await
    }

    async fn section_declaration(&self, section: &str) -> anyhow::Result<Option<SectionDeclaration>> {
        self.declarations.fetch_add(1, Ordering::SeqCst);
        self.inner.section_declaration(section).await
    }

    async fn create_section_stub(&self, section: &str, path: &Path) -> anyhow::Result<()> {
        self.stubs.fetch_add(1, Ordering::SeqCst);
        self.inner.create_section_stub(section, path).await
    }

    async fn last_modified(&self) -> anyhow::Result<Option<SystemTime>> {
        self.inner.last_modified().await
    }
}

/// Route provider logs to the test output
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("settings_provider=debug")
        .try_init();
}
