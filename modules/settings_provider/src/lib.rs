//! Settings Provider Module
//!
//! Typed settings objects persisted as key/value entries in an XML
//! configuration file. Missing values are written back with their defaults on
//! first read, and saves notify typed listeners with the previous and new
//! values.

// Public exports
pub mod contract;
pub use contract::{
    client::SettingsApi, error::SettingsError, CurrentUser, DatabaseSettings, ErasedSettings,
    RequestContext, SettingValue, Settings, SettingsField, SettingsKind, SettingsSnapshot,
};

pub mod config;
pub use config::{BindingMode, Config, SectionCheckPolicy};

pub mod module;
pub use module::{SettingsProviderModule, SettingsProviderModuleBuilder};

pub mod domain;
pub use domain::{
    Binding, EventPublisher, RequestScope, SettingsBinder, SettingsBindings, SettingsCatalog,
    SettingsEvent, SettingsRegistration, SettingsSaved, SettingsSavedListener, SettingsType,
};

pub mod infra;
pub use infra::storage::XmlConfigurationStore;

#[doc(hidden)]
pub mod api;
