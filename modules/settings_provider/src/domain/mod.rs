//! Domain layer - business logic and services

pub mod binder;
pub mod configuration;
pub mod connection_string;
pub mod culture;
pub mod events;
pub mod key_resolver;
pub mod registry;
pub mod repository;
pub mod sections;
pub mod service;

pub use binder::{Binding, RequestScope, SettingsBinder, SettingsBindings, SystemSettingsBinder};
pub use configuration::{ConfigSection, Configuration, SectionKind, SectionSource, CONNECTION_STRINGS_SECTION};
pub use events::{EventBus, EventPublisher, NoOpEventPublisher, SettingsEvent, SettingsSaved, SettingsSavedListener};
pub use registry::{SettingsCatalog, SettingsRegistration, SettingsType};
pub use repository::{ConfigurationStore, SectionDeclaration};
pub use sections::SectionEnsurer;
pub use service::Service;
