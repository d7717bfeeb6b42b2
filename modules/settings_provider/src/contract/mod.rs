//! Contract layer - public API for inter-module communication
//!
//! Settings types, their field tables, errors and the native client trait.

pub mod client;
pub mod context;
pub mod database;
pub mod error;
pub mod model;

pub use client::SettingsApi;
pub use context::{CurrentUser, RequestContext};
pub use database::DatabaseSettings;
pub use error::SettingsError;
pub use model::{
    ConversionError, ErasedSettings, SettingValue, Settings, SettingsField, SettingsKind,
    SettingsSnapshot,
};
