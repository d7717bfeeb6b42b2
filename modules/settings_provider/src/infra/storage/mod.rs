//! Storage layer - XML configuration files

pub mod store;
pub mod xml;

pub use store::{StoreError, XmlConfigurationStore};
