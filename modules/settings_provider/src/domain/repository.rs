//! Configuration store trait
//!
//! Defines the data access interface of the provider.
//! The XML file implementation lives in infra/storage.

use super::configuration::{ConfigSection, Configuration};
use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Section element found in the root configuration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionDeclaration {
    pub section: String,
    /// `configSource` reference, if any
    pub config_source: Option<String>,
    /// `config_source` resolved against the application directory
    pub resolved_path: Option<PathBuf>,
}

/// Backing configuration file with its settings and connection string sections
#[async_trait]
pub trait ConfigurationStore: Send + Sync {
    /// Read one section the way the running application sees it.
    ///
    /// Fails when the section delegates to an external file that is missing.
    async fn read_section(&self, section: &str) -> Result<ConfigSection>;

    /// Open the managed sections for editing; missing external files read as empty
    async fn open(&self) -> Result<Configuration>;

    /// Flush every dirty section of `configuration`
    async fn save(&self, configuration: &Configuration) -> Result<()>;

    /// Parse the root file and locate the declaration of `section`
    async fn section_declaration(&self, section: &str) -> Result<Option<SectionDeclaration>>;

    /// Write an empty section document at `path`
    async fn create_section_stub(&self, section: &str, path: &Path) -> Result<()>;

    /// Modification time of the root file, `None` if it does not exist
    async fn last_modified(&self) -> Result<Option<SystemTime>>;
}
