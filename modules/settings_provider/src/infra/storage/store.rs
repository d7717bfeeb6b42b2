//! XML file configuration store

use super::xml::{self, ParsedSection, XmlError};
use crate::domain::configuration::{
    ConfigSection, Configuration, SectionSource, CONNECTION_STRINGS_SECTION,
};
use crate::domain::repository::{ConfigurationStore, SectionDeclaration};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tempfile::NamedTempFile;

/// Configuration store failures
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed configuration document {}: {source}", path.display())]
    Xml {
        path: PathBuf,
        #[source]
        source: XmlError,
    },

    #[error("configuration section '{section}' delegates to missing file {}", path.display())]
    SectionSourceMissing { section: String, path: PathBuf },
}

/// Store over a root XML configuration file.
///
/// `configSource` references are resolved against `base_dir`.
pub struct XmlConfigurationStore {
    root_path: PathBuf,
    base_dir: PathBuf,
    /// Sections opened for editing
    managed: Vec<String>,
}

impl XmlConfigurationStore {
    /// Store managing `settings_section` and the connection strings section
    pub fn new(
        root_path: impl Into<PathBuf>,
        base_dir: Option<PathBuf>,
        settings_section: impl Into<String>,
    ) -> Self {
        let root_path = root_path.into();
        let base_dir = base_dir.unwrap_or_else(|| {
            root_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default()
        });
        Self {
            root_path,
            base_dir,
            managed: vec![settings_section.into(), CONNECTION_STRINGS_SECTION.to_string()],
        }
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    async fn read_optional(&self, path: &Path) -> Result<Option<String>, StoreError> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    async fn write(&self, path: &Path, contents: String) -> Result<(), StoreError> {
        let target = path.to_path_buf();
        tokio::task::spawn_blocking(move || replace_file(&target, contents.as_bytes()))
            .await
            .unwrap_or_else(|e| Err(std::io::Error::other(e)))
            .map_err(|source| StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
    }

    fn parse(&self, path: &Path, text: &str, sections: &[&str]) -> Result<HashMap<String, ParsedSection>, StoreError> {
        xml::parse_sections(text, sections).map_err(|source| StoreError::Xml {
            path: path.to_path_buf(),
            source,
        })
    }

    async fn declarations(&self, sections: &[&str]) -> Result<HashMap<String, ParsedSection>, StoreError> {
        match self.read_optional(&self.root_path).await? {
            Some(text) => self.parse(&self.root_path, &text, sections),
            None => Ok(HashMap::new()),
        }
    }

    /// Build a section from its declaration; `strict` rejects missing source files
    async fn load_section(
        &self,
        name: &str,
        declared: Option<ParsedSection>,
        strict: bool,
    ) -> Result<ConfigSection, StoreError> {
        let Some(declared) = declared else {
            return Ok(ConfigSection::new(name, SectionSource::Undeclared));
        };

        let (source, entries) = match declared.config_source {
            Some(relative) => {
                let path = self.base_dir.join(&relative);
                let entries = match self.read_optional(&path).await? {
                    Some(text) => self
                        .parse(&path, &text, &[name])?
                        .remove(name)
                        .map(|section| section.entries)
                        .unwrap_or_default(),
                    None if strict => {
                        return Err(StoreError::SectionSourceMissing {
                            section: name.to_string(),
                            path,
                        })
                    }
                    None => Vec::new(),
                };
                (SectionSource::External(PathBuf::from(relative)), entries)
            }
            None => (SectionSource::Inline, declared.entries),
        };

        let mut section = ConfigSection::new(name, source);
        for (key, value) in entries {
            section.set(&key, value);
        }
        section.mark_clean();
        Ok(section)
    }

    async fn save_sections(&self, configuration: &Configuration) -> Result<(), StoreError> {
        let mut inline = Vec::new();
        for section in configuration.dirty_sections() {
            match section.source() {
                SectionSource::External(relative) => {
                    let path = self.base_dir.join(relative);
                    let document = xml::section_document(section).map_err(|source| StoreError::Xml {
                        path: path.clone(),
                        source,
                    })?;
                    self.write(&path, document).await?;
                }
                SectionSource::Inline | SectionSource::Undeclared => inline.push(section),
            }
        }

        if inline.is_empty() {
            return Ok(());
        }
        let root = self.read_optional(&self.root_path).await?;
        let document = xml::rewrite_root(root.as_deref(), &inline).map_err(|source| StoreError::Xml {
            path: self.root_path.clone(),
            source,
        })?;
        self.write(&self.root_path, document).await
    }
}

/// Write `contents` to a temporary file beside `path`, then rename it over `path`
fn replace_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    if let Ok(metadata) = std::fs::metadata(path) {
        file.as_file().set_permissions(metadata.permissions())?;
    }
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl ConfigurationStore for XmlConfigurationStore {
    async fn read_section(&self, section: &str) -> Result<ConfigSection> {
        let mut declared = self.declarations(&[section]).await?;
        Ok(self.load_section(section, declared.remove(section), true).await?)
    }

    async fn open(&self) -> Result<Configuration> {
        let names: Vec<&str> = self.managed.iter().map(String::as_str).collect();
        let mut declared = self.declarations(&names).await?;

        let mut configuration = Configuration::new();
        for name in names {
            let section = self.load_section(name, declared.remove(name), false).await?;
            configuration.insert(section);
        }
        Ok(configuration)
    }

    async fn save(&self, configuration: &Configuration) -> Result<()> {
        self.save_sections(configuration).await?;
        tracing::debug!(path = %self.root_path.display(), "configuration saved");
        Ok(())
    }

    async fn section_declaration(&self, section: &str) -> Result<Option<SectionDeclaration>> {
        let declared = self.declarations(&[section]).await?;
        Ok(declared.get(section).map(|parsed| SectionDeclaration {
            section: section.to_string(),
            config_source: parsed.config_source.clone(),
            resolved_path: parsed
                .config_source
                .as_ref()
                .map(|relative| self.base_dir.join(relative)),
        }))
    }

    async fn create_section_stub(&self, section: &str, path: &Path) -> Result<()> {
        self.write(path, xml::section_stub(section)).await?;
        Ok(())
    }

    async fn last_modified(&self) -> Result<Option<SystemTime>> {
        match tokio::fs::metadata(&self.root_path).await {
            Ok(metadata) => Ok(Some(metadata.modified()?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                path: self.root_path.clone(),
                source,
            }
            .into()),
        }
    }
}
