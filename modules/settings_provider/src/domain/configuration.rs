//! In-memory view of the managed configuration sections

use super::key_resolver::normalize_key;
use indexmap::IndexMap;
use std::path::PathBuf;

/// Name of the built-in connection strings section
pub const CONNECTION_STRINGS_SECTION: &str = "connectionStrings";

/// Entry layout of a section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    /// `<add key=".." value=".."/>`
    AppSettings,
    /// `<add name=".." connectionString=".."/>`
    ConnectionStrings,
}

impl SectionKind {
    pub fn for_section(name: &str) -> Self {
        if name == CONNECTION_STRINGS_SECTION {
            Self::ConnectionStrings
        } else {
            Self::AppSettings
        }
    }

    /// Attribute names of the key and the value of an `<add>` element
    pub fn attributes(&self) -> (&'static str, &'static str) {
        match self {
            Self::AppSettings => ("key", "value"),
            Self::ConnectionStrings => ("name", "connectionString"),
        }
    }
}

/// Where a section's entries live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionSource {
    /// Entries are children of the section element in the root file
    Inline,
    /// Section element delegates to a `configSource` file (relative path)
    External(PathBuf),
    /// The root file has no element for this section
    Undeclared,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    key: String,
    value: String,
}

/// One named section with case-insensitive entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSection {
    name: String,
    kind: SectionKind,
    source: SectionSource,
    entries: IndexMap<String, Entry>,
    dirty: bool,
}

impl ConfigSection {
    pub fn new(name: impl Into<String>, source: SectionSource) -> Self {
        let name = name.into();
        Self {
            kind: SectionKind::for_section(&name),
            name,
            source,
            entries: IndexMap::new(),
            dirty: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SectionKind {
        self.kind
    }

    pub fn source(&self) -> &SectionSource {
        &self.source
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&normalize_key(key))
            .map(|entry| entry.value.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(&normalize_key(key))
    }

    /// Replace any entry with the same key; the new entry goes last
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let normalized = normalize_key(key);
        self.entries.shift_remove(&normalized);
        self.entries.insert(
            normalized,
            Entry {
                key: key.trim().to_string(),
                value: value.into(),
            },
        );
        self.dirty = true;
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let removed = self.entries.shift_remove(&normalize_key(key));
        if removed.is_some() {
            self.dirty = true;
        }
        removed.map(|entry| entry.value)
    }

    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            self.dirty = true;
        }
        self.entries.clear();
    }

    /// Entries as written (original key spelling), in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .map(|entry| (entry.key.as_str(), entry.value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mark as loaded from storage
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
}

/// Editable configuration opened from a store; flushed with one save
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Configuration {
    sections: IndexMap<String, ConfigSection>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, section: ConfigSection) {
        self.sections.insert(section.name().to_string(), section);
    }

    pub fn section(&self, name: &str) -> Option<&ConfigSection> {
        self.sections.get(name)
    }

    /// Section by name, created as undeclared if missing
    pub fn section_mut(&mut self, name: &str) -> &mut ConfigSection {
        self.sections
            .entry(name.to_string())
            .or_insert_with(|| ConfigSection::new(name, SectionSource::Undeclared))
    }

    pub fn sections(&self) -> impl Iterator<Item = &ConfigSection> {
        self.sections.values()
    }

    pub fn dirty_sections(&self) -> impl Iterator<Item = &ConfigSection> {
        self.sections.values().filter(|section| section.is_dirty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_case_insensitive_and_trimmed() {
        let mut section = ConfigSection::new("cmsSettings", SectionSource::Inline);
        section.set(" Site.Name ", "Docs");

        assert_eq!(section.get("site.name"), Some("Docs"));
        assert_eq!(section.get("SITE.NAME  "), Some("Docs"));
        assert!(section.is_dirty());
        assert_eq!(section.iter().collect::<Vec<_>>(), vec![("Site.Name", "Docs")]);
    }

    #[test]
    fn test_set_replaces_and_moves_entry_last() {
        let mut section = ConfigSection::new("cmsSettings", SectionSource::Inline);
        section.set("a", "1");
        section.set("b", "2");
        section.set("A", "3");

        let keys: Vec<_> = section.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "A"]);
        assert_eq!(section.get("a"), Some("3"));
    }

    #[test]
    fn test_section_kind_follows_name() {
        assert_eq!(
            ConfigSection::new(CONNECTION_STRINGS_SECTION, SectionSource::Undeclared).kind(),
            SectionKind::ConnectionStrings
        );
        assert_eq!(
            ConfigSection::new("cmsSettings", SectionSource::Undeclared).kind(),
            SectionKind::AppSettings
        );
    }

    #[test]
    fn test_section_mut_creates_undeclared_section() {
        let mut config = Configuration::new();
        config.section_mut("cmsSettings").set("k", "v");

        let section = config.section("cmsSettings").unwrap();
        assert_eq!(section.source(), &SectionSource::Undeclared);
        assert_eq!(config.dirty_sections().count(), 1);
    }
}
