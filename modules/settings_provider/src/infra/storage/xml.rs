//! XML reading and writing of configuration sections

use crate::domain::configuration::{ConfigSection, SectionKind};
use indexmap::IndexMap;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashMap;

pub const CONFIG_SOURCE_ATTRIBUTE: &str = "configSource";
const ROOT_ELEMENT: &str = "configuration";
const ADD: &str = "add";
const REMOVE: &str = "remove";
const CLEAR: &str = "clear";
const INDENT: &str = "  ";

#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    #[error(transparent)]
    Xml(#[from] quick_xml::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<quick_xml::events::attributes::AttrError> for XmlError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        Self::Xml(e.into())
    }
}

/// First element found for a section name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSection {
    /// Non-blank `configSource` attribute
    pub config_source: Option<String>,
    /// `(key, value)` pairs after applying add/remove/clear, in order
    pub entries: Vec<(String, String)>,
}

struct Collecting {
    name: String,
    depth: usize,
    entries: IndexMap<String, (String, String)>,
}

/// Locate the first element for each of `sections` (at any depth) and read its
/// direct `<add>`/`<remove>`/`<clear>` children.
pub fn parse_sections(xml: &str, sections: &[&str]) -> Result<HashMap<String, ParsedSection>, XmlError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut found: HashMap<String, ParsedSection> = HashMap::new();
    let mut collecting: Option<Collecting> = None;
    let mut depth = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if let Some(current) = collecting.as_mut() {
                    if depth == current.depth {
                        apply_child(current, &e)?;
                    }
                } else if let Some(name) = wanted(&e, sections, &found) {
                    found.insert(name.clone(), section_header(&e)?);
                    collecting = Some(Collecting {
                        name,
                        depth: depth + 1,
                        entries: IndexMap::new(),
                    });
                }
                depth += 1;
            }
            Event::Empty(e) => {
                if let Some(current) = collecting.as_mut() {
                    if depth == current.depth {
                        apply_child(current, &e)?;
                    }
                } else if let Some(name) = wanted(&e, sections, &found) {
                    found.insert(name, section_header(&e)?);
                }
            }
            Event::End(_) => {
                if collecting.as_ref().is_some_and(|c| c.depth == depth) {
                    if let Some(done) = collecting.take() {
                        if let Some(section) = found.get_mut(&done.name) {
                            section.entries = done.entries.into_values().collect();
                        }
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(found)
}

/// Root document with the content of `sections` written in place.
///
/// Everything outside the entries of the rewritten sections is copied as read.
/// Sections missing from the document are appended to the root element; when
/// there is no root element a `<configuration>` document is created.
pub fn rewrite_root(xml: Option<&str>, sections: &[&ConfigSection]) -> Result<String, XmlError> {
    let mut writer = Writer::new(Vec::new());
    let mut pending: Vec<&ConfigSection> = sections.to_vec();
    let mut saw_root = false;

    if let Some(xml) = xml {
        let mut reader = Reader::from_str(xml);
        let mut depth = 0usize;
        let mut replacing: Option<Replacing<'_, '_>> = None;
        // output currently ends with a newline
        let mut at_line_start = true;

        loop {
            let event = reader.read_event()?;
            if matches!(event, Event::Eof) {
                break;
            }

            if let Some(current) = replacing.as_mut() {
                if current.feed(event) {
                    if let Some(done) = replacing.take() {
                        write_section_body(&mut writer, done.section, done.kept, done.level)?;
                        writer.write_event(Event::End(BytesEnd::new(done.section.name())))?;
                    }
                    depth = depth.saturating_sub(1);
                    at_line_start = false;
                }
                continue;
            }

            match event {
                Event::Start(e) => {
                    depth += 1;
                    saw_root = true;
                    let section = take_pending(&mut pending, &e);
                    writer.write_event(Event::Start(e))?;
                    if let Some(section) = section {
                        replacing = Some(Replacing::new(section, depth));
                    }
                    at_line_start = false;
                }
                Event::Empty(e) => {
                    saw_root = true;
                    if let Some(section) = take_pending(&mut pending, &e) {
                        writer.write_event(Event::Start(e.borrow()))?;
                        write_section_body(&mut writer, section, Vec::new(), depth + 1)?;
                        writer.write_event(Event::End(e.to_end().into_owned()))?;
                    } else if depth == 0 && !pending.is_empty() {
                        writer.write_event(Event::Start(e.borrow()))?;
                        append_sections(&mut writer, &mut pending, false)?;
                        writer.write_event(Event::End(e.to_end().into_owned()))?;
                    } else {
                        writer.write_event(Event::Empty(e))?;
                    }
                    at_line_start = false;
                }
                Event::End(e) => {
                    if depth == 1 {
                        append_sections(&mut writer, &mut pending, at_line_start)?;
                    }
                    writer.write_event(Event::End(e))?;
                    depth = depth.saturating_sub(1);
                    at_line_start = false;
                }
                Event::Text(text) => {
                    at_line_start = text.ends_with(b"\n");
                    writer.write_event(Event::Text(text))?;
                }
                other => {
                    writer.write_event(other)?;
                    at_line_start = false;
                }
            }
        }
    }

    if !saw_root {
        if xml.is_none() {
            writer.write_event(Event::Decl(BytesDecl::new("1.0", None, None)))?;
            write_text(&mut writer, "\n")?;
        }
        writer.write_event(Event::Start(BytesStart::new(ROOT_ELEMENT)))?;
        append_sections(&mut writer, &mut pending, false)?;
        writer.write_event(Event::End(BytesEnd::new(ROOT_ELEMENT)))?;
    }

    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

/// Old content of a section element that is being rewritten
struct Replacing<'x, 's> {
    section: &'s ConfigSection,
    /// Nesting level of the section element; the root element is 1
    level: usize,
    /// Depth below the section element, 0 for its direct children
    nested: usize,
    /// Inside a direct child that is kept
    keeping: bool,
    /// Direct children other than entries, each with its subtree
    kept: Vec<Vec<Event<'x>>>,
}

impl<'x, 's> Replacing<'x, 's> {
    fn new(section: &'s ConfigSection, level: usize) -> Self {
        Self {
            section,
            level,
            nested: 0,
            keeping: false,
            kept: Vec::new(),
        }
    }

    /// Take one event from inside the section; `true` at its end tag
    fn feed(&mut self, event: Event<'x>) -> bool {
        match event {
            Event::Start(e) => {
                if self.nested == 0 {
                    self.keeping = !is_entry(&e);
                    if self.keeping {
                        self.kept.push(Vec::new());
                    }
                }
                self.nested += 1;
                self.keep(Event::Start(e));
            }
            Event::End(e) => {
                if self.nested == 0 {
                    return true;
                }
                self.nested -= 1;
                self.keep(Event::End(e));
                if self.nested == 0 {
                    self.keeping = false;
                }
            }
            Event::Empty(e) if self.nested == 0 => {
                if !is_entry(&e) {
                    self.kept.push(vec![Event::Empty(e)]);
                }
            }
            child @ (Event::Comment(_) | Event::CData(_) | Event::PI(_)) if self.nested == 0 => {
                self.kept.push(vec![child]);
            }
            // indentation between direct children is regenerated
            Event::Text(_) if self.nested == 0 => {}
            other => self.keep(other),
        }
        false
    }

    fn keep(&mut self, event: Event<'x>) {
        if self.keeping {
            if let Some(group) = self.kept.last_mut() {
                group.push(event);
            }
        }
    }
}

fn is_entry(e: &BytesStart<'_>) -> bool {
    matches!(element_name(e).as_str(), ADD | REMOVE | CLEAR)
}

fn line_indent(level: usize) -> String {
    format!("\n{}", INDENT.repeat(level))
}

fn write_text(writer: &mut Writer<Vec<u8>>, text: &str) -> Result<(), XmlError> {
    writer.write_event(Event::Text(BytesText::from_escaped(text)))?;
    Ok(())
}

/// Kept children, then the section's entries, one per line
fn write_section_body(
    writer: &mut Writer<Vec<u8>>,
    section: &ConfigSection,
    kept: Vec<Vec<Event<'_>>>,
    level: usize,
) -> Result<(), XmlError> {
    let child_indent = line_indent(level);
    let mut wrote = false;
    for group in kept {
        write_text(writer, &child_indent)?;
        for event in group {
            writer.write_event(event)?;
        }
        wrote = true;
    }

    let (key_attr, value_attr) = section.kind().attributes();
    for (key, value) in section.iter() {
        let mut add = BytesStart::new(ADD);
        add.push_attribute((key_attr, key));
        add.push_attribute((value_attr, value));
        write_text(writer, &child_indent)?;
        writer.write_event(Event::Empty(add))?;
        wrote = true;
    }

    if wrote {
        write_text(writer, &line_indent(level.saturating_sub(1)))?;
    }
    Ok(())
}

/// Append the remaining sections as children of the root element
fn append_sections(
    writer: &mut Writer<Vec<u8>>,
    pending: &mut Vec<&ConfigSection>,
    at_line_start: bool,
) -> Result<(), XmlError> {
    if pending.is_empty() {
        return Ok(());
    }
    if !at_line_start {
        write_text(writer, "\n")?;
    }
    for section in pending.drain(..) {
        write_text(writer, INDENT)?;
        writer.write_event(Event::Start(BytesStart::new(section.name())))?;
        write_section_body(writer, section, Vec::new(), 2)?;
        writer.write_event(Event::End(BytesEnd::new(section.name())))?;
        write_text(writer, "\n")?;
    }
    Ok(())
}

/// Standalone section document used for `configSource` files
pub fn section_document(section: &ConfigSection) -> Result<String, XmlError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", None, None)))?;
    write_section_element(&mut writer, section)?;
    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

/// Empty section document: header and an empty element
pub fn section_stub(section: &str) -> String {
    format!("<?xml version=\"1.0\"?>\n<{0}></{0}>", section)
}

fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn wanted(e: &BytesStart<'_>, sections: &[&str], found: &HashMap<String, ParsedSection>) -> Option<String> {
    let name = element_name(e);
    (sections.contains(&name.as_str()) && !found.contains_key(&name)).then_some(name)
}

fn attribute(e: &BytesStart<'_>, key: &str) -> Result<Option<String>, XmlError> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == key.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn section_header(e: &BytesStart<'_>) -> Result<ParsedSection, XmlError> {
    let config_source = attribute(e, CONFIG_SOURCE_ATTRIBUTE)?
        .map(|source| source.trim().to_string())
        .filter(|source| !source.is_empty());
    Ok(ParsedSection {
        config_source,
        entries: Vec::new(),
    })
}

fn apply_child(current: &mut Collecting, e: &BytesStart<'_>) -> Result<(), XmlError> {
    let (key_attr, value_attr) = SectionKind::for_section(&current.name).attributes();
    match element_name(e).as_str() {
        ADD => {
            if let Some(key) = attribute(e, key_attr)? {
                let value = attribute(e, value_attr)?.unwrap_or_default();
                let normalized = key.trim().to_lowercase();
                current.entries.shift_remove(&normalized);
                current.entries.insert(normalized, (key, value));
            }
        }
        REMOVE => {
            if let Some(key) = attribute(e, key_attr)? {
                current.entries.shift_remove(&key.trim().to_lowercase());
            }
        }
        CLEAR => current.entries.clear(),
        _ => {}
    }
    Ok(())
}

fn take_pending<'s>(pending: &mut Vec<&'s ConfigSection>, e: &BytesStart<'_>) -> Option<&'s ConfigSection> {
    let name = element_name(e);
    let index = pending.iter().position(|section| section.name() == name)?;
    Some(pending.remove(index))
}

fn write_entries(writer: &mut Writer<Vec<u8>>, section: &ConfigSection) -> Result<(), XmlError> {
    let (key_attr, value_attr) = section.kind().attributes();
    for (key, value) in section.iter() {
        let mut add = BytesStart::new(ADD);
        add.push_attribute((key_attr, key));
        add.push_attribute((value_attr, value));
        writer.write_event(Event::Empty(add))?;
    }
    Ok(())
}

fn write_section_element(writer: &mut Writer<Vec<u8>>, section: &ConfigSection) -> Result<(), XmlError> {
    writer.write_event(Event::Start(BytesStart::new(section.name())))?;
    write_entries(writer, section)?;
    writer.write_event(Event::End(BytesEnd::new(section.name())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::configuration::{SectionSource, CONNECTION_STRINGS_SECTION};

    const ROOT: &str = r#"<?xml version="1.0"?>
<configuration>
  <configSections>
    <section name="cmsSettings" type="Cms.SettingsSection" />
  </configSections>
  <!-- application settings -->
  <cmsSettings>
    <add key="cms.site.title" value="Docs &amp; Guides" />
    <add key="cms.site.pagesize" value="10" />
    <remove key="cms.site.pagesize" />
  </cmsSettings>
  <connectionStrings configSource="ConnectionStrings.config" />
  <system.web compilation="debug" />
</configuration>"#;

    #[test]
    fn test_parse_inline_and_external_sections() {
        let parsed = parse_sections(ROOT, &["cmsSettings", CONNECTION_STRINGS_SECTION]).unwrap();

        let settings = &parsed["cmsSettings"];
        assert_eq!(settings.config_source, None);
        assert_eq!(
            settings.entries,
            vec![("cms.site.title".to_string(), "Docs & Guides".to_string())]
        );

        let connections = &parsed[CONNECTION_STRINGS_SECTION];
        assert_eq!(connections.config_source.as_deref(), Some("ConnectionStrings.config"));
        assert!(connections.entries.is_empty());
    }

    #[test]
    fn test_parse_reports_absent_sections_as_missing() {
        let parsed = parse_sections("<configuration/>", &["cmsSettings"]).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_parse_connection_string_entries() {
        let xml = r#"<connectionStrings>
  <clear />
  <add name="cms" connectionString="Data Source=cms.db" providerName="sqlite" />
</connectionStrings>"#;
        let parsed = parse_sections(xml, &[CONNECTION_STRINGS_SECTION]).unwrap();
        assert_eq!(
            parsed[CONNECTION_STRINGS_SECTION].entries,
            vec![("cms".to_string(), "Data Source=cms.db".to_string())]
        );
    }

    #[test]
    fn test_malformed_xml_is_an_error() {
        assert!(parse_sections("<configuration><cmsSettings></configuration>", &["cmsSettings"]).is_err());
    }

    #[test]
    fn test_rewrite_replaces_inline_section_and_keeps_other_content() {
        let mut section = ConfigSection::new("cmsSettings", SectionSource::Inline);
        section.set("cms.site.title", "Handbook");

        let rewritten = rewrite_root(Some(ROOT), &[&section]).unwrap();

        assert!(rewritten.contains(r#"<add key="cms.site.title" value="Handbook"/>"#));
        assert!(!rewritten.contains("Docs &amp; Guides"));
        assert!(rewritten.contains("application settings"));

        let parsed = parse_sections(
            &rewritten,
            &["cmsSettings", CONNECTION_STRINGS_SECTION, "system.web"],
        )
        .unwrap();
        assert_eq!(
            parsed["cmsSettings"].entries,
            vec![("cms.site.title".to_string(), "Handbook".to_string())]
        );
        assert_eq!(
            parsed[CONNECTION_STRINGS_SECTION].config_source.as_deref(),
            Some("ConnectionStrings.config")
        );
        assert!(parsed.contains_key("system.web"));
    }

    #[test]
    fn test_rewrite_without_sections_copies_document_verbatim() {
        assert_eq!(rewrite_root(Some(ROOT), &[]).unwrap(), ROOT);
    }

    #[test]
    fn test_rewrite_keeps_foreign_text_and_non_entry_children() {
        let root = r#"<?xml version="1.0"?>
<configuration>
  <note xml:space="preserve">  two  spaces  </note>
  <cmsSettings>
    <!-- keep me -->
    <add key="old" value="1"/>
    <extension type="custom"><option>on</option></extension>
  </cmsSettings>
</configuration>
"#;
        let mut section = ConfigSection::new("cmsSettings", SectionSource::Inline);
        section.set("new", "2");

        let rewritten = rewrite_root(Some(root), &[&section]).unwrap();

        assert_eq!(
            rewritten,
            r#"<?xml version="1.0"?>
<configuration>
  <note xml:space="preserve">  two  spaces  </note>
  <cmsSettings>
    <!-- keep me -->
    <extension type="custom"><option>on</option></extension>
    <add key="new" value="2"/>
  </cmsSettings>
</configuration>
"#
        );
    }

    #[test]
    fn test_rewrite_appends_undeclared_section_to_root() {
        let mut section = ConfigSection::new("cmsSettings", SectionSource::Undeclared);
        section.set("a.b", "c");

        let rewritten = rewrite_root(Some("<configuration><other/></configuration>"), &[&section]).unwrap();
        let parsed = parse_sections(&rewritten, &["cmsSettings", "other"]).unwrap();

        assert_eq!(parsed["cmsSettings"].entries, vec![("a.b".to_string(), "c".to_string())]);
        assert!(parsed.contains_key("other"));
    }

    #[test]
    fn test_rewrite_expands_self_closing_root() {
        let mut section = ConfigSection::new("cmsSettings", SectionSource::Undeclared);
        section.set("x", "1");

        let rewritten = rewrite_root(Some("<configuration/>"), &[&section]).unwrap();
        let parsed = parse_sections(&rewritten, &["cmsSettings"]).unwrap();

        assert_eq!(parsed["cmsSettings"].entries, vec![("x".to_string(), "1".to_string())]);
    }

    #[test]
    fn test_rewrite_without_document_creates_configuration_root() {
        let mut section = ConfigSection::new(CONNECTION_STRINGS_SECTION, SectionSource::Undeclared);
        section.set("cms", "Data Source=cms.db");

        let created = rewrite_root(None, &[&section]).unwrap();

        assert!(created.starts_with("<?xml version=\"1.0\"?>"));
        assert!(created.contains("<configuration>"));
        assert!(created.contains(r#"<add name="cms" connectionString="Data Source=cms.db"/>"#));
    }

    #[test]
    fn test_section_document_and_stub() {
        let mut section = ConfigSection::new("cmsSettings", SectionSource::External("s.config".into()));
        section.set("k", "v");
        let document = section_document(&section).unwrap();
        let parsed = parse_sections(&document, &["cmsSettings"]).unwrap();
        assert_eq!(parsed["cmsSettings"].entries, vec![("k".to_string(), "v".to_string())]);

        assert_eq!(section_stub("cmsSettings"), "<?xml version=\"1.0\"?>\n<cmsSettings></cmsSettings>");
    }
}
