//! Configuration for settings provider module

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix of environment overrides, e.g. `SETTINGS_PROVIDER_CONFIG_PATH`
pub const ENV_PREFIX: &str = "SETTINGS_PROVIDER_";

/// When a verified configuration section is checked again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionCheckPolicy {
    /// Once per process, until the cache is cleared
    #[default]
    ProcessLifetime,
    /// Again whenever the root file's modification time changes
    OnModification,
}

/// Default binding given to settings types at start-up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingMode {
    /// Default instances, never read from the store
    SelfBinding,
    /// Read through the provider once per request
    #[default]
    RequestScoped,
}

/// Settings provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Root XML configuration file
    #[serde(default = "default_config_path")]
    pub config_path: PathBuf,

    /// Directory `configSource` references resolve against; defaults to the
    /// root file's directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<PathBuf>,

    /// Name of the app settings section
    #[serde(default = "default_settings_section")]
    pub settings_section: String,

    #[serde(default)]
    pub section_check: SectionCheckPolicy,

    #[serde(default)]
    pub binding_mode: BindingMode,

    /// UI culture for users without a preference
    #[serde(default = "default_ui_culture")]
    pub default_ui_culture: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: default_config_path(),
            base_dir: None,
            settings_section: default_settings_section(),
            section_check: SectionCheckPolicy::default(),
            binding_mode: BindingMode::default(),
            default_ui_culture: default_ui_culture(),
        }
    }
}

impl Config {
    /// Defaults, then the YAML file at `path` if present, then environment overrides
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()?;
        Ok(config)
    }
}

fn default_config_path() -> PathBuf {
    PathBuf::from("web.config")
}

fn default_settings_section() -> String {
    "cmsSettings".to_string()
}

fn default_ui_culture() -> String {
    "en-GB".to_string()
}
