//! Contract models for the settings provider
//!
//! Settings types describe their persisted properties with an explicit field
//! table instead of runtime reflection. Each field carries the metadata that
//! decides where and under which key its value is stored.

use indexmap::IndexMap;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use uuid::Uuid;

/// Settings family a type belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsKind {
    /// Process-wide settings persisted in the application configuration file
    System,
    /// Per-site settings resolved through a host supplied binder
    Site,
}

impl fmt::Display for SettingsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::Site => write!(f, "site"),
        }
    }
}

/// A typed bundle of configuration properties persisted as individual keys
pub trait Settings: fmt::Debug + Clone + Default + Send + Sync + 'static {
    /// Fully qualified name of the settings type, used to derive default keys
    const TYPE_NAME: &'static str;

    /// Settings family
    const KIND: SettingsKind;

    /// Persisted properties of this type, in declaration order
    fn fields() -> Vec<SettingsField<Self>>;
}

/// Raised when a stored string cannot be converted to a property's type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot convert '{value}' to {target}: {reason}")]
pub struct ConversionError {
    /// Raw stored value
    pub value: String,
    /// Target type name
    pub target: &'static str,
    /// Parser message
    pub reason: String,
}

impl ConversionError {
    pub fn new(value: &str, target: &'static str, reason: impl fmt::Display) -> Self {
        Self {
            value: value.to_string(),
            target,
            reason: reason.to_string(),
        }
    }
}

/// Conversion between a property value and its stored string form
pub trait SettingValue: Sized {
    /// String representation, `None` when the value is absent
    fn to_setting_string(&self) -> Option<String>;

    /// Parse the stored string representation
    fn from_setting_str(raw: &str) -> Result<Self, ConversionError>;
}

impl SettingValue for String {
    fn to_setting_string(&self) -> Option<String> {
        Some(self.clone())
    }

    fn from_setting_str(raw: &str) -> Result<Self, ConversionError> {
        Ok(raw.to_string())
    }
}

impl SettingValue for bool {
    fn to_setting_string(&self) -> Option<String> {
        Some(self.to_string())
    }

    fn from_setting_str(raw: &str) -> Result<Self, ConversionError> {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("true") {
            Ok(true)
        } else if trimmed.eq_ignore_ascii_case("false") {
            Ok(false)
        } else {
            Err(ConversionError::new(raw, "bool", "expected 'true' or 'false'"))
        }
    }
}

macro_rules! parsed_setting_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl SettingValue for $ty {
                fn to_setting_string(&self) -> Option<String> {
                    Some(self.to_string())
                }

                fn from_setting_str(raw: &str) -> Result<Self, ConversionError> {
                    raw.trim()
                        .parse::<$ty>()
                        .map_err(|e| ConversionError::new(raw, stringify!($ty), e))
                }
            }
        )*
    };
}

parsed_setting_value!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize, f32, f64, Uuid);

impl<V: SettingValue> SettingValue for Option<V> {
    fn to_setting_string(&self) -> Option<String> {
        self.as_ref().and_then(SettingValue::to_setting_string)
    }

    fn from_setting_str(raw: &str) -> Result<Self, ConversionError> {
        if raw.trim().is_empty() {
            return Ok(None);
        }
        V::from_setting_str(raw).map(Some)
    }
}

type Getter<T> = Box<dyn Fn(&T) -> Option<String> + Send + Sync>;
type Setter<T> = Box<dyn Fn(&mut T, &str) -> Result<(), ConversionError> + Send + Sync>;

/// One persisted property of a settings type
pub struct SettingsField<T> {
    name: &'static str,
    app_setting_name: Option<&'static str>,
    connection_string: Option<&'static str>,
    getter: Option<Getter<T>>,
    setter: Option<Setter<T>>,
}

impl<T: 'static> SettingsField<T> {
    /// Readable and writable property
    pub fn new<V: SettingValue + 'static>(
        name: &'static str,
        get: fn(&T) -> &V,
        get_mut: fn(&mut T) -> &mut V,
    ) -> Self {
        Self {
            name,
            app_setting_name: None,
            connection_string: None,
            getter: Some(Box::new(move |settings| get(settings).to_setting_string())),
            setter: Some(Box::new(move |settings, raw| {
                *get_mut(settings) = V::from_setting_str(raw)?;
                Ok(())
            })),
        }
    }

    /// Property without a setter; never read from or written to the store
    pub fn read_only<V: SettingValue + 'static>(name: &'static str, get: fn(&T) -> &V) -> Self {
        Self {
            name,
            app_setting_name: None,
            connection_string: None,
            getter: Some(Box::new(move |settings| get(settings).to_setting_string())),
            setter: None,
        }
    }

    /// Property without a getter; never read from or written to the store
    pub fn write_only<V: SettingValue + 'static>(
        name: &'static str,
        get_mut: fn(&mut T) -> &mut V,
    ) -> Self {
        Self {
            name,
            app_setting_name: None,
            connection_string: None,
            getter: None,
            setter: Some(Box::new(move |settings, raw| {
                *get_mut(settings) = V::from_setting_str(raw)?;
                Ok(())
            })),
        }
    }

    /// Override the persisted key with a literal name
    pub fn app_setting_name(mut self, key: &'static str) -> Self {
        self.app_setting_name = Some(key);
        self
    }

    /// Persist this property as the named connection string
    pub fn connection_string(mut self, name: &'static str) -> Self {
        self.connection_string = Some(name);
        self
    }
}

impl<T> SettingsField<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn explicit_key(&self) -> Option<&'static str> {
        self.app_setting_name
    }

    pub fn connection_string_name(&self) -> Option<&'static str> {
        self.connection_string
    }

    pub fn is_read_write(&self) -> bool {
        self.getter.is_some() && self.setter.is_some()
    }

    /// Current value in its string form; `None` when absent or write-only
    pub fn read(&self, settings: &T) -> Option<String> {
        self.getter.as_ref().and_then(|get| get(settings))
    }

    /// Convert a stored string and assign it; read-only fields are left untouched
    pub fn assign(&self, settings: &mut T, raw: &str) -> Result<(), ConversionError> {
        match &self.setter {
            Some(set) => set(settings, raw),
            None => Ok(()),
        }
    }
}

impl<T> fmt::Debug for SettingsField<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsField")
            .field("name", &self.name)
            .field("app_setting_name", &self.app_setting_name)
            .field("connection_string", &self.connection_string)
            .field("readable", &self.getter.is_some())
            .field("writable", &self.setter.is_some())
            .finish()
    }
}

/// Serializable view of a settings instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsSnapshot {
    pub settings_type: String,
    pub kind: SettingsKind,
    /// Read/write property values keyed by property name
    pub values: IndexMap<String, Option<String>>,
}

/// Object-safe view over any settings type
pub trait ErasedSettings: Any + Send + Sync + fmt::Debug {
    fn type_name(&self) -> &'static str;

    fn kind(&self) -> SettingsKind;

    fn as_any(&self) -> &dyn Any;

    fn snapshot(&self) -> SettingsSnapshot;

    /// Assign a raw value to the named read/write property.
    ///
    /// Returns `false` when no such property exists.
    fn apply(&mut self, field: &str, raw: &str) -> Result<bool, ConversionError>;

    fn clone_boxed(&self) -> Box<dyn ErasedSettings>;
}

impl<T: Settings> ErasedSettings for T {
    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn kind(&self) -> SettingsKind {
        T::KIND
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn snapshot(&self) -> SettingsSnapshot {
        let values = T::fields()
            .iter()
            .filter(|field| field.is_read_write())
            .map(|field| (field.name().to_string(), field.read(self)))
            .collect();
        SettingsSnapshot {
            settings_type: T::TYPE_NAME.to_string(),
            kind: T::KIND,
            values,
        }
    }

    fn apply(&mut self, field: &str, raw: &str) -> Result<bool, ConversionError> {
        let fields = T::fields();
        match fields
            .iter()
            .find(|f| f.is_read_write() && f.name().eq_ignore_ascii_case(field))
        {
            Some(f) => {
                f.assign(self, raw)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn clone_boxed(&self) -> Box<dyn ErasedSettings> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn ErasedSettings> {
    fn clone(&self) -> Self {
        self.clone_boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Sample {
        title: String,
        retries: u32,
        enabled: bool,
        ratio: Option<f64>,
        computed: String,
    }

    impl Default for Sample {
        fn default() -> Self {
            Self {
                title: "Welcome".to_string(),
                retries: 3,
                enabled: true,
                ratio: None,
                computed: "derived".to_string(),
            }
        }
    }

    impl Settings for Sample {
        const TYPE_NAME: &'static str = "tests.Sample";
        const KIND: SettingsKind = SettingsKind::System;

        fn fields() -> Vec<SettingsField<Self>> {
            vec![
                SettingsField::new("Title", |s: &Self| &s.title, |s: &mut Self| &mut s.title),
                SettingsField::new("Retries", |s: &Self| &s.retries, |s: &mut Self| &mut s.retries),
                SettingsField::new("Enabled", |s: &Self| &s.enabled, |s: &mut Self| &mut s.enabled),
                SettingsField::new("Ratio", |s: &Self| &s.ratio, |s: &mut Self| &mut s.ratio),
                SettingsField::read_only("Computed", |s: &Self| &s.computed),
            ]
        }
    }

    #[test]
    fn test_bool_parsing_is_case_insensitive() {
        assert_eq!(bool::from_setting_str("True"), Ok(true));
        assert_eq!(bool::from_setting_str(" FALSE "), Ok(false));
        assert!(bool::from_setting_str("yes").is_err());
    }

    #[test]
    fn test_numeric_parsing_trims_and_reports_target() {
        assert_eq!(u32::from_setting_str(" 42 "), Ok(42));

        let err = u32::from_setting_str("forty").unwrap_err();
        assert_eq!(err.target, "u32");
        assert_eq!(err.value, "forty");
    }

    #[test]
    fn test_option_treats_empty_as_none() {
        assert_eq!(Option::<i64>::from_setting_str(""), Ok(None));
        assert_eq!(Option::<i64>::from_setting_str("  "), Ok(None));
        assert_eq!(Option::<i64>::from_setting_str("7"), Ok(Some(7)));
        assert_eq!(Option::<i64>::None.to_setting_string(), None);
    }

    #[test]
    fn test_read_only_field_is_skipped_by_snapshot() {
        let snapshot = Sample::default().snapshot();
        assert_eq!(snapshot.settings_type, "tests.Sample");
        assert_eq!(snapshot.values.len(), 4);
        assert!(!snapshot.values.contains_key("Computed"));
        assert_eq!(snapshot.values["Ratio"], None);
        assert_eq!(snapshot.values["Retries"], Some("3".to_string()));
    }

    #[test]
    fn test_apply_assigns_named_field() {
        let mut settings = Sample::default();
        assert_eq!(settings.apply("retries", "9"), Ok(true));
        assert_eq!(settings.apply("Computed", "ignored"), Ok(false));
        assert_eq!(settings.apply("Missing", "x"), Ok(false));
        assert_eq!(settings.retries, 9);
        assert_eq!(settings.computed, "derived");
    }

    #[test]
    fn test_erased_downcast_round_trip() {
        let erased: Box<dyn ErasedSettings> = Box::new(Sample::default());
        assert_eq!(erased.kind(), SettingsKind::System);
        let cloned = erased.clone();
        assert_eq!(cloned.as_any().downcast_ref::<Sample>(), Some(&Sample::default()));
    }
}
