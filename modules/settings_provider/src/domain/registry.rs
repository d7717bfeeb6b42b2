//! Settings type catalog
//!
//! Settings types are registered at link time with `inventory::submit!` or
//! listed explicitly. Each descriptor carries a typed handler, so erased
//! callers can load and save an instance by its type tag.

use super::service::Service;
use crate::contract::{ErasedSettings, Settings, SettingsError, SettingsKind};
use async_trait::async_trait;
use std::any::TypeId;
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Typed load/save entry points behind a type tag
#[async_trait]
pub trait SettingsHandler: Send + Sync {
    async fn load(&self, service: &Service) -> Result<Box<dyn ErasedSettings>, SettingsError>;

    async fn save(&self, service: &Service, settings: &dyn ErasedSettings) -> Result<(), SettingsError>;
}

struct TypedHandler<T>(PhantomData<fn() -> T>);

#[async_trait]
impl<T: Settings> SettingsHandler for TypedHandler<T> {
    async fn load(&self, service: &Service) -> Result<Box<dyn ErasedSettings>, SettingsError> {
        let settings = service.get_system_settings::<T>().await?;
        Ok(Box::new(settings))
    }

    async fn save(&self, service: &Service, settings: &dyn ErasedSettings) -> Result<(), SettingsError> {
        let typed = settings
            .as_any()
            .downcast_ref::<T>()
            .ok_or(SettingsError::TypeMismatch {
                expected: T::TYPE_NAME,
                actual: settings.type_name(),
            })?;
        service.save_settings(typed).await
    }
}

/// Descriptor of one settings type
#[derive(Clone)]
pub struct SettingsType {
    type_id: TypeId,
    type_name: &'static str,
    kind: SettingsKind,
    create_default: fn() -> Box<dyn ErasedSettings>,
    handler: Arc<dyn SettingsHandler>,
}

impl SettingsType {
    pub fn of<T: Settings>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: T::TYPE_NAME,
            kind: T::KIND,
            create_default: || Box::new(T::default()),
            handler: Arc::new(TypedHandler::<T>(PhantomData)),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn kind(&self) -> SettingsKind {
        self.kind
    }

    /// Fresh default-constructed instance
    pub fn create_default(&self) -> Box<dyn ErasedSettings> {
        (self.create_default)()
    }

    pub fn handler(&self) -> &Arc<dyn SettingsHandler> {
        &self.handler
    }
}

impl fmt::Debug for SettingsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsType")
            .field("type_name", &self.type_name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Link-time registration of a settings type
pub struct SettingsRegistration {
    describe: fn() -> SettingsType,
}

impl SettingsRegistration {
    pub const fn new(describe: fn() -> SettingsType) -> Self {
        Self { describe }
    }
}

inventory::collect!(SettingsRegistration);

/// Known settings types, sorted by type name
#[derive(Debug, Clone, Default)]
pub struct SettingsCatalog {
    types: Vec<SettingsType>,
}

impl SettingsCatalog {
    /// Every type registered with `inventory::submit!` in the final binary
    pub fn discover() -> Self {
        Self::from_types(
            inventory::iter::<SettingsRegistration>
                .into_iter()
                .map(|registration| (registration.describe)())
                .collect(),
        )
    }

    /// Explicit list; duplicates of the same Rust type are dropped
    pub fn from_types(types: Vec<SettingsType>) -> Self {
        let mut seen = HashSet::new();
        let mut types: Vec<SettingsType> = types
            .into_iter()
            .filter(|ty| seen.insert(ty.type_id))
            .collect();
        types.sort_by(|a, b| a.type_name.cmp(b.type_name));
        Self { types }
    }

    /// Add a type unless it is already present
    pub fn with<T: Settings>(mut self) -> Self {
        if !self.types.iter().any(|ty| ty.type_id == TypeId::of::<T>()) {
            self.types.push(SettingsType::of::<T>());
            self.types.sort_by(|a, b| a.type_name.cmp(b.type_name));
        }
        self
    }

    pub fn get(&self, type_name: &str) -> Option<&SettingsType> {
        self.types.iter().find(|ty| ty.type_name == type_name)
    }

    pub fn get_by_id(&self, type_id: TypeId) -> Option<&SettingsType> {
        self.types.iter().find(|ty| ty.type_id == type_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SettingsType> {
        self.types.iter()
    }

    pub fn of_kind(&self, kind: SettingsKind) -> impl Iterator<Item = &SettingsType> {
        self.types.iter().filter(move |ty| ty.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
