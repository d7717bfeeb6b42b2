//! Settings bindings and request scopes
//!
//! Every settings type in the catalog gets a binding at start-up unless one was
//! registered explicitly before. Bound types are then resolvable once per
//! logical request through a [`RequestScope`].

use super::registry::{SettingsCatalog, SettingsType};
use super::service::Service;
use crate::config::BindingMode;
use crate::contract::{ErasedSettings, RequestContext, Settings, SettingsError, SettingsKind};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

/// Produces settings instances for a request
#[async_trait]
pub trait SettingsBinder: Send + Sync {
    async fn resolve(
        &self,
        ty: &SettingsType,
        ctx: &RequestContext,
    ) -> Result<Box<dyn ErasedSettings>, SettingsError>;
}

/// Binder for system settings: reads them through the provider
pub struct SystemSettingsBinder {
    service: Arc<Service>,
}

impl SystemSettingsBinder {
    pub fn new(service: Arc<Service>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl SettingsBinder for SystemSettingsBinder {
    async fn resolve(
        &self,
        ty: &SettingsType,
        _ctx: &RequestContext,
    ) -> Result<Box<dyn ErasedSettings>, SettingsError> {
        ty.handler().load(&self.service).await
    }
}

/// How a settings type is produced
#[derive(Clone)]
pub enum Binding {
    /// A fresh default instance on every resolve, without touching any store
    ToSelf,
    /// Resolved through a binder once per request scope
    RequestScoped(Arc<dyn SettingsBinder>),
}

/// Registered bindings keyed by settings type
#[derive(Default)]
pub struct SettingsBindings {
    bindings: RwLock<HashMap<TypeId, (SettingsType, Binding)>>,
}

impl SettingsBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the binding of `ty`
    pub fn bind(&self, ty: SettingsType, binding: Binding) {
        self.bindings.write().insert(ty.type_id(), (ty, binding));
    }

    pub fn has_binding(&self, type_id: TypeId) -> bool {
        self.bindings.read().contains_key(&type_id)
    }

    pub fn len(&self) -> usize {
        self.bindings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.read().is_empty()
    }

    /// Give every catalog type without a binding its default binding.
    ///
    /// Returns the number of bindings added. In [`BindingMode::RequestScoped`]
    /// a type whose kind has no binder is an error; nothing is bound in that case.
    pub fn bind_conventions(
        &self,
        catalog: &SettingsCatalog,
        mode: BindingMode,
        system_binder: Arc<dyn SettingsBinder>,
        site_binder: Option<Arc<dyn SettingsBinder>>,
    ) -> Result<usize, SettingsError> {
        let mut pending = Vec::new();
        for ty in catalog.iter() {
            if self.has_binding(ty.type_id()) {
                tracing::debug!(settings_type = ty.type_name(), "keeping existing binding");
                continue;
            }
            let binding = match mode {
                BindingMode::SelfBinding => Binding::ToSelf,
                BindingMode::RequestScoped => match ty.kind() {
                    SettingsKind::System => Binding::RequestScoped(system_binder.clone()),
                    SettingsKind::Site => match &site_binder {
                        Some(binder) => Binding::RequestScoped(binder.clone()),
                        None => {
                            return Err(SettingsError::MissingBinder {
                                kind: SettingsKind::Site,
                                type_name: ty.type_name(),
                            })
                        }
                    },
                },
            };
            pending.push((ty.clone(), binding));
        }

        let added = pending.len();
        let mut bindings = self.bindings.write();
        for (ty, binding) in pending {
            bindings.entry(ty.type_id()).or_insert((ty, binding));
        }
        tracing::info!(added, ?mode, "bound settings types");
        Ok(added)
    }

    /// Start a scope for one logical request
    pub fn begin_request(self: &Arc<Self>, ctx: RequestContext) -> RequestScope {
        RequestScope {
            bindings: Arc::clone(self),
            ctx,
            resolved: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    fn lookup(&self, type_id: TypeId) -> Option<(SettingsType, Binding)> {
        self.bindings.read().get(&type_id).cloned()
    }
}

/// Settings resolved for one request; dropped with it
pub struct RequestScope {
    bindings: Arc<SettingsBindings>,
    ctx: RequestContext,
    resolved: tokio::sync::Mutex<HashMap<TypeId, Box<dyn ErasedSettings>>>,
}

impl RequestScope {
    pub fn context(&self) -> &RequestContext {
        &self.ctx
    }

    /// Instance of `T` for this request
    pub async fn resolve<T: Settings>(&self) -> Result<T, SettingsError> {
        let Some((ty, binding)) = self.bindings.lookup(TypeId::of::<T>()) else {
            return Err(SettingsError::NotBound {
                type_name: T::TYPE_NAME.to_string(),
            });
        };

        let binder = match binding {
            Binding::ToSelf => return Ok(T::default()),
            Binding::RequestScoped(binder) => binder,
        };

        let mut resolved = self.resolved.lock().await;
        if let Some(existing) = resolved.get(&ty.type_id()) {
            return downcast::<T>(existing.as_ref());
        }

        let instance = binder.resolve(&ty, &self.ctx).await?;
        let typed = downcast::<T>(instance.as_ref())?;
        resolved.insert(ty.type_id(), instance);
        Ok(typed)
    }
}

fn downcast<T: Settings>(instance: &dyn ErasedSettings) -> Result<T, SettingsError> {
    instance
        .as_any()
        .downcast_ref::<T>()
        .cloned()
        .ok_or(SettingsError::TypeMismatch {
            expected: T::TYPE_NAME,
            actual: instance.type_name(),
        })
}
