/// Domain events for the settings provider
///
/// Saving settings publishes a notification carrying the previous and the
/// new values:
/// - Typed listeners subscribe per settings type and receive the instances
/// - Event publishers receive a serializable event with snapshots of both
use crate::contract::{ErasedSettings, Settings, SettingsSnapshot};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// Notification for one saved settings instance
#[derive(Debug, Clone)]
pub struct SettingsSaved<T> {
    /// Stored values immediately before the save
    pub previous: T,
    /// The instance that was saved
    pub current: T,
    pub timestamp: DateTime<Utc>,
}

impl<T: Settings> SettingsSaved<T> {
    pub fn new(previous: T, current: T) -> Self {
        Self {
            previous,
            current,
            timestamp: Utc::now(),
        }
    }
}

/// Listener for saves of one settings type
#[async_trait]
pub trait SettingsSavedListener<T: Settings>: Send + Sync {
    async fn on_settings_saved(&self, event: &SettingsSaved<T>) -> anyhow::Result<()>;
}

/// Serializable domain events
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum SettingsEvent {
    /// Settings were written to the configuration store
    SettingsSaved(SettingsSavedEvent),
}

/// Event data for a settings save
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsSavedEvent {
    pub settings_type: String,
    pub previous: SettingsSnapshot,
    pub current: SettingsSnapshot,
    pub timestamp: DateTime<Utc>,
}

impl SettingsEvent {
    pub fn saved<T: Settings>(event: &SettingsSaved<T>) -> Self {
        SettingsEvent::SettingsSaved(SettingsSavedEvent {
            settings_type: T::TYPE_NAME.to_string(),
            previous: event.previous.snapshot(),
            current: event.current.snapshot(),
            timestamp: event.timestamp,
        })
    }
}

/// Event publisher trait for type-independent consumers (audit, cache busting)
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: SettingsEvent) -> anyhow::Result<()>;
}

/// No-op event publisher for testing or when events are disabled
pub struct NoOpEventPublisher;

#[async_trait]
impl EventPublisher for NoOpEventPublisher {
    async fn publish(&self, _event: SettingsEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

/// In-process event bus; delivery is awaited by the publisher
#[derive(Default)]
pub struct EventBus {
    /// TypeId of the settings type -> boxed `Arc<dyn SettingsSavedListener<T>>`
    listeners: RwLock<HashMap<TypeId, Vec<Box<dyn Any + Send + Sync>>>>,
    publishers: RwLock<Vec<Arc<dyn EventPublisher>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<T: Settings>(&self, listener: Arc<dyn SettingsSavedListener<T>>) {
        self.listeners
            .write()
            .entry(TypeId::of::<T>())
            .or_default()
            .push(Box::new(listener));
    }

    pub fn add_publisher(&self, publisher: Arc<dyn EventPublisher>) {
        self.publishers.write().push(publisher);
    }

    /// Deliver `event` to every listener of `T` and then to every publisher.
    ///
    /// Failures are logged and do not stop delivery to the remaining subscribers.
    pub async fn publish<T: Settings>(&self, event: SettingsSaved<T>) {
        let listeners: Vec<Arc<dyn SettingsSavedListener<T>>> = self
            .listeners
            .read()
            .get(&TypeId::of::<T>())
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| entry.downcast_ref::<Arc<dyn SettingsSavedListener<T>>>())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        let publishers: Vec<Arc<dyn EventPublisher>> = self.publishers.read().clone();

        for listener in listeners {
            if let Err(e) = listener.on_settings_saved(&event).await {
                tracing::warn!(settings_type = T::TYPE_NAME, error = %e, "settings saved listener failed");
            }
        }

        if publishers.is_empty() {
            return;
        }
        let erased = SettingsEvent::saved(&event);
        for publisher in publishers {
            if let Err(e) = publisher.publish(erased.clone()).await {
                tracing::warn!(settings_type = T::TYPE_NAME, error = %e, "failed to publish settings event");
            }
        }
    }
}
