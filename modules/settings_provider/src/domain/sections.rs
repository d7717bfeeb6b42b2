//! Configuration section ensurer
//!
//! Guarantees that the custom sections the provider reads exist before they are
//! looked up, creating empty external section files on first use. Checks are
//! memoized per section name.

use super::repository::ConfigurationStore;
use crate::config::SectionCheckPolicy;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

/// Memo of section names already checked, with per-name guards
pub struct SectionEnsurer {
    policy: SectionCheckPolicy,
    /// section name -> root file modification time observed at check
    checked: Mutex<HashMap<String, Option<SystemTime>>>,
    guards: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    checks: AtomicUsize,
}

impl SectionEnsurer {
    pub fn new(policy: SectionCheckPolicy) -> Self {
        Self {
            policy,
            checked: Mutex::new(HashMap::new()),
            guards: DashMap::new(),
            checks: AtomicUsize::new(0),
        }
    }

    /// Make sure `section` exists in `store`.
    ///
    /// The name is marked checked before parsing, so a failed check is not
    /// retried until [`SectionEnsurer::reset`] (or, with
    /// [`SectionCheckPolicy::OnModification`], until the root file changes).
    pub async fn ensure_exists(
        &self,
        store: &dyn ConfigurationStore,
        section: &str,
    ) -> anyhow::Result<()> {
        if self.is_checked(store, section).await? {
            return Ok(());
        }

        let guard = self
            .guards
            .entry(section.to_string())
            .or_default()
            .clone();
        let _lock = guard.lock().await;

        if self.is_checked(store, section).await? {
            return Ok(());
        }

        let stamp = match self.policy {
            SectionCheckPolicy::ProcessLifetime => None,
            SectionCheckPolicy::OnModification => store.last_modified().await?,
        };
        self.checked.lock().insert(section.to_string(), stamp);
        self.checks.fetch_add(1, Ordering::Relaxed);

        let Some(declaration) = store.section_declaration(section).await? else {
            tracing::debug!(section, "section not declared in root configuration");
            return Ok(());
        };
        let Some(path) = declaration.resolved_path else {
            return Ok(());
        };
        if tokio::fs::try_exists(&path).await? {
            return Ok(());
        }

        store.create_section_stub(section, &path).await?;
        tracing::info!(section, path = %path.display(), "created empty configuration section");
        Ok(())
    }

    /// Forget every checked section.
    ///
    /// Guards held by a check in flight are kept so it stays serialized with
    /// the checks that follow.
    pub fn reset(&self) {
        self.checked.lock().clear();
        self.guards.retain(|_, guard| Arc::strong_count(guard) > 1);
    }

    /// Number of section names with a live guard
    pub fn guarded_sections(&self) -> usize {
        self.guards.len()
    }

    /// Number of times a root file was parsed for a section check
    pub fn checks_performed(&self) -> usize {
        self.checks.load(Ordering::Relaxed)
    }

    async fn is_checked(&self, store: &dyn ConfigurationStore, section: &str) -> anyhow::Result<bool> {
        let recorded = match self.checked.lock().get(section) {
            Some(stamp) => *stamp,
            None => return Ok(false),
        };
        match self.policy {
            SectionCheckPolicy::ProcessLifetime => Ok(true),
            SectionCheckPolicy::OnModification => Ok(store.last_modified().await? == recorded),
        }
    }
}

impl Default for SectionEnsurer {
    fn default() -> Self {
        Self::new(SectionCheckPolicy::default())
    }
}
