//! Provider registry — named handles with priorities and health flags.
//!
//! Handles are built by a factory at registration time; a factory error means
//! the provider is simply not registered. Priorities are independent of
//! health: a failed provider keeps its slot and is skipped until reset.
//!
//! All state sits behind one `parking_lot::RwLock`. Handles are cloned out of
//! the lock before any call is awaited.

use std::collections::BTreeMap;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{info, warn};

use super::provider::{LlmError, LlmProvider};

/// Shared handle to a provider.
pub type ProviderHandle = Arc<dyn LlmProvider>;

struct Entry {
    provider: ProviderHandle,
    priority: u32,
    available: bool,
    last_error: Option<String>,
}

impl Entry {
    fn new(provider: ProviderHandle, priority: u32) -> Self {
        Self {
            provider,
            priority,
            available: true,
            last_error: None,
        }
    }

    /// Not marked failed, and the provider's own predicate holds.
    fn is_usable(&self) -> bool {
        self.available && self.provider.check_health()
    }
}

/// Point-in-time view of one registered provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderStatus {
    pub name: String,
    pub priority: u32,
    pub available: bool,
    pub last_error: Option<String>,
    pub models: Vec<String>,
}

/// Registry of provider handles.
///
/// Iteration order is registration order; priority ties resolve the same way.
#[derive(Default)]
pub struct ProviderRegistry {
    entries: RwLock<IndexMap<String, Entry>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a handle with `factory` and register it under `name`.
    ///
    /// Returns `false` (and logs) if the factory fails. Re-registering a name
    /// replaces its handle and priority, clears its health state and keeps its
    /// original position for tie-breaking.
    pub fn register<F>(&self, name: &str, factory: F, priority: u32) -> bool
    where
        F: FnOnce() -> Result<ProviderHandle, LlmError>,
    {
        match factory() {
            Ok(provider) => {
                self.insert(name, provider, priority);
                true
            }
            Err(e) => {
                warn!(provider = %name, error = %e, "provider not registered");
                false
            }
        }
    }

    /// Register `name` unless it is already present.
    ///
    /// An existing registration is left untouched and `factory` is not called.
    /// The factory runs without holding the lock, so it may read the registry.
    /// If another caller registers `name` meanwhile, that registration wins.
    pub fn ensure_registered<F>(&self, name: &str, factory: F, priority: u32) -> bool
    where
        F: FnOnce() -> Result<ProviderHandle, LlmError>,
    {
        if self.entries.read().contains_key(name) {
            return true;
        }
        match factory() {
            Ok(provider) => {
                let mut entries = self.entries.write();
                if let indexmap::map::Entry::Vacant(slot) = entries.entry(name.to_string()) {
                    slot.insert(Entry::new(provider, priority));
                    info!(provider = %name, priority, "provider registered");
                }
                true
            }
            Err(e) => {
                warn!(provider = %name, error = %e, "provider not registered");
                false
            }
        }
    }

    /// Register an already-built handle.
    pub fn insert(&self, name: &str, provider: ProviderHandle, priority: u32) {
        self.entries
            .write()
            .insert(name.to_string(), Entry::new(provider, priority));
        info!(provider = %name, priority, "provider registered");
    }

    /// Remove `name`. Returns whether it was present.
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.entries.write().shift_remove(name).is_some();
        if removed {
            info!(provider = %name, "provider unregistered");
        }
        removed
    }

    pub fn get(&self, name: &str) -> Option<ProviderHandle> {
        self.entries.read().get(name).map(|e| Arc::clone(&e.provider))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// Names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// All names by ascending priority, regardless of health.
    pub fn priority_order(&self) -> Vec<String> {
        let entries = self.entries.read();
        let mut ordered: Vec<(&String, u32)> =
            entries.iter().map(|(name, e)| (name, e.priority)).collect();
        // stable: ties keep registration order
        ordered.sort_by_key(|(_, priority)| *priority);
        ordered.into_iter().map(|(name, _)| name.clone()).collect()
    }

    /// Available names by ascending priority.
    pub fn available_providers(&self) -> Vec<String> {
        self.priority_order()
            .into_iter()
            .filter(|name| self.is_available(name))
            .collect()
    }

    /// Available providers to try, `preferred` first when it is available.
    ///
    /// An unavailable `preferred` is omitted, never forced in.
    pub fn fallback_chain(&self, preferred: Option<&str>) -> Vec<String> {
        let mut chain = self.available_providers();
        if let Some(preferred) = preferred
            && let Some(pos) = chain.iter().position(|n| n == preferred)
        {
            let name = chain.remove(pos);
            chain.insert(0, name);
        }
        chain
    }

    /// Whether `name` is registered and usable.
    pub fn is_available(&self, name: &str) -> bool {
        self.entries.read().get(name).is_some_and(Entry::is_usable)
    }

    /// Local health of every provider. No network I/O.
    pub fn check_health_all(&self) -> BTreeMap<String, bool> {
        self.entries
            .read()
            .iter()
            .map(|(name, e)| (name.clone(), e.is_usable()))
            .collect()
    }

    pub fn status(&self, name: &str) -> Option<ProviderStatus> {
        self.entries.read().get(name).map(|e| ProviderStatus {
            name: name.to_string(),
            priority: e.priority,
            available: e.is_usable(),
            last_error: e.last_error.clone(),
            models: e.provider.list_models(),
        })
    }

    /// Status of every provider, by ascending priority.
    pub fn statuses(&self) -> Vec<ProviderStatus> {
        self.priority_order()
            .iter()
            .filter_map(|name| self.status(name))
            .collect()
    }

    /// Mark `name` unavailable after a failed call.
    pub fn mark_failed(&self, name: &str, error: &str) {
        if let Some(entry) = self.entries.write().get_mut(name) {
            entry.available = false;
            entry.last_error = Some(error.to_string());
            warn!(provider = %name, error, "provider marked unavailable");
        }
    }

    /// Clear failure state for one provider, or for all with `None`.
    pub fn reset_health(&self, name: Option<&str>) {
        let mut entries = self.entries.write();
        let reset = |entry: &mut Entry| {
            entry.available = true;
            entry.last_error = None;
        };
        match name {
            Some(name) => {
                if let Some(entry) = entries.get_mut(name) {
                    reset(entry);
                }
            }
            None => entries.values_mut().for_each(reset),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
