use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, info};

use crate::atlas::fetch::{ImageFetcher, SourceFetcher};
use crate::atlas::manager::AtlasManager;
use crate::config::AtlasConfig;
use crate::error::AtlasError;

/// Hands out one shared [`AtlasManager`] per scope, so every consumer in a
/// scope sees the same atlas and no image is fetched twice.
pub struct AtlasRegistry {
    fetcher: Arc<dyn ImageFetcher>,
    managers: Mutex<HashMap<String, Arc<AtlasManager>>>,
}

impl std::fmt::Debug for AtlasRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scopes: Vec<String> = self
            .managers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        f.debug_struct("AtlasRegistry").field("scopes", &scopes).finish()
    }
}

impl Default for AtlasRegistry {
    fn default() -> Self {
        Self::new(Arc::new(SourceFetcher::new()))
    }
}

impl AtlasRegistry {
    pub fn new(fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self {
            fetcher,
            managers: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the scope's manager, creating it on first use.
    ///
    /// Asking for an existing scope with a different configuration is an
    /// error; the already-packed atlas would not honor it.
    pub fn manager(&self, scope: &str, config: &AtlasConfig) -> Result<Arc<AtlasManager>, AtlasError> {
        let mut managers = self.managers.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(manager) = managers.get(scope) {
            if manager.config() != config {
                return Err(AtlasError::ScopeConflict(scope.to_string()));
            }
            debug!("Reusing atlas manager for scope {:?}", scope);
            return Ok(Arc::clone(manager));
        }

        let manager = AtlasManager::new(config.clone(), Arc::clone(&self.fetcher))?;
        info!("Created atlas scope {:?}", scope);
        managers.insert(scope.to_string(), Arc::clone(&manager));
        Ok(manager)
    }

    /// Forgets the scope. Consumers still holding its manager keep working.
    pub fn release(&self, scope: &str) -> bool {
        self.managers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(scope)
            .is_some()
    }

    pub fn scopes(&self) -> Vec<String> {
        let mut scopes: Vec<String> = self
            .managers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        scopes.sort();
        scopes
    }
}
