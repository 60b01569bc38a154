//! Container registry for one `up` invocation

use super::service::Container;
use crate::error::{ComposeError, Result};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Map of container ID to the container definition it was launched from.
///
/// Shared by every launch task of an `up`. Each ID is written at most once.
#[derive(Debug, Default)]
pub struct Registry {
    containers: Mutex<HashMap<String, Container>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Container>>> {
        self.containers
            .lock()
            .map_err(|_| ComposeError::Lock("Failed to acquire registry lock".to_string()))
    }

    /// Record a launched container
    pub fn insert(&self, id: &str, container: Container) -> Result<()> {
        let mut containers = self.lock()?;

        if let Some(existing) = containers.get(id) {
            return Err(ComposeError::Internal(format!(
                "container ID {} already registered for {}, refusing to register {}",
                id, existing.name, container.name
            )));
        }

        containers.insert(id.to_string(), container);
        Ok(())
    }

    /// Get a registered container by ID
    pub fn get(&self, id: &str) -> Result<Option<Container>> {
        Ok(self.lock()?.get(id).cloned())
    }

    /// All registered IDs, sorted
    pub fn ids(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.lock()?.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    /// Copy of the current contents
    pub fn snapshot(&self) -> Result<HashMap<String, Container>> {
        Ok(self.lock()?.clone())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }
}
