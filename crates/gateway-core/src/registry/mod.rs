//! Registry & Loader (SPEC_FULL.md §4.A): parse/validate declarative connector specs and
//! serve them by id.

mod loader;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use arc_swap::ArcSwap;
use gateway_support::arc::Atomic;

pub use loader::Loader;

use crate::types::{Connector, EndpointSpec, Environment};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("connector not found: {0}")]
    ConnectorNotFound(String),
    #[error("endpoint not found: {0}")]
    EndpointNotFound(String),
    #[error("environment not found: {0}")]
    EnvironmentNotFound(String),
    #[error("invalid connector spec: {0}")]
    Invalid(String),
    #[error("io error: {0}")]
    Io(String),
}

/// Immutable-while-serving catalog of connectors. Reads never block on a writer: every
/// lookup takes an `Arc` snapshot of the whole map off an [`ArcSwap`], the same hot-swap
/// idiom the original's load balancer uses for its endpoint groups. `load_all` and `reload`
/// both publish a brand new map atomically rather than mutating one in place.
pub struct Registry {
    config_dir: PathBuf,
    connectors: Atomic<HashMap<String, Connector>>,
}

impl Registry {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Registry {
            config_dir: config_dir.into(),
            connectors: std::sync::Arc::new(ArcSwap::from_pointee(HashMap::new())),
        }
    }

    /// Loads every connector file in `config_dir`, failing fast on the first invalid one.
    pub fn load_all(&self) -> Result<(), RegistryError> {
        let loaded = Loader::load_all(&self.config_dir)?;
        let mut map = HashMap::with_capacity(loaded.len());
        for connector in loaded {
            map.insert(connector.id.clone(), connector);
        }
        self.connectors.store(std::sync::Arc::new(map));
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.connectors.load().len()
    }

    pub fn get(&self, id: &str) -> Result<Connector, RegistryError> {
        self.connectors
            .load()
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::ConnectorNotFound(id.to_string()))
    }

    pub fn list(&self) -> Vec<Connector> {
        self.connectors.load().values().cloned().collect()
    }

    /// Re-reads and re-validates a single connector file, atomically swapping in a map that
    /// differs from the current one only by that entry.
    pub fn reload(&self, id: &str) -> Result<(), RegistryError> {
        let path = self.file_path_for(id)?;
        let connector = Loader::load_file(&path)?;
        if connector.id != id {
            return Err(RegistryError::Invalid(format!(
                "reloaded file for {id} declares id {}",
                connector.id
            )));
        }
        self.connectors.rcu(|current| {
            let mut next = (**current).clone();
            next.insert(id.to_string(), connector.clone());
            next
        });
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn insert_for_test(&self, connector: Connector) {
        self.connectors.rcu(|current| {
            let mut next = (**current).clone();
            next.insert(connector.id.clone(), connector.clone());
            next
        });
    }

    fn file_path_for(&self, id: &str) -> Result<PathBuf, RegistryError> {
        for ext in ["yaml", "yml"] {
            let candidate = self.config_dir.join(format!("{id}.{ext}"));
            if candidate.exists() {
                return Ok(candidate);
            }
        }
        Err(RegistryError::ConnectorNotFound(id.to_string()))
    }

    pub fn get_endpoint(&self, id: &str, name: &str) -> Result<EndpointSpec, RegistryError> {
        let connector = self.get(id)?;
        connector
            .integration
            .endpoints
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::EndpointNotFound(name.to_string()))
    }

    pub fn get_environment(&self, id: &str, name: &str) -> Result<Environment, RegistryError> {
        let connector = self.get(id)?;
        connector
            .environments
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::EnvironmentNotFound(name.to_string()))
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}
