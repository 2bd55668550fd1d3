//! Persistent container: schema, backend and the shared view context.

use crate::backend::{FileStore, MemoryStore, PersistentStore};
use crate::context::ManagedContext;
use crate::error::Result;
use crate::schema::Model;
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Where committed objects live.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum StoreLocation {
    /// Process memory; nothing survives the container.
    #[default]
    InMemory,
    /// Snapshot file inside this directory.
    Directory(PathBuf),
}

/// Container configuration.
#[derive(Clone, Debug)]
pub struct ContainerConfig {
    /// Name used in diagnostics.
    pub name: String,

    /// Backing store location.
    pub location: StoreLocation,

    /// Whether to create the store directory if it doesn't exist.
    pub create_if_missing: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            location: StoreLocation::InMemory,
            create_if_missing: true,
        }
    }
}

/// A configured persistence stack.
///
/// Owned by the application and shared as `Arc<PersistentContainer>`. The
/// view context is the single working context that record-level operations
/// go through; `new_context` hands out independent contexts that only see
/// committed data.
pub struct PersistentContainer {
    name: String,
    model: Arc<Model>,
    store: Arc<dyn PersistentStore>,
    view_context: Mutex<ManagedContext>,
}

impl PersistentContainer {
    /// Open the backend described by `config`.
    pub fn open(config: ContainerConfig, model: Model) -> Result<Self> {
        let store: Arc<dyn PersistentStore> = match &config.location {
            StoreLocation::InMemory => Arc::new(MemoryStore::new()),
            StoreLocation::Directory(path) => {
                Arc::new(FileStore::open(path, config.create_if_missing)?)
            }
        };

        info!(name = %config.name, location = ?config.location, "opened persistent container");
        Ok(Self::with_store(config.name, model, store))
    }

    /// A container over a fresh in-memory backend.
    pub fn in_memory(model: Model) -> Self {
        Self::with_store("in-memory", model, Arc::new(MemoryStore::new()))
    }

    /// A container over a caller-supplied backend.
    pub fn with_store(
        name: impl Into<String>,
        model: Model,
        store: Arc<dyn PersistentStore>,
    ) -> Self {
        let model = Arc::new(model);
        let view_context = ManagedContext::new(Arc::clone(&model), Arc::clone(&store));
        Self {
            name: name.into(),
            model,
            store,
            view_context: Mutex::new(view_context),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Lock the shared view context.
    pub fn view_context(&self) -> MutexGuard<'_, ManagedContext> {
        self.view_context.lock()
    }

    /// A new, empty context over the same backend.
    pub fn new_context(&self) -> ManagedContext {
        ManagedContext::new(Arc::clone(&self.model), Arc::clone(&self.store))
    }
}

impl fmt::Debug for PersistentContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentContainer")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeType, EntityDescription};
    use serde_json::json;
    use tempfile::TempDir;

    fn model() -> Model {
        Model::new().with_entity(EntityDescription::new("Task").attribute("title", AttributeType::String))
    }

    #[test]
    fn test_new_context_sees_only_committed() {
        let container = PersistentContainer::in_memory(model());

        let id = {
            let mut ctx = container.view_context();
            let id = ctx.insert("Task").unwrap();
            ctx.set_value(id, "title", json!("draft")).unwrap();
            id
        };

        assert!(container.new_context().fetch("Task", None).unwrap().is_empty());

        container.view_context().save().unwrap();
        let records = container.new_context().fetch("Task", None).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id);
    }

    #[test]
    fn test_open_directory_store() {
        let dir = TempDir::new().unwrap();
        let config = ContainerConfig {
            name: "tasks".into(),
            location: StoreLocation::Directory(dir.path().join("tasks")),
            create_if_missing: true,
        };

        let container = PersistentContainer::open(config, model()).unwrap();
        assert_eq!(container.name(), "tasks");
        assert!(dir.path().join("tasks").exists());
    }

    #[test]
    fn test_default_config_is_in_memory() {
        let config = ContainerConfig::default();
        assert_eq!(config.location, StoreLocation::InMemory);
        assert!(PersistentContainer::open(config, model()).is_ok());
    }
}
