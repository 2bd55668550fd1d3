//! In-process backend.

use super::{ChangeSet, PersistentStore, StoreState, StoredObject};
use crate::error::Result;
use crate::types::ObjectId;
use parking_lot::RwLock;

/// Keeps committed objects in memory for the lifetime of the process.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed objects across all entities.
    pub fn object_count(&self) -> usize {
        self.state.read().len()
    }
}

impl PersistentStore for MemoryStore {
    fn load(&self, entity: &str) -> Result<Vec<StoredObject>> {
        Ok(self.state.read().load(entity))
    }

    fn get(&self, id: ObjectId) -> Result<Option<StoredObject>> {
        Ok(self.state.read().get(id))
    }

    fn commit(&self, changes: ChangeSet) -> Result<()> {
        self.state.write().apply(changes);
        Ok(())
    }

    fn next_object_id(&self) -> ObjectId {
        self.state.write().allocate_id()
    }
}
