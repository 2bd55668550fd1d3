//! Durable storage behind a container.
//!
//! A `PersistentStore` holds committed objects and applies change sets
//! atomically. Contexts read from it and hand it their pending changes
//! on save.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::Result;
use crate::types::{AttributeMap, ObjectId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An object as held by the backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
    pub id: ObjectId,
    pub entity: String,
    pub attributes: AttributeMap,
}

/// Pending changes handed to a backend in one commit.
#[derive(Clone, Debug, Default)]
pub struct ChangeSet {
    pub inserted: Vec<StoredObject>,
    pub updated: Vec<StoredObject>,
    pub deleted: Vec<ObjectId>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    /// Total number of object changes.
    pub fn len(&self) -> usize {
        self.inserted.len() + self.updated.len() + self.deleted.len()
    }
}

/// Backing store for committed objects.
pub trait PersistentStore: Send + Sync {
    /// All committed objects of an entity, ordered by id.
    fn load(&self, entity: &str) -> Result<Vec<StoredObject>>;

    /// A single committed object.
    fn get(&self, id: ObjectId) -> Result<Option<StoredObject>>;

    /// Apply a change set. Either all changes become durable or none do.
    fn commit(&self, changes: ChangeSet) -> Result<()>;

    /// Reserve a fresh object id.
    fn next_object_id(&self) -> ObjectId;
}

/// Committed objects plus the id counter, shared by both backends.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct StoreState {
    next_id: u64,
    objects: BTreeMap<ObjectId, StoredObject>,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            next_id: 1,
            objects: BTreeMap::new(),
        }
    }
}

impl StoreState {
    pub(crate) fn load(&self, entity: &str) -> Vec<StoredObject> {
        self.objects
            .values()
            .filter(|o| o.entity == entity)
            .cloned()
            .collect()
    }

    pub(crate) fn get(&self, id: ObjectId) -> Option<StoredObject> {
        self.objects.get(&id).cloned()
    }

    pub(crate) fn allocate_id(&mut self) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        id
    }

    pub(crate) fn apply(&mut self, changes: ChangeSet) {
        for object in changes.inserted.into_iter().chain(changes.updated) {
            self.next_id = self.next_id.max(object.id.0 + 1);
            self.objects.insert(object.id, object);
        }
        for id in changes.deleted {
            self.objects.remove(&id);
        }
    }

    /// Keep the id counter at least as far as `live`, which may have handed
    /// out ids while this copy was being written.
    pub(crate) fn catch_up_ids(&mut self, live: &StoreState) {
        self.next_id = self.next_id.max(live.next_id);
    }

    pub(crate) fn len(&self) -> usize {
        self.objects.len()
    }
}
