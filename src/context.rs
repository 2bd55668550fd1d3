//! Working context over a persistent store.
//!
//! A context is a scratchpad: inserts, attribute changes and deletes are
//! tracked here until `save` validates them and hands them to the backend
//! as one change set. Fetches see committed objects overlaid with this
//! context's pending changes; other contexts only see what was saved.

use crate::backend::{ChangeSet, PersistentStore, StoredObject};
use crate::error::{Result, StoreError};
use crate::predicate::Predicate;
use crate::schema::Model;
use crate::types::{AttributeMap, ObjectId, Record, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Pending state of an object in a context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectState {
    /// Created in this context, not yet saved.
    Inserted,
    /// Saved object with unsaved attribute changes.
    Updated,
    /// Saved object marked for removal.
    Deleted,
}

#[derive(Clone, Debug)]
struct PendingObject {
    entity: String,
    attributes: AttributeMap,
    state: ObjectState,
}

/// A working context tracking unsaved changes.
pub struct ManagedContext {
    model: Arc<Model>,
    store: Arc<dyn PersistentStore>,
    pending: BTreeMap<ObjectId, PendingObject>,
}

impl ManagedContext {
    pub fn new(model: Arc<Model>, store: Arc<dyn PersistentStore>) -> Self {
        Self {
            model,
            store,
            pending: BTreeMap::new(),
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Insert a new object with every declared attribute set to null.
    pub fn insert(&mut self, entity: &str) -> Result<ObjectId> {
        let description = self.model.require_entity(entity)?;
        let attributes = description
            .attribute_names()
            .map(|name| (name.to_string(), Value::Null))
            .collect();

        let id = self.store.next_object_id();
        self.pending.insert(
            id,
            PendingObject {
                entity: entity.to_string(),
                attributes,
                state: ObjectState::Inserted,
            },
        );
        Ok(id)
    }

    /// Entity name of an object visible in this context.
    pub fn entity_of(&self, id: ObjectId) -> Result<String> {
        Ok(self.visible(id)?.entity)
    }

    /// Current attribute values of an object visible in this context.
    pub fn values(&self, id: ObjectId) -> Result<AttributeMap> {
        Ok(self.visible(id)?.attributes)
    }

    /// Snapshot an object as a `Record`.
    pub fn record(&self, id: ObjectId) -> Result<Record> {
        let object = self.visible(id)?;
        Ok(Record {
            id,
            entity: object.entity,
            attributes: object.attributes,
        })
    }

    /// Assign one declared attribute.
    pub fn set_value(&mut self, id: ObjectId, key: &str, value: Value) -> Result<()> {
        if !self.pending.contains_key(&id) {
            let stored = self
                .store
                .get(id)?
                .ok_or(StoreError::ObjectNotFound(id))?;
            self.check_declared(&stored.entity, key)?;

            if stored.attributes.get(key).unwrap_or(&Value::Null) == &value {
                return Ok(());
            }

            self.pending.insert(
                id,
                PendingObject {
                    entity: stored.entity,
                    attributes: stored.attributes,
                    state: ObjectState::Updated,
                },
            );
        }

        let entity = match self.pending.get(&id) {
            Some(object) if object.state != ObjectState::Deleted => object.entity.clone(),
            _ => return Err(StoreError::ObjectNotFound(id)),
        };
        self.check_declared(&entity, key)?;

        if let Some(object) = self.pending.get_mut(&id) {
            object.attributes.insert(key.to_string(), value);
        }
        Ok(())
    }

    /// Mark an object for removal. Deleting an unsaved insert discards it.
    pub fn delete(&mut self, id: ObjectId) -> Result<()> {
        match self.pending.get(&id).map(|o| o.state) {
            Some(ObjectState::Inserted) => {
                self.pending.remove(&id);
            }
            Some(ObjectState::Updated) => {
                if let Some(object) = self.pending.get_mut(&id) {
                    object.state = ObjectState::Deleted;
                }
            }
            Some(ObjectState::Deleted) => {}
            None => {
                let stored = self
                    .store
                    .get(id)?
                    .ok_or(StoreError::ObjectNotFound(id))?;
                self.pending.insert(
                    id,
                    PendingObject {
                        entity: stored.entity,
                        attributes: stored.attributes,
                        state: ObjectState::Deleted,
                    },
                );
            }
        }
        Ok(())
    }

    /// All objects of `entity` matching `predicate`, ordered by id.
    pub fn fetch(&self, entity: &str, predicate: Option<&Predicate>) -> Result<Vec<Record>> {
        let description = self.model.require_entity(entity)?;
        if let Some(predicate) = predicate {
            predicate.validate(description)?;
        }

        let mut objects: BTreeMap<ObjectId, AttributeMap> = self
            .store
            .load(entity)?
            .into_iter()
            .map(|o| (o.id, o.attributes))
            .collect();

        for (id, object) in self.pending.iter().filter(|(_, o)| o.entity == entity) {
            match object.state {
                ObjectState::Inserted | ObjectState::Updated => {
                    objects.insert(*id, object.attributes.clone());
                }
                ObjectState::Deleted => {
                    objects.remove(id);
                }
            }
        }

        let records: Vec<Record> = objects
            .into_iter()
            .filter(|(_, attributes)| predicate.map_or(true, |p| p.evaluate(attributes)))
            .map(|(id, attributes)| Record {
                id,
                entity: entity.to_string(),
                attributes,
            })
            .collect();

        debug!(entity, matched = records.len(), "fetch");
        Ok(records)
    }

    /// Whether any insert, update or delete is waiting to be saved.
    pub fn has_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Pending state of an object, if it has unsaved changes.
    pub fn state_of(&self, id: ObjectId) -> Option<ObjectState> {
        self.pending.get(&id).map(|o| o.state)
    }

    /// Validate and commit all pending changes.
    ///
    /// Returns the number of changes written; zero means nothing was pending
    /// and the backend was not touched. On error the pending changes are kept.
    pub fn save(&mut self) -> Result<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }

        let mut changes = ChangeSet::default();
        for (id, object) in &self.pending {
            if object.state == ObjectState::Deleted {
                changes.deleted.push(*id);
                continue;
            }

            let description = self.model.require_entity(&object.entity)?;
            for attribute in description.attributes() {
                let value = object.attributes.get(&attribute.name).unwrap_or(&Value::Null);
                description.validate_value(attribute, value)?;
            }

            let stored = StoredObject {
                id: *id,
                entity: object.entity.clone(),
                attributes: object.attributes.clone(),
            };
            match object.state {
                ObjectState::Inserted => changes.inserted.push(stored),
                _ => changes.updated.push(stored),
            }
        }

        let count = changes.len();
        self.store.commit(changes)?;
        self.pending.clear();

        debug!(changes = count, "context saved");
        Ok(count)
    }

    /// Discard all pending changes.
    pub fn rollback(&mut self) {
        self.pending.clear();
    }

    fn check_declared(&self, entity: &str, key: &str) -> Result<()> {
        let description = self.model.require_entity(entity)?;
        if description.attribute_named(key).is_none() {
            return Err(StoreError::UnknownAttribute {
                entity: entity.to_string(),
                attribute: key.to_string(),
            });
        }
        Ok(())
    }

    fn visible(&self, id: ObjectId) -> Result<StoredObject> {
        match self.pending.get(&id) {
            Some(object) if object.state == ObjectState::Deleted => {
                Err(StoreError::ObjectNotFound(id))
            }
            Some(object) => Ok(StoredObject {
                id,
                entity: object.entity.clone(),
                attributes: object.attributes.clone(),
            }),
            None => self
                .store
                .get(id)?
                .ok_or(StoreError::ObjectNotFound(id)),
        }
    }
}
